//! Lavka - Telegram storefront bot
//!
//! This library provides the catalog, cart, checkout and order fulfillment
//! logic of the Lavka bot, including stock reservation, payment handling
//! and the Telegram dispatcher schema.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, money, pagination and order export
//! - `storage`: SQLite pool, migrations and the shop data model
//! - `telegram`: Bot commands, screens and payment handlers

#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult, Money};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{schema, HandlerDeps};
