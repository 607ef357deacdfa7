//! Database access: schema, pool, and the shop tables

pub mod cart;
pub mod catalog;
pub mod db;
pub mod faq;
pub mod import;
pub mod migrations;
pub mod orders;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
