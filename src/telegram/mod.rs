//! Telegram bot integration: dispatcher schema, screens and payment flow

pub mod bot;
pub mod callback;
pub mod cart;
pub mod catalog;
pub mod faq;
pub mod handlers;
pub mod keyboards;
pub mod messages;
pub mod notifications;
pub mod order;
pub mod sessions;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps};

/// Bot type used throughout the crate
pub type Bot = teloxide::Bot;
