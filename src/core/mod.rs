//! Core utilities, configuration, and domain helpers

pub mod address;
pub mod checkout;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod money;
pub mod paginator;

// Re-exports for convenience
pub use config::*;
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_payment_configuration};
pub use money::Money;
