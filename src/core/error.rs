use thiserror::Error;

/// Centralized error types for the application
///
/// Storage and checkout operations return this enum so that handlers can
/// tell business failures (stock, order state) apart from infrastructure ones.
///
/// # Example
///
/// ```no_run
/// use lavka::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (catalog import / order export) errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow errors (migrations, startup)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced row does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Not enough free stock to cover a requested quantity
    #[error("Недостаточно товара: {description}. Доступно: {available}, Запрошено: {requested}")]
    InsufficientStock {
        product_id: i64,
        description: String,
        available: i64,
        requested: i64,
    },

    /// The order is not in the state the operation expects
    #[error("Order #{order_id} is {status}, expected pending")]
    OrderNotPending { order_id: i64, status: String },

    /// Invoice payload that was not produced by this bot
    #[error("Invalid invoice payload: {0}")]
    InvalidPayload(String),

    /// Total does not fit into the amount field of an invoice
    #[error("Order total {0} exceeds the invoice limit")]
    AmountTooLarge(i64),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Validation(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = AppError::InsufficientStock {
            product_id: 7,
            description: "Чай".to_string(),
            available: 1,
            requested: 3,
        };
        let text = err.to_string();
        assert!(text.contains("Чай"));
        assert!(text.contains("Доступно: 1"));
        assert!(text.contains("Запрошено: 3"));
    }

    #[test]
    fn test_from_str_is_validation() {
        let err: AppError = "bad".into();
        assert!(matches!(err, AppError::Validation(ref m) if m == "bad"));
    }
}
