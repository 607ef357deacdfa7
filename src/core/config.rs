use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Reads an environment variable, treating blank values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: lavka.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "lavka.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: lavka.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "lavka.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Directory that product image paths are resolved against.
/// Read from MEDIA_ROOT environment variable, supports tilde (~) expansion
/// Default: media
pub static MEDIA_ROOT: Lazy<String> = Lazy::new(|| {
    let raw = env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// CSV file that paid orders are appended to.
/// Read from ORDERS_CSV_PATH environment variable, supports tilde (~) expansion
/// Default: data/orders.csv
pub static ORDERS_CSV_PATH: Lazy<String> = Lazy::new(|| {
    let raw = env::var("ORDERS_CSV_PATH").unwrap_or_else(|_| "data/orders.csv".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Catalog browsing configuration
pub mod catalog {
    /// Categories shown per keyboard page
    pub const CATEGORIES_PER_PAGE: usize = 3;

    /// Products shown per keyboard page
    pub const PRODUCTS_PER_PAGE: usize = 5;

    /// Maximum number of FAQ entries returned to an inline query
    pub const FAQ_INLINE_LIMIT: usize = 10;

    /// Delay before the quantity prompt and its answers are cleaned up (in milliseconds)
    pub const PROMPT_CLEANUP_DELAY_MS: u64 = 1000;

    /// Largest quantity a single cart line may hold
    pub const MAX_LINE_QUANTITY: i64 = i32::MAX as i64;
}

/// Payment provider configuration
pub mod payments {
    use once_cell::sync::Lazy;
    use std::env;

    /// Provider token issued by BotFather for the connected payment provider.
    /// Read from PAYMENT_PROVIDER_TOKEN, falls back to YOOKASSA_PROVIDER_TOKEN
    pub static PROVIDER_TOKEN: Lazy<Option<String>> =
        Lazy::new(|| super::non_empty_var("PAYMENT_PROVIDER_TOKEN").or_else(|| super::non_empty_var("YOOKASSA_PROVIDER_TOKEN")));

    /// ISO 4217 currency code for invoices
    /// Read from PAYMENT_CURRENCY environment variable
    /// Default: RUB
    pub static CURRENCY: Lazy<String> = Lazy::new(|| {
        env::var("PAYMENT_CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "RUB".to_string())
    });

    /// Telegram truncates pre-checkout error messages longer than this
    pub const ERROR_MESSAGE_MAX_CHARS: usize = 200;
}

/// Stock reservation configuration
pub mod reservation {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Minutes a pending order may hold its reservation before it is released.
    /// Read from RESERVATION_TTL_MINUTES environment variable
    /// Default: 30
    pub static TTL_MINUTES: Lazy<i64> = Lazy::new(|| {
        env::var("RESERVATION_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &i64| *v > 0)
            .unwrap_or(30)
    });

    /// How often the stale reservation sweeper runs (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 300;

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin chat IDs that receive order notifications (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    pub fn is_admin(chat_id: i64) -> bool {
        ADMIN_IDS.contains(&chat_id)
    }
}

/// Bot API server configuration utilities
pub mod bot_api {
    /// Returns the BOT_API_URL environment variable if set.
    pub fn get_url() -> Option<String> {
        super::non_empty_var("BOT_API_URL")
    }
}

#[cfg(test)]
mod tests {
    use super::admin::parse_admin_ids;

    #[test]
    fn test_parse_admin_ids_mixed_separators() {
        assert_eq!(parse_admin_ids("1, 2\n3\tx 4"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_admin_ids_empty() {
        assert!(parse_admin_ids("").is_empty());
    }
}
