//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Payment configuration diagnostics at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| anyhow::anyhow!("Failed to create log directory: {}", e))?;
        }
    }
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs payment configuration at application startup
///
/// Invoices cannot be sent to a real provider without a token, so a
/// missing one is reported loudly.
pub fn log_payment_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("💳 Payment Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match config::payments::PROVIDER_TOKEN.as_deref() {
        Some(token) => {
            let tail: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            log::info!("✅ PAYMENT_PROVIDER_TOKEN: set (…{})", tail);
        }
        None => {
            log::error!("❌ PAYMENT_PROVIDER_TOKEN: not set");
            log::error!("   Checkout will fail until a provider token from @BotFather is configured");
        }
    }
    log::info!("  • Currency: {}", config::payments::CURRENCY.as_str());
    log::info!("  • Reservation TTL: {} min", *config::reservation::TTL_MINUTES);
    log::info!("  • Orders CSV: {}", config::ORDERS_CSV_PATH.as_str());
    log::info!("  • Media root: {}", config::MEDIA_ROOT.as_str());

    if config::admin::ADMIN_IDS.is_empty() {
        log::warn!("⚠️  ADMIN_IDS: not set, paid orders will not be announced");
    } else {
        log::info!("  • Admins notified: {}", config::admin::ADMIN_IDS.len());
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
