use anyhow::Result;
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::{interval, sleep};

mod cli;

use cli::{Cli, Commands};
use lavka::core::export::{write_export, ExportFormat};
use lavka::core::{config, init_logger, log_payment_configuration};
use lavka::storage::db::{self as db, with_connection};
use lavka::storage::{create_pool, get_connection, import, orders};
use lavka::telegram::{create_bot, schema, setup_bot_commands, Bot, HandlerDeps};

/// Main entry point for the storefront bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up global panic handler to catch panics in dispatcher
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        None | Some(Commands::Run) => run_bot().await,
        Some(Commands::Migrate) => run_migrate(),
        Some(Commands::ExportOrders { path, format }) => run_export_orders(path, format),
        Some(Commands::Ship { order_id }) => run_ship(order_id),
        Some(Commands::ReleaseStale { minutes }) => run_release_stale(minutes),
        Some(Commands::ImportCatalog { file }) => run_import_catalog(&file),
    }
}

fn open_pool() -> Result<db::DbPool> {
    create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))
}

fn run_migrate() -> Result<()> {
    // Migrations run when the pool is created
    open_pool()?;
    println!("Database {} is up to date", config::DATABASE_PATH.as_str());
    Ok(())
}

fn run_export_orders(path: Option<PathBuf>, format: ExportFormat) -> Result<()> {
    let pool = open_pool()?;
    let conn = get_connection(&pool)?;
    let rows = orders::export_rows(&conn, None)?;

    let path = path.unwrap_or_else(|| PathBuf::from(config::ORDERS_CSV_PATH.as_str()));
    write_export(&path, &rows, format)?;
    println!("Exported {} rows to {} ({})", rows.len(), path.display(), format);
    Ok(())
}

fn run_ship(order_id: i64) -> Result<()> {
    let pool = open_pool()?;
    let conn = get_connection(&pool)?;
    let order = orders::mark_shipped(&conn, order_id)?;
    println!("Order #{} is now {}", order.id, order.status);
    Ok(())
}

fn run_release_stale(minutes: Option<i64>) -> Result<()> {
    let minutes = minutes.unwrap_or(*config::reservation::TTL_MINUTES);
    let pool = open_pool()?;
    let mut conn = get_connection(&pool)?;
    let released = orders::release_stale_reservations(&mut conn, minutes)?;
    println!("Released {} pending order(s) older than {} minutes", released.len(), minutes);
    Ok(())
}

fn run_import_catalog(file: &Path) -> Result<()> {
    let pool = open_pool()?;
    let mut conn = get_connection(&pool)?;
    let summary = import::import_file(&mut conn, file)?;
    println!(
        "Imported {} categories, {} products, {} FAQ entries",
        summary.categories, summary.products, summary.faq
    );
    Ok(())
}

/// Periodically cancels pending orders whose invoice was never paid.
fn start_reservation_sweeper(db_pool: Arc<db::DbPool>) {
    tokio::spawn(async move {
        let mut ticker = interval(config::reservation::sweep_interval());
        loop {
            ticker.tick().await;
            let minutes = *config::reservation::TTL_MINUTES;
            match with_connection(&db_pool, move |conn| orders::release_stale_reservations(conn, minutes)).await {
                Ok(released) if !released.is_empty() => {
                    log::info!("Released stale reservations of orders {:?}", released);
                }
                Ok(_) => {}
                Err(e) => log::error!("Reservation sweep failed: {}", e),
            }
        }
    });
}

/// Waits for the Bot API to answer `getMe`.
///
/// A local Bot API server may still be starting up, so network-like
/// failures are retried for up to five minutes.
async fn wait_for_bot_api(bot: &Bot) -> Result<teloxide::types::Me> {
    let startup_max_retries = 60;
    let mut startup_retry = 0;
    loop {
        match bot.get_me().await {
            Ok(info) => return Ok(info),
            Err(e) => {
                let err_str = e.to_string();
                let is_retryable = err_str.contains("restart")
                    || err_str.contains("network")
                    || err_str.contains("connection")
                    || err_str.contains("timed out")
                    || err_str.contains("Connection refused");

                startup_retry += 1;
                if startup_retry >= startup_max_retries || !is_retryable {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to Bot API after {} retries: {}",
                        startup_retry,
                        e
                    ));
                }

                log::warn!(
                    "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                    startup_retry,
                    startup_max_retries,
                    err_str
                );
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");

    log_payment_configuration();

    let bot = create_bot()?;
    let bot_info = wait_for_bot_api(&bot).await?;
    let bot_username = bot_info.username.clone();
    log::info!("Bot username: {:?}, Bot ID: {}", bot_username, bot_info.id);

    setup_bot_commands(&bot).await?;

    let db_pool = Arc::new(open_pool()?);

    start_reservation_sweeper(Arc::clone(&db_pool));

    let handler_deps = HandlerDeps::new(Arc::clone(&db_pool), bot_username);
    let handler = schema(handler_deps);

    log::info!("================================================");
    log::info!("🎉 Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());
    log::info!("📡 Ready to receive updates!");
    log::info!("================================================");

    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;

    // Run the dispatcher with retry logic
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Each dispatcher runs in its own task so a panic surfaces through the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            // Queued updates may hold successful payments; never drop them
            let listener = Polling::builder(bot_clone.clone()).build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Retrying dispatcher after panic (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                sleep(config::retry::dispatcher_delay()).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    Ok(())
}
