use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lavka::core::export::ExportFormat;

#[derive(Parser)]
#[command(name = "lavka")]
#[command(author, version, about = "Telegram storefront bot with catalog, cart and payments", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot in long polling mode
    Run,

    /// Apply database migrations and exit
    Migrate,

    /// Export all paid and shipped orders
    ExportOrders {
        /// Output file (defaults to ORDERS_CSV_PATH)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },

    /// Mark a paid order as shipped
    Ship {
        #[arg(long)]
        order_id: i64,
    },

    /// Cancel pending orders older than the reservation TTL and release their stock
    ReleaseStale {
        /// Age in minutes (defaults to RESERVATION_TTL_MINUTES)
        #[arg(short, long)]
        minutes: Option<i64>,
    },

    /// Load categories, products and FAQ entries from a JSON document
    ImportCatalog {
        #[arg(short, long)]
        file: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["lavka"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_export_orders() {
        let cli = Cli::try_parse_from(["lavka", "export-orders", "--path", "out.json", "--format", "json"]).unwrap();
        match cli.command {
            Some(Commands::ExportOrders { path, format }) => {
                assert_eq!(path, Some(PathBuf::from("out.json")));
                assert_eq!(format, ExportFormat::Json);
            }
            _ => panic!("expected export-orders"),
        }
    }

    #[test]
    fn test_ship_requires_order_id() {
        assert!(Cli::try_parse_from(["lavka", "ship"]).is_err());
        let cli = Cli::try_parse_from(["lavka", "ship", "--order-id", "7"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Ship { order_id: 7 })));
    }
}
