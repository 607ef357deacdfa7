//! Paid-order export to CSV (and JSON for the CLI).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::core::error::AppResult;
use crate::storage::db::{self, DbPool};
use crate::storage::orders::{self, ExportRow};

pub const CSV_HEADER: &str =
    "order_id,user_chat_id,user_username,status,total_amount,created_at,product_id,product_name,quantity,price,line_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Quotes a text field, doubling inner quotes and flattening newlines
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\"").replace(['\n', '\r'], " "))
}

/// SQLite `CURRENT_TIMESTAMP` (`YYYY-MM-DD HH:MM:SS`) to ISO 8601.
fn iso_timestamp(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn csv_line(row: &ExportRow) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}\n",
        row.order_id,
        row.user_chat_id,
        quoted(&row.user_username),
        row.status,
        row.total_amount,
        iso_timestamp(&row.created_at),
        row.product_id,
        quoted(&row.product_name),
        row.quantity,
        row.price,
        row.line_total
    )
}

pub fn render_csv(rows: &[ExportRow], with_header: bool) -> String {
    let mut content = String::new();
    if with_header {
        content.push_str(CSV_HEADER);
        content.push('\n');
    }
    for row in rows {
        content.push_str(&csv_line(row));
    }
    content
}

pub fn render_json(rows: &[ExportRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}

fn ensure_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Appends rows to the CSV file, writing the header when the file is new or empty.
pub fn append_csv(path: &Path, rows: &[ExportRow]) -> AppResult<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;
    file.write_all(render_csv(rows, is_empty).as_bytes())?;
    Ok(())
}

/// Rewrites `path` with the given rows.
pub fn write_export(path: &Path, rows: &[ExportRow], format: ExportFormat) -> AppResult<()> {
    ensure_parent(path)?;
    let content = match format {
        ExportFormat::Csv => render_csv(rows, true),
        ExportFormat::Json => render_json(rows)?,
    };
    fs::write(path, content)?;
    Ok(())
}

/// Appends one paid order to the orders CSV on a blocking thread.
///
/// Returns the number of rows written.
pub async fn export_paid_order(pool: Arc<DbPool>, order_id: i64, path: PathBuf) -> AppResult<usize> {
    db::with_connection(&pool, move |conn| {
        let rows = orders::export_rows(conn, Some(order_id))?;
        append_csv(&path, &rows)?;
        Ok(rows.len())
    })
    .await
}
