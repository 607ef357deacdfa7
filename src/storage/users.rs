//! Telegram customers.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::AppResult;

/// A customer, identified by their Telegram chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramUser {
    pub id: i64,
    pub chat_id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub joined_at: String,
}

impl TelegramUser {
    /// Name shown to admins: `@username`, else the chat id.
    pub fn display_name(&self) -> String {
        if self.username.is_empty() {
            self.chat_id.to_string()
        } else {
            format!("@{}", self.username)
        }
    }
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TelegramUser> {
    Ok(TelegramUser {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        joined_at: row.get(5)?,
    })
}

/// Creates the user or refreshes their profile fields.
pub fn upsert_user(
    conn: &Connection,
    chat_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> AppResult<TelegramUser> {
    conn.execute(
        "INSERT INTO users (chat_id, username, first_name, last_name)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(chat_id) DO UPDATE SET
           username = excluded.username,
           first_name = excluded.first_name,
           last_name = excluded.last_name",
        params![chat_id, username.unwrap_or(""), first_name, last_name],
    )?;

    let user = conn.query_row(
        "SELECT id, chat_id, username, first_name, last_name, joined_at FROM users WHERE chat_id = ?1",
        params![chat_id],
        parse_row,
    )?;
    Ok(user)
}

pub fn get_user_by_chat(conn: &Connection, chat_id: i64) -> AppResult<Option<TelegramUser>> {
    let user = conn
        .query_row(
            "SELECT id, chat_id, username, first_name, last_name, joined_at FROM users WHERE chat_id = ?1",
            params![chat_id],
            parse_row,
        )
        .optional()?;
    Ok(user)
}
