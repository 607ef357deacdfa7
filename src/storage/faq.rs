//! Frequently asked questions shown by `/faq` and the inline search.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::{AppError, AppResult};

/// Longest question accepted
pub const MAX_QUESTION_CHARS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Faq {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Faq> {
    Ok(Faq {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
    })
}

pub fn create_faq(conn: &Connection, question: &str, answer: &str) -> AppResult<Faq> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question must not be empty".to_string()));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(AppError::Validation(format!(
            "Question is longer than {} characters",
            MAX_QUESTION_CHARS
        )));
    }
    conn.execute(
        "INSERT INTO faq (question, answer) VALUES (?1, ?2)",
        params![question, answer],
    )?;
    Ok(Faq {
        id: conn.last_insert_rowid(),
        question: question.to_string(),
        answer: answer.to_string(),
    })
}

pub fn list_faq(conn: &Connection) -> AppResult<Vec<Faq>> {
    let mut stmt = conn.prepare("SELECT id, question, answer FROM faq ORDER BY id")?;
    let rows = stmt.query_map([], parse_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get_faq(conn: &Connection, id: i64) -> AppResult<Option<Faq>> {
    let faq = conn
        .query_row(
            "SELECT id, question, answer FROM faq WHERE id = ?1",
            params![id],
            parse_row,
        )
        .optional()?;
    Ok(faq)
}

/// Questions containing `text`, case-insensitively, at most `limit` of them.
///
/// SQLite's `LIKE`/`lower()` only fold ASCII, so Cyrillic queries are
/// matched in Rust after loading the table. An empty query returns the
/// first `limit` questions.
pub fn search_faq(conn: &Connection, text: &str, limit: usize) -> AppResult<Vec<Faq>> {
    let needle = text.trim().to_lowercase();
    let matches = list_faq(conn)?
        .into_iter()
        .filter(|faq| needle.is_empty() || faq.question.to_lowercase().contains(&needle))
        .take(limit)
        .collect();
    Ok(matches)
}
