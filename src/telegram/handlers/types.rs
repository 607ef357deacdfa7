//! Handler types, dependencies, and customer bookkeeping

use std::sync::Arc;

use teloxide::types::{Message, User};

use crate::storage::db::DbPool;
use crate::storage::get_connection;
use crate::storage::users::{self, TelegramUser};
use crate::telegram::sessions::ChatSessions;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HandlerResult = Result<(), HandlerError>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<ChatSessions>,
    pub bot_username: Option<String>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, bot_username: Option<String>) -> Self {
        Self {
            db_pool,
            sessions: Arc::new(ChatSessions::new()),
            bot_username,
        }
    }
}

/// Profile fields copied into the `users` table
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserInfo {
    /// Extract user info from a Telegram message
    pub fn from_message(msg: &Message) -> Self {
        match msg.from.as_ref() {
            Some(user) => Self::from_user(msg.chat.id.0, user),
            None => Self {
                chat_id: msg.chat.id.0,
                username: msg.chat.username().map(str::to_string),
                first_name: msg.chat.first_name().map(str::to_string),
                last_name: msg.chat.last_name().map(str::to_string),
            },
        }
    }

    pub fn from_user(chat_id: i64, user: &User) -> Self {
        Self {
            chat_id,
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
        }
    }

    /// Name used in greetings: first name, else username.
    pub fn greeting_name(&self) -> String {
        self.first_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.username.clone())
            .unwrap_or_default()
    }
}

/// Creates or refreshes the customer row. Failures are logged, not fatal.
pub fn remember_user(db_pool: &Arc<DbPool>, user: &UserInfo) -> Option<TelegramUser> {
    let conn = match get_connection(db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for user {}: {}", user.chat_id, e);
            return None;
        }
    };
    match users::upsert_user(
        &conn,
        user.chat_id,
        user.username.as_deref(),
        user.first_name.as_deref(),
        user.last_name.as_deref(),
    ) {
        Ok(stored) => Some(stored),
        Err(e) => {
            log::error!("Failed to save user {}: {}", user.chat_id, e);
            None
        }
    }
}
