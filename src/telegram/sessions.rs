//! Per-chat conversation state kept in memory.
//!
//! Two things are tracked between updates: the quantity prompt a chat is
//! answering, and the product card currently shown so that the next card
//! replaces it instead of piling up. Losing this state on restart only
//! means the user presses the button again.

use std::collections::HashMap;

use teloxide::types::MessageId;
use tokio::sync::Mutex;

use crate::core::config;

/// A chat that was asked "how many?" for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingQuantity {
    pub product_id: i64,
    pub prompt_message_id: MessageId,
}

#[derive(Debug, Default)]
pub struct ChatSessions {
    pending: Mutex<HashMap<i64, PendingQuantity>>,
    detail_messages: Mutex<HashMap<i64, MessageId>>,
}

impl ChatSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts waiting for a quantity, replacing an earlier prompt.
    pub async fn await_quantity(&self, chat_id: i64, pending: PendingQuantity) -> Option<PendingQuantity> {
        self.pending.lock().await.insert(chat_id, pending)
    }

    pub async fn pending_quantity(&self, chat_id: i64) -> Option<PendingQuantity> {
        self.pending.lock().await.get(&chat_id).copied()
    }

    pub async fn finish_quantity(&self, chat_id: i64) -> Option<PendingQuantity> {
        self.pending.lock().await.remove(&chat_id)
    }

    /// Remembers the product card shown in a chat and returns the previous one.
    pub async fn replace_detail_message(&self, chat_id: i64, message_id: MessageId) -> Option<MessageId> {
        self.detail_messages.lock().await.insert(chat_id, message_id)
    }

    pub async fn detail_message(&self, chat_id: i64) -> Option<MessageId> {
        self.detail_messages.lock().await.get(&chat_id).copied()
    }

    pub async fn take_detail_message(&self, chat_id: i64) -> Option<MessageId> {
        self.detail_messages.lock().await.remove(&chat_id)
    }
}

/// Parses a quantity reply: a positive whole number up to the line limit.
pub fn parse_quantity(text: &str) -> Option<i64> {
    text.trim()
        .parse::<i64>()
        .ok()
        .filter(|q| (1..=config::catalog::MAX_LINE_QUANTITY).contains(q))
}
