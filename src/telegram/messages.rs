//! Small helpers around editing and deleting bot messages.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};

use crate::telegram::Bot;

/// Edits a text message in place, sending a new one when the original
/// cannot be edited (it is a photo, too old, or was deleted).
pub async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    keyboard: InlineKeyboardMarkup,
) -> ResponseResult<()> {
    let edited = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard.clone())
        .await;

    match edited {
        Ok(_) => Ok(()),
        Err(teloxide::RequestError::Api(teloxide::ApiError::MessageNotModified)) => Ok(()),
        Err(e) => {
            log::debug!("Cannot edit message {} in chat {}: {}", message_id.0, chat_id, e);
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            Ok(())
        }
    }
}

/// Deletes a message, logging instead of failing.
pub async fn delete_quietly(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, message_id).await {
        log::warn!("Failed to delete message {} in chat {}: {}", message_id.0, chat_id, e);
    }
}

/// Deletes the given messages after `delay`, in the background.
pub fn delete_later(bot: Bot, chat_id: ChatId, message_ids: Vec<MessageId>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for message_id in message_ids {
            delete_quietly(&bot, chat_id, message_id).await;
        }
    });
}
