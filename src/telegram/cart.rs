//! Cart view and the add-to-cart quantity prompt.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, MessageId, ParseMode, ReplyParameters};

use crate::core::config;
use crate::core::error::AppError;
use crate::storage::cart;
use crate::storage::get_connection;
use crate::telegram::handlers::{HandlerDeps, HandlerError, HandlerResult};
use crate::telegram::keyboards;
use crate::telegram::messages::{delete_later, edit_or_send};
use crate::telegram::sessions::{parse_quantity, PendingQuantity};
use crate::telegram::Bot;

fn cleanup_delay() -> Duration {
    Duration::from_millis(config::catalog::PROMPT_CLEANUP_DELAY_MS)
}

/// Asks how many units to add; the next text message answers it.
pub async fn ask_quantity(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, product_id: i64) -> HandlerResult {
    let prompt = bot.send_message(chat_id, "Введите количество товара:").await?;
    let replaced = deps
        .sessions
        .await_quantity(
            chat_id.0,
            PendingQuantity {
                product_id,
                prompt_message_id: prompt.id,
            },
        )
        .await;
    if let Some(old) = replaced {
        delete_later(bot.clone(), chat_id, vec![old.prompt_message_id], Duration::ZERO);
    }
    Ok(())
}

/// Handles a text message while a quantity prompt is open.
///
/// Returns `false` when the chat was not waiting for a quantity.
pub async fn handle_quantity_reply(bot: &Bot, deps: &HandlerDeps, msg: &Message) -> Result<bool, HandlerError> {
    let chat_id = msg.chat.id;
    let Some(pending) = deps.sessions.pending_quantity(chat_id.0).await else {
        return Ok(false);
    };

    let Some(quantity) = msg.text().and_then(parse_quantity) else {
        let warning = bot
            .send_message(chat_id, "Пожалуйста, введите корректное число (больше 0).")
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        delete_later(bot.clone(), chat_id, vec![warning.id], cleanup_delay());
        return Ok(true);
    };

    let added = {
        let conn = get_connection(&deps.db_pool)?;
        cart::add_item(&conn, chat_id.0, pending.product_id, quantity)
    };
    deps.sessions.finish_quantity(chat_id.0).await;

    let reply = match added {
        Ok(line) => {
            log::info!(
                "Chat {} added {} × product {} (now {} in cart)",
                chat_id,
                quantity,
                pending.product_id,
                line.quantity
            );
            "✅ Добавлено в корзину"
        }
        Err(AppError::NotFound(_)) => "❌ Товар больше недоступен",
        Err(e) => return Err(e.into()),
    };

    let confirmation = bot.send_message(chat_id, reply).await?;
    delete_later(
        bot.clone(),
        chat_id,
        vec![pending.prompt_message_id, msg.id, confirmation.id],
        cleanup_delay(),
    );
    Ok(true)
}

/// Shows the cart, editing `message_id` when given.
pub async fn show_cart(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, message_id: Option<MessageId>) -> HandlerResult {
    let lines = {
        let conn = get_connection(&deps.db_pool)?;
        cart::cart_items(&conn, chat_id.0)?
    };
    let (text, keyboard) = keyboards::cart_view(&lines);

    match message_id {
        Some(message_id) => edit_or_send(bot, chat_id, message_id, &text, keyboard).await?,
        None => {
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

pub async fn remove_item(
    bot: &Bot,
    deps: &HandlerDeps,
    query_id: CallbackQueryId,
    chat_id: ChatId,
    message_id: MessageId,
    item_id: i64,
) -> HandlerResult {
    let removed = {
        let conn = get_connection(&deps.db_pool)?;
        cart::remove_item(&conn, chat_id.0, item_id)?
    };
    show_cart(bot, deps, chat_id, Some(message_id)).await?;

    let notice = if removed { "✅ Товар удалён" } else { "Товар уже удалён" };
    bot.answer_callback_query(query_id).text(notice).await?;
    Ok(())
}

pub async fn clear_cart(
    bot: &Bot,
    deps: &HandlerDeps,
    query_id: CallbackQueryId,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let removed = {
        let conn = get_connection(&deps.db_pool)?;
        cart::clear_cart(&conn, chat_id.0)?
    };
    log::info!("Chat {} cleared {} cart line(s)", chat_id, removed);

    let (_, keyboard) = keyboards::cart_view(&[]);
    edit_or_send(bot, chat_id, message_id, "Корзина очищена", keyboard).await?;
    bot.answer_callback_query(query_id).text("✅ Корзина очищена").await?;
    Ok(())
}
