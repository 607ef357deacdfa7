//! Command handlers (/start, /cart, /faq)

use teloxide::types::Message;

use super::types::{remember_user, HandlerDeps, HandlerResult, UserInfo};
use crate::telegram::{cart, catalog, faq, Bot};

/// Greets the user and shows the main menu.
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    let user = UserInfo::from_message(msg);
    if remember_user(&deps.db_pool, &user).is_some() {
        log::info!("/start from chat {}", user.chat_id);
    }
    if deps.sessions.finish_quantity(user.chat_id).await.is_some() {
        log::debug!("Dropped quantity prompt of chat {}", user.chat_id);
    }
    catalog::send_main_menu(bot, msg.chat.id, &user.greeting_name()).await
}

pub(super) async fn handle_cart_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    cart::show_cart(bot, deps, msg.chat.id, None).await
}

pub(super) async fn handle_faq_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> HandlerResult {
    faq::show_faq(bot, deps, msg.chat.id, None).await
}
