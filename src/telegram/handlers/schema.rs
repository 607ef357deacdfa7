//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineQuery, Message, PreCheckoutQuery};

use super::commands::{handle_cart_command, handle_faq_command, handle_start_command};
use super::types::{HandlerDeps, HandlerError, HandlerResult, UserInfo};
use crate::telegram::bot::Command;
use crate::telegram::callback::CallbackAction;
use crate::telegram::{cart, catalog, faq, order, Bot};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same tree is used by `run` and by the integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_payment = deps.clone();
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_precheckout = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        // Successful payment handler must be first
        .branch(successful_payment_handler(deps_payment))
        .branch(command_handler(deps_commands))
        // Plain text answers to the quantity prompt
        .branch(quantity_reply_handler(deps_messages))
        .branch(pre_checkout_handler(deps_precheckout))
        .branch(callback_handler(deps_callback))
        .branch(inline_query_handler(deps))
}

fn successful_payment_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.successful_payment().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = order::handle_successful_payment(&bot, &deps, &msg).await {
                    log::error!("Failed to handle successful payment in chat {}: {:?}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                let result = match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await,
                    Command::Cart => handle_cart_command(&bot, &msg, &deps).await,
                    Command::Faq => handle_faq_command(&bot, &msg, &deps).await,
                };
                if let Err(e) = result {
                    log::error!("Command {:?} failed for chat {}: {}", cmd, msg.chat.id, e);
                }
                Ok(())
            }
        },
    ))
}

fn quantity_reply_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                match cart::handle_quantity_reply(&bot, &deps, &msg).await {
                    Ok(true) => {}
                    Ok(false) => log::debug!("Ignoring text message in chat {}", msg.chat.id),
                    Err(e) => log::error!("Failed to add item for chat {}: {}", msg.chat.id, e),
                }
                Ok(())
            }
        })
}

fn pre_checkout_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_pre_checkout_query().endpoint(move |bot: Bot, query: PreCheckoutQuery| {
        let deps = deps.clone();
        async move {
            let payload = query.invoice_payload.clone();
            if let Err(e) = order::handle_pre_checkout(&bot, &deps, query).await {
                log::error!("Pre-checkout handler failed for {}: {}", payload, e);
            }
            Ok(())
        }
    })
}

/// Routes an inline button press to its screen.
async fn route_callback(bot: &Bot, deps: &HandlerDeps, q: CallbackQuery, action: CallbackAction) -> HandlerResult {
    let Some((chat_id, message_id)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    // These answer the query themselves, with a notice or an alert.
    match action {
        CallbackAction::RemoveItem(item_id) => {
            return cart::remove_item(bot, deps, q.id, chat_id, message_id, item_id).await;
        }
        CallbackAction::ClearCart => return cart::clear_cart(bot, deps, q.id, chat_id, message_id).await,
        CallbackAction::Order => {
            let user = UserInfo::from_user(chat_id.0, &q.from);
            return order::checkout(bot, deps, q.id, &user).await;
        }
        _ => {}
    }

    bot.answer_callback_query(q.id).await?;
    match action {
        CallbackAction::BackToStart => catalog::edit_main_menu(bot, chat_id, message_id).await,
        CallbackAction::Catalog => catalog::show_category_page(bot, deps, chat_id, message_id, 1, None).await,
        CallbackAction::CategoryPage { page, parent_id } => {
            catalog::show_category_page(bot, deps, chat_id, message_id, page, parent_id).await
        }
        CallbackAction::Category(id) => catalog::show_category(bot, deps, chat_id, message_id, id).await,
        CallbackAction::ProductPage { category_id, page } => {
            catalog::show_product_page(bot, deps, chat_id, message_id, category_id, page).await
        }
        CallbackAction::Product(id) => catalog::show_product(bot, deps, chat_id, id).await,
        CallbackAction::AddItem(product_id) => cart::ask_quantity(bot, deps, chat_id, product_id).await,
        CallbackAction::Cart => cart::show_cart(bot, deps, chat_id, Some(message_id)).await,
        CallbackAction::Faq => faq::show_faq(bot, deps, chat_id, Some(message_id)).await,
        CallbackAction::Question(id) => faq::show_question(bot, deps, chat_id, message_id, id).await,
        CallbackAction::NoAction
        | CallbackAction::RemoveItem(_)
        | CallbackAction::ClearCart
        | CallbackAction::Order => Ok(()),
    }
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let data = q.data.clone().unwrap_or_default();
            let action = match data.parse::<CallbackAction>() {
                Ok(action) => action,
                Err(e) => {
                    log::warn!("{}", e);
                    if let Err(e) = bot.answer_callback_query(q.id).await {
                        log::warn!("Failed to answer callback query: {}", e);
                    }
                    return Ok(());
                }
            };

            if let Err(e) = route_callback(&bot, &deps, q, action).await {
                log::error!("Callback {} failed: {}", data, e);
            }
            Ok(())
        }
    })
}

fn inline_query_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_inline_query().endpoint(move |bot: Bot, query: InlineQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = faq::handle_inline_query(&bot, &deps, query).await {
                log::error!("Inline FAQ search failed: {}", e);
            }
            Ok(())
        }
    })
}
