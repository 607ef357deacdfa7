//! Checkout: invoice, pre-checkout validation and payment confirmation.

use std::path::PathBuf;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, LabeledPrice, PreCheckoutQuery};

use crate::core::address::{format_address, ShippingAddress};
use crate::core::checkout::{truncate_error_message, InvoiceDraft, InvoicePayload};
use crate::core::config;
use crate::core::error::AppError;
use crate::core::export;
use crate::core::money::Money;
use crate::storage::db::{self, with_connection};
use crate::storage::orders::{self, OrderContact, PaymentOutcome};
use crate::storage::users;
use crate::telegram::handlers::{remember_user, HandlerDeps, HandlerResult, UserInfo};
use crate::telegram::notifications;
use crate::telegram::Bot;

/// Callback answer for a checkout that could not start.
fn checkout_failure_text(err: &AppError) -> String {
    match err {
        AppError::InsufficientStock {
            description,
            available,
            requested,
            ..
        } => format!(
            "❌ Не удалось зарезервировать товар:\n• {}\nДоступно: {}, Заказано: {}",
            description, available, requested
        ),
        AppError::Validation(_) => "🛒 Ваша корзина пуста.".to_string(),
        AppError::AmountTooLarge(_) => "❌ Не удалось оформить заказ: слишком большая сумма.".to_string(),
        _ => "❌ Не удалось оформить заказ. Попробуйте снова.".to_string(),
    }
}

/// `ok = false` message for a rejected pre-checkout query.
fn pre_checkout_error_text(err: &AppError) -> String {
    let text = match err {
        AppError::InsufficientStock {
            description, available, ..
        } => format!(
            "❌ Товара '{}' недостаточно на складе. Осталось {}",
            description, available
        ),
        AppError::Validation(_) => "❌ Счёт устарел. Оформите заказ заново.".to_string(),
        AppError::InvalidPayload(_) | AppError::NotFound(_) | AppError::OrderNotPending { .. } => {
            "❌ Ошибка при оплате заказа".to_string()
        }
        _ => "❌ Внутренняя ошибка сервера".to_string(),
    };
    truncate_error_message(&text, config::payments::ERROR_MESSAGE_MAX_CHARS)
}

/// Reserves the cart and sends an invoice for it.
pub async fn checkout(bot: &Bot, deps: &HandlerDeps, query_id: CallbackQueryId, user: &UserInfo) -> HandlerResult {
    let chat_id = ChatId(user.chat_id);
    log::info!("Chat {} starts checkout", chat_id);

    let Some(provider_token) = config::payments::PROVIDER_TOKEN.as_deref().map(str::to_string) else {
        log::error!("Checkout requested but PAYMENT_PROVIDER_TOKEN is not configured");
        bot.answer_callback_query(query_id)
            .text("Оплата временно недоступна")
            .show_alert(true)
            .await?;
        return Ok(());
    };

    remember_user(&deps.db_pool, user);

    let draft = with_connection(&deps.db_pool, move |conn| orders::begin_checkout(conn, chat_id.0)).await;
    let draft = match draft {
        Ok(draft) => draft,
        Err(e) => {
            match &e {
                AppError::InsufficientStock { .. } | AppError::Validation(_) => {
                    log::warn!("Checkout for {} refused: {}", chat_id, e)
                }
                _ => log::error!("Checkout for {} failed: {}", chat_id, e),
            }
            bot.answer_callback_query(query_id)
                .text(checkout_failure_text(&e))
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };
    if let Some(cancelled) = draft.cancelled_order_id {
        log::info!("Previous order #{} of chat {} was cancelled", cancelled, chat_id);
    }

    let invoice = InvoiceDraft::for_order(&draft.order, config::payments::CURRENCY.as_str())?;
    let sent = bot
        .send_invoice(
            chat_id,
            invoice.title.clone(),
            invoice.description.clone(),
            invoice.payload.clone(),
            invoice.currency.clone(),
            vec![LabeledPrice::new(invoice.label.clone(), invoice.amount)],
        )
        .provider_token(provider_token)
        .need_name(true)
        .need_phone_number(true)
        .need_shipping_address(true)
        .is_flexible(false)
        .await;

    if let Err(e) = sent {
        log::error!("Failed to send invoice for order #{}: {}", draft.order.id, e);
        let order_id = draft.order.id;
        if let Err(release) = with_connection(&deps.db_pool, move |conn| orders::cancel_order(conn, order_id)).await {
            log::error!("Failed to release order #{} after invoice error: {}", order_id, release);
        }
        bot.answer_callback_query(query_id)
            .text(checkout_failure_text(&AppError::Telegram(e)))
            .show_alert(true)
            .await?;
        return Ok(());
    }

    log::info!(
        "Invoice {} sent to chat {}: {} {}",
        invoice.payload,
        chat_id,
        invoice.total(),
        invoice.currency
    );
    bot.answer_callback_query(query_id).await?;
    Ok(())
}

fn shipping_address(query: &PreCheckoutQuery) -> ShippingAddress {
    match &query.order_info.shipping_address {
        Some(addr) => ShippingAddress {
            country_code: format!("{:?}", addr.country_code),
            state: addr.state.clone(),
            city: addr.city.clone(),
            street_line1: addr.street_line1.clone(),
            street_line2: addr.street_line2.clone(),
            post_code: addr.post_code.clone(),
        },
        None => ShippingAddress::default(),
    }
}

/// Answers a pre-checkout query after re-validating the order.
pub async fn handle_pre_checkout(bot: &Bot, deps: &HandlerDeps, query: PreCheckoutQuery) -> HandlerResult {
    log::info!(
        "Pre-checkout from {}: payload={}, amount={} {}",
        query.from.id,
        query.invoice_payload,
        query.total_amount,
        query.currency
    );

    let contact = OrderContact {
        full_name: query.order_info.name.clone().unwrap_or_default(),
        phone: query.order_info.phone_number.clone().unwrap_or_default(),
        address: format_address(&shipping_address(&query)),
    };
    let invoiced = Money(query.total_amount as i64);

    let result = match query.invoice_payload.parse::<InvoicePayload>() {
        Ok(payload) => {
            with_connection(&deps.db_pool, move |conn| {
                orders::pre_checkout(conn, payload.order_id, invoiced, &contact)
            })
            .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(order) => {
            bot.answer_pre_checkout_query(query.id, true).await?;
            log::info!("Order #{} approved for payment", order.id);
        }
        Err(e) => {
            let message = pre_checkout_error_text(&e);
            log::error!("Pre-checkout rejected for {}: {}", query.invoice_payload, e);
            bot.answer_pre_checkout_query(query.id, false)
                .error_message(message)
                .await?;
        }
    }
    Ok(())
}

/// Applies a successful payment: stock, order status, CSV export, notifications.
pub async fn handle_successful_payment(bot: &Bot, deps: &HandlerDeps, msg: &Message) -> HandlerResult {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("💳 SUCCESSFUL PAYMENT");
    log::info!("  • Chat: {}", msg.chat.id);
    log::info!("  • Payload: {}", payment.invoice_payload);
    log::info!("  • Amount: {} {}", payment.total_amount, payment.currency);
    log::info!("  • Telegram charge ID: {}", payment.telegram_payment_charge_id.0);
    log::info!("  • Provider charge ID: {:?}", payment.provider_payment_charge_id);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let payload = match payment.invoice_payload.parse::<InvoicePayload>() {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Ignoring payment with foreign payload: {}", e);
            return Ok(());
        }
    };

    let provider_charge: Option<String> = payment.provider_payment_charge_id.clone().into();
    let payment_id = provider_charge
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| payment.telegram_payment_charge_id.0.clone());

    let order_id = payload.order_id;
    let outcome = with_connection(&deps.db_pool, move |conn| {
        let outcome = orders::confirm_payment(conn, order_id, Some(payment_id.as_str()))?;
        let items = orders::order_items(conn, order_id)?;
        let customer = match orders::order_chat_id(conn, order_id)? {
            Some(chat_id) => users::get_user_by_chat(conn, chat_id)?,
            None => None,
        };
        Ok((outcome, items, customer))
    })
    .await;

    let (outcome, items, customer) = match outcome {
        Ok(result) => result,
        Err(e) => {
            log::error!("Failed to confirm payment for order #{}: {}", order_id, e);
            bot.send_message(msg.chat.id, "❌ Произошла ошибка при обработке заказа")
                .await?;
            notifications::notify_admins(
                bot,
                &format!(
                    "⚠️ Оплата заказа #{} не обработана\nchat_id: {}\nОшибка: {}",
                    order_id,
                    msg.chat.id,
                    teloxide::utils::html::escape(&e.to_string())
                ),
            )
            .await;
            return Ok(());
        }
    };

    let order = match outcome {
        PaymentOutcome::Confirmed(order) => order,
        PaymentOutcome::AlreadyPaid(order) => {
            log::info!("Duplicate payment update for order #{} ignored", order.id);
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "✅ Заказ успешно оплачен!").await?;

    spawn_csv_export(Arc::clone(&deps.db_pool), order.id);

    let customer = customer
        .map(|u| u.display_name())
        .unwrap_or_else(|| msg.chat.id.to_string());
    notifications::notify_admins_order_paid(bot, &order, &items, &customer).await;
    log::info!("Order #{} fully processed", order.id);
    Ok(())
}

fn spawn_csv_export(pool: Arc<db::DbPool>, order_id: i64) {
    let path = PathBuf::from(config::ORDERS_CSV_PATH.as_str());
    tokio::spawn(async move {
        match export::export_paid_order(pool, order_id, path).await {
            Ok(rows) => log::info!("Order #{} exported to CSV ({} row(s))", order_id, rows),
            Err(e) => log::error!("Failed to export order #{} to CSV: {}", order_id, e),
        }
    });
}
