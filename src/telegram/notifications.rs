use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;

use crate::core::config;
use crate::storage::orders::{Order, OrderItem};
use crate::telegram::Bot;

/// HTML summary of a paid order for the shop admins.
pub fn order_paid_text(order: &Order, items: &[OrderItem], customer: &str) -> String {
    let mut text = format!(
        "🛍 <b>Новый оплаченный заказ #{}</b>\n\nПокупатель: {}\nИмя: {}\nТелефон: {}\nАдрес: {}\n\n",
        order.id,
        html::escape(customer),
        html::escape(&order.full_name),
        html::escape(&order.phone),
        html::escape(&order.address)
    );
    for item in items {
        text.push_str(&format!(
            "• {}: {} × {}₽\n",
            html::escape(&item.description),
            item.quantity,
            item.price
        ));
    }
    text.push_str(&format!("\n<b>Итого: {}₽</b>", order.total_amount));
    text
}

/// Sends an HTML message to every chat in ADMIN_IDS.
pub async fn notify_admins(bot: &Bot, text: &str) {
    for admin_id in config::admin::ADMIN_IDS.iter() {
        if let Err(e) = bot
            .send_message(ChatId(*admin_id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            log::error!("Failed to notify admin {}: {}", admin_id, e);
        }
    }
}

pub async fn notify_admins_order_paid(bot: &Bot, order: &Order, items: &[OrderItem], customer: &str) {
    if config::admin::ADMIN_IDS.is_empty() {
        return;
    }
    notify_admins(bot, &order_paid_text(order, items, customer)).await;
}
