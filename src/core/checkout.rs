//! Invoice payloads and invoice contents for pending orders.

use std::fmt;
use std::str::FromStr;

use crate::core::error::{AppError, AppResult};
use crate::core::money::Money;
use crate::storage::orders::Order;

const PAYLOAD_PREFIX: &str = "order_";

/// Invoice payload identifying the order being paid: `order_{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoicePayload {
    pub order_id: i64,
}

impl fmt::Display for InvoicePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PAYLOAD_PREFIX, self.order_id)
    }
}

impl FromStr for InvoicePayload {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(PAYLOAD_PREFIX)
            .and_then(|id| id.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|order_id| InvoicePayload { order_id })
            .ok_or_else(|| AppError::InvalidPayload(s.to_string()))
    }
}

/// What goes into `send_invoice` for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    pub label: String,
    /// Total in minor units
    pub amount: u32,
}

impl InvoiceDraft {
    pub fn for_order(order: &Order, currency: &str) -> AppResult<Self> {
        Ok(InvoiceDraft {
            title: "Ваш заказ".to_string(),
            description: format!("Оплата заказа #{}", order.id),
            payload: InvoicePayload { order_id: order.id }.to_string(),
            currency: currency.to_string(),
            label: "Товары".to_string(),
            amount: order.total_amount.to_invoice_amount()?,
        })
    }

    pub fn total(&self) -> Money {
        Money(i64::from(self.amount))
    }
}

/// Trims a pre-checkout error message to the length Telegram displays.
pub fn truncate_error_message(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::orders::OrderStatus;
    use pretty_assertions::assert_eq;

    fn order(id: i64, total: i64) -> Order {
        Order {
            id,
            cart_id: 1,
            full_name: String::new(),
            phone: String::new(),
            address: String::new(),
            total_amount: Money(total),
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
            payment_id: None,
            status: OrderStatus::Pending,
        }
    }

    #[test]
    fn test_payload_format_and_parse() {
        assert_eq!(InvoicePayload { order_id: 17 }.to_string(), "order_17");
        assert_eq!("order_17".parse::<InvoicePayload>().unwrap().order_id, 17);
    }

    #[test]
    fn test_payload_rejects_foreign_values() {
        for raw in ["order_", "order_x", "subscription_3", "order_-1", "order_0", ""] {
            assert!(
                matches!(raw.parse::<InvoicePayload>(), Err(AppError::InvalidPayload(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_invoice_draft() {
        let draft = InvoiceDraft::for_order(&order(5, 129990), "RUB").unwrap();
        assert_eq!(draft.payload, "order_5");
        assert_eq!(draft.description, "Оплата заказа #5");
        assert_eq!(draft.amount, 129990);
        assert_eq!(draft.total().to_string(), "1299.90");
    }

    #[test]
    fn test_invoice_draft_rejects_huge_total() {
        assert!(matches!(
            InvoiceDraft::for_order(&order(5, 10_000_000_000), "RUB"),
            Err(AppError::AmountTooLarge(_))
        ));
    }

    #[test]
    fn test_truncate_error_message_counts_chars() {
        let msg = "я".repeat(250);
        assert_eq!(truncate_error_message(&msg, 200).chars().count(), 200);
        assert_eq!(truncate_error_message("ok", 200), "ok");
    }
}
