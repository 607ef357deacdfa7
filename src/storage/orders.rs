//! Orders and stock reservation.
//!
//! The checkout sequence is:
//!
//! 1. [`begin_checkout`] turns the open cart into a `pending` order and
//!    reserves stock for every line (`products.reserved += qty`).
//! 2. [`pre_checkout`] re-validates the order when Telegram asks whether
//!    the payment may proceed, storing the buyer's contact details.
//! 3. [`confirm_payment`] deducts the reserved units from `quantity` once
//!    the payment succeeded, or [`cancel_order`] / the stale sweeper gives
//!    them back.
//!
//! Every step that touches stock runs inside a `BEGIN IMMEDIATE`
//! transaction. SQLite grants a single writer at a time, so the read of
//! `quantity - reserved` and the following update cannot interleave with
//! another checkout. Reservation updates are additionally guarded in SQL
//! (`WHERE quantity - reserved >= ?`).

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use strum::{AsRefStr, Display, EnumString};

use crate::core::error::{AppError, AppResult};
use crate::core::money::Money;
use crate::storage::cart;
use crate::storage::catalog;

/// Longest stored buyer name and phone, matching the schema
const MAX_NAME_CHARS: usize = 255;
const MAX_PHONE_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    New,
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub cart_id: i64,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub total_amount: Money,
    pub created_at: String,
    pub updated_at: String,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub description: String,
    pub quantity: i64,
    pub price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity).unwrap_or(Money(i64::MAX))
    }
}

/// A freshly reserved order, ready to be invoiced.
#[derive(Debug, Clone)]
pub struct CheckoutDraft {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Another pending order of the same user that was cancelled to make room
    pub cancelled_order_id: Option<i64>,
}

/// Buyer details collected by the payment form.
#[derive(Debug, Clone, Default)]
pub struct OrderContact {
    pub full_name: String,
    pub phone: String,
    pub address: String,
}

/// Result of applying a successful payment.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// Stock was deducted and the order is now paid
    Confirmed(Order),
    /// The payment had already been applied (redelivered update)
    AlreadyPaid(Order),
}

impl PaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            PaymentOutcome::Confirmed(order) | PaymentOutcome::AlreadyPaid(order) => order,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, cart_id, full_name, phone, address, total_amount, created_at, updated_at, payment_id, status";

fn parse_status(idx: usize, raw: String) -> rusqlite::Result<OrderStatus> {
    raw.parse::<OrderStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        cart_id: row.get(1)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        total_amount: Money(row.get(5)?),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        payment_id: row.get(8)?,
        status: parse_status(9, row.get(9)?)?,
    })
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.trim().chars().take(max).collect()
}

pub fn get_order(conn: &Connection, order_id: i64) -> AppResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
    Ok(conn.query_row(&sql, params![order_id], parse_order).optional()?)
}

fn require_order(conn: &Connection, order_id: i64) -> AppResult<Order> {
    get_order(conn, order_id)?.ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))
}

pub fn order_items(conn: &Connection, order_id: i64) -> AppResult<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT oi.id, oi.order_id, oi.product_id, p.description, oi.quantity, oi.price
         FROM order_items oi
         JOIN products p ON p.id = oi.product_id
         WHERE oi.order_id = ?1
         ORDER BY oi.id",
    )?;
    let rows = stmt.query_map(params![order_id], |row| {
        Ok(OrderItem {
            id: row.get(0)?,
            order_id: row.get(1)?,
            product_id: row.get(2)?,
            description: row.get(3)?,
            quantity: row.get(4)?,
            price: Money(row.get(5)?),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Chat id of the customer who owns the order.
pub fn order_chat_id(conn: &Connection, order_id: i64) -> AppResult<Option<i64>> {
    let chat_id = conn
        .query_row(
            "SELECT u.chat_id FROM orders o
             JOIN carts c ON c.id = o.cart_id
             JOIN users u ON u.id = c.user_id
             WHERE o.id = ?1",
            params![order_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(chat_id)
}

/// Pending orders of a user, newest first.
pub fn pending_orders_for_chat(conn: &Connection, chat_id: i64) -> AppResult<Vec<Order>> {
    let sql = format!(
        "SELECT {} FROM orders
         WHERE status = 'pending'
           AND cart_id IN (SELECT c.id FROM carts c JOIN users u ON u.id = c.user_id WHERE u.chat_id = ?1)
         ORDER BY id DESC",
        ORDER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![chat_id], parse_order)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn set_status(conn: &Connection, order_id: i64, status: OrderStatus) -> AppResult<()> {
    conn.execute(
        "UPDATE orders SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![status.as_ref(), order_id],
    )?;
    Ok(())
}

/// Takes `requested` units of a product out of the free stock.
fn reserve_units(conn: &Connection, product_id: i64, requested: i64) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE products SET reserved = reserved + ?1
         WHERE id = ?2 AND quantity - reserved >= ?1",
        params![requested, product_id],
    )?;
    if changed == 0 {
        let product = catalog::get_product(conn, product_id)?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
        let available = product.available().max(0);
        return Err(AppError::InsufficientStock {
            product_id,
            description: product.description,
            available,
            requested,
        });
    }
    log::debug!("Reserved {} unit(s) of product {}", requested, product_id);
    Ok(())
}

/// Returns the units held by an order to the free stock.
///
/// `reserved` never drops below zero, so releasing twice is harmless.
pub fn cancel_reservation(conn: &Connection, order_id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE products SET reserved = MAX(reserved - (
             SELECT COALESCE(SUM(oi.quantity), 0) FROM order_items oi
             WHERE oi.order_id = ?1 AND oi.product_id = products.id
         ), 0)
         WHERE id IN (SELECT product_id FROM order_items WHERE order_id = ?1)",
        params![order_id],
    )?;
    Ok(())
}

/// Turns the user's open cart into a pending order with reserved stock.
///
/// Any other pending order of the same user is cancelled first and its
/// reservation released. Runs as one transaction: when a line cannot be
/// reserved the whole checkout is rolled back and
/// [`AppError::InsufficientStock`] names the product.
pub fn begin_checkout(conn: &mut Connection, chat_id: i64) -> AppResult<CheckoutDraft> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let cart = cart::find_open_cart(&tx, chat_id)?.ok_or_else(|| AppError::Validation("Корзина пуста".to_string()))?;
    let lines = cart::lines_of_cart(&tx, cart.id)?;
    if lines.is_empty() {
        return Err(AppError::Validation("Корзина пуста".to_string()));
    }
    let total = cart::cart_total(&lines).ok_or(AppError::AmountTooLarge(i64::MAX))?;
    total.to_invoice_amount()?;

    let mut cancelled_order_id = None;
    for previous in pending_orders_for_chat(&tx, chat_id)? {
        cancel_reservation(&tx, previous.id)?;
        set_status(&tx, previous.id, OrderStatus::Cancelled)?;
        if previous.cart_id != cart.id {
            log::info!("Cancelled previous order #{} of chat {}", previous.id, chat_id);
            cancelled_order_id = Some(previous.id);
        }
    }

    tx.execute(
        "INSERT INTO orders (cart_id, total_amount, status) VALUES (?1, ?2, 'pending')
         ON CONFLICT(cart_id) DO UPDATE SET
           total_amount = excluded.total_amount,
           status = 'pending',
           payment_id = NULL,
           updated_at = CURRENT_TIMESTAMP",
        params![cart.id, total.minor()],
    )?;
    let order_id: i64 = tx.query_row(
        "SELECT id FROM orders WHERE cart_id = ?1",
        params![cart.id],
        |row| row.get(0),
    )?;
    tx.execute("DELETE FROM order_items WHERE order_id = ?1", params![order_id])?;

    for line in &lines {
        reserve_units(&tx, line.product.id, line.quantity)?;
        tx.execute(
            "INSERT INTO order_items (order_id, product_id, quantity, price) VALUES (?1, ?2, ?3, ?4)",
            params![order_id, line.product.id, line.quantity, line.product.price.minor()],
        )?;
    }

    let order = require_order(&tx, order_id)?;
    let items = order_items(&tx, order_id)?;
    tx.commit()?;

    log::info!(
        "Order #{} created for chat {}: {} line(s), total {}",
        order.id,
        chat_id,
        items.len(),
        order.total_amount
    );
    Ok(CheckoutDraft {
        order,
        items,
        cancelled_order_id,
    })
}

/// Validates a pending order right before the payment is charged.
///
/// `invoiced` is the amount of the invoice being paid. A checkout repeated
/// for the same cart reuses the order id, so an older invoice can still be
/// around; its amount no longer matches and it is rejected without
/// touching the order.
///
/// Stores the buyer's contact details and checks that every product still
/// covers the units this order holds. When stock has gone (for example the
/// quantity was written off meanwhile) the reservation is released, the
/// order is cancelled and [`AppError::InsufficientStock`] is returned.
pub fn pre_checkout(conn: &mut Connection, order_id: i64, invoiced: Money, contact: &OrderContact) -> AppResult<Order> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = require_order(&tx, order_id)?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::OrderNotPending {
            order_id,
            status: order.status.to_string(),
        });
    }
    if order.total_amount != invoiced {
        return Err(AppError::Validation(format!(
            "Invoice for order #{} is outdated: {} invoiced, order total {}",
            order_id, invoiced, order.total_amount
        )));
    }

    tx.execute(
        "UPDATE orders SET full_name = ?1, phone = ?2, address = ?3, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?4",
        params![
            truncate_chars(&contact.full_name, MAX_NAME_CHARS),
            truncate_chars(&contact.phone, MAX_PHONE_CHARS),
            contact.address.trim(),
            order_id
        ],
    )?;

    let mut shortage = None;
    for item in order_items(&tx, order_id)? {
        let product = catalog::get_product(&tx, item.product_id)?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", item.product_id)))?;
        // This order's own units are part of `reserved`.
        let available = product.quantity - (product.reserved - item.quantity);
        if available < item.quantity {
            shortage = Some(AppError::InsufficientStock {
                product_id: product.id,
                description: product.description,
                available: available.max(0),
                requested: item.quantity,
            });
            break;
        }
    }

    if let Some(err) = shortage {
        cancel_reservation(&tx, order_id)?;
        set_status(&tx, order_id, OrderStatus::Cancelled)?;
        tx.commit()?;
        log::warn!("Order #{} cancelled at pre-checkout: {}", order_id, err);
        return Err(err);
    }

    let order = require_order(&tx, order_id)?;
    tx.commit()?;
    Ok(order)
}

/// Applies a successful payment: deducts stock, marks the order paid and
/// closes its cart.
///
/// A redelivered payment for a paid or shipped order changes nothing. A
/// payment that arrives after the order was cancelled still deducts the
/// stock (the money has been taken) but has no reservation to release.
pub fn confirm_payment(conn: &mut Connection, order_id: i64, payment_id: Option<&str>) -> AppResult<PaymentOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = require_order(&tx, order_id)?;
    match order.status {
        OrderStatus::Paid | OrderStatus::Shipped => {
            log::info!("Payment for order #{} already applied", order_id);
            return Ok(PaymentOutcome::AlreadyPaid(order));
        }
        OrderStatus::Pending => {}
        OrderStatus::New | OrderStatus::Cancelled => {
            log::warn!(
                "Payment received for order #{} in status {}; deducting stock without reservation",
                order_id,
                order.status
            );
        }
    }
    let held = order.status == OrderStatus::Pending;

    for item in order_items(&tx, order_id)? {
        if held {
            tx.execute(
                "UPDATE products SET
                   quantity = MAX(quantity - ?1, 0),
                   reserved = MAX(reserved - ?1, 0),
                   in_stock = (MAX(quantity - ?1, 0) > 0)
                 WHERE id = ?2",
                params![item.quantity, item.product_id],
            )?;
        } else {
            tx.execute(
                "UPDATE products SET
                   quantity = MAX(quantity - ?1, 0),
                   in_stock = (MAX(quantity - ?1, 0) > 0)
                 WHERE id = ?2",
                params![item.quantity, item.product_id],
            )?;
        }
    }

    tx.execute(
        "UPDATE orders SET status = 'paid', payment_id = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![payment_id, order_id],
    )?;
    tx.execute(
        "UPDATE carts SET is_ordered = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![order.cart_id],
    )?;

    let order = require_order(&tx, order_id)?;
    tx.commit()?;
    log::info!("Order #{} paid (payment id {:?})", order_id, order.payment_id);
    Ok(PaymentOutcome::Confirmed(order))
}

/// Cancels a pending order and releases its reservation.
///
/// Returns `false` when the order was not pending.
pub fn cancel_order(conn: &mut Connection, order_id: i64) -> AppResult<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let order = require_order(&tx, order_id)?;
    if order.status != OrderStatus::Pending {
        return Ok(false);
    }
    cancel_reservation(&tx, order_id)?;
    set_status(&tx, order_id, OrderStatus::Cancelled)?;
    tx.commit()?;
    log::info!("Order #{} cancelled", order_id);
    Ok(true)
}

/// Moves a paid order to `shipped`.
pub fn mark_shipped(conn: &Connection, order_id: i64) -> AppResult<Order> {
    let order = require_order(conn, order_id)?;
    if order.status != OrderStatus::Paid {
        return Err(AppError::Validation(format!(
            "Order #{} is {}, only paid orders can be shipped",
            order_id, order.status
        )));
    }
    set_status(conn, order_id, OrderStatus::Shipped)?;
    require_order(conn, order_id)
}

/// Cancels pending orders untouched for `max_age_minutes` and releases
/// their stock. Returns the ids of the cancelled orders.
pub fn release_stale_reservations(conn: &mut Connection, max_age_minutes: i64) -> AppResult<Vec<i64>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let stale: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT id FROM orders
             WHERE status = 'pending'
               AND updated_at < datetime('now', '-' || ?1 || ' minutes')
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![max_age_minutes], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for order_id in &stale {
        cancel_reservation(&tx, *order_id)?;
        set_status(&tx, *order_id, OrderStatus::Cancelled)?;
    }
    tx.commit()?;

    if !stale.is_empty() {
        log::info!("Released {} stale reservation(s): {:?}", stale.len(), stale);
    }
    Ok(stale)
}

/// One CSV/JSON export row: an order item with its order and customer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExportRow {
    pub order_id: i64,
    pub user_chat_id: i64,
    pub user_username: String,
    pub status: String,
    pub total_amount: String,
    pub created_at: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub price: String,
    pub line_total: String,
}

/// Export rows for one order, or for every paid and shipped order.
pub fn export_rows(conn: &Connection, order_id: Option<i64>) -> AppResult<Vec<ExportRow>> {
    let mut stmt = conn.prepare(
        "SELECT o.id, u.chat_id, u.username, o.status, o.total_amount, o.created_at,
                p.id, p.description, oi.quantity, oi.price
         FROM orders o
         JOIN carts c ON c.id = o.cart_id
         JOIN users u ON u.id = c.user_id
         JOIN order_items oi ON oi.order_id = o.id
         JOIN products p ON p.id = oi.product_id
         WHERE (?1 IS NULL AND o.status IN ('paid', 'shipped')) OR o.id = ?1
         ORDER BY o.id, oi.id",
    )?;
    let rows = stmt.query_map(params![order_id], |row| {
        let quantity: i64 = row.get(8)?;
        let price = Money(row.get(9)?);
        Ok(ExportRow {
            order_id: row.get(0)?,
            user_chat_id: row.get(1)?,
            user_username: row.get(2)?,
            status: row.get(3)?,
            total_amount: Money(row.get(4)?).to_string(),
            created_at: row.get(5)?,
            product_id: row.get(6)?,
            product_name: row.get(7)?,
            quantity,
            price: price.to_string(),
            line_total: price.times(quantity).unwrap_or(Money(i64::MAX)).to_string(),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cart::add_item;
    use crate::storage::catalog::{create_category, create_product, get_product, set_product_quantity, NewProduct};
    use crate::storage::migrations::test_connection;
    use pretty_assertions::assert_eq;

    const ALICE: i64 = 100;
    const BOB: i64 = 200;

    fn product(conn: &Connection, description: &str, price: i64, quantity: i64) -> i64 {
        let cat = match catalog::list_categories(conn, None).unwrap().first() {
            Some(c) => c.id,
            None => create_category(conn, "Чай", None).unwrap().id,
        };
        create_product(
            conn,
            &NewProduct {
                category_id: cat,
                description,
                price: Money(price),
                image: None,
                quantity,
            },
        )
        .unwrap()
        .id
    }

    fn stock(conn: &Connection, id: i64) -> (i64, i64, bool) {
        let p = get_product(conn, id).unwrap().unwrap();
        (p.quantity, p.reserved, p.in_stock)
    }

    fn contact() -> OrderContact {
        OrderContact {
            full_name: "Алиса Петрова".to_string(),
            phone: "+79990001122".to_string(),
            address: "Россия, Москва".to_string(),
        }
    }

    #[test]
    fn test_checkout_reserves_and_snapshots_items() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 25000, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();

        let draft = begin_checkout(&mut conn, ALICE).unwrap();
        assert_eq!(draft.order.status, OrderStatus::Pending);
        assert_eq!(draft.order.total_amount, Money(50000));
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].quantity, 2);
        assert_eq!(draft.items[0].price, Money(25000));
        assert_eq!(stock(&conn, tea), (5, 2, true));
    }

    #[test]
    fn test_checkout_of_empty_cart_fails() {
        let mut conn = test_connection();
        assert!(matches!(begin_checkout(&mut conn, ALICE), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_insufficient_stock_rolls_back_everything() {
        let mut conn = test_connection();
        let plenty = product(&conn, "Улун", 100, 10);
        let scarce = product(&conn, "Пуэр", 100, 1);
        add_item(&conn, ALICE, plenty, 3).unwrap();
        add_item(&conn, ALICE, scarce, 2).unwrap();

        let err = begin_checkout(&mut conn, ALICE).unwrap_err();
        match err {
            AppError::InsufficientStock {
                product_id,
                description,
                available,
                requested,
            } => {
                assert_eq!(product_id, scarce);
                assert_eq!(description, "Пуэр");
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The first line's reservation was rolled back too.
        assert_eq!(stock(&conn, plenty), (10, 0, true));
        assert!(pending_orders_for_chat(&conn, ALICE).unwrap().is_empty());
    }

    #[test]
    fn test_second_cart_cannot_oversell_reserved_stock() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 3);
        add_item(&conn, ALICE, tea, 2).unwrap();
        add_item(&conn, BOB, tea, 2).unwrap();

        begin_checkout(&mut conn, ALICE).unwrap();
        let err = begin_checkout(&mut conn, BOB).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 1, requested: 2, .. }));
        assert_eq!(stock(&conn, tea), (3, 2, true));
    }

    #[test]
    fn test_repeated_checkout_replaces_reservation() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let first = begin_checkout(&mut conn, ALICE).unwrap();

        add_item(&conn, ALICE, tea, 1).unwrap();
        let second = begin_checkout(&mut conn, ALICE).unwrap();

        assert_eq!(first.order.id, second.order.id, "one order per cart");
        assert_eq!(second.cancelled_order_id, None);
        assert_eq!(second.items[0].quantity, 3);
        assert_eq!(stock(&conn, tea), (5, 3, true));
    }

    #[test]
    fn test_cancel_reservation_never_goes_negative() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();

        cancel_reservation(&conn, draft.order.id).unwrap();
        cancel_reservation(&conn, draft.order.id).unwrap();
        assert_eq!(stock(&conn, tea), (5, 0, true));
    }

    #[test]
    fn test_pre_checkout_stores_contact() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();

        let order = pre_checkout(&mut conn, draft.order.id, draft.order.total_amount, &contact()).unwrap();
        assert_eq!(order.full_name, "Алиса Петрова");
        assert_eq!(order.phone, "+79990001122");
        assert_eq!(order.address, "Россия, Москва");
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_pre_checkout_cancels_when_stock_was_written_off() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 4).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();

        set_product_quantity(&conn, tea, 2).unwrap();
        let err = pre_checkout(&mut conn, draft.order.id, draft.order.total_amount, &contact()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 2, requested: 4, .. }));

        let order = get_order(&conn, draft.order.id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(stock(&conn, tea), (2, 0, true));
    }

    #[test]
    fn test_pre_checkout_rejects_non_pending_without_touching_stock() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 1).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();
        confirm_payment(&mut conn, draft.order.id, Some("pay_1")).unwrap();

        let err = pre_checkout(&mut conn, draft.order.id, draft.order.total_amount, &contact()).unwrap_err();
        assert!(matches!(err, AppError::OrderNotPending { .. }));
        assert_eq!(stock(&conn, tea), (4, 0, true));
    }

    #[test]
    fn test_pre_checkout_rejects_outdated_invoice() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 1).unwrap();
        let first = begin_checkout(&mut conn, ALICE).unwrap();
        add_item(&conn, ALICE, tea, 1).unwrap();
        let second = begin_checkout(&mut conn, ALICE).unwrap();

        let err = pre_checkout(&mut conn, first.order.id, first.order.total_amount, &contact()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        // The newer invoice for the same order still goes through.
        pre_checkout(&mut conn, second.order.id, second.order.total_amount, &contact()).unwrap();
        assert_eq!(stock(&conn, tea), (5, 2, true));
    }

    #[test]
    fn test_pre_checkout_unknown_order() {
        let mut conn = test_connection();
        assert!(matches!(
            pre_checkout(&mut conn, 404, Money(100), &contact()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_confirm_payment_deducts_and_closes_cart() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 2);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();

        let outcome = confirm_payment(&mut conn, draft.order.id, Some("yk_123")).unwrap();
        let order = match outcome {
            PaymentOutcome::Confirmed(order) => order,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.payment_id.as_deref(), Some("yk_123"));
        assert_eq!(stock(&conn, tea), (0, 0, false));
        assert!(cart::find_open_cart(&conn, ALICE).unwrap().is_none());
    }

    #[test]
    fn test_confirm_payment_is_idempotent() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();

        confirm_payment(&mut conn, draft.order.id, Some("p")).unwrap();
        let again = confirm_payment(&mut conn, draft.order.id, Some("p")).unwrap();
        assert!(matches!(again, PaymentOutcome::AlreadyPaid(_)));
        assert_eq!(stock(&conn, tea), (3, 0, true));
    }

    #[test]
    fn test_payment_for_cancelled_order_still_deducts_stock() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();
        assert!(cancel_order(&mut conn, draft.order.id).unwrap());

        confirm_payment(&mut conn, draft.order.id, None).unwrap();
        assert_eq!(stock(&conn, tea), (3, 0, true));
    }

    #[test]
    fn test_cart_after_payment_starts_fresh() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 1).unwrap();
        let first = begin_checkout(&mut conn, ALICE).unwrap();
        confirm_payment(&mut conn, first.order.id, None).unwrap();

        add_item(&conn, ALICE, tea, 1).unwrap();
        let second = begin_checkout(&mut conn, ALICE).unwrap();
        assert_ne!(first.order.id, second.order.id);
        assert_eq!(second.order.cart_id, cart::find_open_cart(&conn, ALICE).unwrap().unwrap().id);
    }

    #[test]
    fn test_mark_shipped_requires_paid() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 1).unwrap();
        let draft = begin_checkout(&mut conn, ALICE).unwrap();

        assert!(mark_shipped(&conn, draft.order.id).is_err());
        confirm_payment(&mut conn, draft.order.id, None).unwrap();
        assert_eq!(mark_shipped(&conn, draft.order.id).unwrap().status, OrderStatus::Shipped);
    }

    #[test]
    fn test_stale_reservations_are_released() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 100, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        add_item(&conn, BOB, tea, 1).unwrap();
        let old = begin_checkout(&mut conn, ALICE).unwrap();
        let fresh = begin_checkout(&mut conn, BOB).unwrap();

        conn.execute(
            "UPDATE orders SET updated_at = datetime('now', '-2 hours') WHERE id = ?1",
            params![old.order.id],
        )
        .unwrap();

        let released = release_stale_reservations(&mut conn, 30).unwrap();
        assert_eq!(released, vec![old.order.id]);
        assert_eq!(stock(&conn, tea), (5, 1, true));
        assert_eq!(
            get_order(&conn, fresh.order.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_export_rows_cover_paid_orders_only() {
        let mut conn = test_connection();
        let tea = product(&conn, "Улун", 12550, 5);
        add_item(&conn, ALICE, tea, 2).unwrap();
        let paid = begin_checkout(&mut conn, ALICE).unwrap();
        confirm_payment(&mut conn, paid.order.id, None).unwrap();
        add_item(&conn, BOB, tea, 1).unwrap();
        begin_checkout(&mut conn, BOB).unwrap();

        let rows = export_rows(&conn, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, paid.order.id);
        assert_eq!(rows[0].user_chat_id, ALICE);
        assert_eq!(rows[0].price, "125.50");
        assert_eq!(rows[0].line_total, "251.00");
        assert_eq!(rows[0].status, "paid");
    }

    #[test]
    fn test_order_status_round_trips_through_text() {
        assert_eq!(OrderStatus::Cancelled.as_ref(), "cancelled");
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert!("canceled".parse::<OrderStatus>().is_err());
    }
}
