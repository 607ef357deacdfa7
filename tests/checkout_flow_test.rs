//! Integration tests for the reservation and payment flow
//!
//! Run with: cargo test --test checkout_flow_test

mod common;

use std::thread;

use common::TestShop;
use lavka::core::checkout::{InvoiceDraft, InvoicePayload};
use lavka::core::export::export_paid_order;
use lavka::core::{AppError, Money};
use lavka::storage::cart;
use lavka::storage::get_connection;
use lavka::storage::orders::{self, OrderContact, OrderStatus, PaymentOutcome};
use pretty_assertions::assert_eq;
use serial_test::serial;

fn contact() -> OrderContact {
    OrderContact {
        full_name: "Иван Петров".to_string(),
        phone: "+79990000000".to_string(),
        address: "Россия, Москва, ул. Тверская 1".to_string(),
    }
}

#[test]
fn test_concurrent_checkouts_never_oversell() {
    let shop = TestShop::new();
    let product = shop.product("Чайник", 150_000, 8);

    let buyers: Vec<i64> = (1..=6).collect();
    {
        let conn = get_connection(&shop.pool).unwrap();
        for chat_id in &buyers {
            cart::add_item(&conn, *chat_id, product.id, 3).unwrap();
        }
    }

    let handles: Vec<_> = buyers
        .iter()
        .map(|&chat_id| {
            let pool = shop.pool.clone();
            thread::spawn(move || {
                let mut conn = get_connection(&pool).unwrap();
                orders::begin_checkout(&mut conn, chat_id)
            })
        })
        .collect();

    let mut reserved_orders = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => reserved_orders += 1,
            Err(AppError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(requested, 3);
                assert!(available < 3);
            }
            Err(e) => panic!("unexpected checkout error: {}", e),
        }
    }

    // 8 units cover two orders of 3
    assert_eq!(reserved_orders, 2);
    let product = shop.reload(product.id);
    assert_eq!(product.reserved, 6);
    assert_eq!(product.available(), 2);
}

#[tokio::test]
#[serial]
async fn test_full_purchase_flow_exports_order() {
    let shop = TestShop::new();
    let kettle = shop.product("Чайник", 150_000, 5);
    let cup = shop.product("Кружка", 35_050, 10);
    let chat_id = 4242;

    let draft = {
        let mut conn = get_connection(&shop.pool).unwrap();
        cart::add_item(&conn, chat_id, kettle.id, 1).unwrap();
        cart::add_item(&conn, chat_id, cup.id, 2).unwrap();
        orders::begin_checkout(&mut conn, chat_id).unwrap()
    };
    assert_eq!(draft.order.status, OrderStatus::Pending);
    assert_eq!(draft.order.total_amount, Money(220_100));

    let invoice = InvoiceDraft::for_order(&draft.order, "RUB").unwrap();
    assert_eq!(invoice.amount, 220_100);
    let payload: InvoicePayload = invoice.payload.parse().unwrap();
    assert_eq!(payload.order_id, draft.order.id);

    {
        let mut conn = get_connection(&shop.pool).unwrap();
        let order = orders::pre_checkout(&mut conn, payload.order_id, Money(220_100), &contact()).unwrap();
        assert_eq!(order.full_name, "Иван Петров");

        let outcome = orders::confirm_payment(&mut conn, payload.order_id, Some("provider-1")).unwrap();
        assert!(matches!(outcome, PaymentOutcome::Confirmed(_)));
        assert_eq!(outcome.order().payment_id.as_deref(), Some("provider-1"));

        // The paid cart is closed, a new one starts empty
        assert!(cart::cart_items(&conn, chat_id).unwrap().is_empty());
    }

    let kettle = shop.reload(kettle.id);
    assert_eq!((kettle.quantity, kettle.reserved), (4, 0));
    let cup = shop.reload(cup.id);
    assert_eq!((cup.quantity, cup.reserved), (8, 0));

    let csv_path = shop.dir.path().join("exports").join("orders.csv");
    let written = export_paid_order(shop.pool.clone(), payload.order_id, csv_path.clone())
        .await
        .unwrap();
    assert_eq!(written, 2);

    let content = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("order_id,user_chat_id"));
    assert!(lines[1].contains("\"Чайник\""));
    assert!(lines[2].contains("\"Кружка\""));
}

#[test]
fn test_redelivered_payment_is_applied_once() {
    let shop = TestShop::new();
    let product = shop.product("Чайник", 1_000, 3);

    let mut conn = get_connection(&shop.pool).unwrap();
    cart::add_item(&conn, 7, product.id, 2).unwrap();
    let draft = orders::begin_checkout(&mut conn, 7).unwrap();
    orders::pre_checkout(&mut conn, draft.order.id, draft.order.total_amount, &contact()).unwrap();

    let first = orders::confirm_payment(&mut conn, draft.order.id, Some("charge")).unwrap();
    let second = orders::confirm_payment(&mut conn, draft.order.id, Some("charge")).unwrap();
    assert!(matches!(first, PaymentOutcome::Confirmed(_)));
    assert!(matches!(second, PaymentOutcome::AlreadyPaid(_)));
    drop(conn);

    let product = shop.reload(product.id);
    assert_eq!((product.quantity, product.reserved), (1, 0));
}

#[test]
fn test_cancelled_checkout_returns_stock_for_next_buyer() {
    let shop = TestShop::new();
    let product = shop.product("Чайник", 1_000, 2);

    let mut conn = get_connection(&shop.pool).unwrap();
    cart::add_item(&conn, 1, product.id, 2).unwrap();
    cart::add_item(&conn, 2, product.id, 2).unwrap();

    let first = orders::begin_checkout(&mut conn, 1).unwrap();
    assert!(matches!(
        orders::begin_checkout(&mut conn, 2),
        Err(AppError::InsufficientStock { available: 0, .. })
    ));

    assert!(orders::cancel_order(&mut conn, first.order.id).unwrap());
    let second = orders::begin_checkout(&mut conn, 2).unwrap();
    assert_eq!(second.items.len(), 1);
    drop(conn);

    assert_eq!(shop.reload(product.id).reserved, 2);
}
