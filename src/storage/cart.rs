//! Shopping carts.
//!
//! Every user has at most one open (`is_ordered = 0`) cart; it is created
//! on the first added item and closed when its order is paid.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::money::Money;
use crate::storage::catalog::{self, Product};
use crate::storage::users;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: i64,
    pub user_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub is_ordered: bool,
}

/// A cart line joined with its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: i64,
    pub cart_id: i64,
    pub quantity: i64,
    /// Price captured when the line was first added
    pub price: Money,
    pub product: Product,
}

impl CartLine {
    /// Cost at the product's current price.
    pub fn cost(&self) -> Money {
        self.product.price.times(self.quantity).unwrap_or(Money(i64::MAX))
    }
}

fn parse_cart(row: &rusqlite::Row<'_>) -> rusqlite::Result<Cart> {
    Ok(Cart {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        is_ordered: row.get::<_, i32>(4)? != 0,
    })
}

/// The user's open cart, if any.
pub fn find_open_cart(conn: &Connection, chat_id: i64) -> AppResult<Option<Cart>> {
    let cart = conn
        .query_row(
            "SELECT c.id, c.user_id, c.created_at, c.updated_at, c.is_ordered
             FROM carts c
             JOIN users u ON u.id = c.user_id
             WHERE u.chat_id = ?1 AND c.is_ordered = 0
             ORDER BY c.id DESC
             LIMIT 1",
            params![chat_id],
            parse_cart,
        )
        .optional()?;
    Ok(cart)
}

/// Returns the open cart, creating it (and the user row) when missing.
pub fn open_cart(conn: &Connection, chat_id: i64) -> AppResult<Cart> {
    if let Some(cart) = find_open_cart(conn, chat_id)? {
        return Ok(cart);
    }

    let user = match users::get_user_by_chat(conn, chat_id)? {
        Some(user) => user,
        None => users::upsert_user(conn, chat_id, None, None, None)?,
    };
    conn.execute("INSERT INTO carts (user_id) VALUES (?1)", params![user.id])?;
    let id = conn.last_insert_rowid();
    log::debug!("Opened cart {} for chat {}", id, chat_id);

    let cart = conn.query_row(
        "SELECT id, user_id, created_at, updated_at, is_ordered FROM carts WHERE id = ?1",
        params![id],
        parse_cart,
    )?;
    Ok(cart)
}

fn touch(conn: &Connection, cart_id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE carts SET updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![cart_id],
    )?;
    Ok(())
}

/// Adds `quantity` units of a product, incrementing an existing line.
///
/// New lines capture the product's current price. A line never holds more
/// than [`config::catalog::MAX_LINE_QUANTITY`] units.
pub fn add_item(conn: &Connection, chat_id: i64, product_id: i64, quantity: i64) -> AppResult<CartLine> {
    let max = config::catalog::MAX_LINE_QUANTITY;
    if quantity < 1 {
        return Err(AppError::Validation("Quantity must be greater than 0".to_string()));
    }
    if quantity > max {
        return Err(AppError::Validation(format!("Quantity must not exceed {}", max)));
    }
    let product =
        catalog::get_product(conn, product_id)?.ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
    let cart = open_cart(conn, chat_id)?;

    let changed = conn.execute(
        "INSERT INTO cart_items (cart_id, product_id, quantity, price)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(cart_id, product_id) DO UPDATE SET quantity = quantity + excluded.quantity
         WHERE cart_items.quantity + excluded.quantity <= ?5",
        params![cart.id, product.id, quantity, product.price.minor(), max],
    )?;
    if changed == 0 {
        return Err(AppError::Validation(format!("Quantity must not exceed {}", max)));
    }
    touch(conn, cart.id)?;

    let line = cart_items(conn, chat_id)?
        .into_iter()
        .find(|line| line.product.id == product_id)
        .ok_or_else(|| AppError::NotFound(format!("Cart line for product {}", product_id)))?;
    Ok(line)
}

/// Removes a line from the user's open cart. Returns whether a line was removed.
pub fn remove_item(conn: &Connection, chat_id: i64, item_id: i64) -> AppResult<bool> {
    let Some(cart) = find_open_cart(conn, chat_id)? else {
        return Ok(false);
    };
    let removed = conn.execute(
        "DELETE FROM cart_items WHERE id = ?1 AND cart_id = ?2",
        params![item_id, cart.id],
    )?;
    if removed > 0 {
        touch(conn, cart.id)?;
    }
    Ok(removed > 0)
}

/// Empties the user's open cart. Returns the number of removed lines.
pub fn clear_cart(conn: &Connection, chat_id: i64) -> AppResult<usize> {
    let Some(cart) = find_open_cart(conn, chat_id)? else {
        return Ok(0);
    };
    let removed = conn.execute("DELETE FROM cart_items WHERE cart_id = ?1", params![cart.id])?;
    touch(conn, cart.id)?;
    Ok(removed)
}

/// Lines of a specific cart, in insertion order.
pub fn lines_of_cart(conn: &Connection, cart_id: i64) -> AppResult<Vec<CartLine>> {
    let mut stmt = conn.prepare(
        "SELECT ci.id, ci.cart_id, ci.quantity, ci.price,
                p.id, p.category_id, p.description, p.price, p.image, p.quantity, p.reserved, p.in_stock
         FROM cart_items ci
         JOIN products p ON p.id = ci.product_id
         WHERE ci.cart_id = ?1
         ORDER BY ci.id",
    )?;
    let rows = stmt.query_map(params![cart_id], |row| {
        Ok(CartLine {
            id: row.get(0)?,
            cart_id: row.get(1)?,
            quantity: row.get(2)?,
            price: Money(row.get(3)?),
            product: Product {
                id: row.get(4)?,
                category_id: row.get(5)?,
                description: row.get(6)?,
                price: Money(row.get(7)?),
                image: row.get(8)?,
                quantity: row.get(9)?,
                reserved: row.get(10)?,
                in_stock: row.get::<_, i32>(11)? != 0,
            },
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Lines of the user's open cart; empty when there is no open cart.
pub fn cart_items(conn: &Connection, chat_id: i64) -> AppResult<Vec<CartLine>> {
    match find_open_cart(conn, chat_id)? {
        Some(cart) => lines_of_cart(conn, cart.id),
        None => Ok(Vec::new()),
    }
}

/// Sum of line costs at current product prices.
pub fn cart_total(lines: &[CartLine]) -> Option<Money> {
    lines
        .iter()
        .try_fold(Money(0), |acc, line| {
            line.product
                .price
                .times(line.quantity)
                .and_then(|cost| acc.minor().checked_add(cost.minor()))
                .map(Money)
        })
}
