//! Categories and products.
//!
//! Categories nest at most one level deep: a root category may have
//! children, a child may not. Product stock is tracked as `quantity`
//! (physically on hand) and `reserved` (held by pending orders); the
//! `in_stock` flag is always recomputed from `quantity`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::{AppError, AppResult};
use crate::core::money::Money;

/// Longest product description accepted
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub category_id: i64,
    pub description: String,
    pub price: Money,
    pub image: Option<String>,
    pub quantity: i64,
    pub reserved: i64,
    pub in_stock: bool,
}

impl Product {
    /// Units that can still be reserved by a new order.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }
}

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub category_id: i64,
    pub description: &'a str,
    pub price: Money,
    pub image: Option<&'a str>,
    pub quantity: i64,
}

const PRODUCT_COLUMNS: &str = "id, category_id, description, price, image, quantity, reserved, in_stock";

pub(crate) fn parse_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        category_id: row.get(1)?,
        description: row.get(2)?,
        price: Money(row.get(3)?),
        image: row.get(4)?,
        quantity: row.get(5)?,
        reserved: row.get(6)?,
        in_stock: row.get::<_, i32>(7)? != 0,
    })
}

fn parse_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
    })
}

/// Checks the one-level nesting rule for `parent_id`.
fn validate_parent(conn: &Connection, parent_id: i64) -> AppResult<()> {
    let parent = get_category(conn, parent_id)?.ok_or_else(|| AppError::NotFound(format!("Category {}", parent_id)))?;
    if let Some(grandparent_id) = parent.parent_id {
        let grandparent_name = get_category(conn, grandparent_id)?
            .map(|c| c.name)
            .unwrap_or_else(|| grandparent_id.to_string());
        return Err(AppError::Validation(format!(
            "Максимальная глубина вложенности категорий — 1 уровень. \
             У категории {} уже есть родительская категория {}.",
            parent.name, grandparent_name
        )));
    }
    Ok(())
}

pub fn create_category(conn: &Connection, name: &str, parent_id: Option<i64>) -> AppResult<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Category name must not be empty".to_string()));
    }
    if let Some(parent_id) = parent_id {
        validate_parent(conn, parent_id)?;
    }

    conn.execute(
        "INSERT INTO categories (name, parent_id) VALUES (?1, ?2)",
        params![name, parent_id],
    )?;
    Ok(Category {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        parent_id,
    })
}

/// Moves a category under `parent_id` (or to the root).
///
/// A category pointed at itself becomes a root category. A category that
/// already has children cannot become a child.
pub fn update_category_parent(conn: &Connection, category_id: i64, parent_id: Option<i64>) -> AppResult<Category> {
    let category =
        get_category(conn, category_id)?.ok_or_else(|| AppError::NotFound(format!("Category {}", category_id)))?;

    let parent_id = parent_id.filter(|p| *p != category_id);
    if let Some(parent_id) = parent_id {
        validate_parent(conn, parent_id)?;
        if !list_categories(conn, Some(category_id))?.is_empty() {
            return Err(AppError::Validation(format!(
                "Категория {} содержит подкатегории и не может стать вложенной",
                category.name
            )));
        }
    }

    conn.execute(
        "UPDATE categories SET parent_id = ?1 WHERE id = ?2",
        params![parent_id, category_id],
    )?;
    Ok(Category { parent_id, ..category })
}

pub fn get_category(conn: &Connection, id: i64) -> AppResult<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, parent_id FROM categories WHERE id = ?1",
            params![id],
            parse_category,
        )
        .optional()?;
    Ok(category)
}

/// Children of `parent_id`, or the root categories when `None`.
pub fn list_categories(conn: &Connection, parent_id: Option<i64>) -> AppResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, parent_id FROM categories
         WHERE parent_id IS ?1
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![parent_id], parse_category)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn create_product(conn: &Connection, product: &NewProduct<'_>) -> AppResult<Product> {
    if product.price.minor() < 1 {
        return Err(AppError::Validation("Price must be at least 0.01".to_string()));
    }
    if product.quantity < 0 {
        return Err(AppError::Validation("Quantity must not be negative".to_string()));
    }
    if product.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Description is longer than {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    if get_category(conn, product.category_id)?.is_none() {
        return Err(AppError::NotFound(format!("Category {}", product.category_id)));
    }

    conn.execute(
        "INSERT INTO products (category_id, description, price, image, quantity, reserved, in_stock)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            product.category_id,
            product.description,
            product.price.minor(),
            product.image,
            product.quantity,
            product.quantity > 0
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_product(conn, id)?.ok_or_else(|| AppError::NotFound(format!("Product {}", id)))
}

/// Sets the on-hand quantity (restock or write-off) and refreshes `in_stock`.
pub fn set_product_quantity(conn: &Connection, product_id: i64, quantity: i64) -> AppResult<Product> {
    if quantity < 0 {
        return Err(AppError::Validation("Quantity must not be negative".to_string()));
    }
    let changed = conn.execute(
        "UPDATE products SET quantity = ?1, in_stock = (?1 > 0) WHERE id = ?2",
        params![quantity, product_id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("Product {}", product_id)));
    }
    get_product(conn, product_id)?.ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
}

pub fn get_product(conn: &Connection, id: i64) -> AppResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    let product = conn.query_row(&sql, params![id], parse_product).optional()?;
    Ok(product)
}

/// Products of a category in id order.
pub fn list_products(conn: &Connection, category_id: i64) -> AppResult<Vec<Product>> {
    let sql = format!(
        "SELECT {} FROM products WHERE category_id = ?1 ORDER BY id",
        PRODUCT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![category_id], parse_product)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::test_connection;
    use pretty_assertions::assert_eq;

    fn product<'a>(category_id: i64, description: &'a str, quantity: i64) -> NewProduct<'a> {
        NewProduct {
            category_id,
            description,
            price: Money(15000),
            image: None,
            quantity,
        }
    }

    #[test]
    fn test_root_and_child_categories_are_listed_separately() {
        let conn = test_connection();
        let tea = create_category(&conn, "Чай", None).unwrap();
        let coffee = create_category(&conn, "Кофе", None).unwrap();
        let green = create_category(&conn, "Зелёный", Some(tea.id)).unwrap();

        let roots = list_categories(&conn, None).unwrap();
        assert_eq!(roots, vec![tea.clone(), coffee]);
        assert_eq!(list_categories(&conn, Some(tea.id)).unwrap(), vec![green]);
    }

    #[test]
    fn test_second_level_nesting_is_rejected() {
        let conn = test_connection();
        let root = create_category(&conn, "Чай", None).unwrap();
        let child = create_category(&conn, "Зелёный", Some(root.id)).unwrap();

        let err = create_category(&conn, "Сенча", Some(child.id)).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("1 уровень")));
    }

    #[test]
    fn test_self_parent_is_cleared() {
        let conn = test_connection();
        let root = create_category(&conn, "Чай", None).unwrap();
        let updated = update_category_parent(&conn, root.id, Some(root.id)).unwrap();
        assert_eq!(updated.parent_id, None);
    }

    #[test]
    fn test_category_with_children_cannot_be_nested() {
        let conn = test_connection();
        let tea = create_category(&conn, "Чай", None).unwrap();
        create_category(&conn, "Зелёный", Some(tea.id)).unwrap();
        let coffee = create_category(&conn, "Кофе", None).unwrap();

        assert!(update_category_parent(&conn, tea.id, Some(coffee.id)).is_err());
    }

    #[test]
    fn test_in_stock_follows_quantity() {
        let conn = test_connection();
        let cat = create_category(&conn, "Чай", None).unwrap();

        let p = create_product(&conn, &product(cat.id, "Улун", 0)).unwrap();
        assert!(!p.in_stock);

        let p = set_product_quantity(&conn, p.id, 3).unwrap();
        assert!(p.in_stock);
        assert_eq!(p.available(), 3);

        let p = set_product_quantity(&conn, p.id, 0).unwrap();
        assert!(!p.in_stock);
    }

    #[test]
    fn test_product_validation() {
        let conn = test_connection();
        let cat = create_category(&conn, "Чай", None).unwrap();

        let mut free = product(cat.id, "Даром", 1);
        free.price = Money(0);
        assert!(create_product(&conn, &free).is_err());

        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(create_product(&conn, &product(cat.id, &long, 1)).is_err());

        assert!(matches!(
            create_product(&conn, &product(999, "Нет категории", 1)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_products_are_ordered_by_id() {
        let conn = test_connection();
        let cat = create_category(&conn, "Чай", None).unwrap();
        let a = create_product(&conn, &product(cat.id, "A", 1)).unwrap();
        let b = create_product(&conn, &product(cat.id, "B", 1)).unwrap();

        let ids: Vec<i64> = list_products(&conn, cat.id).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }
}
