//! Common test utilities
//!
//! This module is shared across all integration tests

use std::sync::Arc;

use lavka::core::Money;
use lavka::storage::catalog::{self, NewProduct, Product};
use lavka::storage::{create_pool, get_connection, DbPool};
use tempfile::TempDir;

/// A migrated SQLite file inside a temporary directory.
///
/// The directory is removed when the shop is dropped.
pub struct TestShop {
    pub dir: TempDir,
    pub pool: Arc<DbPool>,
}

impl TestShop {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let db_path = dir.path().join("shop.sqlite");
        let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("pool");
        Self {
            dir,
            pool: Arc::new(pool),
        }
    }

    /// Creates a root category with one product in it.
    pub fn product(&self, description: &str, price: i64, quantity: i64) -> Product {
        let conn = get_connection(&self.pool).expect("connection");
        let category = catalog::create_category(&conn, &format!("Категория {}", description), None).expect("category");
        catalog::create_product(
            &conn,
            &NewProduct {
                category_id: category.id,
                description,
                price: Money(price),
                image: None,
                quantity,
            },
        )
        .expect("product")
    }

    pub fn reload(&self, product_id: i64) -> Product {
        let conn = get_connection(&self.pool).expect("connection");
        catalog::get_product(&conn, product_id).expect("query").expect("product exists")
    }
}
