//! Catalog seeding from a JSON document.
//!
//! ```json
//! {
//!   "categories": [
//!     {
//!       "name": "Чай",
//!       "products": [{ "description": "Пуэр", "price": "450.00", "quantity": 3 }],
//!       "children": [{ "name": "Улун", "products": [] }]
//!     }
//!   ],
//!   "faq": [{ "question": "Сроки доставки?", "answer": "3-5 дней." }]
//! }
//! ```
//!
//! Children have no `children` field of their own, which keeps the
//! one-level nesting rule in the document shape.

use std::path::Path;

use rusqlite::Connection;
use serde::Deserialize;

use crate::core::error::AppResult;
use crate::core::money::Money;
use crate::storage::catalog::{self, NewProduct};
use crate::storage::faq;

#[derive(Debug, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub categories: Vec<RootCategory>,
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RootCategory {
    pub name: String,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
    #[serde(default)]
    pub children: Vec<ChildCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ChildCategory {
    pub name: String,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProductEntry {
    pub description: String,
    /// Decimal price in major units, e.g. `"199.90"`
    pub price: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub products: usize,
    pub faq: usize,
}

pub fn parse_document(json: &str) -> AppResult<CatalogDocument> {
    Ok(serde_json::from_str(json)?)
}

fn insert_products(
    conn: &Connection,
    category_id: i64,
    products: &[ProductEntry],
    summary: &mut ImportSummary,
) -> AppResult<()> {
    for entry in products {
        let price: Money = entry.price.parse()?;
        catalog::create_product(
            conn,
            &NewProduct {
                category_id,
                description: &entry.description,
                price,
                image: entry.image.as_deref(),
                quantity: entry.quantity,
            },
        )?;
        summary.products += 1;
    }
    Ok(())
}

/// Inserts everything in the document in one transaction.
pub fn import_document(conn: &mut Connection, document: &CatalogDocument) -> AppResult<ImportSummary> {
    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();

    for root in &document.categories {
        let category = catalog::create_category(&tx, &root.name, None)?;
        summary.categories += 1;
        insert_products(&tx, category.id, &root.products, &mut summary)?;

        for child in &root.children {
            let sub = catalog::create_category(&tx, &child.name, Some(category.id))?;
            summary.categories += 1;
            insert_products(&tx, sub.id, &child.products, &mut summary)?;
        }
    }
    for entry in &document.faq {
        faq::create_faq(&tx, &entry.question, &entry.answer)?;
        summary.faq += 1;
    }

    tx.commit()?;
    log::info!(
        "Catalog imported: {} categories, {} products, {} FAQ entries",
        summary.categories,
        summary.products,
        summary.faq
    );
    Ok(summary)
}

pub fn import_file(conn: &mut Connection, path: &Path) -> AppResult<ImportSummary> {
    let json = std::fs::read_to_string(path)?;
    let document = parse_document(&json)?;
    import_document(conn, &document)
}
