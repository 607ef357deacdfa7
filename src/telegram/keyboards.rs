//! Inline keyboards and the texts that go with them.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;

use crate::core::money::Money;
use crate::storage::cart::{cart_total, CartLine};
use crate::storage::catalog::{Category, Product};
use crate::storage::faq::Faq;
use crate::telegram::callback::CallbackAction;

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

/// `⬅️ 2/5 ➡️` row; empty when everything fits on one page.
fn pager_row(page: usize, total_pages: usize, to_page: impl Fn(usize) -> CallbackAction) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if total_pages <= 1 {
        return row;
    }
    if page > 1 {
        row.push(button("⬅️", to_page(page - 1)));
    }
    row.push(button(format!("{}/{}", page, total_pages), CallbackAction::NoAction));
    if page < total_pages {
        row.push(button("➡️", to_page(page + 1)));
    }
    row
}

pub fn main_menu_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📦 Каталог", CallbackAction::Catalog),
            button("🛒 Корзина", CallbackAction::Cart),
        ],
        vec![button("❓ FAQ", CallbackAction::Faq)],
    ])
}

pub fn categories_kb(
    categories: &[Category],
    parent_id: Option<i64>,
    page: usize,
    total_pages: usize,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| vec![button(c.name.clone(), CallbackAction::Category(c.id))])
        .collect();

    let pager = pager_row(page, total_pages, |page| CallbackAction::CategoryPage { page, parent_id });
    if !pager.is_empty() {
        rows.push(pager);
    }

    rows.push(match parent_id {
        Some(_) => vec![button("⬅️ Назад", CallbackAction::Catalog)],
        None => vec![button("⬅️ В начало", CallbackAction::BackToStart)],
    });
    InlineKeyboardMarkup::new(rows)
}

pub fn products_kb(
    products: &[Product],
    category_id: i64,
    parent_id: Option<i64>,
    page: usize,
    total_pages: usize,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = products
        .iter()
        .map(|p| vec![button(p.description.clone(), CallbackAction::Product(p.id))])
        .collect();

    let pager = pager_row(page, total_pages, |page| CallbackAction::ProductPage { category_id, page });
    if !pager.is_empty() {
        rows.push(pager);
    }

    let back = match parent_id {
        Some(parent) => CallbackAction::Category(parent),
        None => CallbackAction::Catalog,
    };
    rows.push(vec![button("⬅️ К категориям", back)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn product_detail_kb(product_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(
        "🛒 Добавить в корзину",
        CallbackAction::AddItem(product_id),
    )]])
}

pub fn out_of_stock_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("Нет в наличии", CallbackAction::NoAction)]])
}

/// Whether a product card should offer the "add to cart" button.
pub fn is_purchasable(product: &Product) -> bool {
    product.in_stock && product.available() > 0
}

/// HTML caption of a product card.
pub fn product_card_text(product: &Product) -> String {
    let mark = if is_purchasable(product) { "✅" } else { "❌" };
    format!(
        "<b>{}</b>\n💵 {}₽\nВ наличии: {} шт. {}",
        html::escape(&product.description),
        product.price,
        product.available().max(0),
        mark
    )
}

/// Title of a category list: the parent's name, or the root prompt.
pub fn categories_header(parent: Option<&Category>) -> String {
    match parent {
        Some(parent) => format!("Категория: {}", html::escape(&parent.name)),
        None => "Выберите категорию:".to_string(),
    }
}

/// `Товары: Чай → Улун (стр. 1/3)`
pub fn products_header(parent: Option<&Category>, category: &Category, page: usize, total_pages: usize) -> String {
    let path = match parent {
        Some(parent) => format!("{} → {}", html::escape(&parent.name), html::escape(&category.name)),
        None => html::escape(&category.name),
    };
    format!("Товары: {} (стр. {}/{})", path, page, total_pages.max(1))
}

/// HTML cart summary with per-line remove buttons.
pub fn cart_view(lines: &[CartLine]) -> (String, InlineKeyboardMarkup) {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    let text = if lines.is_empty() {
        "🛒 Ваша корзина пуста.".to_string()
    } else {
        let mut parts: Vec<String> = lines
            .iter()
            .map(|line| {
                format!(
                    "• {}\n  {} × {}₽ = {}₽",
                    html::escape(&line.product.description),
                    line.quantity,
                    line.product.price,
                    line.cost()
                )
            })
            .collect();
        let total = cart_total(lines).unwrap_or(Money(i64::MAX));
        parts.push(format!("\n<b>Итого: {}₽</b>", total));

        for line in lines {
            rows.push(vec![button(
                format!("❌ Удалить {}", line.product.description),
                CallbackAction::RemoveItem(line.id),
            )]);
        }
        rows.push(vec![
            button("🗑 Очистить корзину", CallbackAction::ClearCart),
            button("💳 Оформить заказ", CallbackAction::Order),
        ]);
        parts.join("\n")
    };

    rows.push(vec![button("⬅️ Продолжить покупки", CallbackAction::Catalog)]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// Questions two per row, then a back button.
pub fn faq_kb(faqs: &[Faq]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = faqs
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|f| button(f.question.clone(), CallbackAction::Question(f.id)))
                .collect()
        })
        .collect();
    rows.push(vec![button("Назад", CallbackAction::BackToStart)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_faq_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("Назад", CallbackAction::Faq)]])
}

pub fn faq_answer_text(faq: &Faq) -> String {
    format!("<b>{}</b>\n{}", html::escape(&faq.question), html::escape(&faq.answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
        markup
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                        other => format!("{other:?}"),
                    })
                    .collect()
            })
            .collect()
    }

    fn category(id: i64, name: &str, parent_id: Option<i64>) -> Category {
        Category {
            id,
            name: name.to_string(),
            parent_id,
        }
    }

    fn product(id: i64, description: &str, price: i64, quantity: i64, reserved: i64) -> Product {
        Product {
            id,
            category_id: 1,
            description: description.to_string(),
            price: Money(price),
            image: None,
            quantity,
            reserved,
            in_stock: quantity > 0,
        }
    }

    #[test]
    fn test_main_menu_layout() {
        assert_eq!(
            callbacks(&main_menu_kb()),
            vec![vec!["catalog", "cart"], vec!["faq"]]
        );
    }

    #[test]
    fn test_root_categories_middle_page() {
        let cats = vec![category(4, "Чай", None)];
        let kb = categories_kb(&cats, None, 2, 3);
        assert_eq!(
            callbacks(&kb),
            vec![
                vec!["category_4"],
                vec!["cat_page_1_", "no_action", "cat_page_3_"],
                vec!["back_to_start"],
            ]
        );
    }

    #[test]
    fn test_subcategories_single_page_go_back_to_catalog() {
        let cats = vec![category(5, "Улун", Some(4))];
        let kb = categories_kb(&cats, Some(4), 1, 1);
        assert_eq!(callbacks(&kb), vec![vec!["category_5"], vec!["catalog"]]);
    }

    #[test]
    fn test_products_back_button_targets_parent() {
        let prods = vec![product(9, "Пуэр", 100, 1, 0)];
        assert_eq!(
            callbacks(&products_kb(&prods, 5, Some(4), 1, 2)),
            vec![vec!["product_9"], vec!["no_action", "prod_page_5_2"], vec!["category_4"]]
        );
        assert_eq!(
            callbacks(&products_kb(&prods, 5, None, 1, 1)).last().cloned(),
            Some(vec!["catalog".to_string()])
        );
    }

    #[test]
    fn test_product_card_shows_free_stock() {
        let text = product_card_text(&product(1, "Чай <зелёный>", 25050, 5, 2));
        assert_eq!(text, "<b>Чай &lt;зелёный&gt;</b>\n💵 250.50₽\nВ наличии: 3 шт. ✅");

        let sold_out = product(1, "Пуэр", 100, 2, 2);
        assert!(!is_purchasable(&sold_out));
        assert!(product_card_text(&sold_out).ends_with("0 шт. ❌"));
    }

    #[test]
    fn test_products_header() {
        let parent = category(1, "Чай", None);
        let child = category(2, "Улун", Some(1));
        assert_eq!(products_header(Some(&parent), &child, 1, 3), "Товары: Чай → Улун (стр. 1/3)");
        assert_eq!(products_header(None, &parent, 1, 0), "Товары: Чай (стр. 1/1)");
    }

    #[test]
    fn test_headers_escape_category_names() {
        let parent = category(1, "Чай & кофе", None);
        let child = category(2, "<New>", Some(1));
        assert_eq!(
            products_header(Some(&parent), &child, 2, 2),
            "Товары: Чай &amp; кофе → &lt;New&gt; (стр. 2/2)"
        );
        assert_eq!(categories_header(Some(&parent)), "Категория: Чай &amp; кофе");
        assert_eq!(categories_header(None), "Выберите категорию:");
    }

    #[test]
    fn test_empty_cart_view() {
        let (text, kb) = cart_view(&[]);
        assert_eq!(text, "🛒 Ваша корзина пуста.");
        assert_eq!(callbacks(&kb), vec![vec!["catalog"]]);
    }

    #[test]
    fn test_cart_view_lines_and_total() {
        let lines = vec![
            CartLine {
                id: 11,
                cart_id: 1,
                quantity: 2,
                price: Money(10000),
                product: product(1, "Улун", 10000, 5, 0),
            },
            CartLine {
                id: 12,
                cart_id: 1,
                quantity: 1,
                price: Money(5050),
                product: product(2, "Пуэр", 5050, 5, 0),
            },
        ];
        let (text, kb) = cart_view(&lines);
        assert_eq!(
            text,
            "• Улун\n  2 × 100.00₽ = 200.00₽\n• Пуэр\n  1 × 50.50₽ = 50.50₽\n\n<b>Итого: 250.50₽</b>"
        );
        assert_eq!(
            callbacks(&kb),
            vec![
                vec!["remove_item_11"],
                vec!["remove_item_12"],
                vec!["clear_cart", "order"],
                vec!["catalog"],
            ]
        );
    }

    #[test]
    fn test_faq_two_columns() {
        let faqs: Vec<Faq> = (1..=3)
            .map(|id| Faq {
                id,
                question: format!("Q{id}"),
                answer: String::new(),
            })
            .collect();
        assert_eq!(
            callbacks(&faq_kb(&faqs)),
            vec![vec!["question_1", "question_2"], vec!["question_3"], vec!["back_to_start"]]
        );
    }
}
