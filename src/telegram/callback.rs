//! Inline keyboard callback data.
//!
//! Every button carries one of these actions encoded as a short string
//! (Telegram limits callback data to 64 bytes).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `catalog`: root categories, first page
    Catalog,
    /// `back_to_start`: main menu
    BackToStart,
    /// `cat_page_{page}_{parent}`; parent is empty for root categories
    CategoryPage { page: usize, parent_id: Option<i64> },
    /// `category_{id}`: subcategories or products of a category
    Category(i64),
    /// `prod_page_{category}_{page}`
    ProductPage { category_id: i64, page: usize },
    /// `product_{id}`: product card
    Product(i64),
    /// `add_item_{product}`: asks for a quantity
    AddItem(i64),
    /// `remove_item_{cart_item}`
    RemoveItem(i64),
    Cart,
    ClearCart,
    /// `order`: checkout
    Order,
    Faq,
    /// `question_{id}`
    Question(i64),
    /// Page counters and disabled buttons
    NoAction,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Catalog => f.write_str("catalog"),
            CallbackAction::BackToStart => f.write_str("back_to_start"),
            CallbackAction::CategoryPage { page, parent_id } => match parent_id {
                Some(parent) => write!(f, "cat_page_{}_{}", page, parent),
                None => write!(f, "cat_page_{}_", page),
            },
            CallbackAction::Category(id) => write!(f, "category_{}", id),
            CallbackAction::ProductPage { category_id, page } => write!(f, "prod_page_{}_{}", category_id, page),
            CallbackAction::Product(id) => write!(f, "product_{}", id),
            CallbackAction::AddItem(id) => write!(f, "add_item_{}", id),
            CallbackAction::RemoveItem(id) => write!(f, "remove_item_{}", id),
            CallbackAction::Cart => f.write_str("cart"),
            CallbackAction::ClearCart => f.write_str("clear_cart"),
            CallbackAction::Order => f.write_str("order"),
            CallbackAction::Faq => f.write_str("faq"),
            CallbackAction::Question(id) => write!(f, "question_{}", id),
            CallbackAction::NoAction => f.write_str("no_action"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCallback(pub String);

impl fmt::Display for UnknownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown callback data: {:?}", self.0)
    }
}

impl std::error::Error for UnknownCallback {}

fn id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(data.to_string());

        let action = match data {
            "catalog" => Some(CallbackAction::Catalog),
            "back_to_start" => Some(CallbackAction::BackToStart),
            "cart" => Some(CallbackAction::Cart),
            "clear_cart" => Some(CallbackAction::ClearCart),
            "order" => Some(CallbackAction::Order),
            "faq" => Some(CallbackAction::Faq),
            "no_action" => Some(CallbackAction::NoAction),
            _ => None,
        };
        if let Some(action) = action {
            return Ok(action);
        }

        // Prefixes sharing a stem (`cat_page_`/`category_`,
        // `prod_page_`/`product_`) are distinct at their first underscore.
        let parsed = if let Some(rest) = data.strip_prefix("cat_page_") {
            rest.split_once('_').and_then(|(page, parent)| {
                let page = page.parse().ok()?;
                let parent_id = if parent.is_empty() { None } else { Some(id(parent)?) };
                Some(CallbackAction::CategoryPage { page, parent_id })
            })
        } else if let Some(rest) = data.strip_prefix("category_") {
            id(rest).map(CallbackAction::Category)
        } else if let Some(rest) = data.strip_prefix("prod_page_") {
            rest.split_once('_').and_then(|(category, page)| {
                Some(CallbackAction::ProductPage {
                    category_id: id(category)?,
                    page: page.parse().ok()?,
                })
            })
        } else if let Some(rest) = data.strip_prefix("product_") {
            id(rest).map(CallbackAction::Product)
        } else if let Some(rest) = data.strip_prefix("add_item_") {
            id(rest).map(CallbackAction::AddItem)
        } else if let Some(rest) = data.strip_prefix("remove_item_") {
            id(rest).map(CallbackAction::RemoveItem)
        } else if let Some(rest) = data.strip_prefix("question_") {
            id(rest).map(CallbackAction::Question)
        } else {
            None
        };

        parsed.ok_or_else(unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_wire_strings() {
        let cases = [
            ("catalog", CallbackAction::Catalog),
            ("cat_page_2_", CallbackAction::CategoryPage { page: 2, parent_id: None }),
            ("cat_page_3_14", CallbackAction::CategoryPage { page: 3, parent_id: Some(14) }),
            ("category_5", CallbackAction::Category(5)),
            ("prod_page_5_2", CallbackAction::ProductPage { category_id: 5, page: 2 }),
            ("product_9", CallbackAction::Product(9)),
            ("add_item_9", CallbackAction::AddItem(9)),
            ("remove_item_31", CallbackAction::RemoveItem(31)),
            ("question_4", CallbackAction::Question(4)),
            ("no_action", CallbackAction::NoAction),
        ];
        for (raw, expected) in cases {
            assert_eq!(raw.parse::<CallbackAction>().unwrap(), expected, "{raw}");
            assert_eq!(expected.to_string(), raw);
        }
    }

    #[test]
    fn test_rejects_unknown_data() {
        for raw in ["", "category_", "category_x", "cat_page_x_", "cat_page_1", "prod_page_1", "subscribe"] {
            assert!(raw.parse::<CallbackAction>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_longest_callback_fits_telegram_limit() {
        let action = CallbackAction::CategoryPage {
            page: usize::MAX,
            parent_id: Some(i64::MAX),
        };
        assert!(action.to_string().len() <= 64);
    }
}
