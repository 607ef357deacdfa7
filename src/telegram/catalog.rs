//! Main menu and catalog browsing.

use std::path::PathBuf;

use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, MessageId, ParseMode};

use crate::core::config;
use crate::core::paginator::Paginator;
use crate::storage::catalog::{self, Category};
use crate::storage::get_connection;
use crate::telegram::handlers::{HandlerDeps, HandlerResult};
use crate::telegram::keyboards;
use crate::telegram::messages::{delete_quietly, edit_or_send};
use crate::telegram::Bot;

const CHOOSE_SECTION: &str = "Выберите нужный раздел:";

pub async fn send_main_menu(bot: &Bot, chat_id: ChatId, name: &str) -> HandlerResult {
    let text = if name.is_empty() {
        format!("Добро пожаловать в наш магазин!\n{}", CHOOSE_SECTION)
    } else {
        format!("Добро пожаловать, {}!\n{}", name, CHOOSE_SECTION)
    };
    bot.send_message(chat_id, text)
        .reply_markup(keyboards::main_menu_kb())
        .await?;
    Ok(())
}

pub async fn edit_main_menu(bot: &Bot, chat_id: ChatId, message_id: MessageId) -> HandlerResult {
    let text = format!("Добро пожаловать в наш магазин!\n{}", CHOOSE_SECTION);
    edit_or_send(bot, chat_id, message_id, &text, keyboards::main_menu_kb()).await?;
    Ok(())
}

/// Categories under `parent_id` (roots when `None`), one page of them.
pub async fn show_category_page(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    page: usize,
    parent_id: Option<i64>,
) -> HandlerResult {
    let (categories, parent) = {
        let conn = get_connection(&deps.db_pool)?;
        let parent = match parent_id {
            Some(id) => catalog::get_category(&conn, id)?,
            None => None,
        };
        (catalog::list_categories(&conn, parent_id)?, parent)
    };

    let paginator = Paginator::new(&categories, config::catalog::CATEGORIES_PER_PAGE);
    let (items, page) = paginator.page(page);
    let text = keyboards::categories_header(parent.as_ref());
    let keyboard = keyboards::categories_kb(items, parent_id, page, paginator.total_pages());
    edit_or_send(bot, chat_id, message_id, &text, keyboard).await?;
    Ok(())
}

/// Opens a category: its subcategories when it has any, else its products.
pub async fn show_category(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    category_id: i64,
) -> HandlerResult {
    if let Some(card) = deps.sessions.take_detail_message(chat_id.0).await {
        delete_quietly(bot, chat_id, card).await;
    }

    let (category, has_children) = {
        let conn = get_connection(&deps.db_pool)?;
        let category = catalog::get_category(&conn, category_id)?;
        let has_children = !catalog::list_categories(&conn, Some(category_id))?.is_empty();
        (category, has_children)
    };

    match category {
        None => {
            log::warn!("Category {} not found, showing catalog root", category_id);
            show_category_page(bot, deps, chat_id, message_id, 1, None).await
        }
        Some(_) if has_children => show_category_page(bot, deps, chat_id, message_id, 1, Some(category_id)).await,
        Some(category) => show_products(bot, deps, chat_id, message_id, &category, 1).await,
    }
}

/// Lists one page of a category's products.
pub async fn show_products(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    category: &Category,
    page: usize,
) -> HandlerResult {
    let (products, parent) = {
        let conn = get_connection(&deps.db_pool)?;
        let parent = match category.parent_id {
            Some(id) => catalog::get_category(&conn, id)?,
            None => None,
        };
        (catalog::list_products(&conn, category.id)?, parent)
    };

    let paginator = Paginator::new(&products, config::catalog::PRODUCTS_PER_PAGE);
    let (items, page) = paginator.page(page);
    let text = keyboards::products_header(parent.as_ref(), category, page, paginator.total_pages());
    let keyboard = keyboards::products_kb(
        items,
        category.id,
        parent.as_ref().map(|p| p.id),
        page,
        paginator.total_pages(),
    );
    edit_or_send(bot, chat_id, message_id, &text, keyboard).await?;
    Ok(())
}

pub async fn show_product_page(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    category_id: i64,
    page: usize,
) -> HandlerResult {
    let category = {
        let conn = get_connection(&deps.db_pool)?;
        catalog::get_category(&conn, category_id)?
    };
    match category {
        Some(category) => show_products(bot, deps, chat_id, message_id, &category, page).await,
        None => show_category_page(bot, deps, chat_id, message_id, 1, None).await,
    }
}

fn image_path(image: &str) -> Option<PathBuf> {
    let path = PathBuf::from(config::MEDIA_ROOT.as_str()).join(image);
    if path.is_file() {
        Some(path)
    } else {
        log::warn!("Product image {} is missing", path.display());
        None
    }
}

/// Shows a product card, replacing the card shown before in this chat.
pub async fn show_product(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, product_id: i64) -> HandlerResult {
    let product = {
        let conn = get_connection(&deps.db_pool)?;
        catalog::get_product(&conn, product_id)?
    };
    let Some(product) = product else {
        bot.send_message(chat_id, "Товар не найден").await?;
        return Ok(());
    };

    let caption = keyboards::product_card_text(&product);
    let keyboard = if keyboards::is_purchasable(&product) {
        keyboards::product_detail_kb(product.id)
    } else {
        keyboards::out_of_stock_kb()
    };
    let photo = product.image.as_deref().and_then(image_path);
    let previous = deps.sessions.detail_message(chat_id.0).await;

    if let (Some(path), Some(previous)) = (&photo, previous) {
        let media = InputMedia::Photo(
            InputMediaPhoto::new(InputFile::file(path.clone()))
                .caption(caption.clone())
                .parse_mode(ParseMode::Html),
        );
        match bot
            .edit_message_media(chat_id, previous, media)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => log::debug!("Cannot edit product card {}: {}", previous.0, e),
        }
    }
    if let Some(previous) = previous {
        delete_quietly(bot, chat_id, previous).await;
    }

    let sent = match photo {
        Some(path) => {
            bot.send_photo(chat_id, InputFile::file(path))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?
        }
        None => {
            bot.send_message(chat_id, caption)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?
        }
    };
    deps.sessions.replace_detail_message(chat_id.0, sent.id).await;
    Ok(())
}
