//! FAQ list, answers and the inline search.

use teloxide::prelude::*;
use teloxide::types::{
    InlineQuery, InlineQueryResult, InlineQueryResultArticle, InputMessageContent, InputMessageContentText, MessageId,
    ParseMode,
};

use crate::core::config;
use crate::storage::faq::{self, Faq};
use crate::storage::get_connection;
use crate::telegram::handlers::{HandlerDeps, HandlerResult};
use crate::telegram::keyboards;
use crate::telegram::messages::edit_or_send;
use crate::telegram::Bot;

const FAQ_INTRO: &str = "Вы можете задать свой вопрос в чат, упомянув бота.\nЧасто задаваемые вопросы:";

/// FAQ header, naming the inline mention when the bot's username is known.
fn faq_intro(bot_username: Option<&str>) -> String {
    match bot_username {
        Some(username) => format!(
            "Вы можете задать свой вопрос в любом чате, написав @{} и текст вопроса.\nЧасто задаваемые вопросы:",
            username
        ),
        None => FAQ_INTRO.to_string(),
    }
}

/// Shows the question list, editing `message_id` when given.
pub async fn show_faq(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, message_id: Option<MessageId>) -> HandlerResult {
    let faqs = {
        let conn = get_connection(&deps.db_pool)?;
        faq::list_faq(&conn)?
    };
    let keyboard = keyboards::faq_kb(&faqs);
    let intro = faq_intro(deps.bot_username.as_deref());

    match message_id {
        Some(message_id) => edit_or_send(bot, chat_id, message_id, &intro, keyboard).await?,
        None => {
            bot.send_message(chat_id, intro).reply_markup(keyboard).await?;
        }
    }
    Ok(())
}

pub async fn show_question(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    faq_id: i64,
) -> HandlerResult {
    let entry = {
        let conn = get_connection(&deps.db_pool)?;
        faq::get_faq(&conn, faq_id)?
    };
    match entry {
        Some(entry) => {
            edit_or_send(
                bot,
                chat_id,
                message_id,
                &keyboards::faq_answer_text(&entry),
                keyboards::back_to_faq_kb(),
            )
            .await?;
        }
        None => show_faq(bot, deps, chat_id, Some(message_id)).await?,
    }
    Ok(())
}

fn inline_result(entry: &Faq) -> InlineQueryResult {
    let content = InputMessageContent::Text(
        InputMessageContentText::new(keyboards::faq_answer_text(entry)).parse_mode(ParseMode::Html),
    );
    InlineQueryResult::Article(InlineQueryResultArticle::new(
        entry.id.to_string(),
        entry.question.clone(),
        content,
    ))
}

/// Answers `@bot text` with matching questions.
pub async fn handle_inline_query(bot: &Bot, deps: &HandlerDeps, query: InlineQuery) -> HandlerResult {
    let matches = {
        let conn = get_connection(&deps.db_pool)?;
        faq::search_faq(&conn, &query.query, config::catalog::FAQ_INLINE_LIMIT)?
    };
    log::debug!("Inline FAQ search {:?}: {} result(s)", query.query, matches.len());

    let results: Vec<InlineQueryResult> = matches.iter().map(inline_result).collect();
    bot.answer_inline_query(query.id, results)
        .cache_time(1)
        .is_personal(true)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faq_intro_mentions_bot() {
        assert!(faq_intro(Some("lavka_bot")).contains("@lavka_bot"));
        assert_eq!(faq_intro(None), FAQ_INTRO);
    }
}
