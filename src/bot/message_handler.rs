//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::payloads::{EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::db::Database;
use crate::localization::resolve_language;

// Import dialogue types
use crate::dialogue::{Input, InventoryDialogue, InventoryState};

// Import dialogue manager functions
use super::dialogue_manager::{error_fallback, handle_input, ConversationContext, Transition};

// Import UI builder types
use super::ui_builder::Reply;

/// Run one input through the state machine.
///
/// Any error is logged and turned into the generic error reply with a
/// reset to the main menu, so a failing step never leaves the chat stuck.
pub async fn run_transition(
    db: &Database,
    config: &BotConfig,
    chat_id: ChatId,
    language_code: Option<&str>,
    state: InventoryState,
    input: Input,
) -> Transition {
    let lang = resolve_language(language_code, &config.language);
    let ctx = ConversationContext {
        db,
        config,
        lang,
        today: chrono::Local::now().date_naive(),
    };

    match handle_input(&ctx, state, input).await {
        Ok(transition) => transition,
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to handle input, returning to main menu");
            error_fallback(lang)
        }
    }
}

/// Deliver replies in order. Failed edits are logged, not propagated:
/// the message may be too old or unchanged.
pub async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) -> Result<()> {
    for reply in replies {
        match reply {
            Reply::Send { text, markup } => {
                let request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
                match markup {
                    Some(markup) => request.reply_markup(markup).await?,
                    None => request.await?,
                };
            }
            Reply::Edit {
                message_id,
                text,
                markup,
            } => {
                let request = bot
                    .edit_message_text(chat_id, message_id, text)
                    .parse_mode(ParseMode::Html);
                let result = match markup {
                    Some(markup) => request.reply_markup(markup).await,
                    None => request.await,
                };
                if let Err(e) = result {
                    warn!(chat_id = %chat_id, message_id = message_id.0, error = %e, "Failed to edit message");
                }
            }
        }
    }
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    db: Arc<Database>,
    config: Arc<BotConfig>,
    dialogue: InventoryDialogue,
) -> Result<()> {
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    let input = match msg.text() {
        Some(text) => Input::from_text(text),
        None => Input::Unsupported,
    };

    if input == Input::Start {
        info!(user_id = %msg.chat.id, "User started a conversation");
    } else {
        debug!(user_id = %msg.chat.id, input = ?input, "Received message");
    }

    let state = dialogue.get().await?.unwrap_or_default();
    let transition = run_transition(&db, &config, msg.chat.id, language_code, state, input).await;

    dialogue.update(transition.next).await?;
    send_replies(&bot, msg.chat.id, transition.replies).await
}
