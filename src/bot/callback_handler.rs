//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, warn};

use crate::config::BotConfig;
use crate::db::Database;

// Import dialogue types
use crate::dialogue::{Input, InventoryDialogue};

use super::message_handler::{run_transition, send_replies};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    db: Arc<Database>,
    config: Arc<BotConfig>,
    dialogue: InventoryDialogue,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Stop the loading spinner first; the query expires after a few seconds
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.clone() else {
        return Ok(());
    };

    let input = Input::Callback {
        data,
        message_id: q.message.as_ref().map(|message| message.id()),
    };

    let state = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = %q.from.id, dialogue_state = ?state, "Retrieved dialogue state");

    let transition = run_transition(
        &db,
        &config,
        dialogue.chat_id(),
        q.from.language_code.as_deref(),
        state,
        input,
    )
    .await;

    dialogue.update(transition.next).await?;
    send_replies(&bot, dialogue.chat_id(), transition.replies).await
}
