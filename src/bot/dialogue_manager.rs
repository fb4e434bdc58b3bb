//! Dialogue Manager module for handling dialogue state transitions
//!
//! `handle_input` is a flat dispatcher over the current [`InventoryState`]
//! and the incoming [`Input`]. It reads and writes the database but never
//! talks to Telegram: it returns the replies to send and the next state,
//! and the handlers in `message_handler` / `callback_handler` deliver them.

use anyhow::Result;
use chrono::NaiveDate;
use teloxide::types::MessageId;
use teloxide::utils::html::escape;
use tracing::{debug, info, warn};

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::config::BotConfig;
use crate::db::{AddOutcome, Database, EventPeriod, Item};
use crate::dialogue::{toggle_selection, CallbackAction, Input, InventoryState, SelectionList};
use crate::text_processing::{
    format_date, normalize_text, parse_event_date, split_item_lines, validate_name,
};

// Import UI builder functions
use super::ui_builder::{
    back_keyboard, event_label, events_menu_keyboard, format_events, format_inventory,
    issue_keyboard, main_menu_keyboard, return_items_keyboard, return_keyboard,
    selection_keyboard, storage_choice_keyboard, storage_menu_keyboard, Reply,
};

/// Words that end a free-text step, besides the localized stop word
const STOP_WORDS: &[&str] = &["стоп", "stop", "отмена", "cancel", "/cancel"];

/// Everything a transition may read
pub struct ConversationContext<'a> {
    pub db: &'a Database,
    pub config: &'a BotConfig,
    pub lang: &'a str,
    pub today: NaiveDate,
}

impl ConversationContext<'_> {
    fn lang(&self) -> Option<&str> {
        Some(self.lang)
    }

    fn t(&self, key: &str) -> String {
        t_lang(key, self.lang())
    }

    fn t_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        t_args_lang(key, args, self.lang())
    }

    /// Whether `text` is the label of the button `key`
    fn is_button(&self, text: &str, key: &str) -> bool {
        normalize_text(text) == normalize_text(&self.t(key))
    }

    /// Stop words and the Back / Cancel buttons
    fn is_stop(&self, text: &str) -> bool {
        let normalized = normalize_text(text);
        STOP_WORDS.contains(&normalized.as_str())
            || normalized == normalize_text(&self.t("stop-word"))
            || self.is_button(text, "btn-back")
            || self.is_button(text, "btn-cancel")
    }

    fn storage_title(&self, key: &str) -> String {
        self.config
            .storage(key)
            .map(|storage| storage.title.clone())
            .unwrap_or_else(|| key.to_string())
    }
}

/// Replies to send and the state to store afterwards
#[derive(Clone, Debug)]
pub struct Transition {
    pub replies: Vec<Reply>,
    pub next: InventoryState,
}

impl Transition {
    pub fn to(next: InventoryState) -> Self {
        Self {
            replies: Vec::new(),
            next,
        }
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }

    /// Put `reply` in front of the replies already queued
    pub fn preceded_by(mut self, reply: Reply) -> Self {
        self.replies.insert(0, reply);
        self
    }
}

/// Dispatch one input against the current state
pub async fn handle_input(
    ctx: &ConversationContext<'_>,
    state: InventoryState,
    input: Input,
) -> Result<Transition> {
    match input {
        Input::Start => show_welcome(ctx).await,
        Input::Text(text) => handle_text(ctx, state, text.trim()).await,
        Input::Callback { data, message_id } => {
            let action = CallbackAction::parse(&data)?;
            handle_callback(ctx, state, action, message_id).await
        }
        Input::Unsupported => Ok(render_state(ctx, state)
            .await?
            .preceded_by(Reply::text(ctx.t("unsupported-message")))),
    }
}

/// Generic fallback after any error: apologize and go back to the main menu
pub fn error_fallback(lang: &str) -> Transition {
    let lang = Some(lang);
    Transition::to(InventoryState::MainMenu).reply(Reply::with_keyboard(
        t_lang("error-generic", lang),
        main_menu_keyboard(lang),
    ))
}

async fn show_welcome(ctx: &ConversationContext<'_>) -> Result<Transition> {
    let welcome = format!("{}\n\n{}", ctx.t("welcome-title"), ctx.t("welcome-body"));
    Ok(show_main_menu(ctx)
        .await?
        .preceded_by(Reply::with_keyboard(welcome, main_menu_keyboard(ctx.lang()))))
}

/// Re-render whatever the current state shows, keeping the state
pub async fn render_state(
    ctx: &ConversationContext<'_>,
    state: InventoryState,
) -> Result<Transition> {
    match state {
        InventoryState::MainMenu => show_main_menu(ctx).await,
        InventoryState::ChoosingStorage => Ok(show_storage_choice(ctx)),
        InventoryState::StorageMenu { storage } => show_storage_menu(ctx, storage).await,
        InventoryState::AddingItems { storage } => Ok(start_adding(ctx, storage)),
        InventoryState::DeletingItems { storage, selected } => {
            show_delete_list(ctx, storage, selected, None).await
        }
        InventoryState::EnteringRecipient { storage } => Ok(Transition::to(
            InventoryState::EnteringRecipient { storage },
        )
        .reply(Reply::with_keyboard(
            ctx.t("issue-recipient-prompt"),
            back_keyboard(ctx.lang()),
        ))),
        InventoryState::IssuingItems { storage, recipient } => {
            show_issue_list(ctx, storage, recipient, None).await
        }
        InventoryState::ReturningItems { storage } => show_return_list(ctx, storage, None).await,
        InventoryState::EventsMenu => Ok(show_events_menu(ctx)),
        InventoryState::AddingEventName => Ok(Transition::to(InventoryState::AddingEventName)
            .reply(Reply::with_keyboard(
                ctx.t("event-name-prompt"),
                back_keyboard(ctx.lang()),
            ))),
        InventoryState::AddingEventDate { name } => {
            let prompt = ctx.t_args("event-date-prompt", &[("name", &escape(&name))]);
            Ok(Transition::to(InventoryState::AddingEventDate { name })
                .reply(Reply::with_keyboard(prompt, back_keyboard(ctx.lang()))))
        }
        InventoryState::DeletingEvents { selected } => {
            show_event_delete_list(ctx, selected, None).await
        }
    }
}

// ---------------------------------------------------------------------------
// Menus

/// Inventory of every storage plus the main keyboard
async fn show_main_menu(ctx: &ConversationContext<'_>) -> Result<Transition> {
    let items = ctx.db.list_items(None).await?;

    let sections: Vec<String> = ctx
        .config
        .storages
        .iter()
        .map(|storage| {
            let storage_items: Vec<Item> = items
                .iter()
                .filter(|item| item.storage == storage.key)
                .cloned()
                .collect();
            format_inventory(&storage.title, &storage_items, ctx.lang())
        })
        .collect();

    let text = format!("{}\n\n{}", ctx.t("main-menu"), sections.join("\n\n"));
    Ok(Transition::to(InventoryState::MainMenu)
        .reply(Reply::with_keyboard(text, main_menu_keyboard(ctx.lang()))))
}

fn show_storage_choice(ctx: &ConversationContext<'_>) -> Transition {
    Transition::to(InventoryState::ChoosingStorage).reply(Reply::with_keyboard(
        ctx.t("storage-choose"),
        storage_choice_keyboard(&ctx.config.storages, ctx.lang()),
    ))
}

/// Enter the inventory: straight into the storage when there is only one
async fn enter_inventory(ctx: &ConversationContext<'_>) -> Result<Transition> {
    match ctx.config.storages.as_slice() {
        [only] => show_storage_menu(ctx, only.key.clone()).await,
        _ => Ok(show_storage_choice(ctx)),
    }
}

async fn show_storage_menu(ctx: &ConversationContext<'_>, storage: String) -> Result<Transition> {
    let items = ctx.db.list_items(Some(&storage)).await?;
    let title = ctx.storage_title(&storage);
    let text = format!(
        "{}\n\n{}",
        ctx.t_args("storage-menu", &[("storage", &escape(&title))]),
        format_inventory(&title, &items, ctx.lang())
    );

    Ok(Transition::to(InventoryState::StorageMenu { storage })
        .reply(Reply::with_keyboard(text, storage_menu_keyboard(ctx.lang()))))
}

/// Leave a storage flow back to its menu
async fn back_to_storage_menu(
    ctx: &ConversationContext<'_>,
    storage: String,
) -> Result<Transition> {
    Ok(show_storage_menu(ctx, storage)
        .await?
        .preceded_by(Reply::text(ctx.t("back-to-menu"))))
}

fn show_events_menu(ctx: &ConversationContext<'_>) -> Transition {
    Transition::to(InventoryState::EventsMenu).reply(Reply::with_keyboard(
        ctx.t("events-menu"),
        events_menu_keyboard(ctx.lang()),
    ))
}

fn start_adding(ctx: &ConversationContext<'_>, storage: String) -> Transition {
    Transition::to(InventoryState::AddingItems { storage })
        .reply(Reply::with_keyboard(ctx.t("add-prompt"), back_keyboard(ctx.lang())))
}

// ---------------------------------------------------------------------------
// Text input

async fn handle_text(
    ctx: &ConversationContext<'_>,
    state: InventoryState,
    text: &str,
) -> Result<Transition> {
    debug!(state = ?state, "Handling text input");

    match state {
        InventoryState::MainMenu => {
            if ctx.is_button(text, "btn-inventory") {
                enter_inventory(ctx).await
            } else if ctx.is_button(text, "btn-events") {
                Ok(show_events_menu(ctx))
            } else {
                show_main_menu(ctx).await
            }
        }

        InventoryState::ChoosingStorage => {
            if ctx.is_stop(text) {
                show_main_menu(ctx).await
            } else if let Some(storage) = ctx.config.storage_by_title(text) {
                show_storage_menu(ctx, storage.key.clone()).await
            } else {
                Ok(show_storage_choice(ctx))
            }
        }

        InventoryState::StorageMenu { storage } => handle_storage_menu(ctx, storage, text).await,

        InventoryState::AddingItems { storage } => {
            if ctx.is_stop(text) {
                back_to_storage_menu(ctx, storage).await
            } else {
                add_items_from_text(ctx, storage, text).await
            }
        }

        InventoryState::DeletingItems { storage, selected } => {
            if ctx.is_stop(text) {
                back_to_storage_menu(ctx, storage).await
            } else {
                delete_items_from_text(ctx, storage, selected, text).await
            }
        }

        InventoryState::EnteringRecipient { storage } => {
            if ctx.is_stop(text) {
                return back_to_storage_menu(ctx, storage).await;
            }
            match validate_name(text) {
                Ok(recipient) => {
                    info!(storage = %storage, recipient = %recipient, "Recipient chosen");
                    show_issue_list(ctx, storage, recipient, None).await
                }
                Err(key) => Ok(Transition::to(InventoryState::EnteringRecipient { storage })
                    .reply(Reply::text(ctx.t(key)))),
            }
        }

        InventoryState::IssuingItems { storage, recipient } => {
            if ctx.is_stop(text) || ctx.is_button(text, "btn-done") {
                back_to_storage_menu(ctx, storage).await
            } else {
                issue_items_from_text(ctx, storage, recipient, text).await
            }
        }

        InventoryState::ReturningItems { storage } => {
            if ctx.is_button(text, "btn-return-all") {
                return_all(ctx, storage).await
            } else if ctx.is_stop(text) {
                back_to_storage_menu(ctx, storage).await
            } else {
                return_items_from_text(ctx, storage, text).await
            }
        }

        InventoryState::EventsMenu => handle_events_menu(ctx, text).await,

        InventoryState::AddingEventName => {
            if ctx.is_stop(text) {
                return Ok(show_events_menu(ctx).preceded_by(Reply::text(ctx.t("back-to-menu"))));
            }
            match validate_name(text) {
                Ok(name) => {
                    let prompt = ctx.t_args("event-date-prompt", &[("name", &escape(&name))]);
                    Ok(Transition::to(InventoryState::AddingEventDate { name })
                        .reply(Reply::with_keyboard(prompt, back_keyboard(ctx.lang()))))
                }
                Err(key) => {
                    Ok(Transition::to(InventoryState::AddingEventName).reply(Reply::text(ctx.t(key))))
                }
            }
        }

        InventoryState::AddingEventDate { name } => {
            if ctx.is_stop(text) {
                return Ok(show_events_menu(ctx).preceded_by(Reply::text(ctx.t("back-to-menu"))));
            }
            match parse_event_date(text, ctx.today) {
                Some(date) => {
                    let event = ctx.db.add_event(&name, date).await?;
                    let added = ctx.t_args(
                        "event-added",
                        &[
                            ("name", &escape(&event.name)),
                            ("date", &format_date(event.date)),
                        ],
                    );
                    Ok(show_events_menu(ctx).preceded_by(Reply::text(added)))
                }
                None => Ok(Transition::to(InventoryState::AddingEventDate { name })
                    .reply(Reply::text(ctx.t("event-date-invalid")))),
            }
        }

        InventoryState::DeletingEvents { selected } => {
            if ctx.is_stop(text) {
                Ok(show_events_menu(ctx).preceded_by(Reply::text(ctx.t("back-to-menu"))))
            } else {
                show_event_delete_list(ctx, selected, None).await
            }
        }
    }
}

async fn handle_storage_menu(
    ctx: &ConversationContext<'_>,
    storage: String,
    text: &str,
) -> Result<Transition> {
    if ctx.is_button(text, "btn-add") {
        Ok(start_adding(ctx, storage))
    } else if ctx.is_button(text, "btn-delete") {
        show_delete_list(ctx, storage, Vec::new(), None).await
    } else if ctx.is_button(text, "btn-issue") {
        let items = ctx.db.list_items(Some(&storage)).await?;
        if items.iter().any(Item::is_available) {
            Ok(Transition::to(InventoryState::EnteringRecipient { storage }).reply(
                Reply::with_keyboard(ctx.t("issue-recipient-prompt"), back_keyboard(ctx.lang())),
            ))
        } else {
            Ok(Transition::to(InventoryState::StorageMenu { storage })
                .reply(Reply::text(ctx.t("issue-nothing"))))
        }
    } else if ctx.is_button(text, "btn-return") {
        show_return_list(ctx, storage, None).await
    } else if ctx.is_stop(text) {
        if ctx.config.has_single_storage() {
            show_main_menu(ctx).await
        } else {
            Ok(show_storage_choice(ctx))
        }
    } else {
        // Show, and anything unrecognized, re-render the storage
        show_storage_menu(ctx, storage).await
    }
}

async fn handle_events_menu(ctx: &ConversationContext<'_>, text: &str) -> Result<Transition> {
    let period = if ctx.is_button(text, "btn-events-all") {
        Some((EventPeriod::All, "events-title-all"))
    } else if ctx.is_button(text, "btn-events-week") {
        Some((EventPeriod::Week, "events-title-week"))
    } else if ctx.is_button(text, "btn-events-month") {
        Some((EventPeriod::Month, "events-title-month"))
    } else {
        None
    };

    if let Some((period, title_key)) = period {
        let events = ctx.db.list_events(period, ctx.today).await?;
        let text = format_events(&ctx.t(title_key), &events, ctx.lang());
        return Ok(Transition::to(InventoryState::EventsMenu)
            .reply(Reply::with_keyboard(text, events_menu_keyboard(ctx.lang()))));
    }

    if ctx.is_button(text, "btn-event-add") {
        render_state(ctx, InventoryState::AddingEventName).await
    } else if ctx.is_button(text, "btn-event-delete") {
        show_event_delete_list(ctx, Vec::new(), None).await
    } else if ctx.is_stop(text) {
        show_main_menu(ctx).await
    } else {
        Ok(show_events_menu(ctx))
    }
}

async fn add_items_from_text(
    ctx: &ConversationContext<'_>,
    storage: String,
    text: &str,
) -> Result<Transition> {
    let mut lines = Vec::new();

    for name in split_item_lines(text) {
        let name = match validate_name(&name) {
            Ok(name) => name,
            Err(key) => {
                lines.push(ctx.t(key));
                continue;
            }
        };
        let line = match ctx.db.add_item(&name, &storage).await? {
            AddOutcome::Added(item) => ctx.t_args("add-success", &[("item", &escape(&item.name))]),
            AddOutcome::AlreadyExists(item) => {
                ctx.t_args("add-duplicate", &[("item", &escape(&item.name))])
            }
        };
        lines.push(line);
    }

    lines.push(ctx.t("add-more"));
    Ok(Transition::to(InventoryState::AddingItems { storage }).reply(Reply::text(lines.join("\n"))))
}

async fn delete_items_from_text(
    ctx: &ConversationContext<'_>,
    storage: String,
    mut selected: Vec<i64>,
    text: &str,
) -> Result<Transition> {
    let mut lines = Vec::new();

    for name in split_item_lines(text) {
        match ctx.db.find_by_normalized_name(&name, &storage).await? {
            Some(item) => {
                ctx.db.delete_items(&[item.id]).await?;
                selected.retain(|id| *id != item.id);
                lines.push(ctx.t_args("delete-success", &[("item", &escape(&item.name))]));
            }
            None => lines.push(ctx.t_args("item-not-found", &[("item", &escape(&name))])),
        }
    }

    lines.push(ctx.t("delete-more"));
    Ok(Transition::to(InventoryState::DeletingItems { storage, selected })
        .reply(Reply::text(lines.join("\n"))))
}

async fn issue_items_from_text(
    ctx: &ConversationContext<'_>,
    storage: String,
    recipient: String,
    text: &str,
) -> Result<Transition> {
    let mut lines = Vec::new();

    for name in split_item_lines(text) {
        let line = match ctx.db.find_by_normalized_name(&name, &storage).await? {
            Some(item) => issue_one(ctx, &item, &recipient).await?,
            None => ctx.t_args("item-not-found", &[("item", &escape(&name))]),
        };
        lines.push(line);
    }

    lines.push(ctx.t("issue-more"));
    Ok(Transition::to(InventoryState::IssuingItems { storage, recipient })
        .reply(Reply::text(lines.join("\n"))))
}

/// Issue one item and describe what happened
async fn issue_one(ctx: &ConversationContext<'_>, item: &Item, recipient: &str) -> Result<String> {
    let assigned = ctx.db.assign_items(&[item.id], recipient).await?;
    if assigned.contains(&item.id) {
        return Ok(ctx.t_args(
            "issue-success",
            &[("item", &escape(&item.name)), ("owner", &escape(recipient))],
        ));
    }

    // Re-read to report the current holder
    let holder = ctx
        .db
        .get_item(item.id)
        .await?
        .and_then(|current| current.owner)
        .unwrap_or_default();
    warn!(item = %item.name, holder = %holder, "Item already issued");
    Ok(ctx.t_args(
        "issue-already",
        &[("item", &escape(&item.name)), ("owner", &escape(&holder))],
    ))
}

async fn return_items_from_text(
    ctx: &ConversationContext<'_>,
    storage: String,
    text: &str,
) -> Result<Transition> {
    let mut lines = Vec::new();

    for name in split_item_lines(text) {
        let line = match ctx.db.find_by_normalized_name(&name, &storage).await? {
            Some(item) => return_one(ctx, &item).await?,
            None => ctx.t_args("item-not-found", &[("item", &escape(&name))]),
        };
        lines.push(line);
    }

    lines.push(ctx.t("return-more"));
    Ok(Transition::to(InventoryState::ReturningItems { storage })
        .reply(Reply::text(lines.join("\n"))))
}

/// Return one item and describe what happened
async fn return_one(ctx: &ConversationContext<'_>, item: &Item) -> Result<String> {
    let returned = ctx.db.clear_items(&[item.id]).await?;
    let key = if returned.contains(&item.id) {
        "return-success"
    } else {
        "return-already"
    };
    Ok(ctx.t_args(key, &[("item", &escape(&item.name))]))
}

async fn return_all(ctx: &ConversationContext<'_>, storage: String) -> Result<Transition> {
    let count = ctx.db.clear_all(&storage).await?;
    let done = ctx.t_args("return-all-done", &[("count", &count.to_string())]);
    Ok(show_storage_menu(ctx, storage)
        .await?
        .preceded_by(Reply::text(done)))
}

// ---------------------------------------------------------------------------
// Inline lists

/// Multi-select list of a storage's items. With `message_id` the existing
/// list message is edited in place.
async fn show_delete_list(
    ctx: &ConversationContext<'_>,
    storage: String,
    mut selected: Vec<i64>,
    message_id: Option<MessageId>,
) -> Result<Transition> {
    let items = ctx.db.list_items(Some(&storage)).await?;
    if items.is_empty() {
        return Ok(show_storage_menu(ctx, storage)
            .await?
            .preceded_by(Reply::text(ctx.t("delete-nothing"))));
    }

    selected.retain(|id| items.iter().any(|item| item.id == *id));
    let entries: Vec<(i64, String)> = items.iter().map(|item| (item.id, item.name.clone())).collect();
    let keyboard = selection_keyboard(SelectionList::Items, &entries, &selected, ctx.lang());
    let list_text = ctx.t_args("delete-select", &[("count", &selected.len().to_string())]);

    let mut transition = Transition::to(InventoryState::DeletingItems { storage, selected });
    if message_id.is_none() {
        transition = transition.reply(Reply::with_keyboard(
            ctx.t("delete-prompt"),
            back_keyboard(ctx.lang()),
        ));
    }
    Ok(transition.reply(Reply::update_inline(message_id, list_text, keyboard)))
}

async fn show_issue_list(
    ctx: &ConversationContext<'_>,
    storage: String,
    recipient: String,
    message_id: Option<MessageId>,
) -> Result<Transition> {
    let items = ctx.db.list_items(Some(&storage)).await?;
    let title = ctx.t_args(
        "inventory-title",
        &[("storage", &escape(&ctx.storage_title(&storage)))],
    );
    let list_text = if items.iter().any(Item::is_available) {
        title
    } else {
        format!("{title}\n\n{}", ctx.t("issue-nothing"))
    };

    let mut transition = Transition::to(InventoryState::IssuingItems {
        storage,
        recipient: recipient.clone(),
    });
    if message_id.is_none() {
        let prompt = ctx.t_args("issue-items-prompt", &[("recipient", &escape(&recipient))]);
        transition = transition.reply(Reply::with_keyboard(prompt, back_keyboard(ctx.lang())));
    }
    Ok(transition.reply(Reply::update_inline(
        message_id,
        list_text,
        issue_keyboard(&items, ctx.lang()),
    )))
}

async fn show_return_list(
    ctx: &ConversationContext<'_>,
    storage: String,
    message_id: Option<MessageId>,
) -> Result<Transition> {
    let items = ctx.db.list_items(Some(&storage)).await?;
    let issued: Vec<Item> = items.into_iter().filter(|item| item.issued).collect();

    if issued.is_empty() {
        if message_id.is_some() {
            // The last issued item was just returned from the inline list
            return Ok(show_storage_menu(ctx, storage)
                .await?
                .preceded_by(Reply::text(ctx.t("return-nothing"))));
        }
        return Ok(Transition::to(InventoryState::StorageMenu { storage })
            .reply(Reply::text(ctx.t("return-nothing"))));
    }

    let mut transition = Transition::to(InventoryState::ReturningItems { storage });
    if message_id.is_none() {
        transition = transition.reply(Reply::with_keyboard(
            ctx.t("return-prompt"),
            return_keyboard(ctx.lang()),
        ));
    }
    let list = format_inventory_lines(&issued, ctx);
    Ok(transition.reply(Reply::update_inline(
        message_id,
        list,
        return_items_keyboard(&issued, ctx.lang()),
    )))
}

fn format_inventory_lines(items: &[Item], ctx: &ConversationContext<'_>) -> String {
    items
        .iter()
        .map(|item| {
            ctx.t_args(
                "inventory-issued",
                &[
                    ("item", &escape(&item.name)),
                    ("owner", &escape(item.owner.as_deref().unwrap_or_default())),
                ],
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn show_event_delete_list(
    ctx: &ConversationContext<'_>,
    mut selected: Vec<i64>,
    message_id: Option<MessageId>,
) -> Result<Transition> {
    let events = ctx.db.list_events(EventPeriod::All, ctx.today).await?;
    if events.is_empty() {
        return Ok(show_events_menu(ctx).preceded_by(Reply::text(ctx.t("events-empty"))));
    }

    selected.retain(|id| events.iter().any(|event| event.id == *id));
    let entries: Vec<(i64, String)> = events
        .iter()
        .map(|event| (event.id, event_label(event)))
        .collect();
    let keyboard = selection_keyboard(SelectionList::Events, &entries, &selected, ctx.lang());
    let list_text = ctx.t_args("delete-select", &[("count", &selected.len().to_string())]);

    let mut transition = Transition::to(InventoryState::DeletingEvents { selected });
    if message_id.is_none() {
        transition = transition.reply(Reply::with_keyboard(
            ctx.t("event-delete-prompt"),
            back_keyboard(ctx.lang()),
        ));
    }
    Ok(transition.reply(Reply::update_inline(message_id, list_text, keyboard)))
}

// ---------------------------------------------------------------------------
// Callbacks

async fn handle_callback(
    ctx: &ConversationContext<'_>,
    state: InventoryState,
    action: CallbackAction,
    message_id: Option<MessageId>,
) -> Result<Transition> {
    debug!(state = ?state, action = ?action, "Handling callback");

    match (state, action) {
        // Item deletion
        (
            InventoryState::DeletingItems { storage, mut selected },
            CallbackAction::Toggle(SelectionList::Items, id),
        ) => {
            toggle_selection(&mut selected, id);
            show_delete_list(ctx, storage, selected, message_id).await
        }
        (
            InventoryState::DeletingItems { storage, .. },
            CallbackAction::ClearSelection(SelectionList::Items),
        ) => {
            show_delete_list(ctx, storage, Vec::new(), message_id).await
        }
        (
            InventoryState::DeletingItems { storage, selected },
            CallbackAction::DeleteSelected(SelectionList::Items),
        ) => {
            if selected.is_empty() {
                return Ok(Transition::to(InventoryState::DeletingItems { storage, selected })
                    .reply(Reply::text(ctx.t("delete-none-selected"))));
            }
            let deleted = ctx.db.delete_items(&selected).await?;
            let done = ctx.t_args("delete-done", &[("count", &deleted.to_string())]);
            Ok(show_storage_menu(ctx, storage)
                .await?
                .preceded_by(Reply::text(done)))
        }
        (InventoryState::DeletingItems { storage, .. }, CallbackAction::Cancel) => {
            back_to_storage_menu(ctx, storage).await
        }

        // Issuing
        (InventoryState::IssuingItems { storage, recipient }, CallbackAction::Issue(id)) => {
            let line = match ctx.db.get_item(id).await? {
                Some(item) if item.storage == storage => issue_one(ctx, &item, &recipient).await?,
                Some(item) => {
                    debug!(
                        item_id = id,
                        item_storage = %item.storage,
                        storage = %storage,
                        "Issue button from another storage"
                    );
                    return menu_expired(ctx, InventoryState::IssuingItems { storage, recipient })
                        .await;
                }
                None => ctx.t_args("item-not-found", &[("item", &id.to_string())]),
            };
            Ok(show_issue_list(ctx, storage, recipient, message_id)
                .await?
                .preceded_by(Reply::text(line)))
        }
        (
            InventoryState::IssuingItems { storage, .. },
            CallbackAction::Done | CallbackAction::Cancel,
        ) => back_to_storage_menu(ctx, storage).await,

        // Returning
        (InventoryState::ReturningItems { storage }, CallbackAction::Return(id)) => {
            let line = match ctx.db.get_item(id).await? {
                Some(item) if item.storage == storage => return_one(ctx, &item).await?,
                Some(item) => {
                    debug!(
                        item_id = id,
                        item_storage = %item.storage,
                        storage = %storage,
                        "Return button from another storage"
                    );
                    return menu_expired(ctx, InventoryState::ReturningItems { storage }).await;
                }
                None => ctx.t_args("item-not-found", &[("item", &id.to_string())]),
            };
            Ok(show_return_list(ctx, storage, message_id)
                .await?
                .preceded_by(Reply::text(line)))
        }
        (InventoryState::ReturningItems { storage }, CallbackAction::ReturnAll) => {
            return_all(ctx, storage).await
        }
        (
            InventoryState::ReturningItems { storage },
            CallbackAction::Done | CallbackAction::Cancel,
        ) => back_to_storage_menu(ctx, storage).await,

        // Event deletion
        (
            InventoryState::DeletingEvents { mut selected },
            CallbackAction::Toggle(SelectionList::Events, id),
        ) => {
            toggle_selection(&mut selected, id);
            show_event_delete_list(ctx, selected, message_id).await
        }
        (
            InventoryState::DeletingEvents { .. },
            CallbackAction::ClearSelection(SelectionList::Events),
        ) => {
            show_event_delete_list(ctx, Vec::new(), message_id).await
        }
        (
            InventoryState::DeletingEvents { selected },
            CallbackAction::DeleteSelected(SelectionList::Events),
        ) => {
            if selected.is_empty() {
                return Ok(Transition::to(InventoryState::DeletingEvents { selected })
                    .reply(Reply::text(ctx.t("delete-none-selected"))));
            }
            let deleted = ctx.db.delete_events(&selected).await?;
            let done = ctx.t_args("event-delete-done", &[("count", &deleted.to_string())]);
            Ok(show_events_menu(ctx).preceded_by(Reply::text(done)))
        }
        (InventoryState::DeletingEvents { .. }, CallbackAction::Cancel) => {
            Ok(show_events_menu(ctx).preceded_by(Reply::text(ctx.t("back-to-menu"))))
        }

        // A button from an older menu
        (state, action) => {
            debug!(state = ?state, action = ?action, "Callback does not match the current state");
            menu_expired(ctx, state).await
        }
    }
}

/// Answer a button that no longer belongs to the current state, changing nothing
async fn menu_expired(ctx: &ConversationContext<'_>, state: InventoryState) -> Result<Transition> {
    Ok(render_state(ctx, state)
        .await?
        .preceded_by(Reply::text(ctx.t("menu-expired"))))
}
