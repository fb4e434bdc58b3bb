//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
    ReplyMarkup,
};
use teloxide::utils::html::escape;

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::config::StorageLocation;
use crate::db::{Event, Item};
use crate::dialogue::{CallbackAction, SelectionList};
use crate::text_processing::format_date;

/// Longest label on an inline button, in characters
const MAX_BUTTON_LABEL: usize = 30;

/// One outgoing message produced by the state machine
#[derive(Clone, Debug)]
pub enum Reply {
    /// A new HTML message
    Send {
        text: String,
        markup: Option<ReplyMarkup>,
    },
    /// Replace the text and inline keyboard of an earlier message
    Edit {
        message_id: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Send {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: KeyboardMarkup) -> Self {
        Reply::Send {
            text: text.into(),
            markup: Some(ReplyMarkup::Keyboard(keyboard)),
        }
    }

    pub fn with_inline(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Reply::Send {
            text: text.into(),
            markup: Some(ReplyMarkup::InlineKeyboard(keyboard)),
        }
    }

    /// Edit `message_id` when known, otherwise send a fresh message
    pub fn update_inline(
        message_id: Option<MessageId>,
        text: impl Into<String>,
        keyboard: InlineKeyboardMarkup,
    ) -> Self {
        match message_id {
            Some(message_id) => Reply::Edit {
                message_id,
                text: text.into(),
                markup: Some(keyboard),
            },
            None => Reply::with_inline(text, keyboard),
        }
    }

    /// Text of the reply, for logging and tests
    pub fn body(&self) -> &str {
        match self {
            Reply::Send { text, .. } | Reply::Edit { text, .. } => text,
        }
    }
}

fn reply_keyboard(rows: Vec<Vec<String>>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
    .resize_keyboard()
}

/// Main menu reply keyboard
pub fn main_menu_keyboard(lang: Option<&str>) -> KeyboardMarkup {
    reply_keyboard(vec![
        vec![t_lang("btn-inventory", lang), t_lang("btn-events", lang)],
        vec![t_lang("btn-overview", lang)],
    ])
}

/// One button per storage, two per row, plus Back
pub fn storage_choice_keyboard(storages: &[StorageLocation], lang: Option<&str>) -> KeyboardMarkup {
    let mut rows: Vec<Vec<String>> = storages
        .chunks(2)
        .map(|chunk| chunk.iter().map(|storage| storage.title.clone()).collect())
        .collect();
    rows.push(vec![t_lang("btn-back", lang)]);
    reply_keyboard(rows)
}

/// Actions available inside one storage
pub fn storage_menu_keyboard(lang: Option<&str>) -> KeyboardMarkup {
    reply_keyboard(vec![
        vec![t_lang("btn-add", lang), t_lang("btn-delete", lang)],
        vec![t_lang("btn-issue", lang), t_lang("btn-return", lang)],
        vec![t_lang("btn-show", lang), t_lang("btn-back", lang)],
    ])
}

/// Keyboard shown while the user types free text
pub fn back_keyboard(lang: Option<&str>) -> KeyboardMarkup {
    reply_keyboard(vec![vec![t_lang("btn-back", lang)]])
}

/// Return flow reply keyboard
pub fn return_keyboard(lang: Option<&str>) -> KeyboardMarkup {
    reply_keyboard(vec![vec![
        t_lang("btn-return-all", lang),
        t_lang("btn-cancel", lang),
    ]])
}

/// Events menu reply keyboard
pub fn events_menu_keyboard(lang: Option<&str>) -> KeyboardMarkup {
    reply_keyboard(vec![
        vec![t_lang("btn-event-add", lang), t_lang("btn-event-delete", lang)],
        vec![
            t_lang("btn-events-all", lang),
            t_lang("btn-events-week", lang),
            t_lang("btn-events-month", lang),
        ],
        vec![t_lang("btn-back", lang)],
    ])
}

/// Shorten a label to fit on a button
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_BUTTON_LABEL {
        let head: String = label.chars().take(MAX_BUTTON_LABEL - 1).collect();
        format!("{head}…")
    } else {
        label.to_string()
    }
}

fn button(label: String, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, action.encode())
}

/// Multi-select list: one toggle per entry, then Delete / Clear and Cancel
pub fn selection_keyboard(
    list: SelectionList,
    entries: &[(i64, String)],
    selected: &[i64],
    lang: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = entries
        .iter()
        .map(|(id, label)| {
            let mark = if selected.contains(id) { "☑️" } else { "⬜" };
            vec![button(
                format!("{mark} {}", truncate_label(label)),
                CallbackAction::Toggle(list, *id),
            )]
        })
        .collect();

    buttons.push(vec![
        button(t_lang("btn-delete-selected", lang), CallbackAction::DeleteSelected(list)),
        button(t_lang("btn-clear-selection", lang), CallbackAction::ClearSelection(list)),
    ]);
    buttons.push(vec![button(t_lang("btn-cancel", lang), CallbackAction::Cancel)]);

    InlineKeyboardMarkup::new(buttons)
}

/// Available items to issue, one per row, then Done
pub fn issue_keyboard(items: &[Item], lang: Option<&str>) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = items
        .iter()
        .filter(|item| item.is_available())
        .map(|item| {
            vec![button(
                format!("🎁 {}", truncate_label(&item.name)),
                CallbackAction::Issue(item.id),
            )]
        })
        .collect();

    buttons.push(vec![button(t_lang("btn-done", lang), CallbackAction::Done)]);
    InlineKeyboardMarkup::new(buttons)
}

/// Issued items to return, then Return all and Done
pub fn return_items_keyboard(items: &[Item], lang: Option<&str>) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = items
        .iter()
        .filter(|item| item.issued)
        .map(|item| {
            let label = format!(
                "{} - {}",
                item.name,
                item.owner.as_deref().unwrap_or_default()
            );
            vec![button(
                format!("↩️ {}", truncate_label(&label)),
                CallbackAction::Return(item.id),
            )]
        })
        .collect();

    buttons.push(vec![
        button(t_lang("btn-return-all", lang), CallbackAction::ReturnAll),
        button(t_lang("btn-done", lang), CallbackAction::Done),
    ]);
    InlineKeyboardMarkup::new(buttons)
}

/// Inventory of one storage with availability statistics
pub fn format_inventory(storage_title: &str, items: &[Item], lang: Option<&str>) -> String {
    let mut text = t_args_lang("inventory-title", &[("storage", &escape(storage_title))], lang);
    text.push_str("\n\n");

    if items.is_empty() {
        text.push_str(&t_lang("inventory-empty", lang));
        text.push('\n');
        return text;
    }

    let mut available_count = 0;
    let mut issued_count = 0;

    for item in items {
        let name = escape(&item.name);
        match item.owner.as_deref() {
            Some(owner) if item.issued => {
                text.push_str(&t_args_lang(
                    "inventory-issued",
                    &[("item", &name), ("owner", &escape(owner))],
                    lang,
                ));
                issued_count += 1;
            }
            _ => {
                text.push_str(&t_args_lang("inventory-available", &[("item", &name)], lang));
                available_count += 1;
            }
        }
        text.push('\n');
    }

    text.push('\n');
    text.push_str(&t_args_lang(
        "inventory-stats",
        &[
            ("available", &available_count.to_string()),
            ("issued", &issued_count.to_string()),
        ],
        lang,
    ));

    text
}

/// Event list under a heading
pub fn format_events(title: &str, events: &[Event], lang: Option<&str>) -> String {
    let mut text = format!("{title}\n\n");

    if events.is_empty() {
        text.push_str(&t_lang("events-empty", lang));
        return text;
    }

    let lines: Vec<String> = events
        .iter()
        .map(|event| {
            t_args_lang(
                "event-line",
                &[
                    ("date", &format_date(event.date)),
                    ("name", &escape(&event.name)),
                ],
                lang,
            )
        })
        .collect();
    text.push_str(&lines.join("\n"));

    text
}

/// Label for an event in the delete list
pub fn event_label(event: &Event) -> String {
    format!("{} {}", format_date(event.date), event.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, name: &str, owner: Option<&str>) -> Item {
        Item {
            id,
            name: name.to_string(),
            normalized_name: name.to_lowercase(),
            storage: "main".to_string(),
            owner: owner.map(str::to_string),
            issued: owner.is_some(),
        }
    }

    #[test]
    fn test_truncate_label_counts_chars() {
        let long = "Ж".repeat(40);
        let label = truncate_label(&long);
        assert_eq!(label.chars().count(), MAX_BUTTON_LABEL);
        assert!(label.ends_with('…'));
        assert_eq!(truncate_label("Палатка"), "Палатка");
    }

    #[test]
    fn test_format_inventory_escapes_and_counts() {
        let items = vec![item(1, "<Tent>", None), item(2, "Stove", Some("Ann & Bob"))];
        let text = format_inventory("Main", &items, Some("en"));
        assert!(text.contains("&lt;Tent&gt;"));
        assert!(text.contains("Ann &amp; Bob"));
        assert!(text.contains("1 available, 1 issued"));
    }

    #[test]
    fn test_selection_keyboard_marks_selected() {
        let entries = vec![(1, "Tent".to_string()), (2, "Stove".to_string())];
        let keyboard = selection_keyboard(SelectionList::Items, &entries, &[2], Some("en"));
        assert_eq!(keyboard.inline_keyboard.len(), 4);
        assert!(keyboard.inline_keyboard[0][0].text.starts_with("⬜"));
        assert!(keyboard.inline_keyboard[1][0].text.starts_with("☑️"));
    }

    #[test]
    fn test_issue_keyboard_skips_issued_items() {
        let items = vec![item(1, "Tent", None), item(2, "Stove", Some("Ann"))];
        let keyboard = issue_keyboard(&items, Some("en"));
        // One item row plus Done
        assert_eq!(keyboard.inline_keyboard.len(), 2);
    }
}
