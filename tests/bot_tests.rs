use std::time::{Duration, Instant};

use teloxide::dispatching::dialogue::Storage;
use teloxide::types::{ChatId, MessageId, ReplyMarkup};
use url::Url;

use inventory_bot::bot::ui_builder::*;
use inventory_bot::config::StorageLocation;
use inventory_bot::db::{Event, Item};
use inventory_bot::dialogue::{CallbackAction, InventoryState, SelectionList};
use inventory_bot::keepalive::health_url;
use inventory_bot::session_store::ExpiringStorage;

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

fn callback_data(keyboard: &teloxide::types::InlineKeyboardMarkup) -> Vec<String> {
    use teloxide::types::InlineKeyboardButtonKind;

    keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_storage_choice_keyboard_layout() {
    let storages = vec![
        StorageLocation {
            key: "a".to_string(),
            title: "Main".to_string(),
        },
        StorageLocation {
            key: "b".to_string(),
            title: "Garage".to_string(),
        },
        StorageLocation {
            key: "c".to_string(),
            title: "Attic".to_string(),
        },
    ];
    let keyboard = storage_choice_keyboard(&storages, Some("en"));

    // Two per row, then Back
    assert_eq!(keyboard.keyboard.len(), 3);
    assert_eq!(keyboard.keyboard[0].len(), 2);
    assert_eq!(keyboard.keyboard[1][0].text, "Attic");
    assert_eq!(keyboard.keyboard[2][0].text, "⬅️ Back");
}

#[test]
fn test_return_items_keyboard_callbacks() {
    let items = vec![item(1, "Tent", None), item(2, "Stove", Some("Ann"))];
    let keyboard = return_items_keyboard(&items, Some("en"));

    assert_eq!(
        callback_data(&keyboard),
        vec![
            CallbackAction::Return(2).encode(),
            "ret:all".to_string(),
            "done".to_string()
        ]
    );
}

#[test]
fn test_selection_keyboard_callbacks() {
    let entries = vec![(5, "Tent".to_string())];
    let keyboard = selection_keyboard(SelectionList::Items, &entries, &[], Some("en"));
    assert_eq!(callback_data(&keyboard), vec!["tog:5", "del", "clr", "cancel"]);

    let keyboard = selection_keyboard(SelectionList::Events, &entries, &[], Some("en"));
    assert_eq!(callback_data(&keyboard), vec!["etog:5", "edel", "eclr", "cancel"]);
}

#[test]
fn test_format_inventory_empty() {
    let text = format_inventory("Main", &[], Some("en"));
    assert!(text.contains("INVENTORY: Main"));
    assert!(text.contains("Empty"));
}

#[test]
fn test_format_events() {
    let events = vec![Event {
        id: 1,
        name: "Hike & BBQ".to_string(),
        date: chrono::NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
    }];
    let text = format_events("Events", &events, Some("en"));
    assert!(text.contains("20.06.2025 - <b>Hike &amp; BBQ</b>"));

    let empty = format_events("Events", &[], Some("en"));
    assert!(empty.contains("No events"));
}

#[test]
fn test_update_inline_edits_known_message() {
    let keyboard = issue_keyboard(&[], Some("en"));

    let reply = Reply::update_inline(Some(MessageId(3)), "list", keyboard.clone());
    assert!(matches!(reply, Reply::Edit { message_id: MessageId(3), .. }));

    let reply = Reply::update_inline(None, "list", keyboard);
    assert!(matches!(
        reply,
        Reply::Send {
            markup: Some(ReplyMarkup::InlineKeyboard(_)),
            ..
        }
    ));
    assert_eq!(reply.body(), "list");
}

#[test]
fn test_health_url_from_webhook() {
    let webhook = Url::parse("https://bot.example.com/telegram/webhook").unwrap();
    assert_eq!(
        health_url(&webhook).unwrap().as_str(),
        "https://bot.example.com/health"
    );
}

#[tokio::test]
async fn test_session_storage_expiry() {
    let storage = ExpiringStorage::<InventoryState>::new(Duration::from_secs(30));
    let state = InventoryState::AddingItems {
        storage: "main".to_string(),
    };

    storage
        .clone()
        .update_dialogue(ChatId(7), state.clone())
        .await
        .unwrap();
    assert_eq!(
        storage.clone().get_dialogue(ChatId(7)).await.unwrap(),
        Some(state)
    );

    let removed = storage
        .purge_expired_at(Instant::now() + Duration::from_secs(31))
        .await;
    assert_eq!(removed, 1);
    assert_eq!(storage.clone().get_dialogue(ChatId(7)).await.unwrap(), None);
}
