//! Conversation state for the inventory dialogue.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::Dialogue;
use teloxide::types::MessageId;

use crate::errors::BotError;
use crate::session_store::ExpiringStorage;

/// Represents the step of a flow a chat is currently in
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryState {
    #[default]
    MainMenu,
    ChoosingStorage,
    StorageMenu {
        storage: String,
    },
    AddingItems {
        storage: String,
    },
    DeletingItems {
        storage: String,
        selected: Vec<i64>,
    },
    EnteringRecipient {
        storage: String,
    },
    IssuingItems {
        storage: String,
        recipient: String,
    },
    ReturningItems {
        storage: String,
    },
    EventsMenu,
    AddingEventName,
    AddingEventDate {
        name: String,
    },
    DeletingEvents {
        selected: Vec<i64>,
    },
}

/// Type alias for our inventory dialogue
pub type InventoryDialogue = Dialogue<InventoryState, ExpiringStorage<InventoryState>>;

/// One incoming update, reduced to what the state machine needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// The `/start` command
    Start,
    /// Any other text message
    Text(String),
    /// An inline button press
    Callback {
        data: String,
        message_id: Option<MessageId>,
    },
    /// A message without text (photo, sticker, ...)
    Unsupported,
}

impl Input {
    /// Classify an incoming text message
    pub fn from_text(text: &str) -> Self {
        let command = text.trim().split_whitespace().next().unwrap_or("");
        // Group chats append the bot name: /start@inventory_bot
        if command.split('@').next() == Some("/start") {
            Input::Start
        } else {
            Input::Text(text.to_string())
        }
    }
}

/// Which multi-select list a button belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionList {
    /// Items of a storage, `tog` / `del` / `clr`
    Items,
    /// Events, `etog` / `edel` / `eclr`
    Events,
}

impl SelectionList {
    fn prefix(self) -> &'static str {
        match self {
            SelectionList::Items => "",
            SelectionList::Events => "e",
        }
    }
}

/// Action encoded in an inline button's callback data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// `tog:<id>` / `etog:<id>` toggle an entry in a multi-select list
    Toggle(SelectionList, i64),
    /// `del` / `edel` delete the selection
    DeleteSelected(SelectionList),
    /// `clr` / `eclr` clear the selection
    ClearSelection(SelectionList),
    /// `iss:<id>` issue an item to the pending recipient
    Issue(i64),
    /// `ret:<id>` return an item
    Return(i64),
    /// `ret:all` return every issued item of the storage
    ReturnAll,
    /// `done` finish the current flow
    Done,
    /// `cancel` abandon the current flow
    Cancel,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Result<Self, BotError> {
        let malformed = || BotError::MalformedCallback(data.to_string());
        let id = |raw: &str| raw.parse::<i64>().map_err(|_| malformed());

        match data.split_once(':') {
            None => match data {
                "del" => Ok(CallbackAction::DeleteSelected(SelectionList::Items)),
                "edel" => Ok(CallbackAction::DeleteSelected(SelectionList::Events)),
                "clr" => Ok(CallbackAction::ClearSelection(SelectionList::Items)),
                "eclr" => Ok(CallbackAction::ClearSelection(SelectionList::Events)),
                "done" => Ok(CallbackAction::Done),
                "cancel" => Ok(CallbackAction::Cancel),
                _ => Err(malformed()),
            },
            Some(("tog", raw)) => Ok(CallbackAction::Toggle(SelectionList::Items, id(raw)?)),
            Some(("etog", raw)) => Ok(CallbackAction::Toggle(SelectionList::Events, id(raw)?)),
            Some(("iss", raw)) => Ok(CallbackAction::Issue(id(raw)?)),
            Some(("ret", "all")) => Ok(CallbackAction::ReturnAll),
            Some(("ret", raw)) => Ok(CallbackAction::Return(id(raw)?)),
            Some(_) => Err(malformed()),
        }
    }

    pub fn encode(self) -> String {
        match self {
            CallbackAction::Toggle(list, id) => format!("{}tog:{id}", list.prefix()),
            CallbackAction::DeleteSelected(list) => format!("{}del", list.prefix()),
            CallbackAction::ClearSelection(list) => format!("{}clr", list.prefix()),
            CallbackAction::Issue(id) => format!("iss:{id}"),
            CallbackAction::Return(id) => format!("ret:{id}"),
            CallbackAction::ReturnAll => "ret:all".to_string(),
            CallbackAction::Done => "done".to_string(),
            CallbackAction::Cancel => "cancel".to_string(),
        }
    }
}

/// Flip `id` in a selection, keeping the order of first selection
pub fn toggle_selection(selected: &mut Vec<i64>, id: i64) {
    if let Some(pos) = selected.iter().position(|existing| *existing == id) {
        selected.remove(pos);
    } else {
        selected.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_parse() {
        assert_eq!(
            CallbackAction::parse("tog:12"),
            Ok(CallbackAction::Toggle(SelectionList::Items, 12))
        );
        assert_eq!(
            CallbackAction::parse("etog:12"),
            Ok(CallbackAction::Toggle(SelectionList::Events, 12))
        );
        assert_eq!(
            CallbackAction::parse("edel"),
            Ok(CallbackAction::DeleteSelected(SelectionList::Events))
        );
        assert_eq!(
            CallbackAction::ClearSelection(SelectionList::Events).encode(),
            "eclr"
        );
        assert_eq!(CallbackAction::parse("ret:all"), Ok(CallbackAction::ReturnAll));
        assert_eq!(CallbackAction::parse("ret:3"), Ok(CallbackAction::Return(3)));
        assert_eq!(CallbackAction::parse("done"), Ok(CallbackAction::Done));
        assert!(CallbackAction::parse("tog:x").is_err());
        assert!(CallbackAction::parse("explode").is_err());
        assert!(CallbackAction::parse("foo:1").is_err());
    }

    #[test]
    fn test_toggle_selection() {
        let mut selected = vec![1, 2];
        toggle_selection(&mut selected, 2);
        assert_eq!(selected, vec![1]);
        toggle_selection(&mut selected, 5);
        assert_eq!(selected, vec![1, 5]);
    }

    #[test]
    fn test_state_serialization() {
        let state = InventoryState::IssuingItems {
            storage: "main".to_string(),
            recipient: "Ann".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("IssuingItems"));
        assert_eq!(serde_json::from_str::<InventoryState>(&json).unwrap(), state);
    }

    #[test]
    fn test_input_from_text() {
        assert_eq!(Input::from_text("/start"), Input::Start);
        assert_eq!(Input::from_text("/start@stock_bot"), Input::Start);
        assert_eq!(Input::from_text("Tent"), Input::Text("Tent".to_string()));
    }
}
