//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval, fallback and language detection.

use inventory_bot::localization::{
    detect_language, resolve_language, t_args_lang, t_lang, LocalizationManager,
};
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("welcome-title", "en", None);
        assert!(message.contains("Welcome"));

        let message = manager.get_message_in_language("welcome-title", "ru", None);
        assert!(message.contains("Добро пожаловать"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language_falls_back_to_russian() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("btn-back", "de", None);
        let russian = manager.get_message_in_language("btn-back", "ru", None);
        assert_eq!(message, russian);
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("item", "Tent");
        args.insert("owner", "Ann");

        let message = manager.get_message_in_language("issue-success", "en", Some(&args));
        assert_eq!(message, "✅ <b>Tent</b> issued to <b>Ann</b>!");
    }

    #[test]
    fn test_args_are_not_wrapped_in_isolation_marks() {
        let message = t_args_lang("add-success", &[("item", "Палатка")], Some("ru"));
        assert!(message.contains("<b>Палатка</b>"));
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_has_message() {
        let manager = setup_localization();
        assert!(manager.has_message("stop-word", "en"));
        assert!(manager.has_message("stop-word", "ru"));
        assert!(!manager.has_message("nonexistent-key", "en"));
    }

    #[test]
    fn test_stop_word_per_language() {
        assert_eq!(t_lang("stop-word", Some("en")), "stop");
        assert_eq!(t_lang("stop-word", Some("ru")), "стоп");
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Some("en")), "en");
        assert_eq!(detect_language(Some("en-US")), "en");
        assert_eq!(detect_language(Some("RU")), "ru");
        assert_eq!(detect_language(Some("fr")), "ru");
        assert_eq!(detect_language(None), "ru");
    }

    #[test]
    fn test_resolve_language_uses_configured_fallback() {
        assert_eq!(resolve_language(None, "en"), "en");
        assert_eq!(resolve_language(Some("fr"), "en"), "en");
        assert_eq!(resolve_language(Some("ru"), "en"), "ru");
        // An unsupported fallback still ends in the default
        assert_eq!(resolve_language(None, "de"), "ru");
    }
}
