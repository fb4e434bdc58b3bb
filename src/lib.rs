//! # Inventory Telegram Bot
//!
//! A Telegram bot that tracks shared equipment across storage locations:
//! adding and deleting items, issuing them to people, taking them back,
//! and keeping a small calendar of upcoming events.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod keepalive;
pub mod localization;
pub mod session_store;
pub mod text_processing;
