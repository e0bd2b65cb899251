//! Sticker bot: conversational registration over Telegram.

pub mod channels;
pub mod config;
pub mod directory;
pub mod error;
pub mod locale;
pub mod notifier;
pub mod registration;
pub mod store;
