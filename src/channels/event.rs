//! Inbound event types.
//!
//! Raw platform input (command text, callback payload strings) is parsed
//! exactly once, at the transport boundary, into these tagged types. The
//! registration engine only ever matches on them.

use crate::channels::channel::{ChatTarget, UserId};
use crate::locale::{Category, Language};

/// Callback payload prefixes and tags.
pub mod payload {
    pub const LANGUAGE_PREFIX: &str = "lang_";
    pub const CONFIRM_SUBSCRIPTION: &str = "confirm_sub";
    pub const CATEGORY_PREFIX: &str = "logo_stage_";
    pub const VARIANT_PREFIX: &str = "logo_tribe_";
    pub const CLAIM_BONUS: &str = "get_bonus";
}

/// An event from one chat participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    /// Chat to answer in.
    pub chat: ChatTarget,
    /// Platform username, if the user has one.
    pub username: Option<String>,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(user_id: UserId, kind: EventKind) -> Self {
        Self {
            user_id,
            chat: ChatTarget::from(user_id),
            username: None,
            kind,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_chat(mut self, chat: ChatTarget) -> Self {
        self.chat = chat;
        self
    }
}

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/start`
    Start,
    /// `/reset` (administrative)
    Reset,
    /// Free text that is not a command.
    Text(String),
    /// A photo; the largest size's platform file id.
    Photo { file_id: String },
    /// An inline button press.
    Callback {
        callback_id: String,
        /// Message carrying the pressed button, when the platform reports it.
        message_id: Option<i64>,
        action: CallbackAction,
    },
    /// Anything else (unknown commands, stickers, ...).
    Unsupported(String),
}

impl EventKind {
    /// Classify message text as a command or free text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };
        // `/start@SomeBot deep-link` → `start`
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match name.as_str() {
            "start" => Self::Start,
            "reset" => Self::Reset,
            _ => Self::Unsupported(format!("command /{name}")),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Reset => "reset",
            Self::Text(_) => "text",
            Self::Photo { .. } => "photo",
            Self::Callback { .. } => "callback",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// Parsed inline button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Language(Language),
    ConfirmSubscription,
    Category(Category),
    Variant(String),
    ClaimBonus,
    /// Unrecognized payload, kept verbatim for logging.
    Unknown(String),
}

impl CallbackAction {
    /// Parse a callback payload by prefix.
    pub fn parse(data: &str) -> Self {
        if data == payload::CONFIRM_SUBSCRIPTION {
            return Self::ConfirmSubscription;
        }
        if data == payload::CLAIM_BONUS {
            return Self::ClaimBonus;
        }
        if let Some(code) = data.strip_prefix(payload::LANGUAGE_PREFIX) {
            if let Some(lang) = Language::from_code(code) {
                return Self::Language(lang);
            }
        }
        if let Some(code) = data.strip_prefix(payload::CATEGORY_PREFIX) {
            if let Some(category) = Category::from_code(code) {
                return Self::Category(category);
            }
        }
        if let Some(variant) = data.strip_prefix(payload::VARIANT_PREFIX) {
            if !variant.is_empty() {
                return Self::Variant(variant.to_string());
            }
        }
        Self::Unknown(data.to_string())
    }

    /// Payload string that [`CallbackAction::parse`] maps back to `self`.
    pub fn to_payload(&self) -> String {
        match self {
            Self::Language(lang) => format!("{}{}", payload::LANGUAGE_PREFIX, lang.code()),
            Self::ConfirmSubscription => payload::CONFIRM_SUBSCRIPTION.to_string(),
            Self::Category(category) => {
                format!("{}{}", payload::CATEGORY_PREFIX, category.code())
            }
            Self::Variant(variant) => format!("{}{variant}", payload::VARIANT_PREFIX),
            Self::ClaimBonus => payload::CLAIM_BONUS.to_string(),
            Self::Unknown(raw) => raw.clone(),
        }
    }
}
