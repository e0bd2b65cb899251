//! Transport-neutral chat types and the [`ChatTransport`] trait.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::channels::event::InboundEvent;
use crate::error::ChannelError;

/// Stable identifier of a chat participant.
pub type UserId = i64;

/// Stream of parsed inbound events.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Where a message is delivered: a numeric chat id or a `@channel` username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatTarget(String);

impl ChatTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ChatTarget {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What pressing an inline button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Sends a callback with this opaque payload back to the bot.
    Callback(String),
    /// Opens a URL.
    Url(String),
}

/// A single inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(payload.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Inline button menu attached to a message, one `Vec` per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row of buttons.
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// Every button on its own row.
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    /// All callback payloads, in display order.
    pub fn callback_payloads(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match &b.action {
                ButtonAction::Callback(p) => Some(p.as_str()),
                ButtonAction::Url(_) => None,
            })
            .collect()
    }
}

/// Image to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Local file, uploaded on send.
    Path(PathBuf),
    /// A file already stored by the chat platform.
    FileId(String),
}

/// Membership of a user in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    Other(String),
}

impl MemberStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "creator" => Self::Creator,
            "administrator" => Self::Administrator,
            "member" => Self::Member,
            "restricted" => Self::Restricted,
            "left" => Self::Left,
            "kicked" => Self::Kicked,
            other => Self::Other(other.to_string()),
        }
    }

    /// Anyone who has not left and was not removed counts as subscribed.
    pub fn is_subscribed(&self) -> bool {
        !matches!(self, Self::Left | Self::Kicked)
    }
}

/// Outbound side of the chat platform as used by the registration flow.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message, optionally with an inline menu.
    async fn send_text(
        &self,
        chat: &ChatTarget,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Replace the text (and menu) of a message the bot already sent.
    async fn edit_text(
        &self,
        chat: &ChatTarget,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Send an image with caption. A missing local file yields
    /// [`ChannelError::MediaNotFound`].
    async fn send_photo(
        &self,
        chat: &ChatTarget,
        photo: &PhotoSource,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;

    /// Membership status of `user_id` in `channel`.
    async fn membership_status(
        &self,
        channel: &ChatTarget,
        user_id: UserId,
    ) -> Result<MemberStatus, ChannelError>;
}
