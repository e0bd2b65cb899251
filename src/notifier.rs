//! Operator notifications: best-effort fan-out to a fixed set of chats.

use std::sync::Arc;

use futures::future::join_all;

use crate::channels::{ChatTarget, ChatTransport, PhotoSource};
use crate::error::ChannelError;
use crate::locale::{self, Language, keys};
use crate::store::Registration;

const MISSING: &str = "N/A";

/// Outcome of delivering one notification to one destination.
#[derive(Debug)]
pub struct DeliveryReport {
    pub destination: ChatTarget,
    pub outcome: Result<(), ChannelError>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Sends the same message to every configured destination.
///
/// A failing destination is logged and reported, never raised, and never
/// keeps the others from receiving the message.
pub struct Notifier {
    transport: Arc<dyn ChatTransport>,
    destinations: Vec<ChatTarget>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn ChatTransport>, destinations: Vec<ChatTarget>) -> Self {
        Self {
            transport,
            destinations,
        }
    }

    pub fn destinations(&self) -> &[ChatTarget] {
        &self.destinations
    }

    /// Send `text` to every destination.
    pub async fn notify(&self, text: &str) -> Vec<DeliveryReport> {
        let sends = self.destinations.iter().map(|dest| async move {
            let outcome = self.transport.send_text(dest, text, None).await;
            report(dest, outcome)
        });
        join_all(sends).await
    }

    /// Forward an already uploaded photo with a caption to every destination.
    pub async fn notify_photo(&self, file_id: &str, caption: &str) -> Vec<DeliveryReport> {
        let photo = PhotoSource::FileId(file_id.to_string());
        let photo = &photo;
        let sends = self.destinations.iter().map(|dest| async move {
            let outcome = self.transport.send_photo(dest, photo, caption, None).await;
            report(dest, outcome)
        });
        join_all(sends).await
    }
}

fn report(dest: &ChatTarget, outcome: Result<(), ChannelError>) -> DeliveryReport {
    match &outcome {
        Ok(()) => tracing::debug!(destination = %dest, "Notification delivered"),
        Err(e) => tracing::error!(destination = %dest, error = %e, "Notification delivery failed"),
    }
    DeliveryReport {
        destination: dest.clone(),
        outcome,
    }
}

/// Order summary for operators, always in English.
pub fn format_order_summary(reg: &Registration) -> String {
    let user_id = reg.user_id.to_string();
    locale::render(
        Language::En,
        keys::ADMIN_NOTIFICATION,
        &[
            ("user_id", user_id.as_str()),
            ("username", or_missing(&reg.platform_username)),
            ("lang", reg.language.code()),
            ("nickname", non_empty(&reg.handle)),
            ("real_name", or_missing(&reg.display_name)),
            ("stage", or_missing(&reg.cohort_stage)),
            ("tribe", or_missing(&reg.cohort_group)),
            ("chosen_logo", or_missing(&reg.chosen_logo)),
        ],
    )
}

/// Caption attached to a forwarded bonus proof.
pub fn format_bonus_caption(reg: &Registration) -> String {
    locale::render(
        Language::En,
        keys::ADMIN_BONUS_CAPTION,
        &[
            ("username", or_missing(&reg.platform_username)),
            ("nickname", non_empty(&reg.handle)),
            ("real_name", or_missing(&reg.display_name)),
        ],
    )
}

fn or_missing(value: &Option<String>) -> &str {
    value.as_deref().map(non_empty).unwrap_or(MISSING)
}

fn non_empty(value: &str) -> &str {
    if value.is_empty() { MISSING } else { value }
}
