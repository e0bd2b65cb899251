//! Telegram channel: long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API implementation of [`ChatTransport`], plus the
//! update parser that turns raw JSON updates into [`InboundEvent`]s.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{
    ButtonAction, CallbackAction, ChatTarget, ChatTransport, EventKind, EventStream,
    InboundEvent, Keyboard, MemberStatus, PhotoSource, UserId,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for sendPhoto.
const TELEGRAM_MAX_CAPTION_LENGTH: usize = 1024;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const NAME: &str = "telegram";

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API server (local bot API, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST a JSON body and return the `result` field.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(method, e))?;
        read_result(method, resp).await
    }

    /// Send a text message, trying Markdown first with plain text fallback.
    /// Splits long messages; the keyboard goes on the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = keyboard_markup(kb);
        }

        let markdown_err = match self.call("sendMessage", &body).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!(
            error = %markdown_err,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        if let Some(obj) = body.as_object_mut() {
            obj.remove("parse_mode");
        }
        self.call("sendMessage", &body)
            .await
            .map(|_| ())
            .map_err(|plain_err| ChannelError::SendFailed {
                name: NAME.into(),
                reason: format!("sendMessage failed (markdown: {markdown_err}, plain: {plain_err})"),
            })
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = keyboard_markup(kb);
        }
        if self.call("editMessageText", &body).await.is_ok() {
            return Ok(());
        }
        if let Some(obj) = body.as_object_mut() {
            obj.remove("parse_mode");
        }
        self.call("editMessageText", &body).await.map(|_| ())
    }

    // ── Photos ─────────────────────────────────────────────────────

    async fn send_photo_file(
        &self,
        chat_id: &str,
        path: &std::path::Path,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let file_bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChannelError::MediaNotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(ChannelError::SendFailed {
                    name: NAME.into(),
                    reason: format!("reading {}: {e}", path.display()),
                });
            }
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.png")
            .to_string();
        let caption = truncate_chars(caption, TELEGRAM_MAX_CAPTION_LENGTH);

        let build_form = |markdown: bool| {
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .text("caption", caption.clone())
                .part(
                    "photo",
                    Part::bytes(file_bytes.clone()).file_name(file_name.clone()),
                );
            if markdown {
                form = form.text("parse_mode", "Markdown");
            }
            if let Some(kb) = keyboard {
                form = form.text("reply_markup", keyboard_markup(kb).to_string());
            }
            form
        };

        let first = self.post_multipart("sendPhoto", build_form(true)).await;
        if first.is_ok() {
            tracing::info!(chat_id, file = %file_name, "Telegram photo sent");
            return Ok(());
        }
        self.post_multipart("sendPhoto", build_form(false)).await
    }

    async fn post_multipart(&self, method: &str, form: Form) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_failed(method, e))?;
        read_result(method, resp).await.map(|_| ())
    }

    async fn send_photo_by_id(
        &self,
        chat_id: &str,
        file_id: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "photo": file_id,
            "caption": truncate_chars(caption, TELEGRAM_MAX_CAPTION_LENGTH),
            "parse_mode": "Markdown",
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = keyboard_markup(kb);
        }
        if self.call("sendPhoto", &body).await.is_ok() {
            return Ok(());
        }
        if let Some(obj) = body.as_object_mut() {
            obj.remove("parse_mode");
        }
        self.call("sendPhoto", &body).await.map(|_| ())
    }

    // ── Inbound ────────────────────────────────────────────────────

    /// Start long-polling and return the stream of parsed events.
    pub fn start(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        tracing::debug!("Telegram: skipping update without a usable sender");
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Box::pin(stream)
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: NAME.into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: NAME.into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── ChatTransport implementation ────────────────────────────────────

#[async_trait::async_trait]
impl ChatTransport for TelegramChannel {
    async fn send_text(
        &self,
        chat: &ChatTarget,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.send_message(chat.as_str(), text, keyboard).await
    }

    async fn edit_text(
        &self,
        chat: &ChatTarget,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.edit_message(chat.as_str(), message_id, text, keyboard)
            .await
    }

    async fn send_photo(
        &self,
        chat: &ChatTarget,
        photo: &PhotoSource,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        match photo {
            PhotoSource::Path(path) => {
                self.send_photo_file(chat.as_str(), path, caption, keyboard)
                    .await
            }
            PhotoSource::FileId(file_id) => {
                self.send_photo_by_id(chat.as_str(), file_id, caption, keyboard)
                    .await
            }
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id }),
        )
        .await
        .map(|_| ())
    }

    async fn membership_status(
        &self,
        channel: &ChatTarget,
        user_id: UserId,
    ) -> Result<MemberStatus, ChannelError> {
        let result = self
            .call(
                "getChatMember",
                &json!({ "chat_id": channel.as_str(), "user_id": user_id }),
            )
            .await?;
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::InvalidResponse {
                name: NAME.into(),
                reason: "getChatMember result has no status".into(),
            })?;
        Ok(MemberStatus::parse(status))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn request_failed(method: &str, e: reqwest::Error) -> ChannelError {
    // Request URLs embed the bot token.
    ChannelError::RequestFailed {
        name: NAME.into(),
        method: method.into(),
        reason: e.without_url().to_string(),
    }
}

/// Check the HTTP status and the Bot API `ok` flag, returning `result`.
async fn read_result(method: &str, resp: reqwest::Response) -> Result<Value, ChannelError> {
    let status = resp.status();
    let body: Value = resp.json().await.map_err(|e| ChannelError::InvalidResponse {
        name: NAME.into(),
        reason: format!("{method}: {}", e.without_url()),
    })?;
    let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !status.is_success() || !ok {
        let description = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        return Err(ChannelError::RequestFailed {
            name: NAME.into(),
            method: method.into(),
            reason: format!("HTTP {status}: {description}"),
        });
    }
    Ok(body.get("result").cloned().unwrap_or(Value::Null))
}

/// Render a keyboard as a Bot API `InlineKeyboardMarkup`.
pub fn keyboard_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Value> = keyboard
        .rows
        .iter()
        .map(|row| {
            Value::Array(
                row.iter()
                    .map(|button| match &button.action {
                        ButtonAction::Callback(data) => {
                            json!({ "text": button.label, "callback_data": data })
                        }
                        ButtonAction::Url(url) => json!({ "text": button.label, "url": url }),
                    })
                    .collect(),
            )
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Parse one `getUpdates` entry. Returns `None` for updates without a
/// sender (channel posts, service messages).
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(query) = update.get("callback_query") {
        return parse_callback_query(query);
    }
    let message = update.get("message")?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?;

    let kind = if let Some(text) = message.get("text").and_then(Value::as_str) {
        EventKind::from_text(text)
    } else if let Some(sizes) = message.get("photo").and_then(Value::as_array) {
        // Sizes are ordered smallest first.
        let file_id = sizes
            .last()
            .and_then(|p| p.get("file_id"))
            .and_then(Value::as_str)?;
        EventKind::Photo {
            file_id: file_id.to_string(),
        }
    } else {
        EventKind::Unsupported("non-text message".into())
    };

    let chat = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(ChatTarget::from)
        .unwrap_or_else(|| ChatTarget::from(user_id));

    Some(finish_event(user_id, chat, from, kind))
}

fn parse_callback_query(query: &Value) -> Option<InboundEvent> {
    let from = query.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?;
    let callback_id = query.get("id").and_then(Value::as_str)?.to_string();
    let data = query.get("data").and_then(Value::as_str).unwrap_or_default();
    let message = query.get("message");
    let message_id = message
        .and_then(|m| m.get("message_id"))
        .and_then(Value::as_i64);
    let chat = message
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(ChatTarget::from)
        .unwrap_or_else(|| ChatTarget::from(user_id));

    let kind = EventKind::Callback {
        callback_id,
        message_id,
        action: CallbackAction::parse(data),
    };
    Some(finish_event(user_id, chat, from, kind))
}

fn finish_event(user_id: UserId, chat: ChatTarget, from: &Value, kind: EventKind) -> InboundEvent {
    let mut event = InboundEvent::new(user_id, kind).with_chat(chat);
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        event = event.with_username(username);
    }
    event
}

/// Truncate to at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset of the first char past the limit.
        let limit = remaining
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Button;
    use crate::locale::Language;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(SecretString::from("123:ABC"))
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel().api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn telegram_api_url_custom_base() {
        let ch = channel().with_api_base("http://127.0.0.1:8081/");
        assert_eq!(
            ch.api_url("sendPhoto"),
            "http://127.0.0.1:8081/bot123:ABC/sendPhoto"
        );
    }

    // ── Keyboard markup ─────────────────────────────────────────────

    #[test]
    fn keyboard_markup_shapes_rows() {
        let kb = Keyboard::new()
            .row(vec![Button::url("Channel", "https://t.me/sticky")])
            .row(vec![Button::callback("OK", "confirm_sub")]);
        let markup = keyboard_markup(&kb);
        assert_eq!(
            markup,
            json!({
                "inline_keyboard": [
                    [{ "text": "Channel", "url": "https://t.me/sticky" }],
                    [{ "text": "OK", "callback_data": "confirm_sub" }]
                ]
            })
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_text_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": { "id": 555, "username": "ivan" },
                "chat": { "id": 555 },
                "text": "/start"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.user_id, 555);
        assert_eq!(event.chat, ChatTarget::from(555));
        assert_eq!(event.username.as_deref(), Some("ivan"));
        assert_eq!(event.kind, EventKind::Start);
    }

    #[test]
    fn parse_photo_takes_largest_size() {
        let update = json!({
            "update_id": 2,
            "message": {
                "from": { "id": 9 },
                "chat": { "id": 9 },
                "photo": [
                    { "file_id": "small", "width": 90 },
                    { "file_id": "large", "width": 1280 }
                ]
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.username, None);
        assert_eq!(
            event.kind,
            EventKind::Photo {
                file_id: "large".into()
            }
        );
    }

    #[test]
    fn parse_sticker_is_unsupported() {
        let update = json!({
            "update_id": 3,
            "message": { "from": { "id": 9 }, "chat": { "id": 9 }, "sticker": {} }
        });
        let event = parse_update(&update).unwrap();
        assert!(matches!(event.kind, EventKind::Unsupported(_)));
    }

    #[test]
    fn parse_callback_query_update() {
        let update = json!({
            "update_id": 4,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 77, "username": "olga" },
                "message": { "message_id": 321, "chat": { "id": 77 } },
                "data": "lang_ru"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.user_id, 77);
        assert_eq!(
            event.kind,
            EventKind::Callback {
                callback_id: "cb-1".into(),
                message_id: Some(321),
                action: CallbackAction::Language(Language::Ru),
            }
        );
    }

    #[test]
    fn parse_update_without_sender_is_skipped() {
        let update = json!({
            "update_id": 5,
            "channel_post": { "chat": { "id": -100 }, "text": "news" }
        });
        assert!(parse_update(&update).is_none());
    }

    // ── Message splitting ───────────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks, vec!["a".repeat(2000), "b".repeat(3000)]);
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_counts_chars_not_bytes() {
        // Cyrillic letters are two bytes each.
        let msg = "я".repeat(3000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);

        let msg = "я".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks[0].chars().count(), 4096);
        assert_eq!(chunks[1].chars().count(), 904);
    }

    #[test]
    fn truncate_caption() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[tokio::test]
    async fn send_photo_missing_file_is_media_not_found() {
        let ch = channel();
        let err = ch
            .send_photo(
                &ChatTarget::from(1),
                &PhotoSource::Path("/nonexistent/path/Dragon.png".into()),
                "caption",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::MediaNotFound(_)));
    }
}
