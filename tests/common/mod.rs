//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sticker_bot::channels::{
    CallbackAction, ChatTarget, ChatTransport, EventKind, InboundEvent, Keyboard, MemberStatus,
    PhotoSource, UserId,
};
use sticker_bot::config::FlowConfig;
use sticker_bot::directory::{DirectoryProfile, IdentityDirectory, Lookup};
use sticker_bot::error::{ChannelError, DatabaseError, DirectoryError};
use sticker_bot::store::{LibSqlBackend, ProfileStore, Registration};

pub const OPERATOR: UserId = 42;
pub const USER: UserId = 555;

/// Something the bot sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat: ChatTarget,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat: ChatTarget,
        message_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat: ChatTarget,
        photo: PhotoSource,
        caption: String,
        keyboard: Option<Keyboard>,
    },
}

impl Sent {
    pub fn chat(&self) -> &ChatTarget {
        match self {
            Sent::Text { chat, .. } | Sent::Edit { chat, .. } | Sent::Photo { chat, .. } => chat,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Sent::Text { text, .. } | Sent::Edit { text, .. } => text,
            Sent::Photo { caption, .. } => caption,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Sent::Text { keyboard, .. }
            | Sent::Edit { keyboard, .. }
            | Sent::Photo { keyboard, .. } => keyboard.as_ref(),
        }
    }
}

/// In-process transport that records everything.
///
/// Local photos behave like the real transport: a missing file is
/// `MediaNotFound`.
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    acks: Mutex<Vec<String>>,
    membership: Mutex<Result<MemberStatus, String>>,
    failing: Mutex<HashSet<ChatTarget>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
            membership: Mutex::new(Ok(MemberStatus::Member)),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn set_membership(&self, status: Result<MemberStatus, String>) {
        *self.membership.lock().unwrap() = status;
    }

    pub fn fail_chat(&self, chat: ChatTarget) {
        self.failing.lock().unwrap().insert(chat);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat: &ChatTarget) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat() == chat)
            .collect()
    }

    /// Bodies of everything sent to `chat`, in order.
    pub fn bodies_to(&self, chat: &ChatTarget) -> Vec<String> {
        self.sent_to(chat)
            .iter()
            .map(|s| s.body().to_string())
            .collect()
    }

    pub fn last_to(&self, chat: &ChatTarget) -> Option<Sent> {
        self.sent_to(chat).pop()
    }

    pub fn acks(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.acks.lock().unwrap().clear();
    }

    fn check(&self, chat: &ChatTarget) -> Result<(), ChannelError> {
        if self.failing.lock().unwrap().contains(chat) {
            return Err(ChannelError::SendFailed {
                name: "fake".into(),
                reason: format!("chat {chat} unreachable"),
            });
        }
        Ok(())
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        chat: &ChatTarget,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.check(chat)?;
        self.record(Sent::Text {
            chat: chat.clone(),
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn edit_text(
        &self,
        chat: &ChatTarget,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.check(chat)?;
        self.record(Sent::Edit {
            chat: chat.clone(),
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: &ChatTarget,
        photo: &PhotoSource,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.check(chat)?;
        if let PhotoSource::Path(path) = photo {
            if !path.exists() {
                return Err(ChannelError::MediaNotFound(path.display().to_string()));
            }
        }
        self.record(Sent::Photo {
            chat: chat.clone(),
            photo: photo.clone(),
            caption: caption.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.acks.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn membership_status(
        &self,
        _channel: &ChatTarget,
        _user_id: UserId,
    ) -> Result<MemberStatus, ChannelError> {
        self.membership
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| ChannelError::RequestFailed {
                name: "fake".into(),
                method: "getChatMember".into(),
                reason,
            })
    }
}

/// Directory with a fixed set of known logins.
pub struct FakeDirectory {
    profiles: HashMap<String, DirectoryProfile>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        let mut profiles = HashMap::new();
        profiles.insert(
            "ivanov".to_string(),
            DirectoryProfile {
                login: "ivanov".into(),
                parallel_name: Some("Core program".into()),
                class_name: Some("Dragons".into()),
            },
        );
        Arc::new(Self {
            profiles,
            failing: Mutex::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityDirectory for FakeDirectory {
    async fn resolve(&self, handle: &str) -> Result<Lookup, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(DirectoryError::UnexpectedStatus {
                status: 503,
                body: "maintenance".into(),
            });
        }
        Ok(match self.profiles.get(handle) {
            Some(profile) => Lookup::Found(profile.clone()),
            None => Lookup::NotFound,
        })
    }
}

/// How a [`FailingStore`] logo update misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoUpdateFault {
    None,
    /// The query errors.
    Error,
    /// The query succeeds but matches no row.
    NoRow,
}

/// In-memory libSQL store that fails selected writes on demand.
pub struct FailingStore {
    inner: LibSqlBackend,
    fail_insert: Mutex<bool>,
    logo_fault: Mutex<LogoUpdateFault>,
}

impl FailingStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            fail_insert: Mutex::new(false),
            logo_fault: Mutex::new(LogoUpdateFault::None),
        })
    }

    pub fn set_fail_insert(&self, fail: bool) {
        *self.fail_insert.lock().unwrap() = fail;
    }

    pub fn set_logo_fault(&self, fault: LogoUpdateFault) {
        *self.logo_fault.lock().unwrap() = fault;
    }
}

#[async_trait]
impl ProfileStore for FailingStore {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.inner.run_migrations().await
    }

    async fn exists(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        self.inner.exists(user_id).await
    }

    async fn insert(&self, registration: &Registration) -> Result<(), DatabaseError> {
        if *self.fail_insert.lock().unwrap() {
            return Err(DatabaseError::Query("disk I/O error".into()));
        }
        self.inner.insert(registration).await
    }

    async fn get(&self, user_id: UserId) -> Result<Option<Registration>, DatabaseError> {
        self.inner.get(user_id).await
    }

    async fn update_chosen_logo(
        &self,
        user_id: UserId,
        logo: &str,
    ) -> Result<bool, DatabaseError> {
        let fault = *self.logo_fault.lock().unwrap();
        match fault {
            LogoUpdateFault::None => self.inner.update_chosen_logo(user_id, logo).await,
            LogoUpdateFault::Error => Err(DatabaseError::Query("database is locked".into())),
            LogoUpdateFault::NoRow => Ok(false),
        }
    }

    async fn mark_bonus_claimed(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        self.inner.mark_bonus_claimed(user_id).await
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        self.inner.delete(user_id).await
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        self.inner.count().await
    }
}

pub fn orders_a() -> ChatTarget {
    ChatTarget::new("-100111")
}

pub fn orders_b() -> ChatTarget {
    ChatTarget::new("-100222")
}

pub fn user_chat() -> ChatTarget {
    ChatTarget::from(USER)
}

pub fn operator_chat() -> ChatTarget {
    ChatTarget::from(OPERATOR)
}

pub fn flow_config(images_dir: PathBuf) -> FlowConfig {
    FlowConfig {
        operator_id: OPERATOR,
        notify_destinations: vec![orders_a(), orders_b()],
        subscription_channel: ChatTarget::new("@sticky_online_store"),
        contact_url: "https://t.me/sticker_maker".into(),
        images_dir,
    }
}

// ── Event builders ──────────────────────────────────────────────────

pub fn start(user_id: UserId) -> InboundEvent {
    InboundEvent::new(user_id, EventKind::Start).with_username("ivan_tg")
}

pub fn text(user_id: UserId, body: &str) -> InboundEvent {
    InboundEvent::new(user_id, EventKind::from_text(body))
}

pub fn photo(user_id: UserId, file_id: &str) -> InboundEvent {
    InboundEvent::new(
        user_id,
        EventKind::Photo {
            file_id: file_id.into(),
        },
    )
}

static NEXT_CALLBACK: AtomicUsize = AtomicUsize::new(1);

/// A button press on message 900.
pub fn press(user_id: UserId, payload: &str) -> InboundEvent {
    let n = NEXT_CALLBACK.fetch_add(1, Ordering::SeqCst);
    InboundEvent::new(
        user_id,
        EventKind::Callback {
            callback_id: format!("cb-{n}"),
            message_id: Some(900),
            action: CallbackAction::parse(payload),
        },
    )
}
