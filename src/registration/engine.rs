//! RegistrationEngine: drives each user's session through the
//! registration steps and performs their side effects.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::channels::{
    Button, CallbackAction, ChatTarget, ChatTransport, EventKind, InboundEvent, Keyboard,
    PhotoSource, UserId, event::payload,
};
use crate::config::FlowConfig;
use crate::directory::{IdentityDirectory, Lookup, normalize_handle};
use crate::error::{ChannelError, DatabaseError};
use crate::locale::{self, Category, Language, keys};
use crate::notifier::{self, Notifier};
use crate::store::ProfileStore;

use super::session::Session;
use super::state::ConversationState;

/// Coordinates sessions, verification, persistence and notifications.
///
/// Events for a single user must be fed in order and never concurrently;
/// the dispatcher guarantees that. Different users may be handled in
/// parallel.
pub struct RegistrationEngine {
    flow: FlowConfig,
    store: Arc<dyn ProfileStore>,
    directory: Arc<dyn IdentityDirectory>,
    transport: Arc<dyn ChatTransport>,
    /// Order summaries and bonus proofs.
    orders: Notifier,
    /// Error details for the operator.
    operator: Notifier,
    sessions: Mutex<HashMap<UserId, Session>>,
    awaiting_proof: Mutex<HashSet<UserId>>,
}

impl RegistrationEngine {
    pub fn new(
        flow: FlowConfig,
        store: Arc<dyn ProfileStore>,
        directory: Arc<dyn IdentityDirectory>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let orders = Notifier::new(transport.clone(), flow.notify_destinations.clone());
        let operator = Notifier::new(transport.clone(), vec![ChatTarget::from(flow.operator_id)]);
        Self {
            flow,
            store,
            directory,
            transport,
            orders,
            operator,
            sessions: Mutex::new(HashMap::new()),
            awaiting_proof: Mutex::new(HashSet::new()),
        }
    }

    /// Current step of a user's session, if one is active.
    pub fn session_state(&self, user_id: UserId) -> Option<ConversationState> {
        self.lock_sessions().get(&user_id).map(|s| s.state)
    }

    /// Number of active sessions.
    pub fn active_sessions(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Whether the user was asked for a bonus proof and has not sent it yet.
    pub fn is_awaiting_proof(&self, user_id: UserId) -> bool {
        self.lock_awaiting().contains(&user_id)
    }

    /// Handle one inbound event.
    ///
    /// Returns the session state after the event, `End` when the session was
    /// completed or discarded, and `None` when the event was handled outside
    /// any session (bonus claims, reset, stray input from unknown users).
    pub async fn handle_event(&self, event: InboundEvent) -> Option<ConversationState> {
        let user_id = event.user_id;
        tracing::info!(user_id, kind = event.kind.label(), "Event received");

        if let EventKind::Callback { callback_id, .. } = &event.kind {
            if let Err(e) = self.transport.answer_callback(callback_id).await {
                tracing::debug!(user_id, error = %e, "Failed to acknowledge callback");
            }
        }

        // A pending bonus proof must be the very next event.
        if !matches!(event.kind, EventKind::Photo { .. }) && self.lock_awaiting().remove(&user_id)
        {
            tracing::debug!(user_id, "Bonus proof not sent, request dropped");
        }

        if event.kind == EventKind::Reset {
            self.reset(&event).await;
            return None;
        }

        let Some(session) = self.take_session(user_id) else {
            return self.handle_without_session(&event).await;
        };

        let session = self.advance(session, &event).await;
        let state = session.state;
        if state.is_terminal() {
            tracing::info!(user_id, "Session ended");
        } else {
            self.put_session(session);
        }
        Some(state)
    }

    // ── Session dispatch ────────────────────────────────────────────

    /// Apply the transition matching the session's current state, or treat
    /// the event as out-of-flow.
    async fn advance(&self, mut session: Session, event: &InboundEvent) -> Session {
        use ConversationState as S;

        let chat = &event.chat;
        match (session.state, &event.kind) {
            (
                S::SelectLang,
                EventKind::Callback {
                    action: CallbackAction::Language(lang),
                    message_id,
                    ..
                },
            ) => {
                self.on_language(&mut session, chat, *lang, *message_id)
                    .await;
            }
            (
                S::CheckSub,
                EventKind::Callback {
                    action: CallbackAction::ConfirmSubscription,
                    message_id,
                    ..
                },
            ) => {
                self.on_confirm_subscription(&mut session, chat, *message_id)
                    .await;
            }
            (S::GetHandle, EventKind::Text(text)) => {
                self.on_handle(&mut session, chat, text).await;
            }
            (S::GetRealName, EventKind::Text(text)) => {
                self.on_real_name(&mut session, chat, text).await;
            }
            (
                S::ChooseProductCategory,
                EventKind::Callback {
                    action: CallbackAction::Category(category),
                    message_id,
                    ..
                },
            ) => {
                self.on_category(&mut session, chat, *category, *message_id)
                    .await;
            }
            (
                S::ChooseProductVariant,
                EventKind::Callback {
                    action: CallbackAction::Variant(variant),
                    message_id,
                    ..
                },
            ) if session
                .chosen_category
                .is_some_and(|c| c.has_variant(variant)) =>
            {
                self.on_variant(&mut session, chat, variant, *message_id)
                    .await;
            }
            (state, kind) => {
                tracing::info!(
                    user_id = session.user_id,
                    state = %state,
                    expected = state.expects(),
                    got = kind.label(),
                    "Out-of-flow event, discarding session"
                );
                let text = locale::text(session.language(), keys::FALLBACK_MESSAGE);
                self.say(chat, &text, None).await;
                session.advance(S::End);
            }
        }
        session
    }

    /// Events from users with no active session.
    async fn handle_without_session(&self, event: &InboundEvent) -> Option<ConversationState> {
        match &event.kind {
            EventKind::Start => self.on_start(event).await,
            EventKind::Callback {
                action: CallbackAction::ClaimBonus,
                ..
            } => {
                self.on_claim_bonus(event).await;
                None
            }
            EventKind::Photo { file_id } if self.is_awaiting_proof(event.user_id) => {
                self.on_bonus_proof(event, file_id).await;
                None
            }
            _ => {
                self.fallback_for_profile(event).await;
                None
            }
        }
    }

    // ── Steps ───────────────────────────────────────────────────────

    async fn on_start(&self, event: &InboundEvent) -> Option<ConversationState> {
        let user_id = event.user_id;
        match self.store.get(user_id).await {
            Ok(Some(existing)) => {
                tracing::info!(user_id, "Already registered, not starting a session");
                let text = locale::text(existing.language, keys::ALREADY_REGISTERED);
                self.say(&event.chat, &text, None).await;
                Some(ConversationState::End)
            }
            Ok(None) => {
                let session = Session::new(user_id, event.username.clone());
                let menu = Keyboard::new().row(
                    Language::ALL
                        .iter()
                        .map(|lang| {
                            Button::callback(
                                lang.button_label(),
                                CallbackAction::Language(*lang).to_payload(),
                            )
                        })
                        .collect(),
                );
                let text = locale::text(Language::DEFAULT, keys::WELCOME);
                self.say(&event.chat, &text, Some(&menu)).await;
                let state = session.state;
                self.put_session(session);
                tracing::info!(user_id, username = ?event.username, "Session started");
                Some(state)
            }
            Err(e) => {
                self.storage_failed(user_id, &event.chat, Language::DEFAULT, "start", &e)
                    .await;
                None
            }
        }
    }

    async fn on_language(
        &self,
        session: &mut Session,
        chat: &ChatTarget,
        lang: Language,
        message_id: Option<i64>,
    ) {
        session.language = Some(lang);
        tracing::info!(user_id = session.user_id, language = %lang, "Language selected");

        let selected = locale::text(lang, keys::LANG_SELECTED);
        self.replace_or_send(chat, message_id, &selected, None)
            .await;

        let text = locale::text(lang, keys::ASK_SUBSCRIBE);
        self.say(chat, &text, Some(&self.subscribe_menu(lang)))
            .await;
        session.advance(ConversationState::CheckSub);
    }

    async fn on_confirm_subscription(
        &self,
        session: &mut Session,
        chat: &ChatTarget,
        message_id: Option<i64>,
    ) {
        let user_id = session.user_id;
        let lang = session.language();
        let channel = &self.flow.subscription_channel;

        match self.transport.membership_status(channel, user_id).await {
            Ok(status) if status.is_subscribed() => {
                tracing::info!(user_id, channel = %channel, "Subscription confirmed");
                let text = locale::text(lang, keys::ASK_NICKNAME);
                self.replace_or_send(chat, message_id, &text, None).await;
                session.advance(ConversationState::GetHandle);
            }
            Ok(status) => {
                tracing::info!(user_id, channel = %channel, status = ?status, "Not subscribed");
                let text = locale::text(lang, keys::NOT_SUBSCRIBED);
                self.say(chat, &text, None).await;
                session.advance(ConversationState::CheckSub);
            }
            Err(e) => {
                tracing::error!(user_id, channel = %channel, error = %e, "Subscription check failed");
                self.operator
                    .notify(&format!(
                        "Error checking subscription for user {user_id}. Error: {e}"
                    ))
                    .await;
                let text = locale::text(lang, keys::SUBSCRIPTION_CHECK_FAILED);
                self.say(chat, &text, None).await;
                session.advance(ConversationState::CheckSub);
            }
        }
    }

    async fn on_handle(&self, session: &mut Session, chat: &ChatTarget, raw: &str) {
        let user_id = session.user_id;
        let lang = session.language();

        let Some(handle) = normalize_handle(raw) else {
            tracing::info!(user_id, "Rejected malformed handle");
            let text = locale::render(lang, keys::INVALID_NICKNAME, &[("nickname", raw.trim())]);
            self.say(chat, &text, None).await;
            return;
        };

        match self.directory.resolve(&handle).await {
            Ok(Lookup::Found(profile)) => {
                tracing::info!(
                    user_id,
                    handle = %handle,
                    stage = ?profile.parallel_name,
                    group = ?profile.class_name,
                    "Handle verified"
                );
                let text = locale::render(lang, keys::ASK_REAL_NAME, &[("nickname", handle.as_str())]);
                session.handle = Some(handle);
                session.cohort_stage = profile.parallel_name;
                session.cohort_group = profile.class_name;
                self.say(chat, &text, None).await;
                session.advance(ConversationState::GetRealName);
            }
            Ok(Lookup::NotFound) => {
                tracing::info!(user_id, handle = %handle, "Handle not in directory");
                let text = locale::render(lang, keys::INVALID_NICKNAME, &[("nickname", handle.as_str())]);
                self.say(chat, &text, None).await;
            }
            Err(e) => {
                tracing::warn!(user_id, handle = %handle, error = %e, "Directory lookup failed");
                self.operator
                    .notify(&format!(
                        "Directory lookup failed for user {user_id} (handle {handle}). Error: {e}"
                    ))
                    .await;
                let text = locale::text(lang, keys::DIRECTORY_UNAVAILABLE);
                self.say(chat, &text, None).await;
            }
        }
    }

    async fn on_real_name(&self, session: &mut Session, chat: &ChatTarget, raw: &str) {
        let user_id = session.user_id;
        let lang = session.language();
        let name = raw.trim();

        if name.is_empty() {
            let text = locale::text(lang, keys::EMPTY_REAL_NAME);
            self.say(chat, &text, None).await;
            return;
        }

        session.display_name = Some(name.to_string());
        let registration = session.to_registration();
        match self.store.insert(&registration).await {
            Ok(()) => {
                let done = locale::text(lang, keys::REGISTRATION_COMPLETE);
                self.say(chat, &done, None).await;
                let ask = locale::text(lang, keys::ASK_LOGO_STAGE);
                self.say(chat, &ask, Some(&category_menu(lang))).await;
                session.advance(ConversationState::ChooseProductCategory);
            }
            Err(DatabaseError::Constraint(reason)) => {
                tracing::warn!(user_id, reason = %reason, "Registration already exists");
                let text = locale::text(lang, keys::ALREADY_REGISTERED);
                self.say(chat, &text, None).await;
                session.advance(ConversationState::End);
            }
            Err(e) => {
                session.display_name = None;
                self.storage_failed(user_id, chat, lang, "insert", &e).await;
            }
        }
    }

    async fn on_category(
        &self,
        session: &mut Session,
        chat: &ChatTarget,
        category: Category,
        message_id: Option<i64>,
    ) {
        let lang = session.language();
        session.chosen_category = Some(category);
        tracing::info!(user_id = session.user_id, category = %category, "Logo category chosen");

        let menu = Keyboard::column(category.variants().iter().map(|variant| {
            Button::callback(*variant, format!("{}{variant}", payload::VARIANT_PREFIX))
        }));
        let text = locale::text(lang, keys::ASK_LOGO_TRIBE);
        self.replace_or_send(chat, message_id, &text, Some(&menu))
            .await;
        session.advance(ConversationState::ChooseProductVariant);
    }

    async fn on_variant(
        &self,
        session: &mut Session,
        chat: &ChatTarget,
        variant: &str,
        message_id: Option<i64>,
    ) {
        let user_id = session.user_id;
        let lang = session.language();

        match self.store.update_chosen_logo(user_id, variant).await {
            Ok(true) => {}
            Ok(false) => {
                let e = DatabaseError::NotFound {
                    entity: "registration".into(),
                    id: user_id.to_string(),
                };
                self.storage_failed(user_id, chat, lang, "update_chosen_logo", &e)
                    .await;
                return;
            }
            Err(e) => {
                self.storage_failed(user_id, chat, lang, "update_chosen_logo", &e)
                    .await;
                return;
            }
        }
        session.chosen_logo = Some(variant.to_string());
        tracing::info!(user_id, logo = variant, "Logo chosen");

        let registration = match self.store.get(user_id).await {
            Ok(Some(r)) => r,
            other => {
                tracing::warn!(user_id, result = ?other.err(), "Could not reload registration, summarizing from session");
                session.to_registration()
            }
        };
        let reports = self
            .orders
            .notify(&notifier::format_order_summary(&registration))
            .await;
        tracing::info!(
            user_id,
            delivered = reports.iter().filter(|r| r.delivered()).count(),
            destinations = reports.len(),
            "Order summary sent"
        );

        // Remove the variant buttons.
        if let Some(id) = message_id {
            let text = locale::text(lang, keys::ASK_LOGO_TRIBE);
            if let Err(e) = self.transport.edit_text(chat, id, &text, None).await {
                tracing::debug!(user_id, error = %e, "Failed to clear variant menu");
            }
        }

        let confirmation =
            locale::render(lang, keys::ORDER_COMPLETE, &[("chosen_logo", variant)]);
        self.photo_or_text(chat, &self.flow.variant_image(variant), &confirmation, None)
            .await;

        let promo_menu = Keyboard::new()
            .row(vec![Button::url(
                locale::text(lang, keys::CONTACT_ME_BUTTON),
                self.flow.contact_url.clone(),
            )])
            .row(vec![Button::callback(
                locale::text(lang, keys::GET_BONUS_BUTTON),
                payload::CLAIM_BONUS,
            )]);
        let advert = locale::text(lang, keys::ADVERTISEMENT);
        self.photo_or_text(chat, &self.flow.promo_image(), &advert, Some(&promo_menu))
            .await;

        session.advance(ConversationState::End);
    }

    // ── Bonus sticker ───────────────────────────────────────────────

    async fn on_claim_bonus(&self, event: &InboundEvent) {
        let user_id = event.user_id;
        match self.store.get(user_id).await {
            Ok(Some(reg)) if reg.bonus_claimed => {
                let text = locale::text(reg.language, keys::BONUS_ALREADY_CLAIMED);
                self.say(&event.chat, &text, None).await;
            }
            Ok(Some(reg)) => {
                self.lock_awaiting().insert(user_id);
                tracing::info!(user_id, "Awaiting bonus proof");
                let text = locale::text(reg.language, keys::BONUS_INSTRUCTIONS);
                self.say(&event.chat, &text, None).await;
            }
            Ok(None) => {
                let text = locale::text(Language::DEFAULT, keys::FALLBACK_MESSAGE);
                self.say(&event.chat, &text, None).await;
            }
            Err(e) => {
                self.storage_failed(user_id, &event.chat, Language::DEFAULT, "get", &e)
                    .await;
            }
        }
    }

    async fn on_bonus_proof(&self, event: &InboundEvent, file_id: &str) {
        let user_id = event.user_id;
        let reg = match self.store.get(user_id).await {
            Ok(Some(reg)) => reg,
            Ok(None) => {
                self.lock_awaiting().remove(&user_id);
                let text = locale::text(Language::DEFAULT, keys::FALLBACK_MESSAGE);
                self.say(&event.chat, &text, None).await;
                return;
            }
            Err(e) => {
                self.storage_failed(user_id, &event.chat, Language::DEFAULT, "get", &e)
                    .await;
                return;
            }
        };

        let reports = self
            .orders
            .notify_photo(file_id, &notifier::format_bonus_caption(&reg))
            .await;
        tracing::info!(
            user_id,
            delivered = reports.iter().filter(|r| r.delivered()).count(),
            "Bonus proof forwarded"
        );

        if let Err(e) = self.store.mark_bonus_claimed(user_id).await {
            tracing::error!(user_id, error = %e, "Failed to record bonus claim");
            self.operator
                .notify(&format!(
                    "Failed to record bonus claim for user {user_id}. Error: {e}"
                ))
                .await;
        }
        self.lock_awaiting().remove(&user_id);

        let text = locale::text(reg.language, keys::BONUS_CONFIRMATION);
        self.say(&event.chat, &text, None).await;
    }

    // ── Administrative reset ────────────────────────────────────────

    async fn reset(&self, event: &InboundEvent) {
        let user_id = event.user_id;
        if user_id != self.flow.operator_id {
            tracing::warn!(user_id, "Reset attempted without permission");
            return;
        }

        if let Err(e) = self.store.delete(user_id).await {
            self.storage_failed(user_id, &event.chat, Language::DEFAULT, "delete", &e)
                .await;
            return;
        }
        self.take_session(user_id);
        self.lock_awaiting().remove(&user_id);

        tracing::info!(user_id, "Operator reset their registration");
        let text = locale::text(Language::DEFAULT, keys::RESET_DONE);
        self.say(&event.chat, &text, None).await;
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Fallback for a user without a session, in their stored language.
    async fn fallback_for_profile(&self, event: &InboundEvent) {
        let lang = match self.store.get(event.user_id).await {
            Ok(Some(reg)) => reg.language,
            _ => Language::DEFAULT,
        };
        tracing::debug!(user_id = event.user_id, kind = event.kind.label(), "No session, sending fallback");
        let text = locale::text(lang, keys::FALLBACK_MESSAGE);
        self.say(&event.chat, &text, None).await;
    }

    async fn storage_failed(
        &self,
        user_id: UserId,
        chat: &ChatTarget,
        lang: Language,
        operation: &str,
        error: &DatabaseError,
    ) {
        tracing::error!(user_id, operation, error = %error, "Storage operation failed");
        self.operator
            .notify(&format!(
                "Storage error ({operation}) for user {user_id}. Error: {error}"
            ))
            .await;
        let text = locale::text(lang, keys::STORAGE_UNAVAILABLE);
        self.say(chat, &text, None).await;
    }

    fn subscribe_menu(&self, lang: Language) -> Keyboard {
        let mut menu = Keyboard::new();
        if let Some(link) = self.flow.subscription_link() {
            menu = menu.row(vec![Button::url(
                locale::text(lang, keys::CHANNEL_BUTTON),
                link,
            )]);
        }
        menu.row(vec![Button::callback(
            locale::text(lang, keys::CONFIRM_BUTTON),
            payload::CONFIRM_SUBSCRIPTION,
        )])
    }

    /// Send a message; failures are logged only.
    async fn say(&self, chat: &ChatTarget, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.transport.send_text(chat, text, keyboard).await {
            tracing::warn!(chat = %chat, error = %e, "Failed to send message");
        }
    }

    /// Edit the message carrying the pressed button, or send a new one when
    /// it is unknown or cannot be edited.
    async fn replace_or_send(
        &self,
        chat: &ChatTarget,
        message_id: Option<i64>,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) {
        if let Some(id) = message_id {
            match self.transport.edit_text(chat, id, text, keyboard).await {
                Ok(()) => return,
                Err(e) => tracing::debug!(chat = %chat, error = %e, "Edit failed, sending instead"),
            }
        }
        self.say(chat, text, keyboard).await;
    }

    /// Send a local image with caption, falling back to the caption as text.
    async fn photo_or_text(
        &self,
        chat: &ChatTarget,
        path: &Path,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) {
        let photo = PhotoSource::Path(path.to_path_buf());
        match self.transport.send_photo(chat, &photo, caption, keyboard).await {
            Ok(()) => return,
            Err(ChannelError::MediaNotFound(p)) => {
                tracing::error!(path = %p, "Image not found, sending text instead");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Image send failed, sending text instead");
            }
        }
        self.say(chat, caption, keyboard).await;
    }

    fn take_session(&self, user_id: UserId) -> Option<Session> {
        self.lock_sessions().remove(&user_id)
    }

    fn put_session(&self, session: Session) {
        self.lock_sessions().insert(session.user_id, session);
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_awaiting(&self) -> std::sync::MutexGuard<'_, HashSet<UserId>> {
        self.awaiting_proof
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn category_menu(lang: Language) -> Keyboard {
    Keyboard::new().row(
        Category::ALL
            .iter()
            .map(|c| {
                Button::callback(
                    locale::text(lang, c.button_key()),
                    CallbackAction::Category(*c).to_payload(),
                )
            })
            .collect(),
    )
}
