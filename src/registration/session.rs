//! Transient per-user registration session.

use chrono::Utc;

use crate::channels::UserId;
use crate::locale::{Category, Language};
use crate::registration::state::ConversationState;
use crate::store::Registration;

/// In-progress registration for one user. Lives only in memory; discarded
/// when the flow ends, goes off track, or is reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub state: ConversationState,
    pub platform_username: Option<String>,
    /// Unset until the language step completes.
    pub language: Option<Language>,
    pub handle: Option<String>,
    pub cohort_stage: Option<String>,
    pub cohort_group: Option<String>,
    pub display_name: Option<String>,
    pub chosen_category: Option<Category>,
    pub chosen_logo: Option<String>,
}

impl Session {
    pub fn new(user_id: UserId, platform_username: Option<String>) -> Self {
        Self {
            user_id,
            state: ConversationState::SelectLang,
            platform_username,
            language: None,
            handle: None,
            cohort_stage: None,
            cohort_group: None,
            display_name: None,
            chosen_category: None,
            chosen_logo: None,
        }
    }

    /// Language for replies; the default until the user picks one.
    pub fn language(&self) -> Language {
        self.language.unwrap_or_default()
    }

    /// Move to `next`. Invalid jumps are logged and applied anyway so the
    /// state always reflects what was last sent to the user.
    pub fn advance(&mut self, next: ConversationState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                user_id = self.user_id,
                from = %self.state,
                to = %next,
                "Unexpected state transition"
            );
        }
        if self.state != next {
            tracing::debug!(user_id = self.user_id, from = %self.state, to = %next, "Transition");
        }
        self.state = next;
    }

    /// Record to persist when the real-name step completes.
    pub fn to_registration(&self) -> Registration {
        Registration {
            user_id: self.user_id,
            platform_username: self.platform_username.clone(),
            language: self.language(),
            handle: self.handle.clone().unwrap_or_default(),
            cohort_stage: self.cohort_stage.clone(),
            cohort_group: self.cohort_group.clone(),
            display_name: self.display_name.clone(),
            chosen_logo: self.chosen_logo.clone(),
            registered_at: Utc::now(),
            bonus_claimed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_language_step() {
        let session = Session::new(1, Some("ivan".into()));
        assert_eq!(session.state, ConversationState::SelectLang);
        assert_eq!(session.language(), Language::En);
    }

    #[test]
    fn to_registration_copies_fields() {
        let mut session = Session::new(1, Some("ivan".into()));
        session.language = Some(Language::Ru);
        session.handle = Some("ivanov".into());
        session.cohort_stage = Some("Core program".into());
        session.cohort_group = Some("Dragons".into());
        session.display_name = Some("Ivan".into());

        let reg = session.to_registration();
        assert_eq!(reg.user_id, 1);
        assert_eq!(reg.language, Language::Ru);
        assert_eq!(reg.handle, "ivanov");
        assert_eq!(reg.cohort_group.as_deref(), Some("Dragons"));
        assert_eq!(reg.display_name.as_deref(), Some("Ivan"));
        assert_eq!(reg.chosen_logo, None);
        assert!(!reg.bonus_claimed);
    }

    #[test]
    fn advance_applies_target() {
        let mut session = Session::new(1, None);
        session.advance(ConversationState::CheckSub);
        session.advance(ConversationState::CheckSub);
        assert_eq!(session.state, ConversationState::CheckSub);
        session.advance(ConversationState::End);
        assert!(session.state.is_terminal());
    }
}
