//! Persisted registration record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::UserId;
use crate::locale::Language;

/// One completed registration, keyed by `user_id`.
///
/// Created once when the user submits their real name; afterwards only the
/// logo choice and the bonus flag change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub user_id: UserId,
    /// Platform username, without the `@`.
    pub platform_username: Option<String>,
    pub language: Language,
    /// Verified directory login.
    pub handle: String,
    /// Directory `parallelName`.
    pub cohort_stage: Option<String>,
    /// Directory `className`.
    pub cohort_group: Option<String>,
    /// Name given for sticker pickup. Absent on rows written before the
    /// column existed.
    pub display_name: Option<String>,
    pub chosen_logo: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub bonus_claimed: bool,
}

impl Registration {
    /// A fresh record stamped with the current time.
    pub fn new(user_id: UserId, language: Language, handle: impl Into<String>) -> Self {
        Self {
            user_id,
            platform_username: None,
            language,
            handle: handle.into(),
            cohort_stage: None,
            cohort_group: None,
            display_name: None,
            chosen_logo: None,
            registered_at: Utc::now(),
            bonus_claimed: false,
        }
    }
}
