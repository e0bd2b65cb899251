//! Identity directory: School 21 participant lookups.

pub mod client;
pub mod credential;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

pub use client::DirectoryClient;
pub use credential::{Clock, CredentialCache, SystemClock};

/// Logins are lowercase ASCII letters, digits and `_ . -`.
static HANDLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.\-]{1,64}$").expect("valid handle pattern"));

/// Trim and lowercase a submitted handle. Returns `None` when the result
/// cannot be a directory login, so no lookup is attempted.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim().to_lowercase();
    HANDLE_PATTERN.is_match(&handle).then_some(handle)
}

/// A participant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryProfile {
    pub login: String,
    /// Cohort stage.
    #[serde(default)]
    pub parallel_name: Option<String>,
    /// Cohort group.
    #[serde(default)]
    pub class_name: Option<String>,
}

/// Result of a successful lookup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(DirectoryProfile),
    NotFound,
}

/// Resolves handles against the identity directory.
///
/// `Err` means the directory could not answer; it is never used for a
/// handle that simply does not exist.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn resolve(&self, handle: &str) -> Result<Lookup, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_handle("  IvanOV \n").as_deref(), Some("ivanov"));
        assert_eq!(normalize_handle("a.b-c_9").as_deref(), Some("a.b-c_9"));
    }

    #[test]
    fn normalize_rejects_garbage() {
        for raw in ["", "   ", "ivan ov", "../admin", "иван", "a/b", "x?y=1"] {
            assert!(normalize_handle(raw).is_none(), "{raw:?}");
        }
        assert!(normalize_handle(&"a".repeat(65)).is_none());
    }

    #[test]
    fn profile_parses_camel_case() {
        let profile: DirectoryProfile = serde_json::from_str(
            r#"{"login":"ivanov","parallelName":"Core program","className":"Dragons","status":"ACTIVE"}"#,
        )
        .unwrap();
        assert_eq!(profile.login, "ivanov");
        assert_eq!(profile.parallel_name.as_deref(), Some("Core program"));
        assert_eq!(profile.class_name.as_deref(), Some("Dragons"));
    }

    #[test]
    fn profile_tolerates_missing_cohort() {
        let profile: DirectoryProfile = serde_json::from_str(r#"{"login":"x"}"#).unwrap();
        assert_eq!(profile.parallel_name, None);
    }
}
