//! `ProfileStore` trait: async interface for registration persistence.

use async_trait::async_trait;

use crate::channels::UserId;
use crate::error::DatabaseError;
use crate::store::model::Registration;

/// Backend-agnostic storage for persisted registrations.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Whether a registration exists for this user.
    async fn exists(&self, user_id: UserId) -> Result<bool, DatabaseError>;

    /// Insert a new registration. An existing `user_id` is rejected with
    /// [`DatabaseError::Constraint`] and the stored row is left untouched.
    async fn insert(&self, registration: &Registration) -> Result<(), DatabaseError>;

    /// Fetch a registration.
    async fn get(&self, user_id: UserId) -> Result<Option<Registration>, DatabaseError>;

    /// Record the chosen logo. Returns `false` if no row matched.
    async fn update_chosen_logo(&self, user_id: UserId, logo: &str)
    -> Result<bool, DatabaseError>;

    /// Set the bonus flag. Returns `false` if no row matched.
    async fn mark_bonus_claimed(&self, user_id: UserId) -> Result<bool, DatabaseError>;

    /// Delete a registration. Returns `false` if there was none.
    async fn delete(&self, user_id: UserId) -> Result<bool, DatabaseError>;

    /// Number of stored registrations.
    async fn count(&self) -> Result<u64, DatabaseError>;
}
