//! Data access for the single user table.

pub mod dynamo;
pub mod item;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use ulid::Ulid;

use crate::keys::AlternateKey;
use crate::types::{NewUser, User};

pub use dynamo::DynamoDbStore;
pub use item::UserUpdate;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("no user found with given {key}: {value}")]
    NoMatch { key: AlternateKey, value: String },
    #[error("user already exists: {0}")]
    AlreadyExists(String),
    #[error("cannot delete data in stage {0}")]
    ProtectedStage(String),
    #[error("refusing to wipe with an empty email filter")]
    EmptyWipeFilter,
    #[error("malformed user item: {0}")]
    Corrupt(String),
    #[error("dynamodb request failed: {0}")]
    Dynamo(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound | StoreError::NoMatch { .. })
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact primary-key lookup.
    async fn get_user(&self, user_id: &str) -> Result<User, StoreError>;

    /// First user on the alternate index whose sort key carries the `USER#` prefix.
    async fn get_user_by(&self, key: AlternateKey, value: &str) -> Result<User, StoreError>;

    /// Assigns id and timestamps and writes the item only if its primary key is free.
    /// Username and email uniqueness are the caller's responsibility.
    async fn create_user(&self, user: NewUser) -> Result<String, StoreError>;

    /// Replaces every whitelisted field of an existing user with `update`, removing
    /// the ones it leaves unset. `NotFound` when there is no such user.
    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<(), StoreError>;

    /// Idempotent.
    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError>;

    /// Deletes every user whose email contains `email_filter`. Returns the number
    /// removed. Refused on protected stages and for a blank filter.
    async fn wipe(&self, email_filter: &str) -> Result<usize, StoreError>;
}

/// Fresh identity for a new user: a ULID and matching created/updated dates.
pub(crate) fn assign_identity(user: NewUser) -> User {
    user.into_user(Ulid::new().to_string(), Utc::now())
}

pub(crate) fn ensure_wipe_allowed(
    config: &crate::config::Config,
    email_filter: &str,
) -> Result<(), StoreError> {
    if config.is_protected_stage() {
        tracing::error!(stage = %config.stage, "Refusing to wipe user data");
        return Err(StoreError::ProtectedStage(config.stage.clone()));
    }
    // every email contains the empty string
    if email_filter.trim().is_empty() {
        tracing::error!("Refusing to wipe user data without a filter");
        return Err(StoreError::EmptyWipeFilter);
    }
    Ok(())
}
