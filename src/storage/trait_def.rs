use crate::analytics::models::RedirectEvent;
use crate::analytics::storage::{RedirectCount, StoredRedirect, UserViewName};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redirect event has no creator")]
    MissingCreator,
    #[error("identifier {0} does not fit in a BIGINT column")]
    IdOutOfRange(u64),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Convert an unsigned identifier to the signed column type
pub fn db_id(id: u64) -> StoreResult<i64> {
    i64::try_from(id).map_err(|_| StoreError::IdOutOfRange(id))
}

/// Append-only store for redirect events and the per-user views over it
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Initialize the storage (create table and indexes)
    async fn init(&self) -> Result<()>;

    /// Persist one redirect event
    async fn insert_redirect(&self, event: &RedirectEvent) -> StoreResult<()>;

    /// Create the view for `user_id`, atomically replacing any existing definition.
    ///
    /// Schema-mutating; callers must go through [`crate::analytics::ViewGate`].
    async fn replace_user_view(&self, view: &UserViewName, user_id: u64) -> StoreResult<()>;

    /// Count events per short URL over a user view
    async fn count_by_short_url(&self, view: &UserViewName) -> StoreResult<Vec<RedirectCount>>;

    /// Most recent raw events for one creator, newest first
    async fn recent_redirects(&self, creator_id: u64, limit: u32)
        -> StoreResult<Vec<StoredRedirect>>;
}
