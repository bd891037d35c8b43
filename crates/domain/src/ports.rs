//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external
//! systems. Adapters implement them to connect to real infrastructure.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::model::{Credentials, Criterion, Post, PostId};

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("account not registered: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Port for per-account credential lookup and registration
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the stored credentials for an account
    async fn credentials(&self, handle: &str) -> Result<Credentials, StoreError>;

    /// Register an account (or replace its credentials on re-authorization)
    async fn add_account(&self, handle: &str, credentials: Credentials) -> Result<(), StoreError>;

    /// List all registered account handles
    async fn list_accounts(&self) -> Result<Vec<String>, StoreError>;
}

/// Port for per-account criterion storage
#[async_trait]
pub trait CriteriaStore: Send + Sync {
    /// All stored criteria, one per account at most
    async fn list_all(&self) -> Result<Vec<Criterion>, StoreError>;

    /// The criterion for one account, if active
    async fn get(&self, handle: &str) -> Result<Option<Criterion>, StoreError>;

    /// Insert or replace an account's criterion
    async fn upsert(&self, criterion: &Criterion) -> Result<(), StoreError>;

    /// Remove an account's criterion; removing an absent one is a no-op
    async fn delete(&self, handle: &str) -> Result<(), StoreError>;
}

/// Port for the per-account collection watermark
///
/// `None` means the account has never completed a cycle, which is what
/// triggers the first-run backfill guard.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Highest post id already processed for the account
    async fn watermark(&self, handle: &str) -> Result<Option<PostId>, StoreError>;

    /// Persist an advanced watermark
    async fn set_watermark(&self, handle: &str, id: PostId) -> Result<(), StoreError>;
}

/// Error type for timeline reads
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
}

/// A lazy, finite sequence of posts in source recency order.
///
/// Pages are fetched as the stream is polled; the order is NOT guaranteed
/// ascending by id.
pub type PostStream = BoxStream<'static, Result<Post, TimelineError>>;

/// Port for reading a list timeline and the account's reshare history
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Fetch posts for (handle, list_id) with an exclusive lower bound of
    /// `since_id` (`None` = the source's minimum).
    async fn fetch(
        &self,
        credentials: &Credentials,
        handle: &str,
        list_id: &str,
        since_id: Option<PostId>,
    ) -> Result<PostStream, TimelineError>;

    /// Post ids the account has already reshared. Used only by the
    /// first-run backfill guard.
    async fn reshare_history(
        &self,
        credentials: &Credentials,
        handle: &str,
    ) -> Result<HashSet<PostId>, TimelineError>;
}

/// Error type for reshare writes
#[derive(Debug, Error)]
pub enum ReshareError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited")]
    RateLimited,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Port for issuing the reshare action
///
/// Implementations must treat resharing an already-reshared id as a
/// harmless no-op, not an error; the collector relies on this for its
/// at-least-once retry behavior.
#[async_trait]
pub trait Resharer: Send + Sync {
    async fn reshare(
        &self,
        credentials: &Credentials,
        handle: &str,
        post_id: PostId,
    ) -> Result<(), ReshareError>;
}
