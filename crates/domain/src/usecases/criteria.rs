//! Criterion save/clear use case
//!
//! Validation happens here, synchronously at save time: an update with
//! both fields empty clears the criterion, a half-empty or unparseable
//! one is rejected, and the collector only ever sees stored criteria
//! that passed this gate.

use std::sync::Arc;

use thiserror::Error;

use crate::matcher::Matcher;
use crate::model::Criterion;
use crate::ports::{CriteriaStore, StoreError};

/// Save-time validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("term must not be empty")]
    EmptyTerm,
    #[error("list id must not be empty")]
    EmptyListId,
    #[error("invalid match pattern: {0}")]
    InvalidPattern(String),
}

/// A validated criterion update: either a new active criterion or a
/// request to clear the existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriterionUpdate {
    Set(Criterion),
    Clear,
}

impl CriterionUpdate {
    /// Validate raw form input. Both fields empty means "clear"; exactly
    /// one empty is an error; a term that does not compile is an error.
    pub fn parse(handle: &str, term: &str, list_id: &str) -> Result<Self, ConfigError> {
        let term = term.trim();
        let list_id = list_id.trim();

        match (term.is_empty(), list_id.is_empty()) {
            (true, true) => Ok(Self::Clear),
            (true, false) => Err(ConfigError::EmptyTerm),
            (false, true) => Err(ConfigError::EmptyListId),
            (false, false) => {
                Matcher::new(term).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
                Ok(Self::Set(Criterion {
                    handle: handle.to_string(),
                    term: term.to_string(),
                    list_id: list_id.to_string(),
                }))
            }
        }
    }
}

/// Errors from the criteria service
#[derive(Debug, Error)]
pub enum CriteriaError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a save call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Criterion),
    Cleared,
}

/// Store-backed criterion management
pub struct CriteriaService<S: CriteriaStore + ?Sized> {
    store: Arc<S>,
}

impl<S: CriteriaStore + ?Sized> CriteriaService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and apply a criterion update.
    pub async fn save(
        &self,
        handle: &str,
        term: &str,
        list_id: &str,
    ) -> Result<SaveOutcome, CriteriaError> {
        match CriterionUpdate::parse(handle, term, list_id)? {
            CriterionUpdate::Set(criterion) => {
                self.store.upsert(&criterion).await?;
                tracing::info!(handle = %handle, term = %criterion.term, list_id = %criterion.list_id, "Saved criterion");
                Ok(SaveOutcome::Saved(criterion))
            }
            CriterionUpdate::Clear => {
                self.store.delete(handle).await?;
                tracing::info!(handle = %handle, "Cleared criterion");
                Ok(SaveOutcome::Cleared)
            }
        }
    }

    pub async fn clear(&self, handle: &str) -> Result<(), StoreError> {
        self.store.delete(handle).await
    }

    pub async fn show(&self, handle: &str) -> Result<Option<Criterion>, StoreError> {
        self.store.get(handle).await
    }

    pub async fn list(&self) -> Result<Vec<Criterion>, StoreError> {
        self.store.list_all().await
    }
}
