//! In-memory store for testing and ephemeral runs

use async_trait::async_trait;
use reecho_domain::{
    CredentialStore, Credentials, CriteriaStore, Criterion, PostId, StoreError, WatermarkStore,
};
use std::collections::HashMap;
use std::sync::RwLock;

struct AccountRecord {
    credentials: Credentials,
    watermark: Option<PostId>,
}

/// In-memory implementation of the three store ports
pub struct InMemoryStore {
    accounts: RwLock<HashMap<String, AccountRecord>>,
    criteria: RwLock<HashMap<String, Criterion>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            criteria: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn credentials(&self, handle: &str) -> Result<Credentials, StoreError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        accounts
            .get(handle)
            .map(|r| r.credentials.clone())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    async fn add_account(&self, handle: &str, credentials: Credentials) -> Result<(), StoreError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        // Re-authorization replaces credentials but keeps the watermark.
        match accounts.get_mut(handle) {
            Some(record) => record.credentials = credentials,
            None => {
                accounts.insert(
                    handle.to_string(),
                    AccountRecord {
                        credentials,
                        watermark: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<String>, StoreError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let mut handles: Vec<String> = accounts.keys().cloned().collect();
        handles.sort();
        Ok(handles)
    }
}

#[async_trait]
impl WatermarkStore for InMemoryStore {
    async fn watermark(&self, handle: &str) -> Result<Option<PostId>, StoreError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        accounts
            .get(handle)
            .map(|r| r.watermark)
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    async fn set_watermark(&self, handle: &str, id: PostId) -> Result<(), StoreError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        match accounts.get_mut(handle) {
            Some(record) => {
                record.watermark = Some(id);
                Ok(())
            }
            None => Err(StoreError::NotFound(handle.to_string())),
        }
    }
}

#[async_trait]
impl CriteriaStore for InMemoryStore {
    async fn list_all(&self) -> Result<Vec<Criterion>, StoreError> {
        let criteria = self
            .criteria
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let mut all: Vec<Criterion> = criteria.values().cloned().collect();
        all.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(all)
    }

    async fn get(&self, handle: &str) -> Result<Option<Criterion>, StoreError> {
        let criteria = self
            .criteria
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(criteria.get(handle).cloned())
    }

    async fn upsert(&self, criterion: &Criterion) -> Result<(), StoreError> {
        let mut criteria = self
            .criteria
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        criteria.insert(criterion.handle.clone(), criterion.clone());
        Ok(())
    }

    async fn delete(&self, handle: &str) -> Result<(), StoreError> {
        let mut criteria = self
            .criteria
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        criteria.remove(handle);
        Ok(())
    }
}
