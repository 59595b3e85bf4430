//! In-process credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use vox_core::GroupName;

use crate::errors::{AuthError, Result};
use crate::keys::hash_key;
use crate::store::{CredentialRecord, CredentialStore};

/// Credential store kept in memory, keyed by key hash.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, key: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.records.read().get(&hash_key(key)).cloned())
    }

    async fn issue(&self, key: &str, group: GroupName) -> Result<()> {
        let mut records = self.records.write();
        let hash = hash_key(key);
        if records.contains_key(&hash) {
            return Err(AuthError::DuplicateKey);
        }
        let _ = records.insert(
            hash,
            CredentialRecord {
                group,
                is_active: true,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn revoke(&self, key: &str) -> Result<bool> {
        let mut records = self.records.write();
        match records.get_mut(&hash_key(key)) {
            Some(record) => {
                record.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
