//! The credential store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use vox_core::GroupName;
use vox_core::logging::redact;

use crate::errors::Result;

/// A stored worker credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Group the key was issued for.
    pub group: GroupName,
    /// Inactive keys fail validation.
    pub is_active: bool,
    /// Issuance time.
    pub created_at: DateTime<Utc>,
}

/// Backing store for worker API keys.
///
/// Implementations may be slow or remote; callers must not hold locks across
/// these calls.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the record for `key`, if any.
    async fn lookup(&self, key: &str) -> Result<Option<CredentialRecord>>;

    /// Store a new active record. Fails with
    /// [`AuthError::DuplicateKey`](crate::AuthError::DuplicateKey) if `key`
    /// already exists.
    async fn issue(&self, key: &str, group: GroupName) -> Result<()>;

    /// Mark `key` inactive. Returns `false` if no such key exists.
    async fn revoke(&self, key: &str) -> Result<bool>;

    /// Fail-closed credential check.
    ///
    /// `true` only when a record exists, its group equals `group`, and it is
    /// active. Store errors resolve to `false`.
    async fn validate(&self, key: &str, group: GroupName) -> bool {
        match self.lookup(key).await {
            Ok(Some(record)) if record.group != group => {
                warn!(
                    key = %redact(key),
                    claimed = %group,
                    actual = %record.group,
                    "credential group mismatch"
                );
                false
            }
            Ok(Some(record)) if !record.is_active => {
                warn!(key = %redact(key), %group, "credential is inactive");
                false
            }
            Ok(Some(_)) => {
                debug!(key = %redact(key), %group, "credential accepted");
                true
            }
            Ok(None) => {
                warn!(key = %redact(key), %group, "credential not found");
                false
            }
            Err(e) => {
                warn!(error = %e, %group, "credential lookup failed");
                false
            }
        }
    }
}
