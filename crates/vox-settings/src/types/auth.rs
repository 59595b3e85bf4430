//! Worker credential settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Credential store and admin issuance settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Credential database path (relative paths resolve under the data dir).
    pub db_path: String,
    /// Upper bound on one credential lookup; expiry counts as a failed check.
    pub validate_timeout_ms: u64,
    /// Shared secret for `POST /admin/keys`. Issuance is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
}

impl AuthSettings {
    /// Resolve [`Self::db_path`] against `data_dir`.
    pub fn resolved_db_path(&self, data_dir: &Path) -> PathBuf {
        let path = Path::new(&self.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            db_path: "credentials.db".to_string(),
            validate_timeout_ms: 5000,
            admin_secret: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_db_path_joins_data_dir() {
        let cfg = AuthSettings::default();
        let resolved = cfg.resolved_db_path(Path::new("/var/lib/vox"));
        assert_eq!(resolved, PathBuf::from("/var/lib/vox/credentials.db"));
    }

    #[test]
    fn absolute_db_path_kept() {
        let cfg = AuthSettings {
            db_path: "/srv/keys.db".into(),
            ..AuthSettings::default()
        };
        let resolved = cfg.resolved_db_path(Path::new("/var/lib/vox"));
        assert_eq!(resolved, PathBuf::from("/srv/keys.db"));
    }

    #[test]
    fn admin_secret_omitted_when_unset() {
        let json = serde_json::to_value(AuthSettings::default()).unwrap();
        assert!(json.get("adminSecret").is_none());
    }
}
