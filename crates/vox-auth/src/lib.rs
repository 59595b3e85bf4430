//! # vox-auth
//!
//! Worker credentials: the store that maps an API key to a worker group and an
//! active flag, plus key minting.
//!
//! - [`CredentialStore`]: async trait with `lookup`, `issue`, `revoke` and the
//!   fail-closed [`CredentialStore::validate`] check the broker calls
//! - [`SqliteCredentialStore`]: r2d2-pooled `SQLite` implementation
//! - [`MemoryCredentialStore`]: in-process implementation for tests and demos
//! - [`keys`]: API key generation, hashing, constant-time comparison
//!
//! Keys are stored as SHA-256 digests; the plaintext exists only in the
//! issuance response.

#![deny(unsafe_code)]

pub mod errors;
pub mod keys;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use errors::{AuthError, Result};
pub use keys::{constant_time_eq, generate_api_key, hash_key};
pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;
pub use store::{CredentialRecord, CredentialStore};
