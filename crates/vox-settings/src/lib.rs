//! # vox-settings
//!
//! Configuration for the Vox relay, loaded in layers (lowest priority first):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.vox/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `VOX_*` overrides
//!
//! Command-line flags are applied on top by the binary. Everything here is
//! read once at startup; nothing is mutable at runtime.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{data_dir, deep_merge, load_settings_from_path, settings_path};
pub use types::*;
