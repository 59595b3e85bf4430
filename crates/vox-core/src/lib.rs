//! # vox-core
//!
//! Foundation types shared by every Vox relay crate:
//!
//! - [`ConnId`]: branded connection identifier
//! - [`GroupName`]: the closed set of worker capability groups
//! - [`LanguageTag`]: the language attribute producers attach to requests
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod group;
pub mod ids;
pub mod language;
pub mod logging;

pub use errors::InvalidGroup;
pub use group::GroupName;
pub use ids::ConnId;
pub use language::LanguageTag;
