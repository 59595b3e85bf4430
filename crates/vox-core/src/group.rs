//! Worker capability groups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::InvalidGroup;

/// Capability group a worker connection can claim.
///
/// The set is closed: adding a group is a code change, not a runtime one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupName {
    /// Whisper-family transcription engines.
    Whisper,
    /// wav2vec-family transcription engines.
    Wave2vec,
    /// Audit sink that receives a copy of every admitted request.
    Store,
}

impl GroupName {
    /// Every group, in registry slot order.
    pub const ALL: [Self; 3] = [Self::Whisper, Self::Wave2vec, Self::Store];

    /// Wire name of the group.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Whisper => "whisper",
            Self::Wave2vec => "wave2vec",
            Self::Store => "store",
        }
    }

    /// Dense index used for fixed-size slot tables.
    pub fn index(self) -> usize {
        match self {
            Self::Whisper => 0,
            Self::Wave2vec => 1,
            Self::Store => 2,
        }
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupName {
    type Err = InvalidGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whisper" => Ok(Self::Whisper),
            "wave2vec" => Ok(Self::Wave2vec),
            "store" => Ok(Self::Store),
            other => Err(InvalidGroup(other.to_owned())),
        }
    }
}

impl TryFrom<String> for GroupName {
    type Error = InvalidGroup;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupName> for String {
    fn from(group: GroupName) -> Self {
        group.as_str().to_owned()
    }
}
