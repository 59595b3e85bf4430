//! Wire protocol.
//!
//! Every frame is a JSON text envelope `{"event": <name>, "data": <object>}`.
//! Inbound frames are parsed into [`InboundEvent`]; outbound frames are
//! produced from [`OutboundEvent`], which borrows its fields so a payload is
//! serialized once no matter how many connections receive it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use vox_core::{ConnId, GroupName, LanguageTag};

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Names of the inbound events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// `identify_worker`
    IdentifyWorker,
    /// `audio_request`
    AudioRequest,
    /// `worker_result`
    WorkerResult,
    /// `worker_error`
    WorkerError,
}

impl EventKind {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentifyWorker => "identify_worker",
            Self::AudioRequest => "audio_request",
            Self::WorkerResult => "worker_result",
            Self::WorkerError => "worker_error",
        }
    }

    fn from_wire(name: &str) -> Option<Self> {
        match name {
            "identify_worker" => Some(Self::IdentifyWorker),
            "audio_request" => Some(Self::AudioRequest),
            "worker_result" => Some(Self::WorkerResult),
            "worker_error" => Some(Self::WorkerError),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker claiming a group slot.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IdentifyWorker {
    /// Opaque API key.
    pub key: String,
    /// Claimed group name, parsed later so an unknown name can be reported.
    pub group: String,
}

/// A producer submitting audio.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioRequest {
    /// PCM samples.
    pub audio_float32: Vec<f32>,
    /// Declared language tag.
    pub language: String,
}

/// A worker returning a transcript for a producer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    /// Recognized text.
    pub transcript: String,
    /// Producer the request came from.
    pub target_conn_id: ConnId,
}

/// A worker reporting that it could not serve a request.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerError {
    /// Producer the request came from.
    pub target_conn_id: ConnId,
    /// Worker-side detail. Logged, never forwarded.
    #[serde(default)]
    pub error: Option<String>,
}

/// A parsed inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// `identify_worker`
    IdentifyWorker(IdentifyWorker),
    /// `audio_request`
    AudioRequest(AudioRequest),
    /// `worker_result`
    WorkerResult(WorkerResult),
    /// `worker_error`
    WorkerError(WorkerError),
}

/// Frame-level parse failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not a JSON envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Envelope with an event name the broker does not handle.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Known event whose `data` does not match its shape.
    #[error("invalid {kind} payload: {source}")]
    InvalidData {
        /// Event that failed.
        kind: EventKind,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

impl InboundEvent {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let kind = EventKind::from_wire(&envelope.event)
            .ok_or_else(|| ProtocolError::UnknownEvent(envelope.event.clone()))?;
        let data = envelope.data;
        let invalid = |source| ProtocolError::InvalidData { kind, source };
        Ok(match kind {
            EventKind::IdentifyWorker => {
                Self::IdentifyWorker(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::AudioRequest => {
                Self::AudioRequest(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::WorkerResult => {
                Self::WorkerResult(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::WorkerError => {
                Self::WorkerError(serde_json::from_value(data).map_err(invalid)?)
            }
        })
    }
}

/// A frame the broker sends.
#[derive(Debug, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum OutboundEvent<'a> {
    /// Greeting carrying the connection's own id.
    Connected {
        /// Id assigned on accept.
        conn_id: &'a ConnId,
    },
    /// Transcript for a producer.
    TranscriptionResult {
        /// Recognized text.
        transcript: &'a str,
    },
    /// Error report for a producer.
    TranscriptionError {
        /// Human-readable reason.
        message: &'a str,
    },
    /// Request handed to a worker.
    AudioToWorker {
        /// PCM samples.
        audio_float32: &'a [f32],
        /// Producer that submitted the request.
        origin_conn_id: &'a ConnId,
        /// Declared language tag.
        language: &'a LanguageTag,
    },
    /// Acknowledgement of a successful `identify_worker`.
    WorkerIdentified {
        /// Group the worker now holds.
        group: GroupName,
    },
}

impl OutboundEvent<'_> {
    /// Serialize into a shareable text frame.
    pub fn to_frame(&self) -> Result<Arc<String>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::new)
    }
}
