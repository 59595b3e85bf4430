//! Language-based dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use vox_core::{ConnId, GroupName, LanguageTag};

use crate::connections::ConnectionTable;
use crate::protocol::OutboundEvent;
use crate::registry::WorkerRegistry;
use crate::telemetry;

/// Fixed mapping from language tag to transcription group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: HashMap<String, GroupName>,
}

impl RoutingTable {
    /// The stock language set.
    pub fn standard() -> Self {
        [
            ("english-only", GroupName::Wave2vec),
            ("malay-only", GroupName::Whisper),
            ("malay-english", GroupName::Whisper),
        ]
        .into_iter()
        .map(|(language, group)| (language.to_owned(), group))
        .collect()
    }

    /// Transcription group for `language`. Matching is exact.
    pub fn resolve(&self, language: &LanguageTag) -> Option<GroupName> {
        self.entries.get(language.as_str()).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, GroupName)> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = (String, GroupName)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An admitted, well-formed producer request.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// PCM samples.
    pub payload: Vec<f32>,
    /// Declared language.
    pub language: LanguageTag,
    /// Producer that submitted it.
    pub origin: ConnId,
}

/// Result of [`Router::route`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to the group holder.
    Dispatched {
        /// Transcription group.
        group: GroupName,
        /// Connection that received the request.
        holder: ConnId,
        /// Whether a copy reached the `store` holder.
        mirrored: bool,
    },
    /// No group is configured for the language.
    UnsupportedLanguage,
    /// The group has no holder, or the holder could not take the request.
    ServiceUnavailable {
        /// Transcription group.
        group: GroupName,
    },
}

/// Dispatches requests to group holders.
pub struct Router {
    table: RoutingTable,
}

impl Router {
    /// Create a router over a fixed table.
    pub fn new(table: RoutingTable) -> Self {
        Self { table }
    }

    /// Route one request.
    ///
    /// A copy always goes to the `store` holder when one is bound; that copy
    /// never affects the outcome. The outbound frame is serialized once and
    /// shared by both recipients.
    pub async fn route(
        &self,
        request: &Request,
        registry: &WorkerRegistry,
        connections: &ConnectionTable,
    ) -> DispatchOutcome {
        let resolved = self.table.resolve(&request.language);
        let event = OutboundEvent::AudioToWorker {
            audio_float32: &request.payload,
            origin_conn_id: &request.origin,
            language: &request.language,
        };
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn_id = %request.origin, error = %e, "failed to serialize request");
                return resolved.map_or(DispatchOutcome::UnsupportedLanguage, |group| {
                    DispatchOutcome::ServiceUnavailable { group }
                });
            }
        };

        let mirrored = Self::mirror(&frame, registry, connections).await;

        let Some(group) = resolved else {
            debug!(conn_id = %request.origin, language = %request.language, "no route for language");
            return DispatchOutcome::UnsupportedLanguage;
        };
        let Some(holder) = registry.holder_of(group) else {
            debug!(conn_id = %request.origin, %group, "no worker bound");
            return DispatchOutcome::ServiceUnavailable { group };
        };
        let sent = match connections.get(&holder).await {
            Some(conn) => conn.send(Arc::clone(&frame)),
            None => false,
        };
        if !sent {
            warn!(conn_id = %request.origin, %group, holder = %holder, "worker could not accept request");
            return DispatchOutcome::ServiceUnavailable { group };
        }

        metrics::counter!(telemetry::DISPATCHES_TOTAL, "group" => group.as_str()).increment(1);
        debug!(
            conn_id = %request.origin,
            language = %request.language,
            %group,
            holder = %holder,
            mirrored,
            "request dispatched"
        );
        DispatchOutcome::Dispatched {
            group,
            holder,
            mirrored,
        }
    }

    async fn mirror(
        frame: &Arc<String>,
        registry: &WorkerRegistry,
        connections: &ConnectionTable,
    ) -> bool {
        let Some(holder) = registry.holder_of(GroupName::Store) else {
            return false;
        };
        let Some(conn) = connections.get(&holder).await else {
            return false;
        };
        let sent = conn.send(Arc::clone(frame));
        if sent {
            metrics::counter!(telemetry::STORE_MIRRORS_TOTAL).increment(1);
        } else {
            debug!(holder = %holder, "store worker could not accept copy");
        }
        sent
    }
}
