//! Collaborator boundaries.
//!
//! The transport and persistence services live outside this engine; the
//! session only talks to them through these traits. Both are fire-and-forget:
//! a slow or failing backend never blocks further edits, it only shows up in
//! the saving indicator.

use canopy_core::events::RemoteEnvelope;
use canopy_core::snapshot::{EdgeSnapshot, NodeSnapshot};

/// Bidirectional publish side of the realtime channel. Incoming events are
/// pushed by the host via [`crate::EditorSession::enqueue_remote`].
pub trait Transport {
    fn publish(&mut self, envelope: &RemoteEnvelope);
}

/// Request/response persistence API, seen from the engine as one-way calls.
pub trait Persistence {
    fn save(
        &mut self,
        entity_id: &str,
        node_id: &str,
        node: &NodeSnapshot,
        edge: Option<&EdgeSnapshot>,
    );

    fn delete(&mut self, entity_id: &str, node_ids: &[String]);
}

/// Discards everything. For hosts that wire publication elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn publish(&mut self, _envelope: &RemoteEnvelope) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn save(
        &mut self,
        _entity_id: &str,
        _node_id: &str,
        _node: &NodeSnapshot,
        _edge: Option<&EdgeSnapshot>,
    ) {
    }

    fn delete(&mut self, _entity_id: &str, _node_ids: &[String]) {}
}

/// Captures published envelopes for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    pub published: Vec<RemoteEnvelope>,
}

impl Transport for RecordingTransport {
    fn publish(&mut self, envelope: &RemoteEnvelope) {
        self.published.push(envelope.clone());
    }
}

/// Captures saves and deletes for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingPersistence {
    pub saves: Vec<(String, NodeSnapshot, Option<EdgeSnapshot>)>,
    pub deletes: Vec<(String, Vec<String>)>,
}

impl Persistence for RecordingPersistence {
    fn save(
        &mut self,
        entity_id: &str,
        _node_id: &str,
        node: &NodeSnapshot,
        edge: Option<&EdgeSnapshot>,
    ) {
        self.saves
            .push((entity_id.to_string(), node.clone(), edge.cloned()));
    }

    fn delete(&mut self, entity_id: &str, node_ids: &[String]) {
        self.deletes
            .push((entity_id.to_string(), node_ids.to_vec()));
    }
}
