//! Transport wire model.
//!
//! The engine subscribes to and publishes the same event shapes. Envelopes
//! carry the originating session so self-echoes can be short-circuited.

use serde::{Deserialize, Serialize};

use crate::node::NodeRecord;
use crate::tree::Edge;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEvent {
    NodeCreated {
        node: NodeRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edge: Option<Edge>,
    },
    NodeUpdated {
        node: NodeRecord,
    },
    NodeBatchUpdated {
        nodes: Vec<NodeRecord>,
    },
    NodeDeleted {
        node_ids: Vec<String>,
    },
    NodeReparented {
        node_id: String,
        edge: Edge,
        order: f64,
    },
}

impl RemoteEvent {
    /// The primary node id the event is keyed on, where there is a single one.
    pub fn primary_id(&self) -> Option<&str> {
        match self {
            RemoteEvent::NodeCreated { node, .. } | RemoteEvent::NodeUpdated { node } => {
                Some(node.id.as_str())
            }
            RemoteEvent::NodeReparented { node_id, .. } => Some(node_id.as_str()),
            RemoteEvent::NodeBatchUpdated { .. } | RemoteEvent::NodeDeleted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEnvelope {
    pub entity_id: String,
    pub origin_session_id: String,
    #[serde(flatten)]
    pub event: RemoteEvent,
}

impl RemoteEnvelope {
    pub fn new(
        entity_id: impl Into<String>,
        origin_session_id: impl Into<String>,
        event: RemoteEvent,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            origin_session_id: origin_session_id.into(),
            event,
        }
    }
}
