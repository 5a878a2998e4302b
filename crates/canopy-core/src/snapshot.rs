//! Persisted node shape.
//!
//! What the persistence collaborator stores per node: the content/order data
//! bag plus the last laid-out position. Edges persist as their own records.

use serde::{Deserialize, Serialize};

use crate::geom::Point;
use crate::node::Node;
use crate::tree::Edge;

/// The persisted edge record has the same shape as the in-memory edge.
pub type EdgeSnapshot = Edge;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshotData {
    pub label: String,
    pub parent_id: String,
    pub order: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub data: NodeSnapshotData,
    pub position: SnapshotPosition,
}

impl NodeSnapshot {
    pub fn from_node(node: &Node, order: f64, position: Option<Point>) -> Self {
        let position = position.unwrap_or_default();
        Self {
            id: node.id.clone(),
            data: NodeSnapshotData {
                label: node.content.label.html.clone(),
                parent_id: node.parent_id.clone(),
                order,
                completed: node.badges.completed.then_some(true),
                highlight: node.badges.highlight.then_some(true),
                task_link: node.badges.task_link.clone(),
            },
            position: SnapshotPosition {
                x: position.x,
                y: position.y,
            },
        }
    }
}
