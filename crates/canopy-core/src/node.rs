//! The node record and its wire form.

use serde::{Deserialize, Serialize};

use crate::content::NodeContent;

/// A measured node box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Component-wise maximum. Used to hold a node at its edit-time floor.
    pub fn max(self, other: Size) -> Size {
        Size {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// Small derived decorations carried alongside the content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBadges {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_link: Option<String>,
}

/// One element of the tree.
///
/// `size` is a derived cache: `None` means "needs measuring". `dirty` marks
/// accepted-but-unsaved local changes; it gates what a remote merge may
/// overwrite and what the persistence boundary still owes a save for.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    pub content: NodeContent,
    pub badges: NodeBadges,
    pub size: Option<Size>,
    pub collapsed: bool,
    pub dirty: bool,
}

impl Node {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, content: NodeContent) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            content,
            badges: NodeBadges::default(),
            size: None,
            collapsed: false,
            dirty: false,
        }
    }
}

/// The closed wire record exchanged over the transport.
///
/// Remote payloads are validated into this shape at the merge boundary; fields
/// the sender omitted stay `None` and leave the local value untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    pub parent_id: String,
    pub order: f64,
    /// Primary label HTML. `None` means "content unchanged".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

impl NodeRecord {
    /// A full record describing `node` as currently stored.
    pub fn from_node(node: &Node, order: f64) -> Self {
        Self {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            order,
            label: Some(node.content.label.html.clone()),
            description: node.content.description.as_ref().map(|d| d.html.clone()),
            completed: Some(node.badges.completed),
            highlight: Some(node.badges.highlight),
            task_link: node.badges.task_link.clone(),
            collapsed: Some(node.collapsed),
        }
    }

    pub fn touches_content(&self) -> bool {
        self.label.is_some() || self.description.is_some()
    }
}
