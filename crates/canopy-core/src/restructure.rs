//! Re-parenting and drag-driven restructuring.
//!
//! `reparent` is the only way a node changes parents. It validates before any
//! mutation, so a rejected move leaves the tree untouched. The drag state
//! machine is plain data driven by discrete pointer events; it knows nothing
//! about a rendering surface.

use serde::{Deserialize, Serialize};

use crate::cache::PositionCache;
use crate::error::{Error, Result};
use crate::geom::{Point, Rect};
use crate::tree::{Edge, ROOT_ID, TreeState};

/// Where a moved node lands relative to the drop target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DropPosition {
    Before(String),
    After(String),
    AsFirstChild(String),
    AsLastChild(String),
}

impl DropPosition {
    /// The parent the moved node ends up under.
    pub fn target_parent(&self, tree: &TreeState) -> Result<String> {
        match self {
            DropPosition::Before(anchor) | DropPosition::After(anchor) => tree
                .parent_of(anchor)
                .map(str::to_string)
                .ok_or_else(|| Error::UnknownNode { id: anchor.clone() }),
            DropPosition::AsFirstChild(parent) | DropPosition::AsLastChild(parent) => {
                if parent == ROOT_ID || tree.has_node(parent) {
                    Ok(parent.clone())
                } else {
                    Err(Error::UnknownNode { id: parent.clone() })
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReparentOutcome {
    pub order_key: f64,
    pub edge: Edge,
}

/// Moves `node_id` (with its subtree) under `new_parent_id` at `drop`.
///
/// Fails with [`Error::Cycle`] when the target parent is the node itself or
/// one of its descendants — checked by walking ancestors of the target up to
/// the root before anything is mutated. On success the node's inbound edge is
/// rewired, the subtree's cached positions are invalidated (absolute positions
/// shift even though relative structure is unchanged), and the node is marked
/// locally dirty.
pub fn reparent(
    tree: &mut TreeState,
    cache: &mut PositionCache,
    node_id: &str,
    new_parent_id: &str,
    drop: DropPosition,
) -> Result<ReparentOutcome> {
    if !tree.has_node(node_id) {
        return Err(Error::UnknownNode {
            id: node_id.to_string(),
        });
    }
    if node_id == ROOT_ID {
        return Err(Error::RootImmutable {
            action: "reparented",
        });
    }
    if new_parent_id != ROOT_ID && !tree.has_node(new_parent_id) {
        return Err(Error::UnknownNode {
            id: new_parent_id.to_string(),
        });
    }
    if new_parent_id != ROOT_ID && tree.is_self_or_descendant(new_parent_id, node_id) {
        return Err(Error::Cycle {
            node_id: node_id.to_string(),
            new_parent_id: new_parent_id.to_string(),
        });
    }
    let drop_parent = drop.target_parent(tree)?;
    if drop_parent != new_parent_id {
        return Err(Error::InvalidDrop {
            message: format!(
                "drop position resolves to parent \"{drop_parent}\" but \"{new_parent_id}\" was requested"
            ),
        });
    }
    if let DropPosition::Before(anchor) | DropPosition::After(anchor) = &drop {
        if anchor == node_id {
            return Err(Error::InvalidDrop {
                message: format!("node \"{node_id}\" cannot anchor its own move"),
            });
        }
    }

    // Validation done; mutate.
    tree.set_parent(node_id, new_parent_id)?;

    let siblings: Vec<String> = tree
        .children_ordered(new_parent_id)
        .into_iter()
        .filter(|s| s != node_id)
        .collect();

    let (prev, next) = match &drop {
        DropPosition::Before(anchor) => {
            let idx = siblings.iter().position(|s| s == anchor);
            let prev = idx
                .and_then(|i| i.checked_sub(1))
                .map(|i| siblings[i].clone());
            (prev, Some(anchor.clone()))
        }
        DropPosition::After(anchor) => {
            let idx = siblings.iter().position(|s| s == anchor);
            let next = idx.and_then(|i| siblings.get(i + 1)).cloned();
            (Some(anchor.clone()), next)
        }
        DropPosition::AsFirstChild(_) => (None, siblings.first().cloned()),
        DropPosition::AsLastChild(_) => (siblings.last().cloned(), None),
    };

    let order_key = tree.order_mut().insert_between(
        node_id,
        prev.as_deref(),
        next.as_deref(),
        &siblings,
    );

    cache.invalidate_subtree(tree, node_id);
    if let Some(node) = tree.node_mut(node_id) {
        node.dirty = true;
    }

    Ok(ReparentOutcome {
        order_key,
        edge: Edge::between(new_parent_id, node_id),
    })
}

/// Maps pointer position inside a candidate target box to a drop position:
/// top third inserts before the target, bottom third after it, and the middle
/// band nests as the target's last child.
pub fn drop_position_for_pointer(target_id: &str, target_box: Rect, pointer: Point) -> DropPosition {
    if target_box.height <= 0.0 {
        return DropPosition::AsLastChild(target_id.to_string());
    }
    let rel = (pointer.y - target_box.y) / target_box.height;
    if rel < 1.0 / 3.0 {
        DropPosition::Before(target_id.to_string())
    } else if rel > 2.0 / 3.0 {
        DropPosition::After(target_id.to_string())
    } else {
        DropPosition::AsLastChild(target_id.to_string())
    }
}

/// Pointer must travel this far from the press point before a pending drag
/// becomes a real one; closer movements stay clicks.
pub const DRAG_SLOP_PX: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Pending {
        start: Point,
        started_at_ms: i64,
    },
    Dragging {
        ghost: Point,
    },
    Dropping,
}

/// A completed drag gesture, ready to resolve into a reparent.
#[derive(Debug, Clone, PartialEq)]
pub struct DragDrop {
    pub node_id: String,
    pub at: Point,
}

#[derive(Debug, Clone, Default)]
pub struct DragState {
    node_id: Option<String>,
    phase: DragPhase,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn dragged_node(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging { .. })
    }

    pub fn pointer_down(&mut self, node_id: impl Into<String>, at: Point, now_ms: i64) {
        self.node_id = Some(node_id.into());
        self.phase = DragPhase::Pending {
            start: at,
            started_at_ms: now_ms,
        };
    }

    pub fn pointer_move(&mut self, at: Point) {
        match &self.phase {
            DragPhase::Pending { start, .. } => {
                if start.distance_to(at) > DRAG_SLOP_PX {
                    self.phase = DragPhase::Dragging { ghost: at };
                }
            }
            DragPhase::Dragging { .. } => {
                self.phase = DragPhase::Dragging { ghost: at };
            }
            DragPhase::Idle | DragPhase::Dropping => {}
        }
    }

    /// Ends the gesture. A drag that never left the slop radius resolves to
    /// `None` (it was a click); a real drag enters `Dropping` until the caller
    /// acknowledges with [`DragState::complete`].
    pub fn pointer_up(&mut self) -> Option<DragDrop> {
        match (&self.phase, &self.node_id) {
            (DragPhase::Dragging { ghost }, Some(node_id)) => {
                let drop = DragDrop {
                    node_id: node_id.clone(),
                    at: *ghost,
                };
                self.phase = DragPhase::Dropping;
                Some(drop)
            }
            _ => {
                self.reset();
                None
            }
        }
    }

    pub fn complete(&mut self) {
        self.reset();
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.node_id = None;
        self.phase = DragPhase::Idle;
    }
}
