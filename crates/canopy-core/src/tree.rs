//! The in-memory tree: node table, adjacency, derived edges.
//!
//! There is exactly one of these per edited document and it is only ever
//! mutated by the component holding the current turn (a local action handler
//! or the merge engine). Iteration order of the node table is insertion order,
//! which keeps downstream output deterministic.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::Node;
use crate::order::OrderIndex;

/// Parent id of top-level nodes. The root itself is a virtual anchor, not a
/// stored node.
pub const ROOT_ID: &str = "root";

/// A derived parent→child link. Every non-root node has exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("edge_{source}_{target}"),
            source,
            target,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeState {
    nodes: IndexMap<String, Node>,
    children: FxHashMap<String, Vec<String>>,
    order: OrderIndex,
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn order(&self) -> &OrderIndex {
        &self.order
    }

    pub fn order_mut(&mut self) -> &mut OrderIndex {
        &mut self.order
    }

    /// Inserts a node whose parent must already exist (or be the root).
    /// The caller is responsible for having assigned an order key.
    pub fn insert(&mut self, node: Node) -> Result<()> {
        if node.id == ROOT_ID {
            return Err(Error::RootImmutable { action: "inserted" });
        }
        if self.nodes.contains_key(&node.id) {
            return Err(Error::DuplicateNode { id: node.id });
        }
        if node.parent_id != ROOT_ID && !self.nodes.contains_key(&node.parent_id) {
            return Err(Error::UnknownNode {
                id: node.parent_id,
            });
        }
        self.children
            .entry(node.parent_id.clone())
            .or_default()
            .push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|n| n.parent_id.as_str())
    }

    /// Walks ancestor ids from `id`'s parent up to (and excluding) the root.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = self.parent_of(id);
        while let Some(p) = cur {
            if p == ROOT_ID {
                break;
            }
            out.push(p.to_string());
            cur = self.parent_of(p);
        }
        out
    }

    /// True when `candidate` is `id` itself or one of its descendants.
    pub fn is_self_or_descendant(&self, candidate: &str, id: &str) -> bool {
        if candidate == id {
            return true;
        }
        let mut cur = self.parent_of(candidate);
        while let Some(p) = cur {
            if p == id {
                return true;
            }
            if p == ROOT_ID {
                return false;
            }
            cur = self.parent_of(p);
        }
        false
    }

    /// Children of `parent` in display order (ascending order key).
    pub fn children_ordered(&self, parent: &str) -> Vec<String> {
        match self.children.get(parent) {
            Some(ids) => self.order.sorted(ids),
            None => Vec::new(),
        }
    }

    pub fn child_count(&self, parent: &str) -> usize {
        self.children.get(parent).map_or(0, |c| c.len())
    }

    /// All descendants of `id` in depth-first display order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = self.children_ordered(id);
        stack.reverse();
        while let Some(v) = stack.pop() {
            out.push(v.clone());
            let mut kids = self.children_ordered(&v);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Depth-first display order over visible nodes: descendants of a
    /// collapsed node are skipped entirely.
    pub fn visible_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = self.children_ordered(ROOT_ID);
        stack.reverse();
        while let Some(v) = stack.pop() {
            if !self.nodes.get(&v).is_some_and(|n| n.collapsed) {
                let mut kids = self.children_ordered(&v);
                kids.reverse();
                stack.extend(kids);
            }
            out.push(v);
        }
        out
    }

    /// Rewires `id` under `new_parent`, keeping adjacency lists consistent.
    /// Validation (cycle prevention, drop anchors) belongs to the restructure
    /// engine; this only refuses unknown endpoints.
    pub(crate) fn set_parent(&mut self, id: &str, new_parent: &str) -> Result<()> {
        if !self.nodes.contains_key(id) {
            return Err(Error::UnknownNode { id: id.to_string() });
        }
        if new_parent != ROOT_ID && !self.nodes.contains_key(new_parent) {
            return Err(Error::UnknownNode {
                id: new_parent.to_string(),
            });
        }
        let old_parent = self
            .nodes
            .get(id)
            .map(|n| n.parent_id.clone())
            .unwrap_or_default();
        if let Some(list) = self.children.get_mut(&old_parent) {
            list.retain(|c| c != id);
        }
        self.children
            .entry(new_parent.to_string())
            .or_default()
            .push(id.to_string());
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent_id = new_parent.to_string();
        }
        Ok(())
    }

    /// Removes the named nodes and every descendant. Returns the full removed
    /// id set in removal order; all edges touching a removed node disappear
    /// with it (edges are derived from parent links).
    pub fn remove_cascading(&mut self, ids: &[String]) -> Vec<String> {
        let mut doomed: Vec<String> = Vec::new();
        for id in ids {
            if !self.nodes.contains_key(id) || doomed.iter().any(|d| d == id) {
                continue;
            }
            doomed.push(id.clone());
            for d in self.descendants(id) {
                if !doomed.iter().any(|x| *x == d) {
                    doomed.push(d);
                }
            }
        }

        for id in &doomed {
            let Some(node) = self.nodes.shift_remove(id) else {
                continue;
            };
            if let Some(list) = self.children.get_mut(&node.parent_id) {
                list.retain(|c| c != id);
            }
            self.children.remove(id);
            self.order.remove(id);
        }
        doomed
    }

    /// The inbound edge of `id`, if the node exists.
    pub fn edge_for(&self, id: &str) -> Option<Edge> {
        self.nodes
            .get(id)
            .map(|n| Edge::between(n.parent_id.clone(), id))
    }

    /// All derived edges, one per non-root node, in node-table order.
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes
            .values()
            .map(|n| Edge::between(n.parent_id.clone(), n.id.clone()))
            .collect()
    }

    /// Checks the rooted-tree invariant: every node reaches the root through
    /// parent links, and sibling order keys are present.
    pub fn validate(&self) -> Result<()> {
        for id in self.nodes.keys() {
            let mut seen = 0usize;
            let mut cur = self.parent_of(id);
            loop {
                match cur {
                    None => {
                        return Err(Error::UnknownNode { id: id.clone() });
                    }
                    Some(ROOT_ID) => break,
                    Some(p) => {
                        seen += 1;
                        if seen > self.nodes.len() {
                            return Err(Error::Cycle {
                                node_id: id.clone(),
                                new_parent_id: p.to_string(),
                            });
                        }
                        cur = self.parent_of(p);
                    }
                }
            }
            if self.order.order_of(id).is_none() {
                return Err(Error::UnknownNode { id: id.clone() });
            }
        }
        Ok(())
    }
}
