//! Conflict-aware application of remote mutations.
//!
//! The merge engine is pure state-in/state-out: it rewrites the tree, cache
//! and registry, and reports what happened so the session can re-layout,
//! checkpoint, or update selection. It never touches a rendering surface.
//!
//! The one rule that must never break: a remote update may not overwrite
//! content the local user is actively typing or has not saved yet. Such
//! content portions are dropped by policy — silently, not as errors — while
//! non-content attributes still pass through.

use tracing::{trace, warn};

use crate::cache::PositionCache;
use crate::content::{NodeContent, RichText};
use crate::events::{RemoteEnvelope, RemoteEvent};
use crate::node::{Node, NodeRecord};
use crate::registry::PendingEditRegistry;
use crate::tree::{ROOT_ID, TreeState};

/// How much of the layout a merge invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RelayoutScope {
    /// Nothing moved; attribute-only change.
    #[default]
    None,
    /// Only this node's box may have changed.
    Node(String),
    /// Structure or ordering changed; every position may shift.
    Full,
}

impl RelayoutScope {
    /// Widens `self` to also cover `other`.
    pub fn escalate(&mut self, other: RelayoutScope) {
        match (&self, &other) {
            (RelayoutScope::Full, _) => {}
            (_, RelayoutScope::None) => {}
            (RelayoutScope::None, _) => *self = other,
            // Two distinct node scopes, or node vs full: widen.
            _ => *self = RelayoutScope::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeOutcome {
    /// False when the event was ignored outright (self-echo or stale target).
    pub applied: bool,
    pub relayout: RelayoutScope,
    /// The event was structurally significant; the session should checkpoint.
    pub checkpoint: bool,
    pub created: Vec<String>,
    pub removed: Vec<String>,
    /// Ids whose remote content portion was dropped because the registry
    /// protects them. Policy, not an error.
    pub content_dropped: Vec<String>,
    pub selection_cleared: bool,
}

impl MergeOutcome {
    fn ignored() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    local_session_id: String,
}

impl MergeEngine {
    pub fn new(local_session_id: impl Into<String>) -> Self {
        Self {
            local_session_id: local_session_id.into(),
        }
    }

    pub fn local_session_id(&self) -> &str {
        &self.local_session_id
    }

    /// Applies one remote envelope against local state.
    pub fn apply(
        &self,
        tree: &mut TreeState,
        cache: &mut PositionCache,
        registry: &mut PendingEditRegistry,
        selection: &mut Option<String>,
        envelope: &RemoteEnvelope,
        now_ms: i64,
    ) -> MergeOutcome {
        if envelope.origin_session_id == self.local_session_id {
            // Our own echo coming back over the transport; everything it
            // describes is already local state.
            trace!(event = ?envelope.event, "ignoring self-originated event");
            return MergeOutcome::ignored();
        }

        let mut outcome = MergeOutcome {
            applied: true,
            ..MergeOutcome::default()
        };

        match &envelope.event {
            RemoteEvent::NodeCreated { node, edge } => {
                if let Some(edge) = edge {
                    if edge.target != node.id {
                        warn!(
                            edge = %edge.id,
                            node = %node.id,
                            "dropping created-node edge that does not target the node"
                        );
                    }
                }
                self.apply_record(tree, cache, registry, node, now_ms, &mut outcome);
            }
            RemoteEvent::NodeUpdated { node } => {
                self.apply_record(tree, cache, registry, node, now_ms, &mut outcome);
            }
            RemoteEvent::NodeBatchUpdated { nodes } => {
                for node in nodes {
                    self.apply_record(tree, cache, registry, node, now_ms, &mut outcome);
                }
            }
            RemoteEvent::NodeDeleted { node_ids } => {
                self.apply_deletion(tree, cache, registry, selection, node_ids, &mut outcome);
            }
            RemoteEvent::NodeReparented {
                node_id,
                edge,
                order,
            } => {
                self.apply_reparent(tree, cache, node_id, &edge.source, *order, &mut outcome);
            }
        }

        outcome
    }

    /// Creates or updates one node from its wire record.
    fn apply_record(
        &self,
        tree: &mut TreeState,
        cache: &mut PositionCache,
        registry: &mut PendingEditRegistry,
        record: &NodeRecord,
        now_ms: i64,
        outcome: &mut MergeOutcome,
    ) {
        if !tree.has_node(&record.id) {
            self.insert_new(tree, record, outcome);
            return;
        }

        let protected = registry.protects(&record.id);
        let grace_pass = protected
            && record.touches_content()
            && registry.take_grace(&record.id, now_ms);

        if protected && !grace_pass {
            // Non-content attributes pass through; content stays local.
            if record.touches_content() {
                trace!(node = %record.id, "dropping remote content for locally edited node");
                outcome.content_dropped.push(record.id.clone());
            }
            self.apply_attributes(tree, record, outcome);
            self.apply_structure(tree, cache, record, outcome);
            return;
        }

        // No local interest (or a consumed grace pass): the remote version
        // replaces content, attributes and placement wholesale.
        self.apply_content(tree, record, outcome);
        self.apply_attributes(tree, record, outcome);
        self.apply_structure(tree, cache, record, outcome);
        if let Some(node) = tree.node_mut(&record.id) {
            node.dirty = false;
        }
    }

    fn insert_new(&self, tree: &mut TreeState, record: &NodeRecord, outcome: &mut MergeOutcome) {
        let parent_id = if record.parent_id == ROOT_ID || tree.has_node(&record.parent_id) {
            record.parent_id.clone()
        } else {
            // The edge dangles; recover locally rather than losing the node.
            warn!(
                node = %record.id,
                parent = %record.parent_id,
                "remote node references a missing parent, attaching under root"
            );
            ROOT_ID.to_string()
        };

        let mut content = NodeContent::default();
        if let Some(label) = &record.label {
            content.label = RichText::from_html(label.clone());
        }
        if let Some(descr) = &record.description {
            content.description = Some(RichText::from_html(descr.clone()));
        }

        let mut node = Node::new(record.id.clone(), parent_id, content);
        node.badges.completed = record.completed.unwrap_or(false);
        node.badges.highlight = record.highlight.unwrap_or(false);
        node.badges.task_link = record.task_link.clone();
        node.collapsed = record.collapsed.unwrap_or(false);

        tree.order_mut().assign(record.id.clone(), record.order);
        match tree.insert(node) {
            Ok(()) => {
                outcome.created.push(record.id.clone());
                // A node appearing from another session is a structural
                // change worth a checkpoint.
                outcome.checkpoint = true;
                outcome.relayout.escalate(RelayoutScope::Full);
            }
            Err(err) => {
                tree.order_mut().remove(&record.id);
                warn!(node = %record.id, %err, "failed to insert remote node");
            }
        }
    }

    /// Replaces the content portion, keeping natural image sizes the host
    /// already reported when the same sources reappear.
    fn apply_content(&self, tree: &mut TreeState, record: &NodeRecord, outcome: &mut MergeOutcome) {
        let Some(node) = tree.node_mut(&record.id) else {
            return;
        };
        let mut changed = false;
        if let Some(label) = &record.label {
            if node.content.label.html != *label {
                let mut fresh = RichText::from_html(label.clone());
                fresh.adopt_natural_sizes(&node.content.label);
                node.content.label = fresh;
                changed = true;
            }
        }
        if let Some(descr) = &record.description {
            let differs = node
                .content
                .description
                .as_ref()
                .is_none_or(|d| d.html != *descr);
            if differs {
                let mut fresh = RichText::from_html(descr.clone());
                if let Some(old) = &node.content.description {
                    fresh.adopt_natural_sizes(old);
                }
                node.content.description = Some(fresh);
                changed = true;
            }
        }
        if changed {
            node.size = None;
            outcome.relayout.escalate(RelayoutScope::Full);
        }
    }

    /// Applies the non-content attributes: badges and the collapsed flag.
    /// Badges never move boxes; a collapse toggle changes visibility.
    fn apply_attributes(
        &self,
        tree: &mut TreeState,
        record: &NodeRecord,
        outcome: &mut MergeOutcome,
    ) {
        let Some(node) = tree.node_mut(&record.id) else {
            return;
        };
        if let Some(completed) = record.completed {
            node.badges.completed = completed;
        }
        if let Some(highlight) = record.highlight {
            node.badges.highlight = highlight;
        }
        if let Some(task_link) = &record.task_link {
            node.badges.task_link = Some(task_link.clone());
        }
        if let Some(collapsed) = record.collapsed {
            if node.collapsed != collapsed {
                node.collapsed = collapsed;
                outcome.relayout.escalate(RelayoutScope::Full);
            }
        }
    }

    /// Applies order/parent placement from an update record.
    fn apply_structure(
        &self,
        tree: &mut TreeState,
        cache: &mut PositionCache,
        record: &NodeRecord,
        outcome: &mut MergeOutcome,
    ) {
        let Some(node) = tree.node(&record.id) else {
            return;
        };
        let parent_changed = node.parent_id != record.parent_id;
        let order_changed = tree.order().order_of(&record.id) != Some(record.order);

        if order_changed {
            tree.order_mut().assign(record.id.clone(), record.order);
            outcome.relayout.escalate(RelayoutScope::Full);
        }

        if parent_changed {
            self.apply_reparent(tree, cache, &record.id, &record.parent_id, record.order, outcome);
        }
    }

    fn apply_reparent(
        &self,
        tree: &mut TreeState,
        cache: &mut PositionCache,
        node_id: &str,
        new_parent: &str,
        order: f64,
        outcome: &mut MergeOutcome,
    ) {
        if !tree.has_node(node_id) {
            // The node was deleted locally before this event drained; drop it.
            trace!(node = node_id, "ignoring reparent for missing node");
            return;
        }
        if new_parent != ROOT_ID && !tree.has_node(new_parent) {
            warn!(
                node = node_id,
                parent = new_parent,
                "dropping remote reparent onto a missing parent"
            );
            return;
        }
        if new_parent != ROOT_ID && tree.is_self_or_descendant(new_parent, node_id) {
            warn!(
                node = node_id,
                parent = new_parent,
                "dropping remote reparent that would create a cycle"
            );
            return;
        }
        if tree.set_parent(node_id, new_parent).is_err() {
            return;
        }
        tree.order_mut().assign(node_id.to_string(), order);
        cache.invalidate_subtree(tree, node_id);
        outcome.checkpoint = true;
        outcome.relayout.escalate(RelayoutScope::Full);
    }

    fn apply_deletion(
        &self,
        tree: &mut TreeState,
        cache: &mut PositionCache,
        registry: &mut PendingEditRegistry,
        selection: &mut Option<String>,
        node_ids: &[String],
        outcome: &mut MergeOutcome,
    ) {
        let removed = tree.remove_cascading(node_ids);
        if removed.is_empty() {
            return;
        }

        // Clear local pointers into the removed set before anything observes
        // the new tree.
        if let Some(sel) = selection.as_deref() {
            if removed.iter().any(|id| id == sel) {
                *selection = None;
                outcome.selection_cleared = true;
            }
        }
        for id in &removed {
            registry.forget(id);
            cache.invalidate(id);
        }

        outcome.checkpoint = true;
        outcome.relayout.escalate(RelayoutScope::Full);
        outcome.removed = removed;
    }
}
