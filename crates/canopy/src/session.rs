//! The editor session: one user's live view of one shared tree.
//!
//! Everything runs on a single logical thread. Local UI actions and remote
//! events both mutate the same in-memory tree, but never interleave: remote
//! envelopes queue in an inbox and drain — in arrival order — at the next
//! [`EditorSession::idle_tick`], which also batches re-measuring and a single
//! layout pass over however many mutations accumulated. A layout pass issued
//! after any local mutation always observes that mutation.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::debug;
use uuid::Uuid;

use canopy_core::cache::PositionCache;
use canopy_core::clock::Clock;
use canopy_core::content::{NodeContent, RichText};
use canopy_core::error::{Error, Result};
use canopy_core::events::{RemoteEnvelope, RemoteEvent};
use canopy_core::geom::{Bounds, Point, Rect};
use canopy_core::history::{DEFAULT_HISTORY_DEPTH, HistoryRing};
use canopy_core::merge::{MergeEngine, RelayoutScope};
use canopy_core::node::{Node, NodeRecord};
use canopy_core::registry::PendingEditRegistry;
use canopy_core::restructure::{
    DragState, DropPosition, ReparentOutcome, drop_position_for_pointer, reparent,
};
use canopy_core::snapshot::NodeSnapshot;
use canopy_core::tree::{ROOT_ID, TreeState};
use canopy_layout::diff::{LayoutDiff, diff_layouts};
use canopy_layout::layout::{LayoutConfig, LayoutResult, layout};
use canopy_layout::size::{SizeConfig, SizeLocks, measure_node};
use canopy_layout::text::{DeterministicTextMeasurer, TextMeasurer};

use crate::boundary::{Persistence, Transport};

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub layout: LayoutConfig,
    pub size: SizeConfig,
    pub history_depth: Option<usize>,
}

/// What one idle tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub events_applied: usize,
    pub events_dropped: usize,
    pub checkpoints: usize,
    pub laid_out: bool,
    pub nodes_saved: usize,
}

pub struct EditorSession<T: Transport, P: Persistence> {
    entity_id: String,
    session_id: String,

    tree: TreeState,
    merge: MergeEngine,
    registry: PendingEditRegistry,
    selection: Option<String>,
    cache: PositionCache,
    locks: SizeLocks,
    history: HistoryRing,
    drag: DragState,
    clock: Clock,
    config: SessionConfig,
    measurer: Box<dyn TextMeasurer>,

    transport: T,
    persistence: P,

    inbox: VecDeque<RemoteEnvelope>,
    /// Ids this session has seen deleted; queued events for them are dropped.
    tombstones: FxHashSet<String>,
    /// Dirty nodes that still owe a `node_updated` broadcast.
    pending_broadcast: FxHashSet<String>,
    /// Subset of `pending_broadcast` whose content changed (records for the
    /// rest omit the content portion).
    content_dirty: FxHashSet<String>,
    relayout: RelayoutScope,
    last_layout: LayoutResult,
    last_diff: LayoutDiff,
    saving: bool,
}

impl<T: Transport, P: Persistence> EditorSession<T, P> {
    pub fn new(entity_id: impl Into<String>, transport: T, persistence: P) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let config = SessionConfig::default();
        Self {
            entity_id: entity_id.into(),
            merge: MergeEngine::new(session_id.clone()),
            session_id,
            tree: TreeState::new(),
            registry: PendingEditRegistry::new(),
            selection: None,
            cache: PositionCache::new(),
            locks: SizeLocks::new(),
            history: HistoryRing::with_depth(
                config.history_depth.unwrap_or(DEFAULT_HISTORY_DEPTH),
            ),
            drag: DragState::new(),
            clock: Clock::system(),
            config,
            measurer: Box::new(DeterministicTextMeasurer::default()),
            transport,
            persistence,
            inbox: VecDeque::new(),
            tombstones: FxHashSet::default(),
            pending_broadcast: FxHashSet::default(),
            content_dirty: FxHashSet::default(),
            relayout: RelayoutScope::None,
            last_layout: LayoutResult::default(),
            last_diff: LayoutDiff::default(),
            saving: false,
        }
    }

    /// Overrides the wall clock. This exists primarily to make grace-window
    /// and drag-timing behavior deterministic in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.history = HistoryRing::with_depth(
            config.history_depth.unwrap_or(DEFAULT_HISTORY_DEPTH),
        );
        self.config = config;
        self
    }

    pub fn with_measurer(mut self, measurer: Box<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    /// Fixes the session identity instead of the generated one. Useful when
    /// the transport assigns identities.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self.merge = MergeEngine::new(self.session_id.clone());
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tree(&self) -> &TreeState {
        &self.tree
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn select(&mut self, id: Option<&str>) {
        self.selection = id
            .filter(|id| self.tree.has_node(id))
            .map(str::to_string);
    }

    pub fn positions(&self) -> &LayoutResult {
        &self.last_layout
    }

    /// What changed between the two most recent layout passes. The
    /// presentation layer patches its scene from this instead of rescanning.
    pub fn last_layout_diff(&self) -> &LayoutDiff {
        &self.last_diff
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.last_layout.bounds
    }

    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// The host's persistence layer settled; the saving indicator turns off.
    pub fn mark_saved(&mut self) {
        self.saving = false;
    }

    // ------------------------------------------------------------------
    // Local actions
    // ------------------------------------------------------------------

    /// Creates a node as the last child of `parent_id` and broadcasts it.
    pub fn add_child(&mut self, parent_id: &str, label_html: &str) -> Result<String> {
        if parent_id != ROOT_ID && !self.tree.has_node(parent_id) {
            return Err(Error::UnknownNode {
                id: parent_id.to_string(),
            });
        }
        let siblings = self.tree.children_ordered(parent_id);
        self.create_node(parent_id.to_string(), siblings.last().cloned(), None, label_html)
    }

    /// Creates a node immediately after `anchor_id` among its siblings.
    pub fn add_sibling(&mut self, anchor_id: &str, label_html: &str) -> Result<String> {
        let parent_id = self
            .tree
            .parent_of(anchor_id)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownNode {
                id: anchor_id.to_string(),
            })?;
        let siblings = self.tree.children_ordered(&parent_id);
        let next = siblings
            .iter()
            .position(|s| s == anchor_id)
            .and_then(|i| siblings.get(i + 1))
            .cloned();
        self.create_node(parent_id, Some(anchor_id.to_string()), next, label_html)
    }

    fn create_node(
        &mut self,
        parent_id: String,
        prev: Option<String>,
        next: Option<String>,
        label_html: &str,
    ) -> Result<String> {
        self.history.checkpoint(self.tree.clone());

        let id = Uuid::new_v4().to_string();
        let siblings = self.tree.children_ordered(&parent_id);
        let order = self.tree.order_mut().insert_between(
            &id,
            prev.as_deref(),
            next.as_deref(),
            &siblings,
        );

        let mut node = Node::new(id.clone(), parent_id, NodeContent::from_label_html(label_html));
        node.dirty = true;
        if let Err(err) = self.tree.insert(node) {
            self.tree.order_mut().remove(&id);
            return Err(err);
        }

        self.registry.mark_unsaved(id.clone());
        self.relayout.escalate(RelayoutScope::Full);

        let edge = self.tree.edge_for(&id);
        if let Some(record) = self.record_for(&id) {
            self.publish(RemoteEvent::NodeCreated { node: record, edge });
        }
        Ok(id)
    }

    /// Deletes a node and its whole subtree. Returns every removed id.
    pub fn delete(&mut self, id: &str) -> Result<Vec<String>> {
        if !self.tree.has_node(id) {
            return Err(Error::UnknownNode { id: id.to_string() });
        }
        self.history.checkpoint(self.tree.clone());

        let removed = self.tree.remove_cascading(std::slice::from_ref(&id.to_string()));
        for rid in &removed {
            self.registry.forget(rid);
            self.cache.invalidate(rid);
            self.locks.release(rid);
            self.tombstones.insert(rid.clone());
            self.pending_broadcast.remove(rid);
            self.content_dirty.remove(rid);
        }
        if self
            .selection
            .as_deref()
            .is_some_and(|sel| removed.iter().any(|r| r == sel))
        {
            self.selection = None;
        }
        self.relayout.escalate(RelayoutScope::Full);

        self.publish(RemoteEvent::NodeDeleted {
            node_ids: removed.clone(),
        });
        self.persistence.delete(&self.entity_id, &removed);
        self.saving = true;
        Ok(removed)
    }

    /// Moves `node_id` (with its subtree) under `new_parent_id` at `drop`.
    /// A rejected move (cycle, bad anchor) leaves the tree untouched.
    pub fn reparent(
        &mut self,
        node_id: &str,
        new_parent_id: &str,
        drop: DropPosition,
    ) -> Result<ReparentOutcome> {
        let pre = self.tree.clone();
        let outcome = reparent(&mut self.tree, &mut self.cache, node_id, new_parent_id, drop)?;
        self.history.checkpoint(pre);
        self.relayout.escalate(RelayoutScope::Full);

        self.publish(RemoteEvent::NodeReparented {
            node_id: node_id.to_string(),
            edge: outcome.edge.clone(),
            order: outcome.order_key,
        });
        Ok(outcome)
    }

    pub fn set_completed(&mut self, id: &str, completed: bool) -> Result<()> {
        self.update_node(id, |node| node.badges.completed = completed)
    }

    pub fn set_highlight(&mut self, id: &str, highlight: bool) -> Result<()> {
        self.update_node(id, |node| node.badges.highlight = highlight)
    }

    pub fn set_task_link(&mut self, id: &str, task_link: Option<String>) -> Result<()> {
        self.update_node(id, |node| node.badges.task_link = task_link)
    }

    pub fn toggle_collapsed(&mut self, id: &str) -> Result<bool> {
        let mut collapsed = false;
        self.update_node(id, |node| {
            node.collapsed = !node.collapsed;
            collapsed = node.collapsed;
        })?;
        self.relayout.escalate(RelayoutScope::Full);
        Ok(collapsed)
    }

    /// Badge-style attribute update: marks dirty and queues a broadcast, but
    /// does not protect content or move boxes.
    fn update_node(&mut self, id: &str, f: impl FnOnce(&mut Node)) -> Result<()> {
        let Some(node) = self.tree.node_mut(id) else {
            return Err(Error::UnknownNode { id: id.to_string() });
        };
        f(node);
        node.dirty = true;
        self.pending_broadcast.insert(id.to_string());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Text-editor boundary
    // ------------------------------------------------------------------

    /// The embedded editor focused `id`: the edit session opens, and the
    /// node's current box becomes its floor until blur.
    pub fn editor_focus(&mut self, id: &str) -> Result<()> {
        let Some(node) = self.tree.node(id) else {
            return Err(Error::UnknownNode { id: id.to_string() });
        };
        let floor = node
            .size
            .unwrap_or_else(|| measure_node(&node.content, self.measurer.as_ref(), &self.config.size));

        self.selection = Some(id.to_string());
        self.registry.begin_edit(id.to_string(), self.clock.now_ms());
        self.locks.lock(id.to_string(), floor);
        Ok(())
    }

    /// The embedded editor reported new content for `id`.
    pub fn editor_input(&mut self, id: &str, value_html: &str) -> Result<()> {
        let Some(node) = self.tree.node_mut(id) else {
            return Err(Error::UnknownNode { id: id.to_string() });
        };
        if node.content.label.html != value_html {
            let mut fresh = RichText::from_html(value_html.to_string());
            fresh.adopt_natural_sizes(&node.content.label);
            node.content.label = fresh;
            node.size = None;
            node.dirty = true;
            self.registry.mark_unsaved(id.to_string());
            self.pending_broadcast.insert(id.to_string());
            self.content_dirty.insert(id.to_string());
            self.relayout.escalate(RelayoutScope::Node(id.to_string()));
        }
        Ok(())
    }

    /// Replaces the secondary description block.
    pub fn editor_input_description(&mut self, id: &str, value_html: Option<&str>) -> Result<()> {
        let Some(node) = self.tree.node_mut(id) else {
            return Err(Error::UnknownNode { id: id.to_string() });
        };
        let fresh = value_html.map(|html| {
            let mut rt = RichText::from_html(html.to_string());
            if let Some(old) = &node.content.description {
                rt.adopt_natural_sizes(old);
            }
            rt
        });
        if node.content.description != fresh {
            node.content.description = fresh;
            node.size = None;
            node.dirty = true;
            self.registry.mark_unsaved(id.to_string());
            self.pending_broadcast.insert(id.to_string());
            self.content_dirty.insert(id.to_string());
            self.relayout.escalate(RelayoutScope::Node(id.to_string()));
        }
        Ok(())
    }

    /// The embedded editor blurred `id`: the edit session ends and the size
    /// floor is released, so the next measure pass may shrink the box.
    pub fn editor_blur(&mut self, id: &str) {
        self.registry.end_edit(id);
        self.locks.release(id);
        if let Some(node) = self.tree.node_mut(id) {
            node.size = None;
            self.relayout.escalate(RelayoutScope::Node(id.to_string()));
        }
    }

    /// The host loaded an embedded image and reports its natural dimensions;
    /// the placeholder guess gets corrected on the next tick.
    pub fn report_image_size(&mut self, id: &str, image_index: usize, width: f64, height: f64) {
        let Some(node) = self.tree.node_mut(id) else {
            return;
        };
        if node.content.set_image_natural_size(image_index, width, height) {
            node.size = None;
            self.relayout.escalate(RelayoutScope::Node(id.to_string()));
        }
    }

    // ------------------------------------------------------------------
    // Drag restructuring
    // ------------------------------------------------------------------

    pub fn drag_pointer_down(&mut self, node_id: &str, at: Point) {
        if self.tree.has_node(node_id) {
            self.drag.pointer_down(node_id, at, self.clock.now_ms());
        }
    }

    pub fn drag_pointer_move(&mut self, at: Point) {
        self.drag.pointer_move(at);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn drag_cancel(&mut self) {
        self.drag.cancel();
    }

    /// Ends the gesture over a candidate target (id + its laid-out box).
    /// The pointer's vertical band inside the box picks the drop position.
    pub fn drag_pointer_up(
        &mut self,
        target: Option<(&str, Rect)>,
    ) -> Result<Option<ReparentOutcome>> {
        let Some(drop) = self.drag.pointer_up() else {
            return Ok(None);
        };
        let result = match target {
            Some((target_id, target_box))
                if target_id != drop.node_id && self.tree.has_node(target_id) =>
            {
                let position = drop_position_for_pointer(target_id, target_box, drop.at);
                position
                    .target_parent(&self.tree)
                    .and_then(|new_parent| self.reparent(&drop.node_id, &new_parent, position))
                    .map(Some)
            }
            _ => Ok(None),
        };
        // The gesture is over whether or not the move was accepted.
        self.drag.complete();
        result
    }

    // ------------------------------------------------------------------
    // Remote events
    // ------------------------------------------------------------------

    /// Queues a remote envelope; it applies on the next idle tick.
    pub fn enqueue_remote(&mut self, envelope: RemoteEnvelope) {
        self.inbox.push_back(envelope);
    }

    /// Cooperative yield point: drains the remote inbox in arrival order,
    /// re-measures whatever content changed, runs at most one layout pass,
    /// and flushes pending saves/broadcasts.
    pub fn idle_tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        while let Some(envelope) = self.inbox.pop_front() {
            if envelope.origin_session_id == self.session_id {
                report.events_dropped += 1;
                continue;
            }
            let Some(envelope) = self.without_tombstoned(envelope) else {
                report.events_dropped += 1;
                continue;
            };

            let pre = self.tree.clone();
            let now_ms = self.clock.now_ms();
            let outcome = self.merge.apply(
                &mut self.tree,
                &mut self.cache,
                &mut self.registry,
                &mut self.selection,
                &envelope,
                now_ms,
            );
            if !outcome.applied {
                report.events_dropped += 1;
                continue;
            }
            report.events_applied += 1;

            for id in &outcome.removed {
                self.tombstones.insert(id.clone());
                self.locks.release(id);
                self.pending_broadcast.remove(id);
                self.content_dirty.remove(id);
            }
            if outcome.checkpoint {
                self.history.checkpoint(pre);
                report.checkpoints += 1;
            }
            self.relayout.escalate(outcome.relayout);
        }

        self.measure_pass();

        if self.relayout != RelayoutScope::None {
            let fresh = layout(&self.tree, &self.config.layout, &mut self.cache);
            self.last_diff = diff_layouts(&self.last_layout, &fresh);
            self.last_layout = fresh;
            self.relayout = RelayoutScope::None;
            report.laid_out = true;
        }

        report.nodes_saved = self.flush();
        report
    }

    /// Drops event portions that target nodes this session already saw die.
    fn without_tombstoned(&self, envelope: RemoteEnvelope) -> Option<RemoteEnvelope> {
        match &envelope.event {
            RemoteEvent::NodeCreated { node, .. } | RemoteEvent::NodeUpdated { node } => {
                if self.tombstones.contains(&node.id) {
                    debug!(node = %node.id, "dropping event for deleted node");
                    return None;
                }
                Some(envelope)
            }
            RemoteEvent::NodeReparented { node_id, .. } => {
                if self.tombstones.contains(node_id) {
                    debug!(node = %node_id, "dropping reparent for deleted node");
                    return None;
                }
                Some(envelope)
            }
            RemoteEvent::NodeBatchUpdated { nodes } => {
                let kept: Vec<NodeRecord> = nodes
                    .iter()
                    .filter(|n| !self.tombstones.contains(&n.id))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    return None;
                }
                Some(RemoteEnvelope {
                    event: RemoteEvent::NodeBatchUpdated { nodes: kept },
                    ..envelope
                })
            }
            RemoteEvent::NodeDeleted { .. } => Some(envelope),
        }
    }

    /// Measures every node whose cached size was invalidated, honoring
    /// edit-time floors.
    fn measure_pass(&mut self) {
        let stale: Vec<String> = self
            .tree
            .nodes()
            .filter(|n| n.size.is_none())
            .map(|n| n.id.clone())
            .collect();
        for id in stale {
            let measured = {
                let Some(node) = self.tree.node(&id) else {
                    continue;
                };
                measure_node(&node.content, self.measurer.as_ref(), &self.config.size)
            };
            let boxed = self.locks.apply(&id, measured);
            if let Some(node) = self.tree.node_mut(&id) {
                node.size = Some(boxed);
            }
        }
    }

    /// Saves dirty nodes and broadcasts accumulated local updates: one
    /// `node_updated` for a single node, `node_batch_updated` for several.
    fn flush(&mut self) -> usize {
        let dirty: Vec<String> = self
            .tree
            .nodes()
            .filter(|n| n.dirty)
            .map(|n| n.id.clone())
            .collect();

        // Broadcast records in node-table order so batches stay deterministic.
        let mut broadcast: Vec<NodeRecord> = Vec::new();
        for id in self.tree.node_ids() {
            if !self.pending_broadcast.contains(id) {
                continue;
            }
            if let Some(mut record) = self.record_for(id) {
                if !self.content_dirty.contains(id) {
                    record.label = None;
                    record.description = None;
                }
                broadcast.push(record);
            }
        }

        for id in &dirty {
            let Some(node) = self.tree.node(id) else {
                continue;
            };
            let order = self.tree.order().order_of(id).unwrap_or_default();
            let snapshot = NodeSnapshot::from_node(node, order, self.cache.get(id));
            let edge = self.tree.edge_for(id);
            self.persistence
                .save(&self.entity_id, id, &snapshot, edge.as_ref());
            if let Some(node) = self.tree.node_mut(id) {
                node.dirty = false;
            }
            self.registry.clear_unsaved(id);
        }

        match broadcast.len() {
            0 => {}
            1 => {
                let node = broadcast.remove(0);
                self.publish(RemoteEvent::NodeUpdated { node });
            }
            _ => self.publish(RemoteEvent::NodeBatchUpdated { nodes: broadcast }),
        }
        self.pending_broadcast.clear();
        self.content_dirty.clear();

        if !dirty.is_empty() {
            self.saving = true;
        }
        dirty.len()
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn undo(&mut self) -> bool {
        let Some(restored) = self.history.undo(&self.tree) else {
            return false;
        };
        self.tree = restored;
        self.after_restore();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(restored) = self.history.redo(&self.tree) else {
            return false;
        };
        self.tree = restored;
        self.after_restore();
        true
    }

    fn after_restore(&mut self) {
        self.cache.clear();
        self.relayout.escalate(RelayoutScope::Full);
        let tree = &self.tree;
        self.registry.retain(|id| tree.has_node(id));
        if self
            .selection
            .as_deref()
            .is_some_and(|sel| !self.tree.has_node(sel))
        {
            self.selection = None;
        }
    }

    // ------------------------------------------------------------------

    fn record_for(&self, id: &str) -> Option<NodeRecord> {
        let node = self.tree.node(id)?;
        let order = self.tree.order().order_of(id)?;
        Some(NodeRecord::from_node(node, order))
    }

    fn publish(&mut self, event: RemoteEvent) {
        let envelope = RemoteEnvelope::new(self.entity_id.clone(), self.session_id.clone(), event);
        self.transport.publish(&envelope);
    }
}
