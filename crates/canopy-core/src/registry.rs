//! Pending-edit bookkeeping.
//!
//! Two sets gate what a remote merge may overwrite: ids the local user is
//! actively typing into (focus → blur), and ids with accepted-but-unsaved
//! local changes. An edit session younger than the grace window lets one
//! remote content update through — that covers the echo of the user's own
//! prior save arriving just as they refocus the node.

use rustc_hash::{FxHashMap, FxHashSet};

/// How long after edit-start a remote content update may still pass, once.
pub const EDIT_GRACE_MS: i64 = 1500;

#[derive(Debug, Clone)]
struct EditSession {
    started_at_ms: i64,
    grace_used: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PendingEditRegistry {
    editing: FxHashMap<String, EditSession>,
    unsaved: FxHashSet<String>,
}

impl PendingEditRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_edit(&mut self, id: impl Into<String>, now_ms: i64) {
        self.editing.insert(
            id.into(),
            EditSession {
                started_at_ms: now_ms,
                grace_used: false,
            },
        );
    }

    pub fn end_edit(&mut self, id: &str) {
        self.editing.remove(id);
    }

    pub fn is_editing(&self, id: &str) -> bool {
        self.editing.contains_key(id)
    }

    pub fn editing_ids(&self) -> impl Iterator<Item = &str> {
        self.editing.keys().map(|s| s.as_str())
    }

    /// Consumes the one-shot grace pass if the edit session is young enough.
    /// Returns true when the caller may apply remote content despite the
    /// active edit.
    pub fn take_grace(&mut self, id: &str, now_ms: i64) -> bool {
        let Some(session) = self.editing.get_mut(id) else {
            return false;
        };
        if session.grace_used || now_ms - session.started_at_ms >= EDIT_GRACE_MS {
            return false;
        }
        session.grace_used = true;
        true
    }

    pub fn mark_unsaved(&mut self, id: impl Into<String>) {
        self.unsaved.insert(id.into());
    }

    pub fn clear_unsaved(&mut self, id: &str) {
        self.unsaved.remove(id);
    }

    pub fn is_unsaved(&self, id: &str) -> bool {
        self.unsaved.contains(id)
    }

    /// True when the registry protects `id`'s content from remote overwrite.
    pub fn protects(&self, id: &str) -> bool {
        self.is_editing(id) || self.is_unsaved(id)
    }

    /// Forgets everything about `id`. Called when the node is deleted.
    pub fn forget(&mut self, id: &str) {
        self.editing.remove(id);
        self.unsaved.remove(id);
    }

    /// Drops entries the predicate rejects. Used after a history restore to
    /// shed sessions pointing at nodes that no longer exist.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.editing.retain(|id, _| keep(id.as_str()));
        self.unsaved.retain(|id| keep(id.as_str()));
    }

    pub fn is_idle(&self) -> bool {
        self.editing.is_empty() && self.unsaved.is_empty()
    }
}
