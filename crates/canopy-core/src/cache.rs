//! Memoized layout positions.
//!
//! The cache is an explicit object threaded through layout and mutation calls,
//! invalidated by id. A missing entry means "needs layout"; the presentation
//! layer diffs successive cache generations to find what moved.

use rustc_hash::FxHashMap;

use crate::geom::Point;
use crate::tree::TreeState;

#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    positions: FxHashMap<String, Point>,
    /// Bumped whenever any entry changes; lets hosts skip unchanged frames.
    generation: u64,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn set(&mut self, id: impl Into<String>, pos: Point) {
        self.generation += 1;
        self.positions.insert(id.into(), pos);
    }

    pub fn invalidate(&mut self, id: &str) {
        if self.positions.remove(id).is_some() {
            self.generation += 1;
        }
    }

    /// Drops `id` and every descendant. Used after a reparent: the subtree's
    /// relative structure is unchanged but every absolute position shifts.
    pub fn invalidate_subtree(&mut self, tree: &TreeState, id: &str) {
        self.invalidate(id);
        for d in tree.descendants(id) {
            self.invalidate(&d);
        }
    }

    pub fn clear(&mut self) {
        if !self.positions.is_empty() {
            self.generation += 1;
        }
        self.positions.clear();
    }

    /// Replaces the cache contents with a freshly computed layout, removing
    /// entries for nodes that are no longer visible.
    pub fn replace_all(&mut self, positions: impl IntoIterator<Item = (String, Point)>) {
        self.positions.clear();
        self.positions.extend(positions);
        self.generation += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Point)> {
        self.positions.iter().map(|(id, p)| (id.as_str(), *p))
    }
}
