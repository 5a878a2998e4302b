//! Fractional sibling ordering.
//!
//! Siblings are ordered by f64 keys so a node can be inserted or moved without
//! rewriting the rest of the list. Midpoint insertion eventually exhausts float
//! precision; `reindex_siblings` is the escape valve and is never surfaced to
//! callers.

use rustc_hash::FxHashMap;

/// Below this gap between neighbor keys a midpoint is no longer trustworthy
/// and the sibling list is reindexed.
const MIN_GAP: f64 = 1e-9;

/// First key handed out by a reindex pass. `1.0` stays reserved so a later
/// head insert can take it without going negative.
const REINDEX_BASE: f64 = 2.0;

#[derive(Debug, Clone, Default)]
pub struct OrderIndex {
    keys: FxHashMap<String, f64>,
    /// Monotonic insertion stamps; ties on key are broken by recency
    /// (last insert wins the contested position).
    recency: FxHashMap<String, u64>,
    stamp: u64,
}

impl OrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_of(&self, id: &str) -> Option<f64> {
        self.keys.get(id).copied()
    }

    /// Records `key` for `id`, stamping it as the most recent insert.
    pub fn assign(&mut self, id: impl Into<String>, key: f64) {
        let id = id.into();
        self.stamp += 1;
        self.recency.insert(id.clone(), self.stamp);
        self.keys.insert(id, key);
    }

    pub fn remove(&mut self, id: &str) {
        self.keys.remove(id);
        self.recency.remove(id);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns a key strictly between the two neighbors and assigns it to `id`.
    ///
    /// `siblings` is the target sibling list in display order, not including
    /// `id`. `prev`/`next` name the neighbors the new key must fall between;
    /// `None` on a side means "below the first" / "above the last". Inserting
    /// before the head reindexes the whole list and returns the reserved head
    /// key, so keys never go negative. A degenerate midpoint (neighbors closer
    /// than the precision threshold) also reindexes, transparently.
    pub fn insert_between(
        &mut self,
        id: &str,
        prev: Option<&str>,
        next: Option<&str>,
        siblings: &[String],
    ) -> f64 {
        let key = match (prev, next) {
            (None, None) => 1.0,
            (Some(prev), None) => self.order_of(prev).unwrap_or(0.0) + 1.0,
            (None, Some(_)) => {
                // Head insert: rewrite the list to 2, 3, ... and take 1.
                tracing::debug!(count = siblings.len(), "reindexing siblings for head insert");
                self.reindex_siblings(siblings);
                1.0
            }
            (Some(prev_id), Some(next_id)) => {
                let a = self.order_of(prev_id).unwrap_or(0.0);
                let b = self.order_of(next_id).unwrap_or(a + 1.0);
                match Self::midpoint(a, b) {
                    Some(mid) => mid,
                    None => {
                        // Precision exhausted between the neighbors; recover by
                        // reindexing and retrying against the fresh keys.
                        tracing::debug!(
                            prev = prev_id,
                            next = next_id,
                            "sibling key gap degenerate, reindexing"
                        );
                        self.reindex_siblings(siblings);
                        let a = self.order_of(prev_id).unwrap_or(0.0);
                        let b = self.order_of(next_id).unwrap_or(a + 1.0);
                        Self::midpoint(a, b).unwrap_or(a + 0.5)
                    }
                }
            }
        };
        self.assign(id, key);
        key
    }

    fn midpoint(a: f64, b: f64) -> Option<f64> {
        if b - a <= MIN_GAP {
            return None;
        }
        let mid = a + (b - a) / 2.0;
        if mid > a && mid < b { Some(mid) } else { None }
    }

    /// Rewrites every key in `ordered` to `2, 3, 4, …`, preserving the given
    /// display order.
    pub fn reindex_siblings(&mut self, ordered: &[String]) {
        for (i, id) in ordered.iter().enumerate() {
            self.assign(id.clone(), REINDEX_BASE + i as f64);
        }
    }

    /// Sorts `ids` into display order: ascending key, ties broken by recency
    /// (the later insert takes the contested position).
    pub fn sorted(&self, ids: &[String]) -> Vec<String> {
        let mut out: Vec<String> = ids.to_vec();
        out.sort_by(|a, b| {
            let ka = self.order_of(a).unwrap_or(f64::MAX);
            let kb = self.order_of(b).unwrap_or(f64::MAX);
            ka.total_cmp(&kb).then_with(|| {
                let ra = self.recency.get(a).copied().unwrap_or(0);
                let rb = self.recency.get(b).copied().unwrap_or(0);
                rb.cmp(&ra)
            })
        });
        out
    }
}
