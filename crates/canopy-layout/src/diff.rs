//! Frame-to-frame layout comparison.
//!
//! The engine produces whole layouts; the presentation layer patches its
//! scene by diffing consecutive results instead of being entangled with the
//! merge and layout passes. All three lists come back in the new layout's
//! display order (exits in the old layout's order).

use canopy_core::geom::Point;

use crate::layout::LayoutResult;

#[derive(Debug, Clone, PartialEq)]
pub struct MovedNode {
    pub id: String,
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutDiff {
    /// Nodes visible now that were not before (created, expanded, merged in).
    pub entered: Vec<String>,
    /// Nodes no longer visible (deleted, collapsed away).
    pub exited: Vec<String>,
    /// Nodes whose position changed between the two layouts.
    pub moved: Vec<MovedNode>,
}

impl LayoutDiff {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty() && self.moved.is_empty()
    }
}

pub fn diff_layouts(old: &LayoutResult, new: &LayoutResult) -> LayoutDiff {
    let mut diff = LayoutDiff::default();

    for (id, to) in &new.positions {
        match old.positions.get(id) {
            None => diff.entered.push(id.clone()),
            Some(from) if from != to => diff.moved.push(MovedNode {
                id: id.clone(),
                from: *from,
                to: *to,
            }),
            Some(_) => {}
        }
    }
    for id in old.positions.keys() {
        if !new.positions.contains_key(id) {
            diff.exited.push(id.clone());
        }
    }

    diff
}
