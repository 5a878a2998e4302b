//! The tree positioning pass.
//!
//! Horizontal placement follows depth: a child's left edge starts a fixed
//! spacing to the right of its parent's right edge, so the x offset of a node
//! accumulates every ancestor's own width. Vertical placement is computed
//! bottom-up: a subtree's span is the sum of its visible children's spans
//! (floored at the node's own height so tall cards cannot overlap their
//! neighbors), and each node sits vertically centered against its span.
//!
//! Collapsed nodes are positioned themselves but contribute nothing for their
//! descendants, which receive no position entry at all.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use canopy_core::cache::PositionCache;
use canopy_core::geom::{Bounds, Point};
use canopy_core::node::Size;
use canopy_core::tree::{ROOT_ID, TreeState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Anchor of the (virtual) root; the first top-level subtree starts here.
    pub origin: Point,
    /// Horizontal gap between a parent's right edge and its children.
    pub layer_spacing: f64,
    /// Vertical gap between adjacent sibling subtrees.
    pub sibling_gap: f64,
    /// Box used for nodes that have not been measured yet (a freshly merged
    /// remote node before its first size pass).
    pub fallback_size: Size,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            layer_spacing: 48.0,
            sibling_gap: 16.0,
            fallback_size: Size::new(80.0, 40.0),
        }
    }
}

/// Connector geometry for one visible parent→child link: a straight segment
/// from the parent's right-edge midpoint to the child's left-edge midpoint.
/// Hosts are free to render it as a curve through the same endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutResult {
    /// Top-left position per visible node, in depth-first display order.
    pub positions: IndexMap<String, Point>,
    /// One connector per visible non-top-level node, in display order.
    pub edges: Vec<LayoutEdge>,
    pub bounds: Option<Bounds>,
}

/// Lays out every visible node and replaces the cache contents with the fresh
/// positions. Identical inputs yield byte-identical results.
pub fn layout(tree: &TreeState, cfg: &LayoutConfig, cache: &mut PositionCache) -> LayoutResult {
    let mut spans: FxHashMap<String, f64> = FxHashMap::default();
    let top_level = tree.children_ordered(ROOT_ID);
    for id in &top_level {
        compute_span(tree, cfg, id, &mut spans);
    }

    let mut positions: IndexMap<String, Point> = IndexMap::new();
    let mut top = cfg.origin.y;
    for id in &top_level {
        let span = spans.get(id).copied().unwrap_or(0.0);
        place(tree, cfg, id, cfg.origin.x, top, &spans, &mut positions);
        top += span + cfg.sibling_gap;
    }

    let edges = connector_edges(tree, cfg, &positions);

    let bounds = Bounds::from_points(positions.iter().flat_map(|(id, p)| {
        let size = size_of(tree, cfg, id);
        [(p.x, p.y), (p.x + size.width, p.y + size.height)]
    }));

    cache.replace_all(positions.iter().map(|(id, p)| (id.clone(), *p)));

    LayoutResult {
        positions,
        edges,
        bounds,
    }
}

/// Derives connector segments for every positioned node whose parent is also
/// positioned (top-level nodes hang off the virtual root and get none).
fn connector_edges(
    tree: &TreeState,
    cfg: &LayoutConfig,
    positions: &IndexMap<String, Point>,
) -> Vec<LayoutEdge> {
    let mut edges = Vec::new();
    for (id, pos) in positions {
        let Some(parent) = tree.parent_of(id).filter(|p| *p != ROOT_ID) else {
            continue;
        };
        let Some(parent_pos) = positions.get(parent) else {
            continue;
        };
        let parent_size = size_of(tree, cfg, parent);
        let size = size_of(tree, cfg, id);
        edges.push(LayoutEdge {
            id: format!("edge_{parent}_{id}"),
            source: parent.to_string(),
            target: id.clone(),
            points: vec![
                Point::new(
                    parent_pos.x + parent_size.width,
                    parent_pos.y + parent_size.height / 2.0,
                ),
                Point::new(pos.x, pos.y + size.height / 2.0),
            ],
        });
    }
    edges
}

fn size_of(tree: &TreeState, cfg: &LayoutConfig, id: &str) -> Size {
    tree.node(id)
        .and_then(|n| n.size)
        .unwrap_or(cfg.fallback_size)
}

/// Bottom-up visible span of the subtree rooted at `id`.
fn compute_span(
    tree: &TreeState,
    cfg: &LayoutConfig,
    id: &str,
    spans: &mut FxHashMap<String, f64>,
) -> f64 {
    let own_height = size_of(tree, cfg, id).height;
    let collapsed = tree.node(id).is_some_and(|n| n.collapsed);

    let span = if collapsed {
        own_height
    } else {
        let children = tree.children_ordered(id);
        if children.is_empty() {
            own_height
        } else {
            let mut total = 0.0;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    total += cfg.sibling_gap;
                }
                total += compute_span(tree, cfg, child, spans);
            }
            total.max(own_height)
        }
    };
    spans.insert(id.to_string(), span);
    span
}

fn place(
    tree: &TreeState,
    cfg: &LayoutConfig,
    id: &str,
    x: f64,
    top: f64,
    spans: &FxHashMap<String, f64>,
    positions: &mut IndexMap<String, Point>,
) {
    let size = size_of(tree, cfg, id);
    let span = spans.get(id).copied().unwrap_or(size.height);

    // Centered against the subtree's vertical extent.
    let y = top + (span - size.height) / 2.0;
    positions.insert(id.to_string(), Point::new(x, y));

    if tree.node(id).is_some_and(|n| n.collapsed) {
        return;
    }

    let children = tree.children_ordered(id);
    if children.is_empty() {
        return;
    }

    let children_total: f64 = children
        .iter()
        .map(|c| spans.get(c).copied().unwrap_or(0.0))
        .sum::<f64>()
        + cfg.sibling_gap * (children.len() - 1) as f64;

    let child_x = x + size.width + cfg.layer_spacing;
    let mut child_top = top + (span - children_total) / 2.0;
    for child in &children {
        let child_span = spans.get(child).copied().unwrap_or(0.0);
        place(tree, cfg, child, child_x, child_top, spans, positions);
        child_top += child_span + cfg.sibling_gap;
    }
}
