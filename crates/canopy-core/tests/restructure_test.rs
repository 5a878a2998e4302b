use canopy_core::cache::PositionCache;
use canopy_core::content::NodeContent;
use canopy_core::error::Error;
use canopy_core::geom::{Point, Rect};
use canopy_core::node::Node;
use canopy_core::restructure::{
    DragPhase, DragState, DropPosition, drop_position_for_pointer, reparent,
};
use canopy_core::tree::{ROOT_ID, TreeState};

fn add(tree: &mut TreeState, id: &str, parent: &str, order: f64) {
    tree.order_mut().assign(id.to_string(), order);
    tree.insert(Node::new(id, parent, NodeContent::from_label_html(id)))
        .unwrap();
}

/// x
/// ├── y
/// └── z
///     └── w
fn sample_tree() -> TreeState {
    let mut tree = TreeState::new();
    add(&mut tree, "x", ROOT_ID, 1.0);
    add(&mut tree, "y", "x", 1.0);
    add(&mut tree, "z", "x", 2.0);
    add(&mut tree, "w", "z", 1.0);
    tree
}

fn warm_cache(tree: &TreeState) -> PositionCache {
    let mut cache = PositionCache::new();
    for (i, id) in tree.node_ids().enumerate() {
        cache.set(id.to_string(), Point::new(i as f64, i as f64));
    }
    cache
}

#[test]
fn reparenting_under_a_descendant_fails_with_cycle() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);
    let before: Vec<String> = tree.descendants("x");

    // z is a descendant of x, so x cannot move under it.
    let err = reparent(
        &mut tree,
        &mut cache,
        "x",
        "z",
        DropPosition::AsLastChild("z".to_string()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));

    // The tree is unchanged on failure.
    assert_eq!(tree.descendants("x"), before);
    assert_eq!(tree.parent_of("x"), Some(ROOT_ID));
    tree.validate().unwrap();
}

#[test]
fn reparenting_under_itself_fails_with_cycle() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);
    let err = reparent(
        &mut tree,
        &mut cache,
        "y",
        "y",
        DropPosition::AsLastChild("y".to_string()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
}

#[test]
fn moving_a_leaf_under_its_sibling_is_legal() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);

    // y is not an ancestor of z's subtree, so this is an ordinary move.
    let outcome = reparent(
        &mut tree,
        &mut cache,
        "y",
        "z",
        DropPosition::AsLastChild("z".to_string()),
    )
    .unwrap();

    assert_eq!(tree.parent_of("y"), Some("z"));
    assert_eq!(tree.children_ordered("z"), ["w", "y"]);
    assert_eq!(outcome.edge.source, "z");
    assert_eq!(outcome.edge.target, "y");
    assert_eq!(tree.order().order_of("y"), Some(outcome.order_key));
    tree.validate().unwrap();
}

#[test]
fn drop_before_and_after_resolve_sibling_neighbors() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);
    add(&mut tree, "v", ROOT_ID, 2.0);

    reparent(
        &mut tree,
        &mut cache,
        "v",
        "x",
        DropPosition::Before("z".to_string()),
    )
    .unwrap();
    assert_eq!(tree.children_ordered("x"), ["y", "v", "z"]);

    reparent(
        &mut tree,
        &mut cache,
        "v",
        "x",
        DropPosition::After("z".to_string()),
    )
    .unwrap();
    assert_eq!(tree.children_ordered("x"), ["y", "z", "v"]);

    reparent(
        &mut tree,
        &mut cache,
        "v",
        "x",
        DropPosition::AsFirstChild("x".to_string()),
    )
    .unwrap();
    assert_eq!(tree.children_ordered("x"), ["v", "y", "z"]);
}

#[test]
fn a_mismatched_drop_parent_is_rejected() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);
    // Anchor y lives under x, not under z.
    let err = reparent(
        &mut tree,
        &mut cache,
        "w",
        "z",
        DropPosition::Before("y".to_string()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidDrop { .. }));
    assert_eq!(tree.parent_of("w"), Some("z"));
}

#[test]
fn reparent_invalidates_the_moved_subtree_positions() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);

    reparent(
        &mut tree,
        &mut cache,
        "z",
        "y",
        DropPosition::AsLastChild("y".to_string()),
    )
    .unwrap();

    // The moved node and its descendant lost their cached positions; the
    // rest keep theirs until the next layout pass.
    assert!(!cache.contains("z"));
    assert!(!cache.contains("w"));
    assert!(cache.contains("x"));
    assert!(cache.contains("y"));
}

#[test]
fn reparent_marks_the_node_dirty() {
    let mut tree = sample_tree();
    let mut cache = warm_cache(&tree);
    assert!(!tree.node("y").unwrap().dirty);
    reparent(
        &mut tree,
        &mut cache,
        "y",
        "z",
        DropPosition::AsFirstChild("z".to_string()),
    )
    .unwrap();
    assert!(tree.node("y").unwrap().dirty);
}

#[test]
fn pointer_bands_pick_the_drop_position() {
    let target = Rect::new(0.0, 90.0, 200.0, 60.0);
    assert_eq!(
        drop_position_for_pointer("t", target, Point::new(10.0, 95.0)),
        DropPosition::Before("t".to_string())
    );
    assert_eq!(
        drop_position_for_pointer("t", target, Point::new(10.0, 120.0)),
        DropPosition::AsLastChild("t".to_string())
    );
    assert_eq!(
        drop_position_for_pointer("t", target, Point::new(10.0, 145.0)),
        DropPosition::After("t".to_string())
    );
}

#[test]
fn drag_below_the_slop_radius_stays_a_click() {
    let mut drag = DragState::new();
    drag.pointer_down("n", Point::new(10.0, 10.0), 0);
    drag.pointer_move(Point::new(11.0, 11.0));
    assert!(!drag.is_dragging());
    assert_eq!(drag.pointer_up(), None);
    assert_eq!(*drag.phase(), DragPhase::Idle);
}

#[test]
fn drag_past_the_slop_radius_tracks_the_ghost() {
    let mut drag = DragState::new();
    drag.pointer_down("n", Point::new(0.0, 0.0), 0);
    drag.pointer_move(Point::new(10.0, 0.0));
    assert!(drag.is_dragging());
    drag.pointer_move(Point::new(30.0, 40.0));

    let drop = drag.pointer_up().unwrap();
    assert_eq!(drop.node_id, "n");
    assert_eq!(drop.at, Point::new(30.0, 40.0));
    assert_eq!(*drag.phase(), DragPhase::Dropping);

    drag.complete();
    assert_eq!(*drag.phase(), DragPhase::Idle);
    assert_eq!(drag.dragged_node(), None);
}

#[test]
fn cancel_aborts_a_drag_in_flight() {
    let mut drag = DragState::new();
    drag.pointer_down("n", Point::new(0.0, 0.0), 0);
    drag.pointer_move(Point::new(20.0, 0.0));
    drag.cancel();
    assert_eq!(*drag.phase(), DragPhase::Idle);
    assert_eq!(drag.pointer_up(), None);
}
