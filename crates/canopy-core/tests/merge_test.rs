use canopy_core::cache::PositionCache;
use canopy_core::content::NodeContent;
use canopy_core::events::{RemoteEnvelope, RemoteEvent};
use canopy_core::geom::Point;
use canopy_core::merge::{MergeEngine, RelayoutScope};
use canopy_core::node::{Node, NodeRecord};
use canopy_core::registry::PendingEditRegistry;
use canopy_core::tree::{Edge, ROOT_ID, TreeState};

const LOCAL: &str = "session-local";
const REMOTE: &str = "session-remote";

struct Fixture {
    tree: TreeState,
    cache: PositionCache,
    registry: PendingEditRegistry,
    selection: Option<String>,
    engine: MergeEngine,
}

impl Fixture {
    fn new() -> Self {
        let mut tree = TreeState::new();
        for (id, parent, order) in [
            ("a", ROOT_ID, 1.0),
            ("b", ROOT_ID, 2.0),
            ("b1", "b", 1.0),
        ] {
            tree.order_mut().assign(id.to_string(), order);
            tree.insert(Node::new(
                id,
                parent,
                NodeContent::from_label_html(format!("<p>{id}</p>")),
            ))
            .unwrap();
        }
        let mut cache = PositionCache::new();
        for (i, id) in ["a", "b", "b1"].iter().enumerate() {
            cache.set(id.to_string(), Point::new(i as f64 * 10.0, 0.0));
        }
        Self {
            tree,
            cache,
            registry: PendingEditRegistry::new(),
            selection: None,
            engine: MergeEngine::new(LOCAL),
        }
    }

    fn apply(&mut self, event: RemoteEvent) -> canopy_core::merge::MergeOutcome {
        self.apply_at(event, 1_000_000)
    }

    fn apply_at(&mut self, event: RemoteEvent, now_ms: i64) -> canopy_core::merge::MergeOutcome {
        let envelope = RemoteEnvelope::new("map", REMOTE, event);
        self.engine.apply(
            &mut self.tree,
            &mut self.cache,
            &mut self.registry,
            &mut self.selection,
            &envelope,
            now_ms,
        )
    }
}

fn record(id: &str, parent: &str, order: f64) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        parent_id: parent.to_string(),
        order,
        label: None,
        description: None,
        completed: None,
        highlight: None,
        task_link: None,
        collapsed: None,
    }
}

#[test]
fn self_originated_events_are_ignored() {
    let mut fx = Fixture::new();
    let envelope = RemoteEnvelope::new(
        "map",
        LOCAL,
        RemoteEvent::NodeDeleted {
            node_ids: vec!["a".to_string()],
        },
    );
    let outcome = fx.engine.apply(
        &mut fx.tree,
        &mut fx.cache,
        &mut fx.registry,
        &mut fx.selection,
        &envelope,
        0,
    );
    assert!(!outcome.applied);
    assert!(fx.tree.has_node("a"));
}

#[test]
fn badge_update_on_an_edited_node_keeps_the_label_byte_identical() {
    let mut fx = Fixture::new();
    fx.registry.begin_edit("a", 0);
    let label_before = fx.tree.node("a").unwrap().content.label.html.clone();

    let mut rec = record("a", ROOT_ID, 1.0);
    rec.completed = Some(true);
    let outcome = fx.apply(RemoteEvent::NodeUpdated { node: rec });

    let node = fx.tree.node("a").unwrap();
    assert!(node.badges.completed);
    assert_eq!(node.content.label.html, label_before);
    // An attribute-only change never re-lays the node's box.
    assert_eq!(outcome.relayout, RelayoutScope::None);
    assert!(outcome.content_dropped.is_empty());
}

#[test]
fn remote_content_loses_against_active_typing() {
    let mut fx = Fixture::new();
    fx.registry.begin_edit("a", 0);

    let mut rec = record("a", ROOT_ID, 1.0);
    rec.label = Some("<p>remote wins?</p>".to_string());
    rec.completed = Some(true);
    // Well past the grace window.
    let outcome = fx.apply_at(RemoteEvent::NodeUpdated { node: rec }, 1_000_000);

    let node = fx.tree.node("a").unwrap();
    assert_eq!(node.content.label.html, "<p>a</p>");
    assert!(node.badges.completed, "non-content attributes still pass");
    assert_eq!(outcome.content_dropped, ["a"]);
}

#[test]
fn a_young_edit_session_lets_one_remote_content_update_through() {
    let mut fx = Fixture::new();
    fx.registry.begin_edit("a", 1_000);

    let mut rec = record("a", ROOT_ID, 1.0);
    rec.label = Some("<p>echo of own save</p>".to_string());
    let outcome = fx.apply_at(RemoteEvent::NodeUpdated { node: rec.clone() }, 1_200);
    assert!(outcome.content_dropped.is_empty());
    assert_eq!(
        fx.tree.node("a").unwrap().content.label.html,
        "<p>echo of own save</p>"
    );

    // The guard re-engages: the second update within the window is dropped.
    rec.label = Some("<p>second</p>".to_string());
    let outcome = fx.apply_at(RemoteEvent::NodeUpdated { node: rec }, 1_300);
    assert_eq!(outcome.content_dropped, ["a"]);
    assert_eq!(
        fx.tree.node("a").unwrap().content.label.html,
        "<p>echo of own save</p>"
    );
}

#[test]
fn unsaved_but_unfocused_content_is_protected_too() {
    let mut fx = Fixture::new();
    fx.registry.mark_unsaved("a");

    let mut rec = record("a", ROOT_ID, 1.0);
    rec.label = Some("<p>remote</p>".to_string());
    rec.highlight = Some(true);
    let outcome = fx.apply(RemoteEvent::NodeUpdated { node: rec });

    let node = fx.tree.node("a").unwrap();
    assert_eq!(node.content.label.html, "<p>a</p>");
    assert!(node.badges.highlight);
    assert_eq!(outcome.content_dropped, ["a"]);
}

#[test]
fn uninterested_nodes_are_replaced_wholesale() {
    let mut fx = Fixture::new();
    fx.tree.node_mut("a").unwrap().dirty = true;

    let mut rec = record("a", ROOT_ID, 4.0);
    rec.label = Some("<p>fresh</p>".to_string());
    rec.completed = Some(true);
    let outcome = fx.apply(RemoteEvent::NodeUpdated { node: rec });

    let node = fx.tree.node("a").unwrap();
    assert_eq!(node.content.label.html, "<p>fresh</p>");
    assert!(node.badges.completed);
    assert!(!node.dirty, "remote version owns the node now");
    assert_eq!(fx.tree.order().order_of("a"), Some(4.0));
    assert_eq!(outcome.relayout, RelayoutScope::Full);
    // Display order follows the new key.
    assert_eq!(fx.tree.children_ordered(ROOT_ID), ["b", "a"]);
}

#[test]
fn an_unknown_node_is_inserted_and_forces_a_checkpoint() {
    let mut fx = Fixture::new();
    let mut rec = record("c", "b", 2.0);
    rec.label = Some("<p>new</p>".to_string());
    let outcome = fx.apply(RemoteEvent::NodeUpdated { node: rec });

    assert!(fx.tree.has_node("c"));
    assert_eq!(fx.tree.parent_of("c"), Some("b"));
    assert_eq!(outcome.created, ["c"]);
    assert!(outcome.checkpoint);
    assert_eq!(outcome.relayout, RelayoutScope::Full);
    fx.tree.validate().unwrap();
}

#[test]
fn created_node_with_a_missing_parent_recovers_under_root() {
    let mut fx = Fixture::new();
    let rec = record("orphan", "nowhere", 1.0);
    let outcome = fx.apply(RemoteEvent::NodeCreated {
        node: rec,
        edge: Some(Edge::between("nowhere", "orphan")),
    });

    assert_eq!(outcome.created, ["orphan"]);
    assert_eq!(fx.tree.parent_of("orphan"), Some(ROOT_ID));
    fx.tree.validate().unwrap();
}

#[test]
fn batch_updates_apply_per_node_in_order() {
    let mut fx = Fixture::new();
    fx.registry.begin_edit("a", 0);

    let mut protected = record("a", ROOT_ID, 1.0);
    protected.label = Some("<p>blocked</p>".to_string());
    let mut open = record("b", ROOT_ID, 2.0);
    open.label = Some("<p>applied</p>".to_string());

    let outcome = fx.apply(RemoteEvent::NodeBatchUpdated {
        nodes: vec![protected, open],
    });

    assert_eq!(fx.tree.node("a").unwrap().content.label.html, "<p>a</p>");
    assert_eq!(
        fx.tree.node("b").unwrap().content.label.html,
        "<p>applied</p>"
    );
    assert_eq!(outcome.content_dropped, ["a"]);
}

#[test]
fn deletion_removes_subtrees_and_clears_local_pointers() {
    let mut fx = Fixture::new();
    fx.selection = Some("b1".to_string());
    fx.registry.begin_edit("b1", 0);

    let outcome = fx.apply(RemoteEvent::NodeDeleted {
        node_ids: vec!["b".to_string()],
    });

    assert_eq!(outcome.removed, ["b", "b1"]);
    assert!(outcome.selection_cleared);
    assert!(fx.selection.is_none());
    assert!(!fx.registry.is_editing("b1"));
    assert!(!fx.tree.has_node("b"));
    assert!(!fx.tree.has_node("b1"));
    assert!(!fx.cache.contains("b"));
    assert!(!fx.cache.contains("b1"));
    assert!(outcome.checkpoint);
}

#[test]
fn deleting_already_missing_nodes_is_silent() {
    let mut fx = Fixture::new();
    let outcome = fx.apply(RemoteEvent::NodeDeleted {
        node_ids: vec!["ghost".to_string()],
    });
    assert!(outcome.applied);
    assert!(outcome.removed.is_empty());
    assert!(!outcome.checkpoint);
}

#[test]
fn remote_reparent_moves_the_subtree_and_invalidates_positions() {
    let mut fx = Fixture::new();
    let outcome = fx.apply(RemoteEvent::NodeReparented {
        node_id: "b".to_string(),
        edge: Edge::between("a", "b"),
        order: 1.0,
    });

    assert_eq!(fx.tree.parent_of("b"), Some("a"));
    assert!(!fx.cache.contains("b"));
    assert!(!fx.cache.contains("b1"), "descendants shift too");
    assert!(fx.cache.contains("a"));
    assert_eq!(outcome.relayout, RelayoutScope::Full);
    assert!(outcome.checkpoint);
    fx.tree.validate().unwrap();
}

#[test]
fn remote_reparent_that_would_cycle_is_dropped() {
    let mut fx = Fixture::new();
    let outcome = fx.apply(RemoteEvent::NodeReparented {
        node_id: "b".to_string(),
        edge: Edge::between("b1", "b"),
        order: 1.0,
    });
    assert_eq!(fx.tree.parent_of("b"), Some(ROOT_ID));
    assert_eq!(outcome.relayout, RelayoutScope::None);
    fx.tree.validate().unwrap();
}

#[test]
fn natural_image_sizes_survive_a_content_replace() {
    let mut fx = Fixture::new();
    {
        let node = fx.tree.node_mut("a").unwrap();
        node.content = NodeContent::from_label_html(r#"<img src="pic.png">"#);
        node.content.set_image_natural_size(0, 640.0, 480.0);
    }

    let mut rec = record("a", ROOT_ID, 1.0);
    rec.label = Some(r#"<p>now with text</p><img src="pic.png">"#.to_string());
    fx.apply(RemoteEvent::NodeUpdated { node: rec });

    let img = &fx.tree.node("a").unwrap().content.label.images[0];
    assert_eq!(img.natural_width, Some(640.0));
    assert_eq!(img.natural_height, Some(480.0));
}
