use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use canopy::PositionCache;
use canopy::content::NodeContent;
use canopy::layout::{LayoutConfig, layout};
use canopy::node::{Node, Size};
use canopy::tree::{ROOT_ID, TreeState};

/// Balanced tree: `branching^depth` leaves, sizes varied deterministically so
/// the span computation cannot collapse into a constant.
fn balanced_tree(depth: usize, branching: usize) -> TreeState {
    let mut tree = TreeState::new();
    let mut frontier: Vec<String> = vec![ROOT_ID.to_string()];
    let mut counter = 0usize;

    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in &frontier {
            for i in 0..branching {
                counter += 1;
                let id = format!("n{counter}");
                tree.order_mut().assign(id.clone(), (i + 1) as f64);
                let mut node = Node::new(
                    id.clone(),
                    parent.clone(),
                    NodeContent::from_label_html(format!("<p>node {counter}</p>")),
                );
                node.size = Some(Size::new(
                    80.0 + (counter % 7) as f64 * 20.0,
                    40.0 + (counter % 3) as f64 * 30.0,
                ));
                tree.insert(node).expect("bench tree insert");
                next.push(id);
            }
        }
        frontier = next;
    }
    tree
}

fn bench_layout_stress(c: &mut Criterion) {
    let tree = balanced_tree(6, 4);
    let cfg = LayoutConfig::default();

    let mut group = c.benchmark_group("layout_stress");
    group.sample_size(50);

    // A full pass over ~5.5k nodes is microsecond-to-millisecond scale, so we
    // batch iterations to get a stable signal out of allocation changes.
    group.bench_function("balanced_tree_layout_x10", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for _ in 0..10usize {
                let mut cache = PositionCache::new();
                let result = layout(black_box(&tree), &cfg, &mut cache);
                acc ^= result.positions.len();
            }
            black_box(acc);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_layout_stress);
criterion_main!(benches);
