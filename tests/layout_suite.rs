use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use nodegraph_layout::ir::{Element, ElementKind, Graph, Rect};
use nodegraph_layout::layout::{Hierarchy, LayoutId, overlapping_pairs};
use nodegraph_layout::{
    Document, LayoutConfig, compute_layout, layout_selected_groups, parse_document,
};
use proptest::prelude::*;

const TOLERANCE: f32 = 0.5;

fn load_fixture(rel: &str) -> Document {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    assert!(path.exists(), "fixture missing: {}", rel);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    parse_document(&input).expect("parse failed")
}

fn snapshot(graph: &Graph) -> (BTreeMap<i64, Rect>, BTreeMap<i64, Option<Rect>>) {
    let elements = graph
        .elements
        .values()
        .map(|element| (element.id, element.rect()))
        .collect();
    let groups = graph
        .groups
        .values()
        .map(|group| (group.id, group.bounds))
        .collect();
    (elements, groups)
}

fn close(a: &Rect, b: &Rect) -> bool {
    (a.x - b.x).abs() <= TOLERANCE
        && (a.y - b.y).abs() <= TOLERANCE
        && (a.width - b.width).abs() <= TOLERANCE
        && (a.height - b.height).abs() <= TOLERANCE
}

fn content(bounds: &Rect, title_height: f32) -> Rect {
    Rect::new(
        bounds.x,
        bounds.y + title_height,
        bounds.width,
        bounds.height - title_height,
    )
}

fn assert_finite(graph: &Graph, fixture: &str) {
    for element in graph.elements.values() {
        let rect = element.rect();
        assert!(
            rect.x.is_finite() && rect.y.is_finite(),
            "{fixture}: element {} has non-finite position",
            element.id
        );
    }
    for group in graph.groups.values() {
        if let Some(bounds) = group.bounds {
            assert!(bounds.is_valid(), "{fixture}: group {} bounds invalid", group.id);
        }
    }
}

/// Top-level groups and ungrouped elements.
fn top_level_boxes(graph: &Graph, hierarchy: &Hierarchy) -> BTreeMap<LayoutId, Rect> {
    let mut boxes = BTreeMap::new();
    for root in &hierarchy.roots {
        if let Some(bounds) = graph.groups[root].valid_bounds() {
            boxes.insert(LayoutId::Group(*root), bounds);
        }
    }
    for element in graph.elements.values() {
        if hierarchy.owner_of(element.id).is_some() {
            continue;
        }
        boxes.insert(LayoutId::Element(element.id), element.rect());
    }
    boxes
}

fn assert_containment(graph: &Graph, before: &Hierarchy, title_height: f32, fixture: &str) {
    for (element, group) in &before.owner {
        let bounds = graph.groups[group].bounds.expect("group lost its bounds");
        assert!(
            content(&bounds, title_height).encloses(&graph.elements[element].rect(), 1.0),
            "{fixture}: element {element} escaped group {group}"
        );
    }
    for (child, parent) in &before.parent {
        let outer = graph.groups[parent].bounds.expect("group lost its bounds");
        let inner = graph.groups[child].bounds.expect("group lost its bounds");
        assert!(
            content(&outer, title_height).encloses(&inner, 0.0),
            "{fixture}: group {child} escaped group {parent}"
        );
    }
}

fn assert_left_to_right(graph: &Graph, fixture: &str) {
    for link in graph.resolved_links() {
        let origin = &graph.elements[&link.origin];
        let target = &graph.elements[&link.target];
        if origin.is_reroute() || target.is_reroute() {
            continue;
        }
        assert!(
            origin.x + origin.width <= target.x + target.width + TOLERANCE,
            "{fixture}: link {} runs right to left ({} -> {})",
            link.id,
            origin.id,
            target.id
        );
    }
}

#[test]
fn layout_all_fixtures() {
    let config = LayoutConfig::default();

    // Keep this list explicit so new fixtures must be added intentionally.
    let candidates = [
        ("fan_out.json", true),
        ("token_grid.json", true),
        ("reroute_chain.json", true),
        ("nested_tokens.json", true),
        ("mixed.json", true),
        ("interior_chain.json", true),
        ("skip_chain.json", true),
        // pushed clear of the pinned group's stretched box
        ("pinned_member.json", false),
        ("cycle.json", false),
    ];

    for (rel, ordered) in candidates {
        let mut doc = load_fixture(rel);
        let before = Hierarchy::build(&doc.graph, config.title_height);

        let stats = compute_layout(&mut doc.graph, &config);
        assert!(doc.graph.dirty, "{rel}: graph not flagged for redraw");
        assert_eq!(stats.positioned, doc.graph.elements.len(), "{rel}: positioned count");
        assert_finite(&doc.graph, rel);
        assert_containment(&doc.graph, &before, config.title_height, rel);

        let after = Hierarchy::build(&doc.graph, config.title_height);
        assert_eq!(after.owner, before.owner, "{rel}: membership changed");
        let overlaps = overlapping_pairs(&top_level_boxes(&doc.graph, &after));
        assert!(overlaps.is_empty(), "{rel}: overlapping entities {overlaps:?}");
        if ordered {
            assert_left_to_right(&doc.graph, rel);
        }

        let (elements, groups) = snapshot(&doc.graph);
        compute_layout(&mut doc.graph, &config);
        let (elements_again, groups_again) = snapshot(&doc.graph);
        for (id, rect) in &elements {
            assert!(
                close(rect, &elements_again[id]),
                "{rel}: element {id} moved on second run: {rect:?} -> {:?}",
                elements_again[id]
            );
        }
        for (id, bounds) in &groups {
            match (bounds, &groups_again[id]) {
                (Some(a), Some(b)) => assert!(close(a, b), "{rel}: group {id} moved on second run"),
                (a, b) => assert_eq!(a, b, "{rel}: group {id} bounds changed"),
            }
        }

        doc.write_back();
        let text = doc.to_json_string().expect("serialize failed");
        let reparsed = parse_document(&text).expect("written document does not parse");
        assert_eq!(reparsed.graph.elements.len(), doc.graph.elements.len());
    }
}

#[test]
fn single_source_feeds_two_stacked_sinks() {
    let mut doc = load_fixture("fan_out.json");
    let stats = compute_layout(&mut doc.graph, &LayoutConfig::default());
    assert_eq!(stats.layers, 2);

    let graph = &doc.graph;
    let (source, a, b) = (&graph.elements[&1], &graph.elements[&2], &graph.elements[&3]);
    assert_eq!(a.x, b.x);
    assert!(a.x >= source.x + source.width);
    let (upper, lower) = if a.y < b.y { (a, b) } else { (b, a) };
    assert!(upper.y + upper.height <= lower.y, "sinks overlap vertically");
}

#[test]
fn three_column_token_spreads_four_items() {
    let mut doc = load_fixture("token_grid.json");
    compute_layout(&mut doc.graph, &LayoutConfig::default());

    let mut per_column: BTreeMap<i64, usize> = BTreeMap::new();
    for id in 1..=4 {
        *per_column.entry(doc.graph.elements[&id].x.round() as i64).or_default() += 1;
    }
    assert_eq!(per_column.len(), 3);
    let mut counts: Vec<usize> = per_column.values().copied().collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 1, 2]);
}

#[test]
fn reroutes_sit_evenly_on_the_connection() {
    let mut doc = load_fixture("reroute_chain.json");
    let stats = compute_layout(&mut doc.graph, &LayoutConfig::default());
    assert_eq!(stats.layers, 2);

    let graph = &doc.graph;
    let start = graph.elements[&1].output_anchor(0);
    let end = graph.elements[&2].input_anchor(0);
    for (step, id) in [10, 11].into_iter().enumerate() {
        let t = (step as f32 + 1.0) / 3.0;
        let (cx, cy) = graph.elements[&id].rect().center();
        assert!((cx - (start.0 + (end.0 - start.0) * t)).abs() < 1e-3);
        assert!((cy - (start.1 + (end.1 - start.1) * t)).abs() < 1e-3);
    }
}

#[test]
fn reroute_skipping_a_layer_clears_the_node_in_between() {
    let mut doc = load_fixture("skip_chain.json");
    let stats = compute_layout(&mut doc.graph, &LayoutConfig::default());
    assert_eq!(stats.layers, 3);
    assert_eq!(stats.positioned, 4);

    let graph = &doc.graph;
    let (middle, reroute, sink) = (
        graph.elements[&2].rect(),
        graph.elements[&9].rect(),
        graph.elements[&3].rect(),
    );
    assert!(!reroute.intersects(&middle) && !reroute.intersects(&sink));
    assert!(middle.right() <= reroute.x && reroute.right() <= sink.x);
}

#[test]
fn pinned_member_keeps_its_group_clear_of_neighbours() {
    let mut doc = load_fixture("pinned_member.json");
    compute_layout(&mut doc.graph, &LayoutConfig::default());

    let graph = &doc.graph;
    assert_eq!((graph.elements[&11].x, graph.elements[&11].y), (50.0, 800.0));
    let bounds = graph.groups[&1].bounds.expect("group bounds");
    assert!(bounds.encloses(&graph.elements[&11].rect(), 0.0));
    for id in [30, 31, 32] {
        assert!(!bounds.intersects(&graph.elements[&id].rect()), "element {id} overlaps the group");
    }
}

#[test]
fn nested_tokens_arrange_row_of_column() {
    let mut doc = load_fixture("nested_tokens.json");
    compute_layout(&mut doc.graph, &LayoutConfig::default());

    let graph = &doc.graph;
    assert_eq!(graph.elements[&20].x, graph.elements[&21].x);
    assert!(graph.elements[&20].y < graph.elements[&21].y);

    let inner = graph.groups[&2].bounds.expect("inner bounds");
    let row: BTreeSet<i64> = [graph.elements[&10].y, inner.y, graph.elements[&11].y]
        .into_iter()
        .map(|y| y.round() as i64)
        .collect();
    assert_eq!(row.len(), 1);
    assert!(graph.elements[&10].x < inner.x && inner.right() < graph.elements[&11].x);
}

#[test]
fn selected_group_relayout_leaves_the_rest_alone() {
    let mut doc = load_fixture("mixed.json");
    let (elements, groups) = snapshot(&doc.graph);
    let config = LayoutConfig::default();

    let stats = layout_selected_groups(&mut doc.graph, &[3, 99], &config);
    assert_eq!(stats.processed_groups, 1);
    assert_eq!(stats.positioned, 3);

    let inner = doc.graph.groups[&3].bounds.expect("inner bounds");
    let original = groups[&3].expect("inner bounds");
    assert_eq!((inner.x, inner.y), (original.x, original.y));
    for id in [1, 2, 4, 8, 9, 12, 13, 14, 15, 16] {
        assert_eq!(doc.graph.elements[&id].rect(), elements[&id], "element {id} moved");
    }
    for id in [5, 6, 7] {
        assert!(
            content(&inner, config.title_height).encloses(&doc.graph.elements[&id].rect(), 1.0),
            "element {id} left the selected group"
        );
    }

    let stats = layout_selected_groups(&mut doc.graph, &[2, 3], &config);
    assert_eq!(stats.processed_groups, 2);
    assert_eq!(stats.positioned, 4);
}

#[test]
fn degenerate_inputs_stay_finite() {
    let config = LayoutConfig::default();

    let mut empty = Graph::new();
    let stats = compute_layout(&mut empty, &config);
    assert_eq!(stats.positioned, 0);

    let mut single = Graph::new();
    single.add_element(Element::new(1, ElementKind::Ordinary, f32::NAN, 3.0, -5.0, 0.0));
    compute_layout(&mut single, &config);
    let element = &single.elements[&1];
    assert_eq!(element.rect(), Rect::new(50.0, 50.0, 200.0, 100.0));

    let mut unlinked = Graph::new();
    for id in 0..6 {
        unlinked.add_element(Element::new(id, ElementKind::Ordinary, 0.0, 0.0, 100.0 + id as f32, 40.0));
    }
    compute_layout(&mut unlinked, &config);
    assert_finite(&unlinked, "unlinked");
    let hierarchy = Hierarchy::build(&unlinked, config.title_height);
    assert!(overlapping_pairs(&top_level_boxes(&unlinked, &hierarchy)).is_empty());
}

fn random_dag(sizes: &[(f32, f32)], edges: &[(usize, usize)]) -> Graph {
    let mut graph = Graph::new();
    for (idx, (w, h)) in sizes.iter().enumerate() {
        graph.add_element(Element::new(idx as i64, ElementKind::Ordinary, 0.0, 0.0, *w, *h));
    }
    let n = sizes.len();
    for (link, (a, b)) in edges.iter().enumerate() {
        let (a, b) = (a % n, b % n);
        if a < b {
            graph.connect(link as i64, a as i64, 0, b as i64, 0);
        }
    }
    graph
}

proptest! {
    #[test]
    fn random_dags_lay_out_cleanly(
        sizes in proptest::collection::vec((40.0f32..300.0, 30.0f32..200.0), 1..24),
        edges in proptest::collection::vec((0usize..24, 0usize..24), 0..40),
    ) {
        let config = LayoutConfig::default();
        let mut graph = random_dag(&sizes, &edges);
        compute_layout(&mut graph, &config);

        let hierarchy = Hierarchy::build(&graph, config.title_height);
        prop_assert!(overlapping_pairs(&top_level_boxes(&graph, &hierarchy)).is_empty());
        for element in graph.elements.values() {
            prop_assert!(element.x.is_finite() && element.y.is_finite());
        }
        for link in graph.resolved_links() {
            let origin = &graph.elements[&link.origin];
            let target = &graph.elements[&link.target];
            prop_assert!(origin.x + origin.width <= target.x);
        }

        let (first, _) = snapshot(&graph);
        compute_layout(&mut graph, &config);
        let (second, _) = snapshot(&graph);
        for (id, rect) in &first {
            prop_assert!(close(rect, &second[id]));
        }
    }
}
