use std::collections::BTreeSet;
use std::time::Instant;

use tracing::debug;

use super::groups::{place_group, plan_groups};
use super::hierarchy::Hierarchy;
use super::reroute::Collapsed;
use super::resize::resize_groups;
use super::types::SelectionStats;
use crate::config::LayoutConfig;
use crate::ir::{Graph, GroupId};

/// Re-lays out the interiors of the selected groups in place.
///
/// Only selected groups without a selected ancestor act as roots; their
/// nested groups are always included. Each root keeps its top-left corner,
/// only links between members of the same group are considered, and nothing
/// outside the selected subtrees moves. Ids that resolve to no usable group
/// are ignored.
pub fn layout_selected_groups(
    graph: &mut Graph,
    selected: &[GroupId],
    config: &LayoutConfig,
) -> SelectionStats {
    let started = Instant::now();
    graph.sanitize_geometry(config.default_width, config.default_height);
    let hierarchy = Hierarchy::build(graph, config.title_height);

    let chosen: BTreeSet<GroupId> = selected
        .iter()
        .copied()
        .filter(|id| hierarchy.contains_group(*id))
        .collect();
    let roots: Vec<GroupId> = chosen
        .iter()
        .copied()
        .filter(|id| !chosen.iter().any(|other| hierarchy.is_ancestor(*other, *id)))
        .collect();
    if roots.is_empty() {
        debug!(requested = selected.len(), "no layoutable group in selection");
        return SelectionStats {
            elapsed: started.elapsed(),
            ..Default::default()
        };
    }

    let mut stats = SelectionStats::default();
    for root in roots {
        let Some(origin) = hierarchy.bounds.get(&root).copied() else {
            continue;
        };
        let order = hierarchy.subtree_deepest_first(root);
        let plans = plan_groups(graph, &hierarchy, &Collapsed::default(), &order, config);
        stats.positioned += place_group(graph, &plans, root, origin.x, origin.y);
        resize_groups(graph, &hierarchy, &order, config);
        stats.processed_groups += order.len();
    }
    graph.mark_dirty();
    stats.elapsed = started.elapsed();
    debug!(
        positioned = stats.positioned,
        groups = stats.processed_groups,
        "laid out selected groups"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Element, ElementKind, Group, Rect};

    fn selection_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_group(Group::new(1, "outer", Some(Rect::new(100.0, 100.0, 900.0, 900.0))));
        graph.add_group(Group::new(2, "inner [HORIZONTAL]", Some(Rect::new(150.0, 500.0, 700.0, 400.0))));
        graph.add_element(Element::new(10, ElementKind::Ordinary, 300.0, 200.0, 100.0, 50.0));
        graph.add_element(Element::new(11, ElementKind::Ordinary, 600.0, 300.0, 100.0, 50.0));
        graph.add_element(Element::new(20, ElementKind::Ordinary, 500.0, 600.0, 100.0, 50.0));
        graph.add_element(Element::new(21, ElementKind::Ordinary, 200.0, 700.0, 100.0, 50.0));
        graph.add_element(Element::new(30, ElementKind::Ordinary, 2000.0, 2000.0, 100.0, 50.0));
        graph.connect(1, 10, 0, 11, 0);
        graph
    }

    #[test]
    fn nested_groups_are_included_and_outside_stays() {
        let mut graph = selection_graph();
        let stats = layout_selected_groups(&mut graph, &[2, 1], &LayoutConfig::default());
        assert_eq!(stats.processed_groups, 2);
        assert_eq!(stats.positioned, 4);
        assert!(graph.dirty);

        let outer = graph.groups[&1].bounds.unwrap();
        assert_eq!((outer.x, outer.y), (100.0, 100.0));
        // inner items sorted by x: 21 then 20, in one row
        assert_eq!(graph.elements[&21].y, graph.elements[&20].y);
        assert!(graph.elements[&21].x < graph.elements[&20].x);
        assert_eq!(graph.elements[&30].x, 2000.0);
    }

    #[test]
    fn unknown_ids_yield_zero_result() {
        let mut graph = selection_graph();
        let before = graph.elements[&10].x;
        let stats = layout_selected_groups(&mut graph, &[42], &LayoutConfig::default());
        assert_eq!(stats.positioned, 0);
        assert_eq!(stats.processed_groups, 0);
        assert_eq!(graph.elements[&10].x, before);
        assert!(!graph.dirty);
    }
}
