use tracing::debug;

use super::LayoutSession;
use super::packing::PackItem;
use super::types::{ChainSpan, LayeredGraph, LayoutId};
use crate::ir::{Graph, NodeId};

/// Top-level layout input: the condensed DAG, the room collapsed chains need
/// between its nodes, and the disconnected elements that go to the left
/// margin.
#[derive(Debug, Default)]
pub(super) struct TopLevel {
    pub graph: LayeredGraph,
    pub spans: Vec<ChainSpan>,
    pub margin: Vec<PackItem>,
}

/// Node standing in for `id` at the top level: the element itself, or the
/// outermost group that owns it. Fixed and collapsed elements have none.
pub(super) fn representative(graph: &Graph, session: &LayoutSession, id: NodeId) -> Option<LayoutId> {
    if session.collapsed.is_removed(id) {
        return None;
    }
    if let Some(group) = session.hierarchy.top_level_owner(id) {
        return Some(LayoutId::Group(group));
    }
    let element = graph.elements.get(&id)?;
    if element.is_fixed() {
        return None;
    }
    Some(LayoutId::Element(id))
}

pub(super) fn build_top_level(graph: &Graph, session: &LayoutSession) -> TopLevel {
    let mut top = TopLevel::default();

    for element in graph.elements.values() {
        if element.is_fixed()
            || session.collapsed.is_removed(element.id)
            || session.hierarchy.owner_of(element.id).is_some()
        {
            continue;
        }
        let id = LayoutId::Element(element.id);
        if session.classes.is_connected(element.id) {
            top.graph.add_node(id, element.width, element.height);
        } else {
            top.margin.push(PackItem::new(id, element.width, element.height));
        }
    }
    for root in &session.hierarchy.roots {
        if let Some(plan) = session.plans.get(root) {
            top.graph.add_node(LayoutId::Group(*root), plan.width, plan.height);
        }
    }

    let direct = graph
        .resolved_links()
        .filter(|link| {
            !session.collapsed.is_removed(link.origin) && !session.collapsed.is_removed(link.target)
        })
        .map(|link| (link.origin, link.target));
    let edges: Vec<(NodeId, NodeId)> = direct
        .chain(session.collapsed.virtual_edges.iter().copied())
        .collect();
    let mut dropped = 0;
    for (origin, target) in edges {
        let (Some(from), Some(to)) = (
            representative(graph, session, origin),
            representative(graph, session, target),
        ) else {
            dropped += 1;
            continue;
        };
        if !top.graph.add_edge(from, to) {
            dropped += 1;
        }
    }

    for chain in &session.collapsed.chains {
        let Some(from) = representative(graph, session, chain.source.node) else {
            continue;
        };
        let room = chain.room(graph);
        for target in &chain.targets {
            match representative(graph, session, target.node) {
                Some(to) if to != from => top.spans.push(ChainSpan { from, to, room }),
                _ => {}
            }
        }
    }

    debug!(
        nodes = top.graph.nodes.len(),
        edges = top.graph.edge_count(),
        dropped,
        margin = top.margin.len(),
        "built top-level layout graph"
    );
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{Element, ElementKind, Group, Rect};

    #[test]
    fn substitutes_group_representatives_and_drops_internal_edges() {
        let mut graph = Graph::new();
        graph.add_group(Group::new(1, "g", Some(Rect::new(0.0, 0.0, 800.0, 600.0))));
        graph.add_element(Element::new(10, ElementKind::Ordinary, 50.0, 100.0, 100.0, 50.0));
        graph.add_element(Element::new(11, ElementKind::Ordinary, 300.0, 100.0, 100.0, 50.0));
        graph.add_element(Element::new(20, ElementKind::Ordinary, 1000.0, 100.0, 100.0, 50.0));
        graph.add_element(Element::new(21, ElementKind::Ordinary, 1000.0, 400.0, 100.0, 50.0));
        graph.add_element(Element::new(30, ElementKind::Ordinary, 1000.0, 800.0, 100.0, 50.0));
        let mut pinned = Element::new(40, ElementKind::Ordinary, 1500.0, 0.0, 100.0, 50.0);
        pinned.pinned = true;
        graph.add_element(pinned);
        graph.connect(1, 10, 0, 11, 0);
        graph.connect(2, 11, 0, 20, 0);
        graph.connect(3, 20, 0, 10, 1);
        graph.connect(4, 21, 0, 40, 0);

        let config = LayoutConfig::default();
        let session = LayoutSession::new(&graph, &config);
        let top = build_top_level(&graph, &session);

        let ids: Vec<LayoutId> = top.graph.nodes.keys().copied().collect();
        assert_eq!(
            ids,
            vec![
                LayoutId::Element(20),
                LayoutId::Element(21),
                LayoutId::Group(1)
            ]
        );
        // 10 -> 11 is internal; group <-> 20 in both directions; 21 -> pinned dropped
        assert_eq!(top.graph.edge_count(), 2);
        assert_eq!(top.margin.len(), 1);
        assert_eq!(top.margin[0].id, LayoutId::Element(30));
    }

    #[test]
    fn reroute_chains_become_virtual_edges() {
        let mut graph = Graph::new();
        graph.add_element(Element::new(1, ElementKind::Ordinary, 0.0, 0.0, 100.0, 50.0));
        graph.add_element(Element::new(2, ElementKind::Reroute, 0.0, 0.0, 20.0, 20.0));
        graph.add_element(Element::new(3, ElementKind::Ordinary, 0.0, 0.0, 100.0, 50.0));
        graph.connect(1, 1, 0, 2, 0);
        graph.connect(2, 2, 0, 3, 0);

        let config = LayoutConfig::default();
        let session = LayoutSession::new(&graph, &config);
        let top = build_top_level(&graph, &session);
        assert!(!top.graph.nodes.contains_key(&LayoutId::Element(2)));
        assert_eq!(top.graph.nodes[&LayoutId::Element(1)].succs, vec![LayoutId::Element(3)]);
        assert_eq!(
            top.spans,
            vec![ChainSpan {
                from: LayoutId::Element(1),
                to: LayoutId::Element(3),
                room: 40.0
            }]
        );

        let config = LayoutConfig {
            collapse_reroutes: false,
            ..LayoutConfig::default()
        };
        let session = LayoutSession::new(&graph, &config);
        let top = build_top_level(&graph, &session);
        assert_eq!(top.graph.nodes.len(), 3);
        assert_eq!(top.graph.edge_count(), 2);
    }
}
