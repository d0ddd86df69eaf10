use std::collections::BTreeSet;

use crate::ir::{Graph, NodeId};

/// Partition of the elements of a graph by connectivity.
///
/// `connected` and `disconnected` are disjoint and together cover every
/// element; `pass_through` is the subset of reroute elements and overlaps the
/// other two.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub connected: BTreeSet<NodeId>,
    pub disconnected: BTreeSet<NodeId>,
    pub pass_through: BTreeSet<NodeId>,
}

impl Classification {
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.connected.contains(&id)
    }
}

pub(crate) fn classify(graph: &Graph) -> Classification {
    let mut out = Classification::default();
    for link in graph.resolved_links() {
        out.connected.insert(link.origin);
        out.connected.insert(link.target);
    }
    for element in graph.elements.values() {
        if !out.connected.contains(&element.id) {
            out.disconnected.insert(element.id);
        }
        if element.is_reroute() {
            out.pass_through.insert(element.id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Element, ElementKind};

    #[test]
    fn dangling_links_do_not_connect() {
        let mut graph = Graph::new();
        for id in 1..=4 {
            let kind = if id == 3 {
                ElementKind::Reroute
            } else {
                ElementKind::Ordinary
            };
            graph.add_element(Element::new(id, kind, 0.0, 0.0, 50.0, 50.0));
        }
        graph.connect(1, 1, 0, 3, 0);
        graph.connect(2, 3, 0, 2, 0);
        // endpoint 9 does not exist; the link is rejected up front
        assert!(!graph.connect(3, 4, 0, 9, 0));

        let classes = classify(&graph);
        assert_eq!(classes.connected, BTreeSet::from([1, 2, 3]));
        assert_eq!(classes.disconnected, BTreeSet::from([4]));
        assert_eq!(classes.pass_through, BTreeSet::from([3]));
    }
}
