use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use super::hierarchy::Hierarchy;
use super::types::{RerouteChain, SlotRef};
use crate::ir::{Graph, GroupId, NodeId};

/// Result of collapsing reroute chains: the chains themselves, the elements
/// removed from the layered graph, and the virtual edges replacing them.
#[derive(Debug, Clone, Default)]
pub struct Collapsed {
    pub chains: Vec<RerouteChain>,
    pub removed: BTreeSet<NodeId>,
    pub virtual_edges: Vec<(NodeId, NodeId)>,
}

impl Collapsed {
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.removed.contains(&id)
    }
}

/// Traces every chain of collapsible reroutes that is fed directly by a
/// non-collapsible source. `collapsible` decides which pass-through elements
/// may be folded away; everything else is treated as a real element.
pub(crate) fn collapse_chains(graph: &Graph, collapsible: &BTreeSet<NodeId>) -> Collapsed {
    let mut out = Collapsed::default();
    let mut visited: BTreeSet<NodeId> = BTreeSet::new();

    for &start in collapsible {
        if visited.contains(&start) {
            continue;
        }
        let Some(element) = graph.elements.get(&start) else {
            continue;
        };
        let feed = element
            .inputs
            .iter()
            .flatten()
            .filter_map(|link_id| graph.links.get(link_id))
            .find(|link| link.target == start && graph.elements.contains_key(&link.origin));
        let Some(feed) = feed else {
            continue;
        };
        if collapsible.contains(&feed.origin) {
            // Interior of a chain; reached from its head instead.
            continue;
        }

        let source = SlotRef {
            node: feed.origin,
            slot: feed.origin_slot,
        };
        let mut members = Vec::new();
        let mut targets: Vec<SlotRef> = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            members.push(current);
            let Some(node) = graph.elements.get(&current) else {
                continue;
            };
            for link_id in node.outputs.iter().flatten() {
                let Some(link) = graph.links.get(link_id) else {
                    continue;
                };
                if link.origin != current || !graph.elements.contains_key(&link.target) {
                    continue;
                }
                if collapsible.contains(&link.target) {
                    if visited.insert(link.target) {
                        queue.push_back(link.target);
                    }
                } else {
                    let target = SlotRef {
                        node: link.target,
                        slot: link.target_slot,
                    };
                    if !targets.contains(&target) {
                        targets.push(target);
                    }
                }
            }
        }

        for target in &targets {
            let edge = (source.node, target.node);
            if !out.virtual_edges.contains(&edge) {
                out.virtual_edges.push(edge);
            }
        }
        out.removed.extend(members.iter().copied());
        out.chains.push(RerouteChain {
            source,
            members,
            targets,
        });
    }

    debug!(
        chains = out.chains.len(),
        removed = out.removed.len(),
        "collapsed reroute chains"
    );
    out
}

impl RerouteChain {
    /// Group that directly owns the source and every target, if there is one.
    pub fn interior_owner(&self, hierarchy: &Hierarchy) -> Option<GroupId> {
        let owner = hierarchy.owner_of(self.source.node)?;
        if self.targets.is_empty() {
            return None;
        }
        self.targets
            .iter()
            .all(|target| hierarchy.owner_of(target.node) == Some(owner))
            .then_some(owner)
    }

    /// Horizontal distance between the endpoints at which evenly spaced
    /// members no longer overlap each other or the endpoints.
    pub fn room(&self, graph: &Graph) -> f32 {
        let widest = self
            .members
            .iter()
            .filter_map(|id| graph.elements.get(id))
            .map(|element| element.width)
            .fold(0.0, f32::max);
        (self.members.len() as f32 + 1.0) * widest
    }
}

/// Places chain members on the straight line from the source output anchor to
/// the centroid of the targets' input anchors, evenly spaced, skipping fixed
/// elements. Chains without targets are left where they are. Returns the
/// number of elements moved.
pub(crate) fn restore_chains(graph: &mut Graph, chains: &[RerouteChain]) -> usize {
    let mut placed = 0;
    for chain in chains {
        if chain.targets.is_empty() || chain.members.is_empty() {
            continue;
        }
        let Some(source) = graph.elements.get(&chain.source.node) else {
            continue;
        };
        let start = source.output_anchor(chain.source.slot);

        let anchors: Vec<(f32, f32)> = chain
            .targets
            .iter()
            .filter_map(|target| {
                graph
                    .elements
                    .get(&target.node)
                    .map(|element| element.input_anchor(target.slot))
            })
            .collect();
        if anchors.is_empty() {
            continue;
        }
        let count = anchors.len() as f32;
        let end = (
            anchors.iter().map(|p| p.0).sum::<f32>() / count,
            anchors.iter().map(|p| p.1).sum::<f32>() / count,
        );

        let steps = chain.members.len() as f32 + 1.0;
        for (idx, member) in chain.members.iter().enumerate() {
            let Some(element) = graph.elements.get_mut(member) else {
                continue;
            };
            if element.is_fixed() {
                continue;
            }
            let t = (idx as f32 + 1.0) / steps;
            let cx = start.0 + (end.0 - start.0) * t;
            let cy = start.1 + (end.1 - start.1) * t;
            element.x = cx - element.width / 2.0;
            element.y = cy - element.height / 2.0;
            placed += 1;
        }
    }
    placed
}
