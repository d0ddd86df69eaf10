use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::debug;

use super::types::{LayeredGraph, LayoutId};

/// Longest-path layering in topological (Kahn) order. Nodes left over by a
/// cycle are appended at the end and take `1 + max` over their already
/// resolved predecessors, or layer 0.
pub(super) fn assign_layers(graph: &mut LayeredGraph) {
    let mut indeg: HashMap<LayoutId, usize> = graph
        .nodes
        .iter()
        .map(|(id, node)| (*id, node.preds.len()))
        .collect();

    let mut ready: BinaryHeap<Reverse<LayoutId>> = indeg
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order: Vec<LayoutId> = Vec::with_capacity(graph.nodes.len());
    let mut processed: BTreeSet<LayoutId> = BTreeSet::new();
    while let Some(Reverse(id)) = ready.pop() {
        if !processed.insert(id) {
            continue;
        }
        order.push(id);
        let Some(node) = graph.nodes.get(&id) else {
            continue;
        };
        for next in &node.succs {
            if let Some(deg) = indeg.get_mut(next) {
                *deg = deg.saturating_sub(1);
                if *deg == 0 {
                    ready.push(Reverse(*next));
                }
            }
        }
    }

    let residual: Vec<LayoutId> = graph
        .nodes
        .keys()
        .filter(|id| !processed.contains(*id))
        .copied()
        .collect();
    if !residual.is_empty() {
        debug!(
            residual = residual.len(),
            "cycle in layout graph; residual nodes appended"
        );
    }

    let mut resolved: HashMap<LayoutId, usize> = HashMap::new();
    for id in order.iter().chain(residual.iter()) {
        let Some(node) = graph.nodes.get(id) else {
            continue;
        };
        let layer = node
            .preds
            .iter()
            .filter_map(|pred| resolved.get(pred))
            .map(|layer| layer + 1)
            .max()
            .unwrap_or(0);
        resolved.insert(*id, layer);
    }

    let layer_count = resolved.values().copied().max().map_or(0, |max| max + 1);
    let mut layers: Vec<Vec<LayoutId>> = vec![Vec::new(); layer_count];
    for (id, node) in graph.nodes.iter_mut() {
        let layer = resolved.get(id).copied().unwrap_or(0);
        node.layer = layer;
        layers[layer].push(*id);
    }
    graph.layers = layers;
}

/// Size-aware barycenter ordering. Layers start tallest first; each sweep
/// re-sorts a layer by the height-weighted vertical centroid of its
/// neighbours on the swept side.
pub(super) fn order_layers(graph: &mut LayeredGraph, max_iterations: usize, gap: f32) {
    for bucket in graph.layers.iter_mut() {
        bucket.sort_by(|a, b| {
            let ha = graph.nodes.get(a).map_or(0.0, |n| n.height);
            let hb = graph.nodes.get(b).map_or(0.0, |n| n.height);
            hb.partial_cmp(&ha).unwrap_or(Ordering::Equal).then(a.cmp(b))
        });
    }

    if graph.layers.len() > 1 {
        let mut centers = vertical_centers(graph, gap);
        let mut sweeps = 0;
        for _ in 0..max_iterations {
            sweeps += 1;
            let mut changed = false;
            for layer in 1..graph.layers.len() {
                changed |= sort_layer(graph, layer, Side::Preds, &mut centers, gap);
            }
            for layer in (0..graph.layers.len() - 1).rev() {
                changed |= sort_layer(graph, layer, Side::Succs, &mut centers, gap);
            }
            if !changed {
                break;
            }
        }
        debug!(sweeps, layers = graph.layers.len(), "ordered layers");
    }

    for bucket in &graph.layers {
        for (idx, id) in bucket.iter().enumerate() {
            if let Some(node) = graph.nodes.get_mut(id) {
                node.order = idx;
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Preds,
    Succs,
}

fn sort_layer(
    graph: &mut LayeredGraph,
    layer: usize,
    side: Side,
    centers: &mut HashMap<LayoutId, f32>,
    gap: f32,
) -> bool {
    if graph.layers[layer].len() <= 1 {
        return false;
    }
    let keys: HashMap<LayoutId, f32> = graph.layers[layer]
        .iter()
        .map(|id| (*id, barycenter(graph, *id, side, centers)))
        .collect();

    let before = graph.layers[layer].clone();
    graph.layers[layer].sort_by(|a, b| {
        let ka = keys.get(a).copied().unwrap_or(0.0);
        let kb = keys.get(b).copied().unwrap_or(0.0);
        ka.partial_cmp(&kb).unwrap_or(Ordering::Equal).then(a.cmp(b))
    });
    if before == graph.layers[layer] {
        return false;
    }
    update_layer_centers(graph, layer, centers, gap);
    true
}

fn barycenter(
    graph: &LayeredGraph,
    id: LayoutId,
    side: Side,
    centers: &HashMap<LayoutId, f32>,
) -> f32 {
    let own = centers.get(&id).copied().unwrap_or(0.0);
    let Some(node) = graph.nodes.get(&id) else {
        return own;
    };
    let neighbors = match side {
        Side::Preds => &node.preds,
        Side::Succs => &node.succs,
    };
    let mut weighted = 0.0f32;
    let mut weight = 0.0f32;
    for neighbor in neighbors {
        let (Some(center), Some(other)) = (centers.get(neighbor), graph.nodes.get(neighbor)) else {
            continue;
        };
        let h = other.height.max(1.0);
        weighted += center * h;
        weight += h;
    }
    if weight > 0.0 {
        weighted / weight
    } else {
        own
    }
}

fn vertical_centers(graph: &LayeredGraph, gap: f32) -> HashMap<LayoutId, f32> {
    let mut centers = HashMap::new();
    for layer in 0..graph.layers.len() {
        update_layer_centers(graph, layer, &mut centers, gap);
    }
    centers
}

fn update_layer_centers(
    graph: &LayeredGraph,
    layer: usize,
    centers: &mut HashMap<LayoutId, f32>,
    gap: f32,
) {
    let mut cursor = 0.0f32;
    for id in &graph.layers[layer] {
        let height = graph.nodes.get(id).map_or(0.0, |n| n.height);
        centers.insert(*id, cursor + height / 2.0);
        cursor += height + gap;
    }
}

/// Number of pairwise crossings between consecutive layers.
pub fn count_crossings(graph: &LayeredGraph) -> usize {
    let position: HashMap<LayoutId, usize> = graph
        .layers
        .iter()
        .flat_map(|bucket| bucket.iter().enumerate().map(|(idx, id)| (*id, idx)))
        .collect();
    let mut total = 0;
    for layer in 0..graph.layers.len().saturating_sub(1) {
        let mut segments: Vec<(usize, usize)> = Vec::new();
        for id in &graph.layers[layer] {
            let Some(node) = graph.nodes.get(id) else {
                continue;
            };
            for succ in &node.succs {
                let Some(target) = graph.nodes.get(succ) else {
                    continue;
                };
                if target.layer != layer + 1 {
                    continue;
                }
                if let (Some(&a), Some(&b)) = (position.get(id), position.get(succ)) {
                    segments.push((a, b));
                }
            }
        }
        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                let (a1, b1) = segments[i];
                let (a2, b2) = segments[j];
                if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                    total += 1;
                }
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: i64) -> LayoutId {
        LayoutId::Element(id)
    }

    fn graph_with(nodes: &[(i64, f32)], edges: &[(i64, i64)]) -> LayeredGraph {
        let mut graph = LayeredGraph::default();
        for (id, height) in nodes {
            graph.add_node(el(*id), 100.0, *height);
        }
        for (from, to) in edges {
            graph.add_edge(el(*from), el(*to));
        }
        graph
    }

    #[test]
    fn longest_path_layers() {
        let mut graph = graph_with(
            &[(1, 50.0), (2, 50.0), (3, 50.0), (4, 50.0)],
            &[(1, 2), (2, 3), (1, 3), (4, 3)],
        );
        assign_layers(&mut graph);
        assert_eq!(graph.nodes[&el(1)].layer, 0);
        assert_eq!(graph.nodes[&el(2)].layer, 1);
        assert_eq!(graph.nodes[&el(3)].layer, 2);
        assert_eq!(graph.nodes[&el(4)].layer, 0);
        assert_eq!(graph.layers.len(), 3);
    }

    #[test]
    fn cycles_degrade_instead_of_failing() {
        let mut graph = graph_with(
            &[(1, 50.0), (2, 50.0), (3, 50.0), (4, 50.0)],
            &[(1, 2), (2, 3), (3, 2), (3, 4)],
        );
        assign_layers(&mut graph);
        assert_eq!(graph.nodes[&el(1)].layer, 0);
        // 2 and 3 are residual; 2 resolves from 1, 3 from 2
        assert_eq!(graph.nodes[&el(2)].layer, 1);
        assert_eq!(graph.nodes[&el(3)].layer, 2);
        // 4 only has the residual 3 as predecessor
        assert_eq!(graph.nodes[&el(4)].layer, 3);
        let total: usize = graph.layers.iter().map(Vec::len).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn initial_order_is_tallest_first() {
        let mut graph = graph_with(&[(1, 20.0), (2, 80.0), (3, 80.0)], &[]);
        assign_layers(&mut graph);
        order_layers(&mut graph, 0, 10.0);
        assert_eq!(graph.layers[0], vec![el(2), el(3), el(1)]);
        assert_eq!(graph.nodes[&el(1)].order, 2);
    }

    #[test]
    fn barycenter_sweeps_remove_crossings() {
        // 1 (tall) feeds 4, 2 feeds 3; initial order of layer 1 crosses
        let mut graph = graph_with(
            &[(1, 100.0), (2, 50.0), (3, 60.0), (4, 40.0)],
            &[(1, 4), (2, 3)],
        );
        assign_layers(&mut graph);
        order_layers(&mut graph, 0, 10.0);
        assert_eq!(graph.layers[1], vec![el(3), el(4)]);
        assert_eq!(count_crossings(&graph), 1);

        order_layers(&mut graph, 8, 10.0);
        assert_eq!(count_crossings(&graph), 0);
        assert_eq!(graph.layers[1], vec![el(4), el(3)]);
    }
}
