use std::collections::BTreeMap;

use super::packing::{PackItem, pack, stacked_height, widest_row};
use super::ranking::{assign_layers, order_layers};
use super::types::{Arrangement, ChainSpan, LayeredGraph, LayoutId, Row};
use crate::config::{ColumnPolicy, LayoutConfig};

/// Runs layering, ordering, packing and coordinate assignment on a layered
/// graph and returns positions relative to (0, 0).
///
/// Group representatives are given their own full-width band at the top of
/// their layer before the remaining nodes are packed. Each layer is then
/// centred vertically against the tallest layer that holds no group. The gap
/// after a layer widens to the room of any chain spanning into the next one.
pub(super) fn layered_arrangement(
    graph: &mut LayeredGraph,
    spans: &[ChainSpan],
    config: &LayoutConfig,
) -> Arrangement {
    if graph.nodes.is_empty() {
        return Arrangement::default();
    }
    assign_layers(graph);
    order_layers(graph, config.max_iterations, config.vertical_gap);

    let h_gap = config.horizontal_gap;
    let v_gap = config.vertical_gap;

    struct PackedLayer {
        rows: Vec<Row>,
        width: f32,
        height: f32,
        has_group: bool,
    }

    let mut packed: Vec<PackedLayer> = Vec::with_capacity(graph.layers.len());
    for bucket in &graph.layers {
        let mut rows: Vec<Row> = Vec::new();
        let mut items: Vec<PackItem> = Vec::new();
        for id in bucket {
            let Some(node) = graph.nodes.get(id) else {
                continue;
            };
            if id.is_group() {
                rows.push(Row {
                    items: vec![*id],
                    width: node.width,
                    height: node.height,
                });
            } else {
                items.push(PackItem::new(*id, node.width, node.height));
            }
        }
        let has_group = !rows.is_empty();
        rows.extend(pack(&items, config.column_policy, config.max_row_width, h_gap));
        packed.push(PackedLayer {
            width: widest_row(&rows),
            height: stacked_height(&rows, v_gap),
            rows,
            has_group,
        });
    }

    let tallest_plain = packed
        .iter()
        .filter(|layer| !layer.has_group)
        .map(|layer| layer.height)
        .fold(None, |acc: Option<f32>, h| Some(acc.map_or(h, |a| a.max(h))));
    let target = tallest_plain
        .unwrap_or_else(|| packed.iter().map(|layer| layer.height).fold(0.0, f32::max));

    let mut gaps = vec![h_gap; packed.len()];
    for span in spans {
        let (Some(from), Some(to)) = (graph.nodes.get(&span.from), graph.nodes.get(&span.to)) else {
            continue;
        };
        if to.layer == from.layer + 1 {
            gaps[from.layer] = gaps[from.layer].max(span.room);
        }
    }

    let mut out = Arrangement {
        layer_count: packed.len(),
        ..Default::default()
    };
    let mut layer_x = 0.0f32;
    for (layer, gap) in packed.iter().zip(&gaps) {
        let offset = ((target - layer.height) / 2.0).max(0.0);
        let mut row_y = offset;
        for row in &layer.rows {
            let mut item_x = layer_x;
            for id in &row.items {
                let Some(node) = graph.nodes.get_mut(id) else {
                    continue;
                };
                node.x = item_x;
                node.y = row_y;
                out.positions.insert(*id, (item_x, row_y));
                item_x += node.width + h_gap;
            }
            row_y += row.height + v_gap;
        }
        out.height = out.height.max(offset + layer.height);
        out.width = layer_x + layer.width;
        layer_x += layer.width + gap;
    }
    out
}

/// Bin-packs blocks (no topology) and returns positions relative to (0, 0).
pub(super) fn packed_arrangement(
    items: &[PackItem],
    policy: ColumnPolicy,
    max_row_width: f32,
    config: &LayoutConfig,
) -> Arrangement {
    let rows = pack(items, policy, max_row_width, config.horizontal_gap);
    let sizes: BTreeMap<LayoutId, f32> = items.iter().map(|item| (item.id, item.width)).collect();
    let mut out = Arrangement::default();
    let mut y = 0.0f32;
    for row in &rows {
        let mut x = 0.0f32;
        for id in &row.items {
            out.positions.insert(*id, (x, y));
            x += sizes.get(id).copied().unwrap_or(0.0) + config.horizontal_gap;
        }
        y += row.height + config.vertical_gap;
    }
    out.width = widest_row(&rows);
    out.height = stacked_height(&rows, config.vertical_gap);
    out
}

/// Left margin for disconnected elements: packed against the widest one.
/// Returns the arrangement and the horizontal space it reserves, gap
/// included (0 when there is nothing to place).
pub(super) fn margin_arrangement(items: &[PackItem], config: &LayoutConfig) -> (Arrangement, f32) {
    if items.is_empty() {
        return (Arrangement::default(), 0.0);
    }
    let widest = items.iter().map(|item| item.width).fold(0.0, f32::max);
    let arrangement = packed_arrangement(items, ColumnPolicy::Auto, widest, config);
    (arrangement, widest + config.margin_gap)
}
