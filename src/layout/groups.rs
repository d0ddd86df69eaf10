use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::hierarchy::Hierarchy;
use super::packing::PackItem;
use super::position::{layered_arrangement, packed_arrangement};
use super::reroute::Collapsed;
use super::tokens::{LayoutToken, parse_token};
use super::types::{Arrangement, ChainSpan, LayeredGraph, LayoutId};
use crate::config::{ColumnPolicy, LayoutConfig};
use crate::ir::{Graph, GroupId, NodeId, Rect};

/// Interior layout of one group: its final size and the offset of every
/// direct member and child group from the group's top-left corner.
#[derive(Debug, Clone, Default)]
pub struct GroupPlan {
    pub width: f32,
    pub height: f32,
    pub offsets: BTreeMap<LayoutId, (f32, f32)>,
}

/// A block inside a group interior, with the position it had before layout.
#[derive(Debug, Clone, Copy)]
struct Block {
    id: LayoutId,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Block {
    fn item(&self) -> PackItem {
        PackItem::new(self.id, self.width, self.height)
    }
}

/// Computes plans for `order`, which must list every group after all of its
/// descendants (deepest first). Collapsed reroutes take no cell; chains whose
/// endpoints share a group count as internal links of that group.
pub(super) fn plan_groups(
    graph: &Graph,
    hierarchy: &Hierarchy,
    collapsed: &Collapsed,
    order: &[GroupId],
    config: &LayoutConfig,
) -> BTreeMap<GroupId, GroupPlan> {
    let mut plans: BTreeMap<GroupId, GroupPlan> = BTreeMap::new();
    for &group in order {
        let plan = plan_group(graph, hierarchy, collapsed, group, &plans, config);
        plans.insert(group, plan);
    }
    debug!(groups = plans.len(), "planned group interiors");
    plans
}

fn plan_group(
    graph: &Graph,
    hierarchy: &Hierarchy,
    collapsed: &Collapsed,
    group: GroupId,
    plans: &BTreeMap<GroupId, GroupPlan>,
    config: &LayoutConfig,
) -> GroupPlan {
    let members: Vec<Block> = hierarchy
        .members_of(group)
        .iter()
        .filter(|id| !collapsed.is_removed(**id))
        .filter_map(|id| graph.elements.get(id))
        .filter(|element| !element.is_fixed())
        .map(|element| Block {
            id: LayoutId::Element(element.id),
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
        })
        .collect();
    let children: Vec<Block> = hierarchy
        .children_of(group)
        .iter()
        .filter_map(|child| {
            let plan = plans.get(child)?;
            let bounds = hierarchy.bounds.get(child)?;
            Some(Block {
                id: LayoutId::Group(*child),
                x: bounds.x,
                y: bounds.y,
                width: plan.width,
                height: plan.height,
            })
        })
        .collect();

    if members.is_empty() && children.is_empty() {
        let bounds = hierarchy.bounds.get(&group).copied().unwrap_or_default();
        return GroupPlan {
            width: bounds.width,
            height: bounds.height,
            offsets: BTreeMap::new(),
        };
    }

    let title = graph
        .groups
        .get(&group)
        .map(|g| g.title.as_str())
        .unwrap_or_default();
    let content = match parse_token(title) {
        Some(token) => {
            let mut blocks = members;
            blocks.extend(children);
            token_arrangement(token, blocks, config)
        }
        None => {
            let mut internal: Vec<(NodeId, NodeId)> = Vec::new();
            let mut spans: Vec<ChainSpan> = Vec::new();
            for chain in &collapsed.chains {
                if chain.interior_owner(hierarchy) != Some(group) {
                    continue;
                }
                let room = chain.room(graph);
                for target in &chain.targets {
                    internal.push((chain.source.node, target.node));
                    spans.push(ChainSpan {
                        from: LayoutId::Element(chain.source.node),
                        to: LayoutId::Element(target.node),
                        room,
                    });
                }
            }
            topology_arrangement(graph, members, children, &internal, &spans, config)
        }
    };

    let pad = config.group_padding;
    let top = config.title_height + pad;
    GroupPlan {
        width: content.width + 2.0 * pad,
        height: content.height + 2.0 * pad + config.title_height,
        offsets: content
            .positions
            .into_iter()
            .map(|(id, (x, y))| (id, (x + pad, y + top)))
            .collect(),
    }
}

/// Layered block for linked members, packed block for the rest, child groups
/// stacked underneath. `internal` adds member pairs joined through collapsed
/// chains.
fn topology_arrangement(
    graph: &Graph,
    members: Vec<Block>,
    children: Vec<Block>,
    internal: &[(NodeId, NodeId)],
    spans: &[ChainSpan],
    config: &LayoutConfig,
) -> Arrangement {
    let ids: BTreeSet<NodeId> = members
        .iter()
        .filter_map(|block| match block.id {
            LayoutId::Element(id) => Some(id),
            LayoutId::Group(_) => None,
        })
        .collect();

    let edges: Vec<(NodeId, NodeId)> = graph
        .resolved_links()
        .map(|link| (link.origin, link.target))
        .chain(internal.iter().copied())
        .filter(|(origin, target)| origin != target && ids.contains(origin) && ids.contains(target))
        .collect();

    let mut layered = LayeredGraph::default();
    let linked: BTreeSet<NodeId> = edges.iter().flat_map(|&(a, b)| [a, b]).collect();
    let mut loose: Vec<PackItem> = Vec::new();
    for block in &members {
        match block.id {
            LayoutId::Element(id) if linked.contains(&id) => {
                layered.add_node(block.id, block.width, block.height);
            }
            _ => loose.push(block.item()),
        }
    }
    for (origin, target) in edges {
        layered.add_edge(LayoutId::Element(origin), LayoutId::Element(target));
    }

    let child_items: Vec<PackItem> = children.iter().map(Block::item).collect();
    let blocks = [
        layered_arrangement(&mut layered, spans, config),
        packed_arrangement(&loose, config.column_policy, config.max_row_width, config),
        packed_arrangement(&child_items, ColumnPolicy::SingleColumn, f32::MAX, config),
    ];
    stack_vertically(blocks, config.vertical_gap)
}

fn stack_vertically(blocks: impl IntoIterator<Item = Arrangement>, gap: f32) -> Arrangement {
    let mut out = Arrangement::default();
    let mut y = 0.0f32;
    for mut block in blocks {
        if block.is_empty() {
            continue;
        }
        if !out.is_empty() {
            y += gap;
        }
        block.translate(0.0, y);
        out.positions.append(&mut block.positions);
        out.width = out.width.max(block.width);
        out.layer_count = out.layer_count.max(block.layer_count);
        y += block.height;
    }
    out.height = y;
    out
}

fn by_position(a: &Block, b: &Block, x_first: bool) -> Ordering {
    let (pa, pb) = if x_first {
        ((a.x, a.y), (b.x, b.y))
    } else {
        ((a.y, a.x), (b.y, b.x))
    };
    pa.0.partial_cmp(&pb.0)
        .unwrap_or(Ordering::Equal)
        .then(pa.1.partial_cmp(&pb.1).unwrap_or(Ordering::Equal))
        .then(a.id.cmp(&b.id))
}

/// Arranges blocks purely by the token, ignoring topology. Rows and columns
/// of a grid are as tall/wide as their largest block; cells are top-left
/// aligned.
fn token_arrangement(token: LayoutToken, mut blocks: Vec<Block>, config: &LayoutConfig) -> Arrangement {
    let x_first = matches!(token, LayoutToken::Horizontal | LayoutToken::Rows(_));
    blocks.sort_by(|a, b| by_position(a, b, x_first));

    let cells: Vec<(usize, usize)> = (0..blocks.len()).map(|i| grid_cell(token, i)).collect();
    let row_count = cells.iter().map(|c| c.0 + 1).max().unwrap_or(0);
    let col_count = cells.iter().map(|c| c.1 + 1).max().unwrap_or(0);
    let mut row_heights = vec![0.0f32; row_count];
    let mut col_widths = vec![0.0f32; col_count];
    for (block, &(row, col)) in blocks.iter().zip(&cells) {
        row_heights[row] = row_heights[row].max(block.height);
        col_widths[col] = col_widths[col].max(block.width);
    }

    let offsets = |sizes: &[f32], gap: f32| -> (Vec<f32>, f32) {
        let mut out = Vec::with_capacity(sizes.len());
        let mut cursor = 0.0f32;
        for size in sizes {
            out.push(cursor);
            cursor += size + gap;
        }
        (out, (cursor - gap).max(0.0))
    };
    let (row_y, height) = offsets(&row_heights, config.vertical_gap);
    let (col_x, width) = offsets(&col_widths, config.horizontal_gap);

    let mut out = Arrangement {
        width,
        height,
        layer_count: col_count,
        ..Default::default()
    };
    for (block, &(row, col)) in blocks.iter().zip(&cells) {
        out.positions.insert(block.id, (col_x[col], row_y[row]));
    }
    out
}

/// (row, column) of the i-th block in token order.
fn grid_cell(token: LayoutToken, i: usize) -> (usize, usize) {
    match token {
        LayoutToken::Horizontal => (0, i),
        LayoutToken::Vertical => (i, 0),
        LayoutToken::Columns(k) => (i / k, i % k),
        LayoutToken::Rows(k) => (i % k, i / k),
    }
}

/// Moves the group to (x, y) with its planned size and recursively places its
/// interior. Returns the number of elements moved.
pub(super) fn place_group(
    graph: &mut Graph,
    plans: &BTreeMap<GroupId, GroupPlan>,
    group: GroupId,
    x: f32,
    y: f32,
) -> usize {
    let Some(plan) = plans.get(&group) else {
        return 0;
    };
    if let Some(record) = graph.groups.get_mut(&group) {
        record.bounds = Some(Rect::new(x, y, plan.width, plan.height));
    }
    let mut moved = 0;
    for (id, (dx, dy)) in &plan.offsets {
        match id {
            LayoutId::Element(element) => {
                if let Some(element) = graph.elements.get_mut(element) {
                    element.x = x + dx;
                    element.y = y + dy;
                    moved += 1;
                }
            }
            LayoutId::Group(child) => {
                moved += place_group(graph, plans, *child, x + dx, y + dy);
            }
        }
    }
    moved
}

/// Translates a group with every non-fixed element and nested group inside.
pub(super) fn shift_group(graph: &mut Graph, hierarchy: &Hierarchy, group: GroupId, dx: f32, dy: f32) {
    for id in hierarchy.subtree_deepest_first(group) {
        if let Some(bounds) = graph.groups.get_mut(&id).and_then(|g| g.bounds.as_mut()) {
            bounds.translate(dx, dy);
        }
    }
    for id in hierarchy.all_members(group) {
        if let Some(element) = graph.elements.get_mut(&id) {
            if !element.is_fixed() {
                element.x += dx;
                element.y += dy;
            }
        }
    }
}
