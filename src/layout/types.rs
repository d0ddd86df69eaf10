use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::ir::{GroupId, NodeId};

/// Identity of a node in a layered graph: either an element, or the single
/// representative standing in for a whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LayoutId {
    Element(NodeId),
    Group(GroupId),
}

impl LayoutId {
    pub fn is_group(&self) -> bool {
        matches!(self, LayoutId::Group(_))
    }
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: LayoutId,
    pub layer: usize,
    pub order: usize,
    pub preds: Vec<LayoutId>,
    pub succs: Vec<LayoutId>,
    pub width: f32,
    pub height: f32,
    pub x: f32,
    pub y: f32,
}

impl LayoutNode {
    pub fn new(id: LayoutId, width: f32, height: f32) -> Self {
        Self {
            id,
            layer: 0,
            order: 0,
            preds: Vec::new(),
            succs: Vec::new(),
            width,
            height,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Layered graph under construction: nodes keyed by id plus the layers
/// produced by the layer assigner (filled in order by the minimizer).
#[derive(Debug, Clone, Default)]
pub struct LayeredGraph {
    pub nodes: BTreeMap<LayoutId, LayoutNode>,
    pub layers: Vec<Vec<LayoutId>>,
}

impl LayeredGraph {
    pub fn add_node(&mut self, id: LayoutId, width: f32, height: f32) {
        self.nodes
            .entry(id)
            .or_insert_with(|| LayoutNode::new(id, width, height));
    }

    /// Adds a directed edge; self loops, duplicates and unknown endpoints are
    /// ignored. Returns whether the edge was added.
    pub fn add_edge(&mut self, from: LayoutId, to: LayoutId) -> bool {
        if from == to || !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return false;
        }
        let Some(source) = self.nodes.get_mut(&from) else {
            return false;
        };
        if source.succs.contains(&to) {
            return false;
        }
        source.succs.push(to);
        if let Some(target) = self.nodes.get_mut(&to) {
            target.preds.push(from);
        }
        true
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.succs.len()).sum()
    }
}

/// One packed row: items left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub items: Vec<LayoutId>,
    pub width: f32,
    pub height: f32,
}

/// Relative placement of a set of blocks, origin at (0, 0).
#[derive(Debug, Clone, Default)]
pub struct Arrangement {
    pub positions: BTreeMap<LayoutId, (f32, f32)>,
    pub width: f32,
    pub height: f32,
    pub layer_count: usize,
}

impl Arrangement {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        for pos in self.positions.values_mut() {
            pos.0 += dx;
            pos.1 += dy;
        }
    }
}

/// Endpoint of a reroute chain on a real element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotRef {
    pub node: NodeId,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerouteChain {
    pub source: SlotRef,
    /// Pass-through elements in visiting order.
    pub members: Vec<NodeId>,
    pub targets: Vec<SlotRef>,
}

/// Horizontal room a collapsed chain needs between two layered endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSpan {
    pub from: LayoutId,
    pub to: LayoutId,
    pub room: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LayoutStats {
    pub positioned: usize,
    pub layers: usize,
    pub resized_groups: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SelectionStats {
    pub positioned: usize,
    pub processed_groups: usize,
    pub elapsed: Duration,
}
