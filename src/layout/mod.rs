mod builder;
mod classify;
mod groups;
mod hierarchy;
mod overlap;
mod packing;
mod position;
mod ranking;
mod reroute;
mod resize;
mod selection;
mod tokens;
pub(crate) mod types;
pub use types::*;

pub use classify::Classification;
pub use groups::GroupPlan;
pub use hierarchy::{Hierarchy, check_containment};
pub use overlap::overlapping_pairs;
pub use packing::{PackItem, pack};
pub use ranking::count_crossings;
pub use reroute::Collapsed;
pub use selection::layout_selected_groups;
pub use tokens::{LayoutToken, parse_token};

use builder::build_top_level;
use classify::classify;
use groups::{place_group, plan_groups};
use overlap::resolve_overlaps;
use position::{layered_arrangement, margin_arrangement};
use reroute::{collapse_chains, restore_chains};
use resize::resize_groups;

use crate::config::LayoutConfig;
use crate::ir::{Graph, GroupId, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, warn};

/// Everything one layout run derives from the graph before it starts moving
/// things. Built once and threaded through every stage.
#[derive(Debug)]
pub struct LayoutSession<'a> {
    pub config: &'a LayoutConfig,
    pub hierarchy: Hierarchy,
    pub classes: Classification,
    pub collapsed: Collapsed,
    pub plans: BTreeMap<GroupId, GroupPlan>,
}

impl<'a> LayoutSession<'a> {
    pub fn new(graph: &Graph, config: &'a LayoutConfig) -> Self {
        let mut hierarchy = Hierarchy::build(graph, config.title_height);
        let classes = classify(graph);

        let collapsible: BTreeSet<NodeId> = if config.collapse_reroutes {
            classes
                .pass_through
                .iter()
                .copied()
                .filter(|id| graph.elements.get(id).is_some_and(|e| !e.is_fixed()))
                .collect()
        } else {
            BTreeSet::new()
        };
        let collapsed = collapse_chains(graph, &collapsible);

        // Collapsed reroutes belong to the group holding both ends of their
        // chain, wherever they currently sit.
        hierarchy.detach(&collapsed.removed);
        for chain in &collapsed.chains {
            if let Some(group) = chain.interior_owner(&hierarchy) {
                for &member in &chain.members {
                    hierarchy.attach(group, member);
                }
            }
        }
        let plans = plan_groups(graph, &hierarchy, &collapsed, &hierarchy.deepest_first(), config);

        Self {
            config,
            hierarchy,
            classes,
            collapsed,
            plans,
        }
    }
}

/// Lays out the whole graph in place and flags it for redraw.
///
/// Every element that is neither pinned nor locked gets a new position and
/// every group with content gets new bounds. The result is stable: running it
/// again on its own output moves nothing.
pub fn compute_layout(graph: &mut Graph, config: &LayoutConfig) -> LayoutStats {
    let started = Instant::now();
    let repaired = graph.sanitize_geometry(config.default_width, config.default_height);
    if repaired > 0 {
        warn!(repaired, "replaced non-finite element geometry");
    }

    let session = LayoutSession::new(graph, config);
    let top = build_top_level(graph, &session);

    let (margin, reserved) = margin_arrangement(&top.margin, config);
    let mut layered = top.graph;
    let main = layered_arrangement(&mut layered, &top.spans, config);

    let mut positioned = apply_arrangement(graph, &session, &margin, config.origin_x, config.origin_y);
    positioned += apply_arrangement(graph, &session, &main, config.origin_x + reserved, config.origin_y);
    positioned += restore_chains(graph, &session.collapsed.chains);
    positioned += graph.elements.values().filter(|e| e.is_fixed()).count();

    let order = session.hierarchy.deepest_first();
    let resized_groups = resize_groups(graph, &session.hierarchy, &order, config);
    resolve_overlaps(graph, &session);
    graph.mark_dirty();

    let stats = LayoutStats {
        positioned,
        layers: main.layer_count,
        resized_groups,
        elapsed: started.elapsed(),
    };
    debug!(
        positioned = stats.positioned,
        layers = stats.layers,
        resized = stats.resized_groups,
        chains = session.collapsed.chains.len(),
        elapsed_us = stats.elapsed.as_micros() as u64,
        "layout complete"
    );
    stats
}

fn apply_arrangement(
    graph: &mut Graph,
    session: &LayoutSession,
    arrangement: &Arrangement,
    x: f32,
    y: f32,
) -> usize {
    let mut moved = 0;
    for (id, (dx, dy)) in &arrangement.positions {
        match id {
            LayoutId::Element(element) => {
                if let Some(element) = graph.elements.get_mut(element) {
                    element.x = x + dx;
                    element.y = y + dy;
                    moved += 1;
                }
            }
            LayoutId::Group(group) => {
                moved += place_group(graph, &session.plans, *group, x + dx, y + dy);
            }
        }
    }
    moved
}
