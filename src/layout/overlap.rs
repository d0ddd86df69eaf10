use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use super::LayoutSession;
use super::groups::shift_group;
use super::types::LayoutId;
use crate::ir::{Graph, Rect};

/// Who yields when two entities overlap. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Priority {
    /// Collapsed reroute outside any group.
    Reroute,
    Disconnected,
    Connected,
    Group,
    /// Pinned or locked, or a group holding such an element: never moves.
    Fixed,
}

#[derive(Debug, Clone, Copy)]
struct Entity {
    id: LayoutId,
    rect: Rect,
    priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Pushes lower-priority top-level entities right (first pass) and then down
/// (second pass) until no two of them overlap. Returns the number of
/// entities that moved.
pub(super) fn resolve_overlaps(graph: &mut Graph, session: &LayoutSession) -> usize {
    let mut entities = collect_entities(graph, session);
    if entities.len() < 2 {
        return 0;
    }
    let start: Vec<Rect> = entities.iter().map(|entity| entity.rect).collect();
    let gap = session.config.overlap_gap;
    let x_pushes = sweep(&mut entities, Axis::X, gap);
    let y_pushes = sweep(&mut entities, Axis::Y, gap);

    let mut moved = 0;
    for (entity, before) in entities.iter().zip(&start) {
        let dx = entity.rect.x - before.x;
        let dy = entity.rect.y - before.y;
        if dx == 0.0 && dy == 0.0 {
            continue;
        }
        moved += 1;
        match entity.id {
            LayoutId::Element(id) => {
                if let Some(element) = graph.elements.get_mut(&id) {
                    element.x += dx;
                    element.y += dy;
                }
            }
            LayoutId::Group(id) => shift_group(graph, &session.hierarchy, id, dx, dy),
        }
    }
    debug!(
        entities = entities.len(),
        x_pushes,
        y_pushes,
        moved,
        "resolved overlaps"
    );
    moved
}

fn collect_entities(graph: &Graph, session: &LayoutSession) -> Vec<Entity> {
    let mut entities = Vec::new();
    for root in &session.hierarchy.roots {
        let Some(rect) = graph.groups.get(root).and_then(|group| group.valid_bounds()) else {
            continue;
        };
        let pinned = session
            .hierarchy
            .all_members(*root)
            .iter()
            .filter_map(|id| graph.elements.get(id))
            .any(|element| element.is_fixed());
        entities.push(Entity {
            id: LayoutId::Group(*root),
            rect,
            priority: if pinned { Priority::Fixed } else { Priority::Group },
        });
    }
    for element in graph.elements.values() {
        if session.hierarchy.owner_of(element.id).is_some() {
            continue;
        }
        let priority = if element.is_fixed() {
            Priority::Fixed
        } else if session.collapsed.is_removed(element.id) {
            Priority::Reroute
        } else if session.classes.is_connected(element.id) {
            Priority::Connected
        } else {
            Priority::Disconnected
        };
        entities.push(Entity {
            id: LayoutId::Element(element.id),
            rect: element.rect(),
            priority,
        });
    }
    entities
}

fn sweep(entities: &mut [Entity], axis: Axis, gap: f32) -> usize {
    let limit = 2 * entities.len();
    let mut pushes = 0;
    for _ in 0..limit {
        let mut order: Vec<usize> = (0..entities.len()).collect();
        order.sort_by(|&a, &b| {
            let (ea, eb) = (&entities[a], &entities[b]);
            let (pa, pb) = match axis {
                Axis::X => (ea.rect.x, eb.rect.x),
                Axis::Y => (ea.rect.y, eb.rect.y),
            };
            pa.partial_cmp(&pb)
                .unwrap_or(Ordering::Equal)
                .then(eb.priority.cmp(&ea.priority))
                .then(ea.id.cmp(&eb.id))
        });

        let mut changed = false;
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                let (a, b) = (order[i], order[j]);
                if !entities[a].rect.intersects(&entities[b].rect) {
                    continue;
                }
                let (keep, push) = if entities[b].priority <= entities[a].priority {
                    (a, b)
                } else {
                    (b, a)
                };
                if entities[push].priority == Priority::Fixed {
                    continue;
                }
                let anchor = entities[keep].rect;
                let target = &mut entities[push].rect;
                match axis {
                    Axis::X => {
                        if target.x < anchor.x {
                            continue;
                        }
                        target.x = anchor.right() + gap;
                    }
                    Axis::Y => target.y = anchor.bottom() + gap,
                }
                pushes += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    pushes
}

/// Overlapping pairs among the given rectangles, for diagnostics and tests.
pub fn overlapping_pairs(rects: &BTreeMap<LayoutId, Rect>) -> Vec<(LayoutId, LayoutId)> {
    let entries: Vec<(&LayoutId, &Rect)> = rects.iter().collect();
    let mut pairs = Vec::new();
    for (i, (a, ra)) in entries.iter().enumerate() {
        for (b, rb) in &entries[i + 1..] {
            if ra.intersects(rb) {
                pairs.push((**a, **b));
            }
        }
    }
    pairs
}
