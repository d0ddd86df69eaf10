use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use tracing::warn;

use crate::error::{Error, Result};
use crate::ir::{Graph, GroupId, NodeId, Rect};

/// Elements may poke out of a group content box by this much and still count
/// as enclosed.
const CONTAINMENT_TOLERANCE: f32 = 1.0;

/// Geometric containment forest over the groups of a graph.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub bounds: BTreeMap<GroupId, Rect>,
    pub parent: BTreeMap<GroupId, GroupId>,
    pub children: BTreeMap<GroupId, Vec<GroupId>>,
    pub depth: BTreeMap<GroupId, usize>,
    /// Direct members of each group.
    pub members: BTreeMap<GroupId, Vec<NodeId>>,
    /// Innermost group of each grouped element.
    pub owner: BTreeMap<NodeId, GroupId>,
    pub roots: Vec<GroupId>,
    /// Groups dropped because their containment was cyclic.
    pub rejected: Vec<GroupId>,
}

impl Hierarchy {
    pub fn build(graph: &Graph, title_height: f32) -> Self {
        let mut bounds: BTreeMap<GroupId, Rect> = graph
            .groups
            .values()
            .filter_map(|group| group.valid_bounds().map(|rect| (group.id, rect)))
            .collect();

        let mut rejected = Vec::new();
        for (outer, inner) in mutual_containment(&bounds, title_height) {
            if bounds.remove(&inner).is_some() {
                warn!(outer, inner, "groups contain each other; skipping the inner one");
                rejected.push(inner);
            }
        }

        let mut hierarchy = Hierarchy {
            bounds,
            rejected,
            ..Default::default()
        };

        let ids: Vec<GroupId> = hierarchy.bounds.keys().copied().collect();
        for &id in &ids {
            let rect = hierarchy.bounds[&id];
            let parent = smallest_enclosing(
                &hierarchy.bounds,
                title_height,
                &rect,
                0.0,
                |candidate| candidate != id,
            );
            match parent {
                Some(parent) => {
                    hierarchy.parent.insert(id, parent);
                    hierarchy.children.entry(parent).or_default().push(id);
                }
                None => hierarchy.roots.push(id),
            }
        }

        for &id in &ids {
            let mut depth = 0;
            let mut cursor = id;
            while let Some(&up) = hierarchy.parent.get(&cursor) {
                depth += 1;
                cursor = up;
                if depth > ids.len() {
                    break;
                }
            }
            hierarchy.depth.insert(id, depth);
        }

        for element in graph.elements.values() {
            let rect = element.rect();
            if let Some(owner) = smallest_enclosing(
                &hierarchy.bounds,
                title_height,
                &rect,
                CONTAINMENT_TOLERANCE,
                |_| true,
            ) {
                hierarchy.owner.insert(element.id, owner);
                hierarchy.members.entry(owner).or_default().push(element.id);
            }
        }

        hierarchy
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn contains_group(&self, id: GroupId) -> bool {
        self.bounds.contains_key(&id)
    }

    pub fn owner_of(&self, element: NodeId) -> Option<GroupId> {
        self.owner.get(&element).copied()
    }

    pub fn members_of(&self, group: GroupId) -> &[NodeId] {
        self.members.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children_of(&self, group: GroupId) -> &[GroupId] {
        self.children.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn top_level_of(&self, group: GroupId) -> GroupId {
        let mut cursor = group;
        let mut steps = 0;
        while let Some(&up) = self.parent.get(&cursor) {
            cursor = up;
            steps += 1;
            if steps > self.bounds.len() {
                break;
            }
        }
        cursor
    }

    /// Outermost group that (transitively) owns the element.
    pub fn top_level_owner(&self, element: NodeId) -> Option<GroupId> {
        self.owner_of(element).map(|group| self.top_level_of(group))
    }

    pub fn is_ancestor(&self, ancestor: GroupId, group: GroupId) -> bool {
        let mut cursor = group;
        let mut steps = 0;
        while let Some(&up) = self.parent.get(&cursor) {
            if up == ancestor {
                return true;
            }
            cursor = up;
            steps += 1;
            if steps > self.bounds.len() {
                break;
            }
        }
        false
    }

    /// Drops the elements from group membership.
    pub fn detach(&mut self, ids: &BTreeSet<NodeId>) {
        self.owner.retain(|id, _| !ids.contains(id));
        for members in self.members.values_mut() {
            members.retain(|id| !ids.contains(id));
        }
    }

    /// Makes `group` the direct owner of `element`, replacing any previous one.
    pub fn attach(&mut self, group: GroupId, element: NodeId) {
        if !self.contains_group(group) {
            return;
        }
        if let Some(previous) = self.owner.insert(element, group) {
            if let Some(members) = self.members.get_mut(&previous) {
                members.retain(|id| *id != element);
            }
        }
        self.members.entry(group).or_default().push(element);
    }

    /// All groups, deepest first; ties by id.
    pub fn deepest_first(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.bounds.keys().copied().collect();
        ids.sort_by(|a, b| {
            let da = self.depth.get(a).copied().unwrap_or(0);
            let db = self.depth.get(b).copied().unwrap_or(0);
            db.cmp(&da).then(a.cmp(b))
        });
        ids
    }

    /// The group and all its descendants, deepest first.
    pub fn subtree_deepest_first(&self, root: GroupId) -> Vec<GroupId> {
        self.deepest_first()
            .into_iter()
            .filter(|&id| id == root || self.is_ancestor(root, id))
            .collect()
    }

    /// Elements owned by the group or any of its descendants.
    pub fn all_members(&self, group: GroupId) -> BTreeSet<NodeId> {
        let mut out: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack = vec![group];
        while let Some(current) = stack.pop() {
            out.extend(self.members_of(current).iter().copied());
            stack.extend(self.children_of(current).iter().copied());
        }
        out
    }
}

/// Fails when two groups enclose each other.
pub fn check_containment(graph: &Graph, title_height: f32) -> Result<()> {
    let bounds: BTreeMap<GroupId, Rect> = graph
        .groups
        .values()
        .filter_map(|group| group.valid_bounds().map(|rect| (group.id, rect)))
        .collect();
    match mutual_containment(&bounds, title_height).first() {
        Some(&(outer, inner)) => Err(Error::CyclicContainment { outer, inner }),
        None => Ok(()),
    }
}

pub(crate) fn content_rect(bounds: &Rect, title_height: f32) -> Rect {
    let title = title_height.min(bounds.height);
    Rect::new(bounds.x, bounds.y + title, bounds.width, bounds.height - title)
}

fn mutual_containment(bounds: &BTreeMap<GroupId, Rect>, title_height: f32) -> Vec<(GroupId, GroupId)> {
    let mut pairs = Vec::new();
    for (&a, rect_a) in bounds {
        for (&b, rect_b) in bounds.range((Bound::Excluded(a), Bound::Unbounded)) {
            let a_holds_b = content_rect(rect_a, title_height).encloses(rect_b, 0.0);
            let b_holds_a = content_rect(rect_b, title_height).encloses(rect_a, 0.0);
            if a_holds_b && b_holds_a {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

fn smallest_enclosing(
    bounds: &BTreeMap<GroupId, Rect>,
    title_height: f32,
    rect: &Rect,
    tolerance: f32,
    accept: impl Fn(GroupId) -> bool,
) -> Option<GroupId> {
    let mut best: Option<(f32, GroupId)> = None;
    for (&id, group_rect) in bounds {
        if !accept(id) {
            continue;
        }
        if !content_rect(group_rect, title_height).encloses(rect, tolerance) {
            continue;
        }
        let area = group_rect.area();
        // Equal areas: the later id is the nested one.
        let better = match best {
            None => true,
            Some((best_area, _)) => area <= best_area,
        };
        if better {
            best = Some((area, id));
        }
    }
    best.map(|(_, id)| id)
}
