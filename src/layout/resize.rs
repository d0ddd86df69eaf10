use tracing::debug;

use super::hierarchy::Hierarchy;
use crate::config::LayoutConfig;
use crate::ir::{Graph, GroupId, Rect};

/// Fits every group in `order` (deepest first) around its direct members and
/// its already resized children. Groups with nothing inside keep their
/// bounds. Returns the number of groups resized.
pub(super) fn resize_groups(
    graph: &mut Graph,
    hierarchy: &Hierarchy,
    order: &[GroupId],
    config: &LayoutConfig,
) -> usize {
    let pad = config.group_padding;
    let mut resized = 0;
    for &group in order {
        let members = hierarchy
            .members_of(group)
            .iter()
            .filter_map(|id| graph.elements.get(id))
            .map(|element| element.rect());
        let children = hierarchy
            .children_of(group)
            .iter()
            .filter_map(|child| graph.groups.get(child))
            .filter_map(|child| child.valid_bounds());
        let Some(content) = members.chain(children).reduce(|acc, rect| acc.union(&rect)) else {
            continue;
        };
        let Some(record) = graph.groups.get_mut(&group) else {
            continue;
        };
        record.bounds = Some(Rect::new(
            content.x - pad,
            content.y - pad - config.title_height,
            content.width + 2.0 * pad,
            content.height + 2.0 * pad + config.title_height,
        ));
        resized += 1;
    }
    debug!(resized, "resized groups");
    resized
}
