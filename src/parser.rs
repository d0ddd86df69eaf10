use crate::error::{Error, Result};
use crate::ir::{Element, ElementKind, Graph, Group, GroupId, Link, NodeId, Rect};
use crate::layout::check_containment;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Title bar height assumed when the caller does not pass one.
const DEFAULT_TITLE_HEIGHT: f32 = 34.0;
const FALLBACK_WIDTH: f32 = 200.0;
const FALLBACK_HEIGHT: f32 = 100.0;

/// How a pair of numbers was encoded in the source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairFormat {
    Array,
    Keys(&'static str, &'static str),
}

const POS_KEYS: &[(&str, &str)] = &[("0", "1"), ("x", "y")];
const SIZE_KEYS: &[(&str, &str)] = &[("0", "1"), ("width", "height"), ("w", "h"), ("x", "y")];
const BOUNDS_KEYS: &[(&str, &str)] = &[("x", "y")];

#[derive(Debug, Clone, Copy)]
enum Geometry {
    /// `pos` / `size` fields, each in its own format (`None` if absent).
    Split {
        pos: Option<PairFormat>,
        size: Option<PairFormat>,
    },
    /// A single `bounding` rectangle.
    Bounding(PairFormat),
}

#[derive(Debug, Clone, Copy)]
struct NodeSource {
    index: usize,
    geometry: Geometry,
}

#[derive(Debug, Clone, Copy)]
struct GroupSource {
    /// `true` when the group was found in `nodes` rather than `groups`.
    in_nodes: bool,
    index: usize,
    format: Option<PairFormat>,
}

/// An ingested editor document: the canonical graph plus enough of the raw
/// JSON to write positions back in the shape they came in.
#[derive(Debug, Clone)]
pub struct Document {
    pub graph: Graph,
    raw: Value,
    nodes: BTreeMap<NodeId, NodeSource>,
    groups: BTreeMap<GroupId, GroupSource>,
}

pub fn parse_document(input: &str) -> Result<Document> {
    parse_document_with(input, DEFAULT_TITLE_HEIGHT)
}

/// Parses a document and rejects groups that contain each other under the
/// given title bar height.
pub fn parse_document_with(input: &str, title_height: f32) -> Result<Document> {
    let raw: Value = match serde_json::from_str(input) {
        Ok(value) => value,
        Err(err) => {
            debug!(%err, "strict JSON failed; retrying as JSON5");
            json5::from_str::<Value>(input)?
        }
    };
    let Some(root) = raw.as_object() else {
        return Err(Error::InvalidDocument("top level must be an object".into()));
    };

    let mut graph = Graph::new();
    let mut nodes = BTreeMap::new();
    let mut groups = BTreeMap::new();
    let mut pending_groups: Vec<(GroupSource, &Map<String, Value>)> = Vec::new();

    for (index, entry) in array_field(root, "nodes").iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        if looks_like_group(obj) {
            let format = obj.get("bounding").and_then(rect_format);
            pending_groups.push((
                GroupSource {
                    in_nodes: true,
                    index,
                    format,
                },
                obj,
            ));
            continue;
        }
        let Some(id) = obj.get("id").and_then(as_id) else {
            warn!(index, "node without usable id skipped");
            continue;
        };
        let (element, geometry) = read_element(id, obj);
        nodes.insert(id, NodeSource { index, geometry });
        graph.add_element(element);
    }

    for (index, entry) in array_field(root, "groups").iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let format = obj.get("bounding").and_then(rect_format);
        pending_groups.push((
            GroupSource {
                in_nodes: false,
                index,
                format,
            },
            obj,
        ));
    }

    let mut next_id = pending_groups
        .iter()
        .filter_map(|(_, obj)| obj.get("id").and_then(as_id))
        .max()
        .unwrap_or(0)
        + 1;
    for (source, obj) in pending_groups {
        let id = match obj.get("id").and_then(as_id) {
            Some(id) if !groups.contains_key(&id) => id,
            _ => {
                next_id += 1;
                next_id - 1
            }
        };
        let title = obj.get("title").and_then(Value::as_str).unwrap_or_default();
        let bounds = obj.get("bounding").and_then(read_rect);
        graph.add_group(Group::new(id, title, bounds));
        groups.insert(id, source);
    }

    for entry in array_field(root, "links") {
        let Some((id, origin, origin_slot, target, target_slot, kind)) = read_link(entry) else {
            continue;
        };
        if !graph.connect(id, origin, origin_slot, target, target_slot) {
            debug!(link = id, origin, target, "link with dangling endpoint kept unbound");
            graph.links.insert(
                id,
                Link {
                    id,
                    origin,
                    origin_slot,
                    target,
                    target_slot,
                    kind: String::new(),
                },
            );
        }
        if let Some(link) = graph.links.get_mut(&id) {
            link.kind = kind;
        }
    }

    check_containment(&graph, title_height)?;
    debug!(
        elements = graph.elements.len(),
        links = graph.links.len(),
        groups = graph.groups.len(),
        "parsed document"
    );
    Ok(Document {
        graph,
        raw,
        nodes,
        groups,
    })
}

impl Document {
    /// Writes element positions and sizes and group bounds into the raw
    /// document, keeping each entry's original encoding.
    pub fn write_back(&mut self) {
        for (id, source) in &self.nodes {
            let Some(element) = self.graph.elements.get(id) else {
                continue;
            };
            let Some(entry) = self
                .raw
                .get_mut("nodes")
                .and_then(|nodes| nodes.get_mut(source.index))
                .and_then(Value::as_object_mut)
            else {
                continue;
            };
            match source.geometry {
                Geometry::Bounding(format) => {
                    entry.insert("bounding".into(), rect_value(format, &element.rect()));
                }
                Geometry::Split { pos, size } => {
                    write_pair(entry, "pos", pos, element.x, element.y);
                    if let Some(format) = size {
                        write_pair(entry, "size", Some(format), element.width, element.height);
                    }
                }
            }
        }

        for (id, source) in &self.groups {
            let Some(bounds) = self.graph.groups.get(id).and_then(|group| group.bounds) else {
                continue;
            };
            let list = if source.in_nodes { "nodes" } else { "groups" };
            let Some(entry) = self
                .raw
                .get_mut(list)
                .and_then(|items| items.get_mut(source.index))
                .and_then(Value::as_object_mut)
            else {
                continue;
            };
            let format = source.format.unwrap_or(PairFormat::Array);
            entry.insert("bounding".into(), rect_value(format, &bounds));
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }
}

fn array_field<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    root.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_index(value: &Value) -> Option<usize> {
    as_id(value).and_then(|v| usize::try_from(v).ok())
}

fn as_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32).filter(|v| v.is_finite())
}

fn looks_like_group(obj: &Map<String, Value>) -> bool {
    !obj.contains_key("type") && obj.contains_key("bounding") && obj.contains_key("title")
}

fn read_pair(value: &Value, keys: &[(&'static str, &'static str)]) -> Option<((f32, f32), PairFormat)> {
    if let Some(items) = value.as_array() {
        let a = as_f32(items.first()?)?;
        let b = as_f32(items.get(1)?)?;
        return Some(((a, b), PairFormat::Array));
    }
    let obj = value.as_object()?;
    keys.iter().find_map(|&(ka, kb)| {
        let a = as_f32(obj.get(ka)?)?;
        let b = as_f32(obj.get(kb)?)?;
        Some(((a, b), PairFormat::Keys(ka, kb)))
    })
}

fn rect_format(value: &Value) -> Option<PairFormat> {
    if value.is_array() {
        return Some(PairFormat::Array);
    }
    read_pair(value, BOUNDS_KEYS).map(|(_, format)| format)
}

fn read_rect(value: &Value) -> Option<Rect> {
    if let Some(items) = value.as_array() {
        if items.len() < 4 {
            return None;
        }
        return Some(Rect::new(
            as_f32(&items[0])?,
            as_f32(&items[1])?,
            as_f32(&items[2])?,
            as_f32(&items[3])?,
        ));
    }
    let obj = value.as_object()?;
    Some(Rect::new(
        as_f32(obj.get("x")?)?,
        as_f32(obj.get("y")?)?,
        as_f32(obj.get("width")?)?,
        as_f32(obj.get("height")?)?,
    ))
}

fn rect_value(format: PairFormat, rect: &Rect) -> Value {
    let [x, y, w, h] = [rect.x, rect.y, rect.width, rect.height].map(f64::from);
    match format {
        PairFormat::Array => json!([x, y, w, h]),
        PairFormat::Keys(..) => json!({ "x": x, "y": y, "width": w, "height": h }),
    }
}

fn write_pair(entry: &mut Map<String, Value>, key: &str, format: Option<PairFormat>, a: f32, b: f32) {
    let (a, b) = (f64::from(a), f64::from(b));
    match format {
        Some(PairFormat::Keys(ka, kb)) => {
            if let Some(obj) = entry.get_mut(key).and_then(Value::as_object_mut) {
                obj.insert(ka.into(), json!(a));
                obj.insert(kb.into(), json!(b));
                return;
            }
            entry.insert(key.into(), json!({ ka: a, kb: b }));
        }
        Some(PairFormat::Array) | None => {
            entry.insert(key.into(), json!([a, b]));
        }
    }
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    let direct = obj.get(key).and_then(Value::as_bool).unwrap_or(false);
    let nested = obj
        .get("flags")
        .and_then(|flags| flags.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    direct || nested
}

fn element_kind(obj: &Map<String, Value>) -> ElementKind {
    let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
    if kind.to_ascii_lowercase().contains("reroute") {
        ElementKind::Reroute
    } else if matches!(kind, "GraphInput" | "GraphOutput") || flag(obj, "boundary") {
        ElementKind::BoundaryIo
    } else {
        ElementKind::Ordinary
    }
}

fn read_element(id: NodeId, obj: &Map<String, Value>) -> (Element, Geometry) {
    let pos = obj.get("pos").and_then(|v| read_pair(v, POS_KEYS));
    let size = obj.get("size").and_then(|v| read_pair(v, SIZE_KEYS));
    let bounding = obj.get("bounding").and_then(|v| read_rect(v).zip(rect_format(v)));

    let (rect, geometry) = match (pos, bounding) {
        (None, Some((rect, format))) => (rect, Geometry::Bounding(format)),
        _ => {
            let ((x, y), pos_format) = pos.map_or(((0.0, 0.0), None), |(p, f)| (p, Some(f)));
            let ((w, h), size_format) = size
                .map_or(((FALLBACK_WIDTH, FALLBACK_HEIGHT), None), |(s, f)| (s, Some(f)));
            (
                Rect::new(x, y, w, h),
                Geometry::Split {
                    pos: pos_format,
                    size: size_format,
                },
            )
        }
    };

    let mut element = Element::new(id, element_kind(obj), rect.x, rect.y, rect.width, rect.height);
    if !element.rect().is_valid() {
        element.width = FALLBACK_WIDTH;
        element.height = FALLBACK_HEIGHT;
    }
    element.pinned = flag(obj, "pinned");
    element.locked = flag(obj, "locked");

    if let Some(inputs) = obj.get("inputs").and_then(Value::as_array) {
        element.inputs = inputs
            .iter()
            .map(|slot| slot.get("link").and_then(as_id))
            .collect();
    }
    if let Some(outputs) = obj.get("outputs").and_then(Value::as_array) {
        element.outputs = outputs
            .iter()
            .map(|slot| {
                slot.get("links")
                    .and_then(Value::as_array)
                    .map(|links| links.iter().filter_map(as_id).collect())
                    .unwrap_or_default()
            })
            .collect();
    }
    (element, geometry)
}

type LinkRecord = (i64, NodeId, usize, NodeId, usize, String);

fn read_link(entry: &Value) -> Option<LinkRecord> {
    if let Some(items) = entry.as_array() {
        let kind = items.get(5).map(type_tag).unwrap_or_default();
        return Some((
            as_id(items.first()?)?,
            as_id(items.get(1)?)?,
            as_index(items.get(2)?)?,
            as_id(items.get(3)?)?,
            as_index(items.get(4)?)?,
            kind,
        ));
    }
    let obj = entry.as_object()?;
    let field = |names: &[&str]| names.iter().find_map(|name| obj.get(*name));
    Some((
        as_id(field(&["id"])?)?,
        as_id(field(&["origin_id", "origin", "originId"])?)?,
        field(&["origin_slot", "originSlot"]).and_then(as_index).unwrap_or(0),
        as_id(field(&["target_id", "target", "targetId"])?)?,
        field(&["target_slot", "targetSlot"]).and_then(as_index).unwrap_or(0),
        field(&["type"]).map(type_tag).unwrap_or_default(),
    ))
}

fn type_tag(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
