use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type NodeId = i64;
pub type LinkId = i64;
pub type GroupId = i64;

/// Vertical distance between two consecutive slots on an element edge.
pub const SLOT_PITCH: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Finite origin and a strictly positive, finite size.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn encloses(&self, other: &Rect, tolerance: f32) -> bool {
        other.x >= self.x - tolerance
            && other.y >= self.y - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    /// Strict overlap: touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        let overlap_x = self.right().min(other.right()) - self.x.max(other.x);
        let overlap_y = self.bottom().min(other.bottom()) - self.y.max(other.y);
        overlap_x > 0.0 && overlap_y > 0.0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElementKind {
    #[default]
    Ordinary,
    /// Pass-through element that only re-routes a connection.
    Reroute,
    /// Graph input/output boundary record.
    BoundaryIo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: NodeId,
    pub kind: ElementKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// One entry per input slot: the incoming link bound to it, if any.
    pub inputs: Vec<Option<LinkId>>,
    /// One entry per output slot: the outgoing links bound to it.
    pub outputs: Vec<Vec<LinkId>>,
    pub pinned: bool,
    pub locked: bool,
}

impl Element {
    pub fn new(id: NodeId, kind: ElementKind, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            width,
            height,
            inputs: Vec::new(),
            outputs: Vec::new(),
            pinned: false,
            locked: false,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn is_reroute(&self) -> bool {
        self.kind == ElementKind::Reroute
    }

    /// Pinned and locked elements are never repositioned.
    pub fn is_fixed(&self) -> bool {
        self.pinned || self.locked
    }

    pub fn input_anchor(&self, slot: usize) -> (f32, f32) {
        if self.is_reroute() {
            return self.rect().center();
        }
        (self.x, self.y + self.slot_offset(slot))
    }

    pub fn output_anchor(&self, slot: usize) -> (f32, f32) {
        if self.is_reroute() {
            return self.rect().center();
        }
        (self.x + self.width, self.y + self.slot_offset(slot))
    }

    fn slot_offset(&self, slot: usize) -> f32 {
        (SLOT_PITCH * (slot as f32 + 0.5)).min(self.height.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub origin: NodeId,
    pub origin_slot: usize,
    pub target: NodeId,
    pub target_slot: usize,
    /// Payload type tag. Carried through, never used for layout.
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    /// `None` when the source record had no usable bounds.
    pub bounds: Option<Rect>,
}

impl Group {
    pub fn new(id: GroupId, title: impl Into<String>, bounds: Option<Rect>) -> Self {
        Self {
            id,
            title: title.into(),
            bounds,
        }
    }

    /// Bounds usable for containment and layout.
    pub fn valid_bounds(&self) -> Option<Rect> {
        self.bounds.filter(Rect::is_valid)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub elements: BTreeMap<NodeId, Element>,
    pub links: BTreeMap<LinkId, Link>,
    pub groups: BTreeMap<GroupId, Group>,
    /// Set once at the end of a layout run; the host clears it after redraw.
    #[serde(skip)]
    pub dirty: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.insert(element.id, element);
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.insert(group.id, group);
    }

    /// Adds a link and binds it to the endpoint slots, growing slot lists as
    /// needed. Binding an already bound link is a no-op. Returns `false` when
    /// either endpoint is unknown.
    pub fn connect(
        &mut self,
        id: LinkId,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> bool {
        if !self.elements.contains_key(&origin) || !self.elements.contains_key(&target) {
            return false;
        }
        if let Some(source) = self.elements.get_mut(&origin) {
            if source.outputs.len() <= origin_slot {
                source.outputs.resize_with(origin_slot + 1, Vec::new);
            }
            if !source.outputs[origin_slot].contains(&id) {
                source.outputs[origin_slot].push(id);
            }
        }
        if let Some(sink) = self.elements.get_mut(&target) {
            if sink.inputs.len() <= target_slot {
                sink.inputs.resize(target_slot + 1, None);
            }
            sink.inputs[target_slot] = Some(id);
        }
        self.links.insert(
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
        true
    }

    /// Links whose endpoints both resolve to existing elements.
    pub fn resolved_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values().filter(|link| {
            self.elements.contains_key(&link.origin) && self.elements.contains_key(&link.target)
        })
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replaces non-finite geometry so that every later stage works on
    /// finite numbers. Returns how many elements were repaired.
    pub fn sanitize_geometry(&mut self, default_width: f32, default_height: f32) -> usize {
        let mut repaired = 0;
        for element in self.elements.values_mut() {
            let mut touched = false;
            if !element.width.is_finite() || element.width <= 0.0 {
                element.width = default_width;
                touched = true;
            }
            if !element.height.is_finite() || element.height <= 0.0 {
                element.height = default_height;
                touched = true;
            }
            if !element.x.is_finite() {
                element.x = 0.0;
                touched = true;
            }
            if !element.y.is_finite() {
                element.y = 0.0;
                touched = true;
            }
            if touched {
                repaired += 1;
            }
        }
        repaired
    }
}
