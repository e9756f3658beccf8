//! Retained SVG element tree with keyed, animatable elements.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Handle to an element in a [`Scene`]. Slots of removed elements are
/// recycled under a new generation, so a handle to a removed element simply
/// stops resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// What a transition animates
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Attr(String),
    Style(String),
}

impl Property {
    fn name(&self) -> &str {
        match self {
            Property::Attr(name) | Property::Style(name) => name,
        }
    }
}

/// A recorded animation. The end state is already applied to the element;
/// the transition only describes how a renderer may interpolate towards it.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub property: Property,
    pub from: Option<String>,
    pub to: String,
    pub delay_ms: u32,
    pub duration_ms: u32,
}

/// One SVG element
#[derive(Clone, Debug)]
pub struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    key: Option<String>,
    /// Record bound to this element by the renderer that created it
    datum: Value,
    /// Datum snapshot shown by popups
    info: Value,
    transitions: Vec<Transition>,
    retired: bool,
}

impl Element {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            styles: BTreeMap::new(),
            text: None,
            children: Vec::new(),
            parent,
            key: None,
            datum: Value::Null,
            info: Value::Null,
            transitions: Vec::new(),
            retired: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn style(&self, name: &str) -> Option<&str> {
        self.styles.get(name).map(String::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn datum(&self) -> &Value {
        &self.datum
    }

    pub fn info(&self) -> &Value {
        &self.info
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Retired elements are on their way out: they are no longer keyed or
    /// selectable, and are swept at the next reconciliation of their group.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|part| part == class))
    }
}

/// Retained SVG element tree that renderers mutate in place
#[derive(Clone, Debug)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    root: NodeId,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

impl Scene {
    /// Create a scene whose root element has the given tag
    pub fn new(root_tag: &str) -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                element: Some(Element::new(root_tag, None)),
            }],
            free: Vec::new(),
            live: 1,
            root: NodeId { index: 0, generation: 0 },
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.element.as_ref())
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.element.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Number of elements currently in the tree, root included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots backing the tree, recycled ones included
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn alloc(&mut self, tag: &str, parent: NodeId) -> NodeId {
        let element = Some(Element::new(tag, Some(parent)));
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.element = element;
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, element });
        NodeId { index, generation: 0 }
    }

    /// Append a new child element as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.alloc(tag, parent);
        if let Some(p) = self.element_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Insert a new child element before `sibling`, or first if `sibling` is
    /// not a child of `parent`
    pub fn insert_before(&mut self, parent: NodeId, tag: &str, sibling: Option<NodeId>) -> NodeId {
        let id = self.alloc(tag, parent);
        if let Some(p) = self.element_mut(parent) {
            let idx = sibling
                .and_then(|s| p.children.iter().position(|&c| c == s))
                .unwrap_or(0);
            p.children.insert(idx, id);
        }
        id
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.attrs.insert(name.to_string(), value.into());
        }
    }

    pub fn style(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.style(name))
    }

    /// Set a style property; `None` removes it, like assigning `null` in CSSOM
    pub fn set_style(&mut self, id: NodeId, name: &str, value: Option<String>) {
        if let Some(e) = self.element_mut(id) {
            match value {
                Some(v) => {
                    e.styles.insert(name.to_string(), v);
                }
                None => {
                    e.styles.remove(name);
                }
            }
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.text = Some(text.into());
        }
    }

    pub fn set_key(&mut self, id: NodeId, key: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.key = Some(key.into());
        }
    }

    pub fn set_datum(&mut self, id: NodeId, datum: Value) {
        if let Some(e) = self.element_mut(id) {
            e.datum = datum;
        }
    }

    pub fn set_info(&mut self, id: NodeId, info: Value) {
        if let Some(e) = self.element_mut(id) {
            e.info = info;
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(Element::children).unwrap_or(&[])
    }

    /// Children that have not been retired
    pub fn live_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some_and(|e| !e.retired))
            .collect()
    }

    /// Live keyed children of `parent` with the given tag, in document order
    pub fn keyed_children(&self, parent: NodeId, tag: &str) -> Vec<(NodeId, String)> {
        self.live_children(parent)
            .into_iter()
            .filter_map(|c| {
                let e = self.element(c)?;
                if e.tag != tag {
                    return None;
                }
                Some((c, e.key.clone()?))
            })
            .collect()
    }

    /// All live descendants of `from` carrying `class`, in document order
    pub fn select_class(&self, from: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.live_children(from).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(e) = self.element(id) {
                if e.has_class(class) {
                    found.push(id);
                }
                stack.extend(self.live_children(id).into_iter().rev());
            }
        }
        found
    }

    /// First live direct child of `parent` carrying `class`
    pub fn child_with_class(&self, parent: NodeId, class: &str) -> Option<NodeId> {
        self.live_children(parent)
            .into_iter()
            .find(|&c| self.element(c).is_some_and(|e| e.has_class(class)))
    }

    /// Move an element to the end of its parent's child list so it paints last
    pub fn raise(&mut self, id: NodeId) {
        let Some(parent) = self.element(id).and_then(Element::parent) else {
            return;
        };
        if let Some(p) = self.element_mut(parent) {
            p.children.retain(|&c| c != id);
            p.children.push(id);
        }
    }

    /// Move an element in front of `sibling` within its parent, or to the end
    /// when `sibling` is `None` or not a sibling
    pub fn move_before(&mut self, id: NodeId, sibling: Option<NodeId>) {
        let Some(parent) = self.element(id).and_then(Element::parent) else {
            return;
        };
        if let Some(p) = self.element_mut(parent) {
            p.children.retain(|&c| c != id);
            let at = sibling
                .and_then(|s| p.children.iter().position(|&c| c == s))
                .unwrap_or(p.children.len());
            p.children.insert(at, id);
        }
    }

    /// Detach and drop an element with its whole subtree. Returns the handles
    /// that stopped resolving.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.root {
            return Vec::new();
        }
        if let Some(parent) = self.element(id).and_then(Element::parent) {
            if let Some(p) = self.element_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(next.index as usize)
                .filter(|s| s.generation == next.generation)
            else {
                continue;
            };
            if let Some(e) = slot.element.take() {
                stack.extend(e.children);
                self.free.push(next.index);
                self.live -= 1;
                removed.push(next);
            }
        }
        removed
    }

    /// Remove every child of `id`
    pub fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = self.children(id).to_vec();
        children.into_iter().flat_map(|c| self.remove(c)).collect()
    }

    /// Apply `to` as the new value of `property` and record the animation from
    /// the previous value. A newer transition on the same property replaces
    /// the pending one.
    pub fn transition(&mut self, id: NodeId, property: Property, to: impl Into<String>, delay_ms: u32, duration_ms: u32) {
        let to = to.into();
        let Some(e) = self.element_mut(id) else {
            return;
        };
        let from = match &property {
            Property::Attr(name) => e.attrs.insert(name.clone(), to.clone()),
            Property::Style(name) => e.styles.insert(name.clone(), to.clone()),
        };
        e.transitions.retain(|t| t.property != property);
        e.transitions.push(Transition {
            property,
            from,
            to,
            delay_ms,
            duration_ms,
        });
    }

    /// Take an element out of the live set. Its exit transitions stay recorded
    /// until [`Scene::sweep`] drops it.
    pub fn retire(&mut self, id: NodeId) {
        if let Some(e) = self.element_mut(id) {
            e.retired = true;
            e.key = None;
        }
    }

    /// Drop retired children of `parent`
    pub fn sweep(&mut self, parent: NodeId) -> Vec<NodeId> {
        let retired: Vec<NodeId> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some_and(|e| e.retired))
            .collect();
        retired.into_iter().flat_map(|c| self.remove(c)).collect()
    }

    /// Serialize the tree below `id` (inclusive) as SVG markup
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_element(&mut out, id);
        out
    }

    fn write_element(&self, out: &mut String, id: NodeId) {
        let Some(e) = self.element(id) else {
            return;
        };

        let _ = write!(out, "<{}", e.tag);
        for (name, value) in &e.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        if !e.styles.is_empty() {
            let style = e
                .styles
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = write!(out, " style=\"{}\"", escape(&style));
        }

        if e.children.is_empty() && e.text.is_none() && e.transitions.is_empty() && !e.retired {
            out.push_str("/>");
            return;
        }
        out.push('>');

        for t in &e.transitions {
            let attribute_type = match t.property {
                Property::Attr(_) => "XML",
                Property::Style(_) => "CSS",
            };
            let _ = write!(
                out,
                "<animate attributeName=\"{}\" attributeType=\"{}\"",
                t.property.name(),
                attribute_type
            );
            if let Some(from) = &t.from {
                let _ = write!(out, " from=\"{}\"", escape(from));
            }
            let _ = write!(
                out,
                " to=\"{}\" begin=\"{}ms\" dur=\"{}ms\" fill=\"freeze\"/>",
                escape(&t.to),
                t.delay_ms,
                t.duration_ms.max(1)
            );
        }
        if e.retired {
            let end = e
                .transitions
                .iter()
                .map(|t| t.delay_ms + t.duration_ms)
                .max()
                .unwrap_or(0);
            let _ = write!(out, "<set attributeName=\"display\" to=\"none\" begin=\"{}ms\"/>", end);
        }
        if let Some(text) = &e.text {
            out.push_str(&escape(text));
        }
        for &child in &e.children {
            self.write_element(out, child);
        }
        let _ = write!(out, "</{}>", e.tag);
    }
}

/// Format a number the way it is written into attributes: at most three
/// decimals, no trailing zeros, no negative zero
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{}", rounded)
}

/// Escape text for use in markup and attribute values
pub(crate) fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
