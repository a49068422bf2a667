//! DOM capability interface and an in-memory document implementing it.
//!
//! The tracker and the context heuristics only ever see the page through the
//! traits in this module. `Document` is the arena-backed implementation used by
//! the page host and by tests that need synthetic trees.

use std::collections::HashMap;

pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// A point inside the document.
///
/// For text nodes `offset` counts characters; for elements it is a child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl TextRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Live state of a plain text field (`input` or `textarea`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldState {
    pub value: String,
    pub selection_start: usize,
    pub selection_end: usize,
    pub input_type: Option<String>,
}

impl FieldState {
    pub fn selected_text(&self) -> Option<&str> {
        char_slice(&self.value, self.selection_start, self.selection_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEventKind {
    Input,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomEvent {
    pub target: NodeId,
    pub kind: DomEventKind,
}

/// User interactions that may change the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    PointerUp,
    KeyUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Read-only view of the element tree.
pub trait DomView {
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
    fn children_of(&self, node: NodeId) -> Vec<NodeId>;
    /// Lower-case tag name; `None` for text nodes.
    fn tag_of(&self, node: NodeId) -> Option<&str>;
    fn attributes_of(&self, node: NodeId) -> Vec<(&str, &str)>;
    fn bounding_box_of(&self, node: NodeId) -> Option<Rect>;
    fn text_of(&self, node: NodeId) -> String;
    fn is_editable(&self, node: NodeId) -> bool;
    fn is_attached(&self, node: NodeId) -> bool;

    fn attribute_of(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes_of(node)
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.tag_of(node).is_some()
    }

    /// True when `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    fn boundary_after(&self, node: NodeId) -> Option<Boundary> {
        let parent = self.parent_of(node)?;
        let index = self.children_of(parent).iter().position(|c| *c == node)?;
        Some(Boundary::new(parent, index + 1))
    }
}

/// Focus, field and selection state on top of the tree.
pub trait SelectionSource: DomView {
    fn active_element(&self) -> Option<NodeId>;
    fn field_of(&self, node: NodeId) -> Option<&FieldState>;
    fn selection(&self) -> Option<TextRange>;
    fn range_text(&self, range: &TextRange) -> Option<String>;
    fn range_bounding_box(&self, range: &TextRange) -> Option<Rect>;

    fn common_ancestor(&self, range: &TextRange) -> Option<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = Some(range.start.node);
        while let Some(id) = current {
            ancestors.push(id);
            current = self.parent_of(id);
        }
        let mut current = Some(range.end.node);
        while let Some(id) = current {
            if ancestors.contains(&id) {
                return Some(id);
            }
            current = self.parent_of(id);
        }
        None
    }
}

/// Mutations needed to put a replacement back into the page.
pub trait DomMut: SelectionSource {
    fn focus(&mut self, node: NodeId);
    fn set_field_selection(&mut self, node: NodeId, start: usize, end: usize) -> bool;
    /// Replaces `start..end` of a field's value and moves the caret after the replacement.
    fn splice_field_value(
        &mut self,
        node: NodeId,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> bool;
    fn set_selection(&mut self, range: Option<TextRange>);
    /// Deletes the range contents and returns the collapsed start point.
    fn delete_range_contents(&mut self, range: &TextRange) -> Option<Boundary>;
    /// Inserts a single new text node at `at` and returns it.
    fn insert_text_at(&mut self, at: Boundary, text: &str) -> Option<NodeId>;
    fn dispatch(&mut self, target: NodeId, kind: DomEventKind);
}

/// Registration of interaction listeners as explicit subscriptions.
pub trait EventSource {
    fn subscribe(&mut self, kinds: &[InteractionKind]) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Slice `s` by character offsets.
pub fn char_slice(s: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let start_byte = byte_offset(s, start)?;
    let end_byte = byte_offset(s, end)?;
    s.get(start_byte..end_byte)
}

fn byte_offset(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    match s.char_indices().nth(chars) {
        Some((idx, _)) => Some(idx),
        None if s.chars().count() == chars => Some(s.len()),
        None => None,
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Option<Rect>,
    field: Option<FieldState>,
}

impl NodeData {
    fn element(tag: &str, attributes: Vec<(String, String)>) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attributes,
            },
            parent: None,
            children: Vec::new(),
            rect: None,
            field: None,
        }
    }

    fn text(text: &str) -> Self {
        Self {
            kind: NodeKind::Text(text.to_string()),
            parent: None,
            children: Vec::new(),
            rect: None,
            field: None,
        }
    }
}

struct TextEntry {
    node: NodeId,
    base: usize,
    len: usize,
    order: usize,
}

/// Linearised text of the attached tree, used for range arithmetic.
struct TextLayout {
    order: HashMap<NodeId, usize>,
    entries: Vec<TextEntry>,
    total: usize,
}

/// Arena-backed document with focus, selection and dispatched-event log.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    active: Option<NodeId>,
    selection: Option<TextRange>,
    events: Vec<DomEvent>,
    subscriptions: Vec<(SubscriptionId, Vec<InteractionKind>)>,
    next_subscription: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::element("body", Vec::new())],
            active: None,
            selection: None,
            events: Vec::new(),
            subscriptions: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), (*v).to_string()))
            .collect();
        let id = self.create_node(NodeData::element(tag, attributes));
        let index = self.child_count(parent);
        self.insert_child(parent, index, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_node(NodeData::text(text));
        let index = self.child_count(parent);
        self.insert_child(parent, index, id);
        id
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(NodeKind::Element { attributes, .. }) =
            self.nodes.get_mut(node).map(|n| &mut n.kind)
        {
            let name = name.to_ascii_lowercase();
            match attributes.iter_mut().find(|(k, _)| *k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((name, value.to_string())),
            }
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.rect = Some(rect);
        }
    }

    /// Turns an element into a plain text field holding `value`.
    pub fn set_field_value(&mut self, node: NodeId, value: &str) {
        let input_type = self.attribute_of(node, "type").map(str::to_ascii_lowercase);
        if let Some(data) = self.nodes.get_mut(node) {
            let field = data.field.get_or_insert_with(FieldState::default);
            field.value = value.to_string();
            field.input_type = input_type;
            let len = value.chars().count();
            field.selection_start = field.selection_start.min(len);
            field.selection_end = field.selection_end.min(len);
        }
    }

    pub fn field_value(&self, node: NodeId) -> Option<&str> {
        self.field_of(node).map(|f| f.value.as_str())
    }

    pub fn set_active_element(&mut self, node: Option<NodeId>) {
        self.active = node.filter(|id| self.is_attached(*id));
    }

    /// Detaches `node` (and its subtree) from the document.
    pub fn remove(&mut self, node: NodeId) {
        if node == ROOT {
            return;
        }
        if let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            self.nodes[parent].children.retain(|c| *c != node);
            self.nodes[node].parent = None;
        }
        if let Some(active) = self.active {
            if self.contains(node, active) {
                self.active = None;
            }
        }
    }

    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_listener(&self, kind: InteractionKind) -> bool {
        self.subscriptions
            .iter()
            .any(|(_, kinds)| kinds.contains(&kind))
    }

    /// Attached text nodes in document order.
    pub fn text_nodes(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        self.preorder(ROOT, &mut order);
        order
            .into_iter()
            .filter(|id| matches!(self.nodes[*id].kind, NodeKind::Text(_)))
            .collect()
    }

    /// Text of the whole attached document.
    pub fn body_text(&self) -> String {
        self.text_of(ROOT)
    }

    fn create_node(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        self.nodes.len() - 1
    }

    fn child_count(&self, node: NodeId) -> usize {
        self.nodes.get(node).map_or(0, |n| n.children.len())
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if parent >= self.nodes.len() || child >= self.nodes.len() {
            return;
        }
        let index = index.min(self.nodes[parent].children.len());
        self.nodes[parent].children.insert(index, child);
        self.nodes[child].parent = Some(parent);
    }

    fn preorder(&self, from: NodeId, out: &mut Vec<NodeId>) {
        out.push(from);
        for child in &self.nodes[from].children {
            self.preorder(*child, out);
        }
    }

    fn subtree_len(&self, node: NodeId) -> usize {
        1 + self.nodes[node]
            .children
            .iter()
            .map(|c| self.subtree_len(*c))
            .sum::<usize>()
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    fn layout(&self) -> TextLayout {
        let mut preorder = Vec::new();
        self.preorder(ROOT, &mut preorder);
        let mut order = HashMap::with_capacity(preorder.len());
        let mut entries = Vec::new();
        let mut total = 0;
        for (index, id) in preorder.into_iter().enumerate() {
            order.insert(id, index);
            if let NodeKind::Text(text) = &self.nodes[id].kind {
                let len = text.chars().count();
                entries.push(TextEntry {
                    node: id,
                    base: total,
                    len,
                    order: index,
                });
                total += len;
            }
        }
        TextLayout {
            order,
            entries,
            total,
        }
    }

    fn resolve(&self, layout: &TextLayout, boundary: Boundary) -> Option<usize> {
        let data = self.nodes.get(boundary.node)?;
        let position = *layout.order.get(&boundary.node)?;
        match &data.kind {
            NodeKind::Text(_) => {
                let entry = layout.entries.iter().find(|e| e.node == boundary.node)?;
                (boundary.offset <= entry.len).then_some(entry.base + boundary.offset)
            }
            NodeKind::Element { .. } => {
                if boundary.offset > data.children.len() {
                    return None;
                }
                let from = match data.children.get(boundary.offset) {
                    Some(child) => *layout.order.get(child)?,
                    None => position + self.subtree_len(boundary.node),
                };
                Some(
                    layout
                        .entries
                        .iter()
                        .find(|e| e.order >= from)
                        .map_or(layout.total, |e| e.base),
                )
            }
        }
    }

    fn resolve_range(&self, layout: &TextLayout, range: &TextRange) -> Option<(usize, usize)> {
        let start = self.resolve(layout, range.start)?;
        let end = self.resolve(layout, range.end)?;
        (start <= end).then_some((start, end))
    }
}

impl DomView for Document {
    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node)?.parent
    }

    fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag_of(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn attributes_of(&self, node: NodeId) -> Vec<(&str, &str)> {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn bounding_box_of(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(node)?.rect
    }

    fn text_of(&self, node: NodeId) -> String {
        let Some(data) = self.nodes.get(node) else {
            return String::new();
        };
        match &data.kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element { .. } => data.children.iter().map(|c| self.text_of(*c)).collect(),
        }
    }

    fn is_editable(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(value) = self.attribute_of(id, "contenteditable") {
                match value.trim().to_ascii_lowercase().as_str() {
                    "" | "true" | "plaintext-only" => return true,
                    "false" => return false,
                    _ => {}
                }
            }
            current = self.parent_of(id);
        }
        false
    }

    fn is_attached(&self, node: NodeId) -> bool {
        if node >= self.nodes.len() {
            return false;
        }
        let mut current = node;
        loop {
            if current == ROOT {
                return true;
            }
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

impl SelectionSource for Document {
    fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    fn field_of(&self, node: NodeId) -> Option<&FieldState> {
        self.nodes.get(node)?.field.as_ref()
    }

    fn selection(&self) -> Option<TextRange> {
        self.selection
    }

    fn range_text(&self, range: &TextRange) -> Option<String> {
        let layout = self.layout();
        let (start, end) = self.resolve_range(&layout, range)?;
        let mut out = String::new();
        for entry in &layout.entries {
            let from = start.max(entry.base);
            let to = end.min(entry.base + entry.len);
            if from < to {
                let text = self.text(entry.node)?;
                out.push_str(char_slice(text, from - entry.base, to - entry.base)?);
            }
        }
        Some(out)
    }

    fn range_bounding_box(&self, range: &TextRange) -> Option<Rect> {
        let mut current = Some(range.start.node);
        while let Some(id) = current {
            if let Some(rect) = self.bounding_box_of(id) {
                return Some(rect);
            }
            current = self.parent_of(id);
        }
        None
    }
}

impl DomMut for Document {
    fn focus(&mut self, node: NodeId) {
        if self.is_attached(node) {
            self.active = Some(node);
        }
    }

    fn set_field_selection(&mut self, node: NodeId, start: usize, end: usize) -> bool {
        let Some(field) = self.nodes.get_mut(node).and_then(|n| n.field.as_mut()) else {
            return false;
        };
        let len = field.value.chars().count();
        field.selection_start = start.min(len);
        field.selection_end = end.min(len).max(field.selection_start);
        true
    }

    fn splice_field_value(
        &mut self,
        node: NodeId,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> bool {
        let Some(field) = self.nodes.get_mut(node).and_then(|n| n.field.as_mut()) else {
            return false;
        };
        let (Some(start_byte), Some(end_byte)) =
            (byte_offset(&field.value, start), byte_offset(&field.value, end))
        else {
            return false;
        };
        if start_byte > end_byte {
            return false;
        }
        field.value.replace_range(start_byte..end_byte, replacement);
        let caret = start + replacement.chars().count();
        field.selection_start = caret;
        field.selection_end = caret;
        true
    }

    fn set_selection(&mut self, range: Option<TextRange>) {
        self.selection = range;
    }

    fn delete_range_contents(&mut self, range: &TextRange) -> Option<Boundary> {
        let layout = self.layout();
        let (start, end) = self.resolve_range(&layout, range)?;
        let mut emptied = Vec::new();
        for entry in &layout.entries {
            let from = start.max(entry.base);
            let to = end.min(entry.base + entry.len);
            if from >= to {
                continue;
            }
            let local_from = from - entry.base;
            let local_to = to - entry.base;
            if let NodeKind::Text(text) = &mut self.nodes[entry.node].kind {
                let (Some(a), Some(b)) = (byte_offset(text, local_from), byte_offset(text, local_to))
                else {
                    return None;
                };
                text.replace_range(a..b, "");
                if text.is_empty() && entry.node != range.start.node {
                    emptied.push(entry.node);
                }
            }
        }
        for node in emptied {
            self.remove(node);
        }
        let collapsed = range.start;
        self.selection = Some(TextRange::collapsed(collapsed));
        Some(collapsed)
    }

    fn insert_text_at(&mut self, at: Boundary, text: &str) -> Option<NodeId> {
        if !self.is_attached(at.node) {
            return None;
        }
        if let Some(original) = self.text(at.node).map(str::to_string) {
            let parent = self.parent_of(at.node)?;
            let split = byte_offset(&original, at.offset)?;
            let (before, after) = original.split_at(split);
            let index = self.nodes[parent]
                .children
                .iter()
                .position(|c| *c == at.node)?;
            self.nodes[at.node].kind = NodeKind::Text(before.to_string());
            let inserted = self.create_node(NodeData::text(text));
            self.insert_child(parent, index + 1, inserted);
            if !after.is_empty() {
                let rest = self.create_node(NodeData::text(after));
                self.insert_child(parent, index + 2, rest);
            }
            return Some(inserted);
        }
        if at.offset > self.child_count(at.node) {
            return None;
        }
        let inserted = self.create_node(NodeData::text(text));
        self.insert_child(at.node, at.offset, inserted);
        Some(inserted)
    }

    fn dispatch(&mut self, target: NodeId, kind: DomEventKind) {
        self.events.push(DomEvent { target, kind });
    }
}

impl EventSource for Document {
    fn subscribe(&mut self, kinds: &[InteractionKind]) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push((id, kinds.to_vec()));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.retain(|(sub, _)| *sub != id);
    }
}
