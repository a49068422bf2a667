//! Loads an HTML page into the in-memory [`Document`] the core works on.
//!
//! There is no layout engine here: every element gets a full-width row whose
//! vertical position follows document order, which is enough for "above the
//! selection" decisions and affordance placement.

use ego_tree::NodeRef;
use engify_core::dom::{DomMut, DomView, SelectionSource};
use engify_core::{Boundary, Document, NodeId, Rect, TextRange};
use engify_logging::engify_debug;
use scraper::node::Node;
use scraper::{ElementRef, Html};

const SKIPPED_TAGS: [&str; 5] = ["head", "script", "style", "template", "noscript"];
const ROW_HEIGHT: f64 = 24.0;
const PAGE_WIDTH: f64 = 800.0;

pub fn load_document(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut loader = Loader {
        document: Document::new(),
        row: 0,
        autofocus: None,
    };
    let root = loader.document.root();

    let body = parsed
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name().eq_ignore_ascii_case("body"));
    match body {
        Some(body) => {
            for (name, value) in body.value().attrs() {
                loader.document.set_attribute(root, name, value);
            }
            for child in body.children() {
                loader.visit(child, root);
            }
        }
        None => {
            for child in parsed.root_element().children() {
                loader.visit(child, root);
            }
        }
    }

    if let Some(focused) = loader.autofocus {
        loader.document.set_active_element(Some(focused));
    }
    loader.document
}

struct Loader {
    document: Document,
    row: usize,
    autofocus: Option<NodeId>,
}

impl Loader {
    fn visit(&mut self, node: NodeRef<'_, Node>, parent: NodeId) {
        match node.value() {
            Node::Text(text) => {
                if !text.trim().is_empty() {
                    self.document.append_text(parent, text);
                }
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, parent);
                }
            }
            _ => {}
        }
    }

    fn visit_element(&mut self, element: ElementRef<'_>, parent: NodeId) {
        let tag = element.value().name().to_ascii_lowercase();
        if SKIPPED_TAGS.contains(&tag.as_str()) {
            return;
        }
        let attributes: Vec<(&str, &str)> = element.value().attrs().collect();
        let id = self.document.append_element(parent, &tag, &attributes);
        self.document.set_rect(
            id,
            Rect::new(self.row as f64 * ROW_HEIGHT, 0.0, PAGE_WIDTH, ROW_HEIGHT),
        );
        self.row += 1;

        if self.autofocus.is_none() && element.value().attr("autofocus").is_some() {
            self.autofocus = Some(id);
        }

        match tag.as_str() {
            "textarea" => {
                let value: String = element.text().collect();
                self.document.set_field_value(id, &value);
            }
            "input" => {
                let value = element.value().attr("value").unwrap_or_default();
                self.document.set_field_value(id, value);
            }
            _ => {
                for child in element.children() {
                    self.visit(child, id);
                }
            }
        }
    }
}

/// First element whose `id` attribute equals `id`.
pub fn element_by_id(document: &Document, id: &str) -> Option<NodeId> {
    let mut stack = vec![document.root()];
    while let Some(node) = stack.pop() {
        if document.attribute_of(node, "id") == Some(id) {
            return Some(node);
        }
        stack.extend(document.children_of(node).into_iter().rev());
    }
    None
}

/// Selects the first occurrence of `needle`, the way a user dragging over it would.
///
/// Text fields are searched first (the field is focused and its selection set);
/// otherwise a single editable text node containing `needle` gets a page selection.
pub fn select_text(document: &mut Document, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    let mut stack = vec![document.root()];
    while let Some(node) = stack.pop() {
        if let Some(value) = document.field_of(node).map(|field| field.value.clone()) {
            if let Some(byte) = value.find(needle) {
                let start = value[..byte].chars().count();
                let end = start + needle.chars().count();
                document.set_active_element(Some(node));
                document.set_field_selection(node, start, end);
                engify_debug!("Selected {}..{} in field {}", start, end, node);
                return true;
            }
        }
        stack.extend(document.children_of(node).into_iter().rev());
    }

    for node in document.text_nodes() {
        let text = document.text_of(node);
        let Some(byte) = text.find(needle) else {
            continue;
        };
        let editable = document
            .parent_of(node)
            .is_some_and(|parent| document.is_editable(parent));
        if !editable {
            continue;
        }
        let start = text[..byte].chars().count();
        let end = start + needle.chars().count();
        document.set_active_element(None);
        document.set_selection(Some(TextRange::new(
            Boundary::new(node, start),
            Boundary::new(node, end),
        )));
        engify_debug!("Selected {}..{} in text node {}", start, end, node);
        return true;
    }
    false
}
