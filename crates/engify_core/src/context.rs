//! Heuristic extraction of nearby conversation text.
//!
//! Walks outward from the selected element and looks for discrete
//! "message-like" blocks above it. Everything here is a pure function over
//! [`DomView`], so synthetic trees exercise it directly.

use std::cmp::Ordering;
use std::collections::HashMap;

use engify_logging::engify_debug;

use crate::dom::{DomView, NodeId};

const MESSAGE_MARKERS: [&str; 3] = ["message", "comment", "note"];
const MESSAGE_ROLES: [&str; 3] = ["article", "comment", "listitem"];
const MESSAGE_TAGS: [&str; 2] = ["li", "article"];
const THREAD_MARKERS: [&str; 4] = ["thread", "conversation", "chat", "timeline"];
const THREAD_ROLES: [&str; 2] = ["feed", "log"];
const BLOCK_TAGS: [&str; 22] = [
    "article", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "li", "ol", "p", "pre", "section", "tr", "ul",
];
const MIN_MESSAGES: usize = 2;
const MIN_HOMOGENEOUS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSettings {
    pub max_depth: usize,
    pub max_messages: usize,
    pub max_chars: usize,
    pub separator: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_depth: 15,
            max_messages: 20,
            max_chars: 4000,
            separator: "\n\n".to_string(),
        }
    }
}

struct Candidate {
    top: Option<f64>,
    text: String,
}

/// Nearby conversation text for `element`, or `None` when no ancestor level
/// yields at least two distinct qualifying messages.
pub fn extract_context<D>(dom: &D, element: NodeId, settings: &ContextSettings) -> Option<String>
where
    D: DomView + ?Sized,
{
    let selection_top = dom.bounding_box_of(element).map(|rect| rect.top);
    let mut best: Option<Vec<String>> = None;
    let mut container = dom.parent_of(element);

    for depth in 0..settings.max_depth {
        let Some(level) = container else {
            break;
        };

        let mut texts = qualifying_texts(
            dom,
            element,
            selection_top,
            message_candidates(dom, level, element),
        );
        if texts.len() < MIN_MESSAGES {
            texts = qualifying_texts(
                dom,
                element,
                selection_top,
                homogeneous_children(dom, level),
            );
        }

        if texts.len() >= MIN_MESSAGES {
            engify_debug!(
                "Context candidate at depth {}: {} messages",
                depth,
                texts.len()
            );
            let count = texts.len();
            best = Some(texts);
            if looks_like_thread(dom, level) || count >= settings.max_messages {
                break;
            }
        }

        container = dom.parent_of(level);
    }

    best.map(|texts| assemble(texts, settings))
}

fn qualifying_texts<D>(
    dom: &D,
    element: NodeId,
    selection_top: Option<f64>,
    nodes: Vec<NodeId>,
) -> Vec<String>
where
    D: DomView + ?Sized,
{
    let mut candidates: Vec<Candidate> = Vec::new();
    for node in nodes {
        if dom.contains(node, element) {
            continue;
        }
        let top = dom.bounding_box_of(node).map(|rect| rect.top);
        if let (Some(top), Some(limit)) = (top, selection_top) {
            if top > limit {
                continue;
            }
        }
        let text = normalize(&message_text(dom, node));
        if text.is_empty() || candidates.iter().any(|c| c.text == text) {
            continue;
        }
        candidates.push(Candidate { top, text });
    }
    // Position sort only when every candidate has a box; otherwise document order.
    if candidates.iter().all(|c| c.top.is_some()) {
        candidates.sort_by(|a, b| {
            a.top
                .zip(b.top)
                .map_or(Ordering::Equal, |(a, b)| a.total_cmp(&b))
        });
    }
    candidates.into_iter().map(|c| c.text).collect()
}

fn assemble(texts: Vec<String>, settings: &ContextSettings) -> String {
    let skip = texts.len().saturating_sub(settings.max_messages);
    let joined = texts[skip..].join(&settings.separator);
    let len = joined.chars().count();
    if len <= settings.max_chars {
        return joined;
    }
    joined.chars().skip(len - settings.max_chars).collect()
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outermost message-like elements under `root`. Markers nested inside a
/// message (author, body, footer) belong to it. A wrapper around `element`
/// is looked through rather than taken.
fn message_candidates<D>(dom: &D, root: NodeId, element: NodeId) -> Vec<NodeId>
where
    D: DomView + ?Sized,
{
    let mut found = Vec::new();
    let mut stack: Vec<NodeId> = dom.children_of(root).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if !dom.is_element(node) {
            continue;
        }
        if looks_like_message(dom, node) && !dom.contains(node, element) {
            found.push(node);
            continue;
        }
        stack.extend(dom.children_of(node).into_iter().rev());
    }
    found
}

/// Text of `node` with a line break around every block-level element.
fn message_text<D: DomView + ?Sized>(dom: &D, node: NodeId) -> String {
    let mut text = String::new();
    collect_text(dom, node, &mut text);
    text
}

fn collect_text<D: DomView + ?Sized>(dom: &D, node: NodeId, out: &mut String) {
    let Some(tag) = dom.tag_of(node) else {
        out.push_str(&dom.text_of(node));
        return;
    };
    let block = BLOCK_TAGS.contains(&tag);
    if block {
        out.push('\n');
    }
    for child in dom.children_of(node) {
        collect_text(dom, child, out);
    }
    if block {
        out.push('\n');
    }
}

fn looks_like_message<D: DomView + ?Sized>(dom: &D, node: NodeId) -> bool {
    if dom
        .tag_of(node)
        .is_some_and(|tag| MESSAGE_TAGS.contains(&tag))
    {
        return true;
    }
    if dom
        .attribute_of(node, "role")
        .is_some_and(|role| MESSAGE_ROLES.contains(&role.to_ascii_lowercase().as_str()))
    {
        return true;
    }
    attributes_mention(dom, node, &MESSAGE_MARKERS)
}

fn looks_like_thread<D: DomView + ?Sized>(dom: &D, node: NodeId) -> bool {
    if dom
        .attribute_of(node, "role")
        .is_some_and(|role| THREAD_ROLES.contains(&role.to_ascii_lowercase().as_str()))
    {
        return true;
    }
    attributes_mention(dom, node, &THREAD_MARKERS)
}

fn attributes_mention<D: DomView + ?Sized>(dom: &D, node: NodeId, markers: &[&str]) -> bool {
    dom.attributes_of(node).into_iter().any(|(name, value)| {
        let name = name.to_ascii_lowercase();
        let value = value.to_ascii_lowercase();
        markers
            .iter()
            .any(|marker| name.contains(marker) || value.contains(marker))
    })
}

/// Children sharing the dominant `tag.class` signature, when it repeats enough.
fn homogeneous_children<D: DomView + ?Sized>(dom: &D, container: NodeId) -> Vec<NodeId> {
    let children: Vec<NodeId> = dom
        .children_of(container)
        .into_iter()
        .filter(|c| dom.is_element(*c))
        .collect();
    if children.len() < MIN_HOMOGENEOUS {
        return Vec::new();
    }

    let signatures: Vec<String> = children.iter().map(|c| signature(dom, *c)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sig in &signatures {
        *counts.entry(sig.as_str()).or_default() += 1;
    }
    let Some((dominant, count)) = signatures
        .iter()
        .map(|sig| (sig.as_str(), counts[sig.as_str()]))
        .max_by_key(|(_, count)| *count)
    else {
        return Vec::new();
    };
    if count < MIN_HOMOGENEOUS {
        return Vec::new();
    }

    children
        .into_iter()
        .zip(signatures.iter())
        .filter(|(_, sig)| sig.as_str() == dominant)
        .map(|(child, _)| child)
        .collect()
}

fn signature<D: DomView + ?Sized>(dom: &D, node: NodeId) -> String {
    let tag = dom.tag_of(node).unwrap_or_default();
    let class = dom
        .attribute_of(node, "class")
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join("."))
        .unwrap_or_default();
    format!("{tag}.{class}")
}
