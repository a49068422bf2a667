//! Selection capture, debounce, listener subscription and replacement.

use std::time::{Duration, Instant};

use engify_logging::{engify_debug, engify_warn};

use crate::descriptor::{SelectionDescriptor, SelectionKind};
use crate::dom::{
    char_slice, DomEventKind, DomMut, DomView, EventSource, FieldState, InteractionKind, NodeId,
    SelectionSource, SubscriptionId, TextRange,
};

pub const SELECTION_CHECK_DELAY: Duration = Duration::from_millis(50);
pub const EXCLUDED_INPUT_TYPES: [&str; 3] = ["email", "password", "number"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub debounce: Duration,
    pub excluded_input_types: Vec<String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            debounce: SELECTION_CHECK_DELAY,
            excluded_input_types: EXCLUDED_INPUT_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Result of one debounced evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Captured(SelectionDescriptor),
    Cleared,
}

impl Evaluation {
    pub fn into_descriptor(self) -> Option<SelectionDescriptor> {
        match self {
            Evaluation::Captured(descriptor) => Some(descriptor),
            Evaluation::Cleared => None,
        }
    }
}

/// Outcome of putting replacement text back into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    /// The owning element left the document; nothing was changed.
    Detached,
    /// The live content no longer matches what was captured; nothing was changed.
    Conflict,
}

/// Where a pointer-up or key-up landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionTarget {
    Page,
    /// On the affordance itself; pressing it must not re-evaluate the selection.
    Affordance,
}

/// Coalesces interaction events and evaluates the selection once they settle.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    settings: TrackerSettings,
    pending: Option<Instant>,
}

impl SelectionTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            pending: None,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Restarts the debounce window unless the event hit the affordance.
    pub fn on_interaction(&mut self, now: Instant, target: InteractionTarget) {
        if target == InteractionTarget::Affordance {
            return;
        }
        self.pending = Some(now + self.settings.debounce);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Evaluates the selection if the debounce window has elapsed.
    pub fn poll<D>(&mut self, now: Instant, dom: &D) -> Option<Evaluation>
    where
        D: SelectionSource + ?Sized,
    {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                Some(match capture_selection(dom, &self.settings) {
                    Some(descriptor) => Evaluation::Captured(descriptor),
                    None => Evaluation::Cleared,
                })
            }
            _ => None,
        }
    }
}

/// Determines the current selection, if it is one we can later replace.
pub fn capture_selection<D>(dom: &D, settings: &TrackerSettings) -> Option<SelectionDescriptor>
where
    D: SelectionSource + ?Sized,
{
    if let Some(active) = dom.active_element() {
        if is_plain_field(dom, active) {
            if let Some(field) = dom.field_of(active) {
                return capture_plain_field(dom, active, field, settings);
            }
        }
    }

    let range = dom.selection()?;
    if range.is_collapsed() {
        return None;
    }
    let text = dom.range_text(&range)?;
    if text.trim().is_empty() {
        return None;
    }

    let mut container = dom.common_ancestor(&range)?;
    if !dom.is_element(container) {
        container = dom.parent_of(container)?;
    }
    let editable = find_editable_ancestor(dom, container)?;
    SelectionDescriptor::rich_region(text, editable, range)
}

fn is_plain_field<D: DomView + ?Sized>(dom: &D, node: NodeId) -> bool {
    matches!(dom.tag_of(node), Some("input") | Some("textarea"))
}

fn capture_plain_field<D>(
    dom: &D,
    element: NodeId,
    field: &FieldState,
    settings: &TrackerSettings,
) -> Option<SelectionDescriptor>
where
    D: SelectionSource + ?Sized,
{
    if dom.tag_of(element) == Some("input") {
        let input_type = field.input_type.as_deref().unwrap_or("text");
        if settings
            .excluded_input_types
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(input_type))
        {
            engify_debug!("Ignoring selection in excluded input type {}", input_type);
            return None;
        }
    }
    if field.selection_start == field.selection_end {
        return None;
    }
    let text = field.selected_text()?;
    SelectionDescriptor::plain_field(text, element, field.selection_start, field.selection_end)
}

fn find_editable_ancestor<D: DomView + ?Sized>(dom: &D, from: NodeId) -> Option<NodeId> {
    let mut current = Some(from);
    while let Some(node) = current {
        if dom.is_element(node) && dom.is_editable(node) {
            return Some(node);
        }
        current = dom.parent_of(node);
    }
    None
}

/// Puts `new_text` where `descriptor` was captured.
///
/// The captured text must still be present at the recorded position; a
/// mismatch leaves the page untouched and reports `Conflict`.
pub fn replace_selection<D>(
    dom: &mut D,
    descriptor: &SelectionDescriptor,
    new_text: &str,
) -> ReplaceOutcome
where
    D: DomMut + ?Sized,
{
    let element = descriptor.element();
    if !dom.is_attached(element) {
        engify_debug!("Selection owner {} detached before replace", element);
        return ReplaceOutcome::Detached;
    }
    dom.focus(element);

    match descriptor.kind() {
        SelectionKind::PlainField { start, end } => {
            replace_in_field(dom, element, descriptor.text(), *start, *end, new_text)
        }
        SelectionKind::RichRegion { range } => {
            replace_in_region(dom, element, descriptor.text(), range, new_text)
        }
    }
}

fn replace_in_field<D>(
    dom: &mut D,
    element: NodeId,
    captured: &str,
    start: usize,
    end: usize,
    new_text: &str,
) -> ReplaceOutcome
where
    D: DomMut + ?Sized,
{
    let live = dom
        .field_of(element)
        .and_then(|field| char_slice(&field.value, start, end))
        .map(str::to_string);
    if live.as_deref() != Some(captured) {
        engify_warn!(
            "Field {} changed since capture (offsets {}..{}); skipping replace",
            element,
            start,
            end
        );
        return ReplaceOutcome::Conflict;
    }

    dom.set_field_selection(element, start, end);
    if !dom.splice_field_value(element, start, end, new_text) {
        return ReplaceOutcome::Conflict;
    }
    dom.dispatch(element, DomEventKind::Input);
    dom.dispatch(element, DomEventKind::Change);
    ReplaceOutcome::Replaced
}

fn replace_in_region<D>(
    dom: &mut D,
    element: NodeId,
    captured: &str,
    range: &TextRange,
    new_text: &str,
) -> ReplaceOutcome
where
    D: DomMut + ?Sized,
{
    if dom.range_text(range).as_deref() != Some(captured) {
        engify_warn!("Region {} changed since capture; skipping replace", element);
        return ReplaceOutcome::Conflict;
    }

    dom.set_selection(Some(*range));
    let Some(start) = dom.delete_range_contents(range) else {
        return ReplaceOutcome::Conflict;
    };
    let Some(inserted) = dom.insert_text_at(start, new_text) else {
        return ReplaceOutcome::Conflict;
    };
    let after = dom.boundary_after(inserted);
    dom.set_selection(after.map(TextRange::collapsed));
    dom.dispatch(element, DomEventKind::Input);
    ReplaceOutcome::Replaced
}

/// The pointer-up/key-up subscription, held as an explicit handle.
#[derive(Debug, Clone, Default)]
pub struct SelectionListeners {
    active: Option<SubscriptionId>,
}

impl SelectionListeners {
    pub const KINDS: [InteractionKind; 2] = [InteractionKind::PointerUp, InteractionKind::KeyUp];

    pub fn attach<S: EventSource + ?Sized>(&mut self, source: &mut S) {
        if self.active.is_none() {
            self.active = Some(source.subscribe(&Self::KINDS));
        }
    }

    pub fn detach<S: EventSource + ?Sized>(&mut self, source: &mut S) {
        if let Some(id) = self.active.take() {
            source.unsubscribe(id);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.active.is_some()
    }
}
