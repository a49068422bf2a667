use crate::dom::{NodeId, TextRange};

/// Where the captured text lives and how to find it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionKind {
    /// Character offsets into an `input`/`textarea` value; `start < end`.
    PlainField { start: usize, end: usize },
    /// A range inside an editable region.
    RichRegion { range: TextRange },
}

/// Anchor used to place the affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionRef {
    Element(NodeId),
    Range(TextRange),
}

/// Captured record of a user selection, sufficient to replace it later.
///
/// `element` is a plain handle: the node may be detached from the document at
/// any time, and the descriptor never keeps it alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionDescriptor {
    text: String,
    element: NodeId,
    kind: SelectionKind,
}

impl SelectionDescriptor {
    /// Returns `None` unless `start < end` and `text` is non-blank.
    pub fn plain_field(
        text: impl Into<String>,
        element: NodeId,
        start: usize,
        end: usize,
    ) -> Option<Self> {
        let text = text.into();
        if start >= end || text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text,
            element,
            kind: SelectionKind::PlainField { start, end },
        })
    }

    /// Returns `None` for a collapsed range or blank text.
    pub fn rich_region(text: impl Into<String>, element: NodeId, range: TextRange) -> Option<Self> {
        let text = text.into();
        if range.is_collapsed() || text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text,
            element,
            kind: SelectionKind::RichRegion { range },
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn kind(&self) -> &SelectionKind {
        &self.kind
    }

    pub fn position_ref(&self) -> PositionRef {
        match &self.kind {
            SelectionKind::PlainField { .. } => PositionRef::Element(self.element),
            SelectionKind::RichRegion { range } => PositionRef::Range(*range),
        }
    }
}
