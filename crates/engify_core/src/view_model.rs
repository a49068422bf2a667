use crate::{PositionRef, Rect};

pub const AFFORDANCE_MARGIN: f64 = 10.0;
pub const AFFORDANCE_GAP: f64 = 5.0;

/// What the affordance should currently look like.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AffordanceView {
    pub visible: bool,
    pub label: String,
    pub spinner: bool,
    pub anchor: Option<PositionRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub phase: crate::Phase,
    pub affordance: AffordanceView,
    pub has_selection: bool,
    pub listeners_attached: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub scroll_x: f64,
    pub scroll_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub top: f64,
    pub left: f64,
    pub above: bool,
}

/// Positions the affordance next to `anchor`, in page coordinates.
///
/// It sits above the anchor unless there is less than `height + AFFORDANCE_MARGIN`
/// of room above it, in which case it flips below.
pub fn place_affordance(anchor: Rect, height: f64, viewport: Viewport) -> Placement {
    let above = anchor.top >= height + AFFORDANCE_MARGIN;
    let top = if above {
        viewport.scroll_y + anchor.top - height - AFFORDANCE_GAP
    } else {
        viewport.scroll_y + anchor.bottom() + AFFORDANCE_GAP
    };
    Placement {
        top,
        left: viewport.scroll_x + anchor.left,
        above,
    }
}
