//! Engify core: selection tracking, context heuristics, command resolution and
//! the enhancement state machine. No IO lives here.
mod command;
mod context;
mod descriptor;
pub mod dom;
mod effect;
mod msg;
mod selection;
mod state;
mod update;
mod view_model;
mod wire;

pub use command::{resolve_command, Command, Mode, COMMANDS, DEFAULT_COMMAND};
pub use context::{extract_context, ContextSettings};
pub use descriptor::{PositionRef, SelectionDescriptor, SelectionKind};
pub use dom::{Boundary, Document, NodeId, Rect, TextRange};
pub use effect::{Effect, RelayCall};
pub use msg::{Msg, RelayReply};
pub use selection::{
    capture_selection, replace_selection, Evaluation, InteractionTarget, ReplaceOutcome,
    SelectionListeners, SelectionTracker, TrackerSettings, EXCLUDED_INPUT_TYPES,
    SELECTION_CHECK_DELAY,
};
pub use state::{
    AppState, OrchestratorSettings, Phase, RequestId, ERROR_DISPLAY_DURATION, MSG_CONFLICT,
    MSG_FAILED, MSG_NO_CONTEXT, MSG_RELOAD_REQUIRED,
};
pub use update::update;
pub use view_model::{
    place_affordance, AffordanceView, AppViewModel, Placement, Viewport, AFFORDANCE_GAP,
    AFFORDANCE_MARGIN,
};
pub use wire::{
    BackgroundReply, PageMessage, RelayErrorBody, RelayOutcome, RelayRequestBody,
    RelaySuccessBody,
};
