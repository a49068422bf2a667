use std::time::Duration;

use crate::{Mode, NodeId, RequestId, SelectionDescriptor};

/// Work the host performs on behalf of [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the context extractor for `element` and reply with `Msg::ContextReady`.
    ExtractContext { request_id: RequestId, element: NodeId },
    /// Send the request to the background relay caller.
    CallRelay(RelayCall),
    /// Apply the replacement and reply with `Msg::ReplaceFinished`.
    ReplaceSelection {
        request_id: RequestId,
        descriptor: SelectionDescriptor,
        text: String,
    },
    /// Reply with `Msg::HideTimerElapsed { generation }` after `after`.
    ScheduleHide { generation: u64, after: Duration },
    AttachSelectionListeners,
    DetachSelectionListeners,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCall {
    pub request_id: RequestId,
    pub text: String,
    pub context: Option<String>,
    pub mode: Mode,
}
