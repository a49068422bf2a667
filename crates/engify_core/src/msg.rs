use crate::{PageMessage, ReplaceOutcome, RequestId, SelectionDescriptor};

/// What the background relay caller answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayReply {
    Success(String),
    Failure(String),
    /// Nobody answered the message: the extension was reloaded under a stale page.
    NoResponder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Script attached to the page.
    Attached,
    /// Page navigated away or the script is being torn down.
    Detached,
    /// Debounced selection evaluation finished.
    SelectionChanged(Option<SelectionDescriptor>),
    /// User pressed the affordance.
    AffordanceActivated,
    /// External "enhance current selection" command (shortcut, context menu).
    EnhanceRequested { selected_text: Option<String> },
    ContextReady {
        request_id: RequestId,
        context: Option<String>,
    },
    RelayReplied {
        request_id: RequestId,
        reply: RelayReply,
    },
    /// Intermediate status from the relay caller, e.g. a retry notice.
    StatusUpdated(String),
    ReplaceFinished {
        request_id: RequestId,
        outcome: ReplaceOutcome,
    },
    HideTimerElapsed { generation: u64 },
    /// Pointer pressed somewhere other than the affordance.
    PointerDownOutside,
    VisibilityChanged { hidden: bool },
    /// Target of an incoming `PageMessage::CallRelay`. The page only issues
    /// relay calls as effects, so one arriving here changes nothing.
    NoOp,
}

impl From<PageMessage> for Msg {
    fn from(message: PageMessage) -> Self {
        match message {
            PageMessage::EnhanceText { selected_text } => Msg::EnhanceRequested { selected_text },
            PageMessage::UpdateStatus { status } => Msg::StatusUpdated(status),
            PageMessage::CallRelay { .. } => Msg::NoOp,
        }
    }
}
