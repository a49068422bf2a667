use engify_logging::{engify_debug, engify_info, engify_warn};

use crate::state::{MSG_CONFLICT, MSG_FAILED, MSG_NO_CONTEXT, MSG_RELOAD_REQUIRED};
use crate::{
    resolve_command, AppState, Effect, Msg, Phase, RelayCall, RelayReply, ReplaceOutcome, RequestId,
    SelectionDescriptor,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Attached => {
            if state.listeners_attached() {
                Vec::new()
            } else {
                state.set_listeners_attached(true);
                vec![Effect::AttachSelectionListeners]
            }
        }
        Msg::Detached => {
            let was_attached = state.listeners_attached();
            state.reset();
            if was_attached {
                vec![Effect::DetachSelectionListeners]
            } else {
                Vec::new()
            }
        }
        Msg::SelectionChanged(descriptor) => {
            on_selection_changed(&mut state, descriptor);
            Vec::new()
        }
        Msg::AffordanceActivated => begin_enhancement(&mut state),
        Msg::EnhanceRequested { selected_text } => {
            if let (Some(supplied), Some(current)) = (selected_text.as_deref(), state.descriptor())
            {
                if supplied.trim() != current.text().trim() {
                    engify_debug!(
                        "Supplied selection ({} chars) differs from tracked selection; using tracked",
                        supplied.chars().count()
                    );
                }
            }
            begin_enhancement(&mut state)
        }
        Msg::ContextReady {
            request_id,
            context,
        } => {
            if state.phase() != Phase::Busy || !state.in_flight_matches(request_id) {
                return (state, Vec::new());
            }
            match context {
                Some(context) => state
                    .in_flight()
                    .map(|flight| {
                        Effect::CallRelay(RelayCall {
                            request_id,
                            text: flight.text.clone(),
                            context: Some(context),
                            mode: flight.command.mode,
                        })
                    })
                    .into_iter()
                    .collect(),
                None => {
                    engify_info!("Request {} failed: no context found", request_id);
                    fail(&mut state, MSG_NO_CONTEXT)
                }
            }
        }
        Msg::RelayReplied { request_id, reply } => {
            if state.phase() != Phase::Busy || !state.in_flight_matches(request_id) {
                engify_debug!("Ignoring stale relay reply for request {}", request_id);
                return (state, Vec::new());
            }
            match reply {
                RelayReply::Success(text) => apply_success(&mut state, request_id, text),
                RelayReply::Failure(error) => {
                    engify_warn!("Relay error for request {}: {}", request_id, error);
                    fail(&mut state, MSG_FAILED)
                }
                RelayReply::NoResponder => {
                    engify_warn!("Extension context is stale; page reload required");
                    fail(&mut state, MSG_RELOAD_REQUIRED)
                }
            }
        }
        Msg::StatusUpdated(status) => {
            if state.phase() == Phase::Busy {
                state.show_affordance(&status, true, None);
            }
            Vec::new()
        }
        Msg::ReplaceFinished {
            request_id,
            outcome,
        } => {
            if state.phase() != Phase::Applying || !state.in_flight_matches(request_id) {
                return (state, Vec::new());
            }
            state.finish_request();
            match outcome {
                ReplaceOutcome::Replaced | ReplaceOutcome::Detached => {
                    state.set_phase(Phase::Idle);
                    Vec::new()
                }
                ReplaceOutcome::Conflict => fail(&mut state, MSG_CONFLICT),
            }
        }
        Msg::HideTimerElapsed { generation } => {
            if state.phase() == Phase::Failed && generation == state.hide_generation() {
                state.hide_affordance();
                state.set_phase(Phase::Idle);
            }
            Vec::new()
        }
        Msg::PointerDownOutside => {
            if !state.phase().is_in_flight() {
                state.hide_affordance();
                if state.phase() == Phase::Failed {
                    state.bump_hide_generation();
                    state.set_phase(Phase::Idle);
                }
            }
            Vec::new()
        }
        Msg::VisibilityChanged { hidden } => {
            if hidden && state.listeners_attached() {
                state.set_listeners_attached(false);
                vec![Effect::DetachSelectionListeners]
            } else if !hidden && !state.listeners_attached() {
                state.set_listeners_attached(true);
                vec![Effect::AttachSelectionListeners]
            } else {
                Vec::new()
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn on_selection_changed(state: &mut AppState, descriptor: Option<SelectionDescriptor>) {
    // The in-flight request keeps its own descriptor; only remember the new one.
    if state.phase().is_in_flight() {
        state.set_descriptor(descriptor);
        return;
    }
    if state.phase() == Phase::Failed {
        state.bump_hide_generation();
        state.set_phase(Phase::Idle);
    }
    match &descriptor {
        Some(current) => {
            let command = resolve_command(current.text());
            state.show_affordance(command.idle_label, false, Some(current.position_ref()));
        }
        None => state.hide_affordance(),
    }
    state.set_descriptor(descriptor);
}

fn begin_enhancement(state: &mut AppState) -> Vec<Effect> {
    if state.phase().is_in_flight() {
        engify_debug!("Enhancement already in progress; ignoring trigger");
        return Vec::new();
    }
    let Some(descriptor) = state.descriptor().cloned() else {
        engify_debug!("No valid selection; ignoring trigger");
        return Vec::new();
    };

    let command = resolve_command(descriptor.text());
    let text = command.payload(descriptor.text()).to_string();
    let element = descriptor.element();
    let anchor = descriptor.position_ref();

    state.set_phase(Phase::Busy);
    state.bump_hide_generation();
    state.show_affordance(command.busy_label, true, Some(anchor));
    let request_id = state.begin_request(descriptor, command, text.clone());
    engify_info!(
        "Request {} started: mode={} text_len={}",
        request_id,
        command.mode,
        text.chars().count()
    );

    if command.requires_context {
        vec![Effect::ExtractContext {
            request_id,
            element,
        }]
    } else {
        vec![Effect::CallRelay(RelayCall {
            request_id,
            text,
            context: None,
            mode: command.mode,
        })]
    }
}

fn apply_success(state: &mut AppState, request_id: RequestId, text: String) -> Vec<Effect> {
    let Some(descriptor) = state.in_flight().map(|flight| flight.descriptor.clone()) else {
        return Vec::new();
    };
    state.take_descriptor_if(&descriptor);
    state.set_phase(Phase::Applying);
    state.hide_affordance();
    vec![Effect::ReplaceSelection {
        request_id,
        descriptor,
        text,
    }]
}

fn fail(state: &mut AppState, message: &str) -> Vec<Effect> {
    state.finish_request();
    state.set_phase(Phase::Failed);
    state.show_affordance(message, false, None);
    let generation = state.bump_hide_generation();
    vec![Effect::ScheduleHide {
        generation,
        after: state.settings().error_display,
    }]
}
