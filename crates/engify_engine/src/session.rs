use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use engify_core::dom::{DomView, SelectionSource};
use engify_core::{
    extract_context, place_affordance, replace_selection, update, AppState, BackgroundReply,
    ContextSettings, Document, Effect, Evaluation, InteractionTarget, Msg, OrchestratorSettings,
    Placement, PositionRef, RelayOutcome, SelectionListeners, SelectionTracker, TrackerSettings,
    Viewport,
};
use engify_logging::{engify_debug, engify_info, engify_warn};

use crate::engine::{background_reply, no_responder, relay_outcome};
use crate::{RelayEvent, RelayHandle};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub tracker: TrackerSettings,
    pub context: ContextSettings,
    pub orchestrator: OrchestratorSettings,
}

/// One page with the assistant attached: owns the document, the orchestrator
/// state and the background relay caller, and executes effects.
pub struct PageSession {
    document: Document,
    state: AppState,
    tracker: SelectionTracker,
    listeners: SelectionListeners,
    context: ContextSettings,
    relay: RelayHandle,
    hide_timers: Vec<(Instant, u64)>,
    viewport: Viewport,
}

impl PageSession {
    pub fn new(document: Document, relay: RelayHandle) -> Self {
        Self::with_settings(document, relay, SessionSettings::default())
    }

    pub fn with_settings(document: Document, relay: RelayHandle, settings: SessionSettings) -> Self {
        let mut session = Self {
            document,
            state: AppState::with_settings(settings.orchestrator),
            tracker: SelectionTracker::new(settings.tracker),
            listeners: SelectionListeners::default(),
            context: settings.context,
            relay,
            hide_timers: Vec::new(),
            viewport: Viewport::default(),
        };
        session.dispatch(Instant::now(), Msg::Attached);
        session
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Pointer-up or key-up on the page or on the affordance.
    pub fn interaction(&mut self, now: Instant, target: InteractionTarget) {
        if self.listeners.is_attached() {
            self.tracker.on_interaction(now, target);
        }
    }

    /// Pointer pressed on the affordance.
    pub fn activate(&mut self, now: Instant) {
        self.dispatch(now, Msg::AffordanceActivated);
    }

    pub fn pointer_down_outside(&mut self, now: Instant) {
        self.dispatch(now, Msg::PointerDownOutside);
    }

    /// Page is going away: drop the selection and unsubscribe.
    pub fn detach(&mut self, now: Instant) {
        self.dispatch(now, Msg::Detached);
    }

    pub fn set_hidden(&mut self, now: Instant, hidden: bool) {
        self.dispatch(now, Msg::VisibilityChanged { hidden });
    }

    /// Fires due timers and drains relay events.
    pub fn tick(&mut self, now: Instant) {
        if let Some(evaluation) = self.tracker.poll(now, &self.document) {
            if let Evaluation::Captured(descriptor) = &evaluation {
                engify_debug!(
                    "Selection captured: {} chars in element {}",
                    descriptor.text().chars().count(),
                    descriptor.element()
                );
            }
            self.dispatch(now, Msg::SelectionChanged(evaluation.into_descriptor()));
        }

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.hide_timers)
            .into_iter()
            .partition(|(deadline, _)| *deadline <= now);
        self.hide_timers = pending;
        for (_, generation) in due {
            self.dispatch(now, Msg::HideTimerElapsed { generation });
        }

        while let Some(event) = self.relay.try_recv() {
            let msg = match event {
                RelayEvent::Status { status, .. } => Msg::StatusUpdated(status),
                RelayEvent::Completed { request_id, result } => {
                    let outcome = relay_outcome(result);
                    let status = outcome.as_ref().and_then(RelayOutcome::http_status_hint);
                    if let Some(status) = status {
                        engify_warn!("Request {} ended with relay status {}", request_id, status);
                    }
                    Msg::RelayReplied {
                        request_id,
                        reply: BackgroundReply::into_relay_reply(
                            outcome.map(BackgroundReply::from),
                        ),
                    }
                }
            };
            self.dispatch(now, msg);
        }
    }

    /// Earliest pending debounce or hide deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.hide_timers
            .iter()
            .map(|(deadline, _)| *deadline)
            .chain(self.tracker.deadline())
            .min()
    }

    /// Ticks until no request is in flight, or `timeout` passes.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        let give_up = Instant::now() + timeout;
        loop {
            self.tick(Instant::now());
            if !self.state.phase().is_in_flight() {
                return true;
            }
            if Instant::now() >= give_up {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Where the affordance goes for its current anchor, in page coordinates.
    pub fn affordance_placement(&self, height: f64) -> Option<Placement> {
        let view = self.state.view();
        if !view.affordance.visible {
            return None;
        }
        let anchor = match view.affordance.anchor? {
            PositionRef::Element(node) => self.document.bounding_box_of(node)?,
            PositionRef::Range(range) => self.document.range_bounding_box(&range)?,
        };
        Some(place_affordance(anchor, height, self.viewport))
    }

    pub fn dispatch(&mut self, now: Instant, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                if let Some(follow_up) = self.run_effect(now, effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn run_effect(&mut self, now: Instant, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::ExtractContext {
                request_id,
                element,
            } => {
                let context = extract_context(&self.document, element, &self.context);
                engify_debug!(
                    "Context for request {}: {:?} chars",
                    request_id,
                    context.as_ref().map(|text| text.chars().count())
                );
                Some(Msg::ContextReady {
                    request_id,
                    context,
                })
            }
            Effect::CallRelay(call) => {
                let request_id = call.request_id;
                if self.relay.enqueue(call) {
                    None
                } else {
                    Some(Msg::RelayReplied {
                        request_id,
                        reply: BackgroundReply::into_relay_reply(background_reply(Err(
                            no_responder(),
                        ))),
                    })
                }
            }
            Effect::ReplaceSelection {
                request_id,
                descriptor,
                text,
            } => {
                let outcome = replace_selection(&mut self.document, &descriptor, &text);
                engify_info!("Request {} replace outcome: {:?}", request_id, outcome);
                Some(Msg::ReplaceFinished {
                    request_id,
                    outcome,
                })
            }
            Effect::ScheduleHide { generation, after } => {
                self.hide_timers.push((now + after, generation));
                None
            }
            Effect::AttachSelectionListeners => {
                self.listeners.attach(&mut self.document);
                None
            }
            Effect::DetachSelectionListeners => {
                self.listeners.detach(&mut self.document);
                self.tracker.cancel();
                None
            }
        }
    }
}
