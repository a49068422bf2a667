use std::time::Duration;

use crate::view_model::{AffordanceView, AppViewModel};
use crate::{Command, SelectionDescriptor};

pub type RequestId = u64;

pub const ERROR_DISPLAY_DURATION: Duration = Duration::from_millis(3000);

pub const MSG_FAILED: &str = "Failed. Try again.";
pub const MSG_NO_CONTEXT: &str = "No context found.";
pub const MSG_RELOAD_REQUIRED: &str = "Update required. Reload page.";
pub const MSG_CONFLICT: &str = "Text changed. Try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Busy,
    Applying,
    Failed,
}

impl Phase {
    /// Busy and Applying both hold the single in-flight slot.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Busy | Phase::Applying)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub error_display: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            error_display: ERROR_DISPLAY_DURATION,
        }
    }
}

/// The request currently owned by the orchestrator.
///
/// It keeps its own copy of the descriptor: a newer selection captured while
/// the request is in flight does not redirect the replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub(crate) request_id: RequestId,
    pub(crate) descriptor: SelectionDescriptor,
    pub(crate) command: &'static Command,
    pub(crate) text: String,
}

/// Orchestrator context: everything the page script used to keep in globals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    settings: OrchestratorSettings,
    phase: Phase,
    descriptor: Option<SelectionDescriptor>,
    in_flight: Option<InFlight>,
    last_request_id: RequestId,
    hide_generation: u64,
    affordance: AffordanceView,
    listeners_attached: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: OrchestratorSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            phase: self.phase,
            affordance: self.affordance.clone(),
            has_selection: self.descriptor.is_some(),
            listeners_attached: self.listeners_attached,
            dirty: self.dirty,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn descriptor(&self) -> Option<&SelectionDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Returns whether anything visible changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_descriptor(&mut self, descriptor: Option<SelectionDescriptor>) {
        self.descriptor = descriptor;
    }

    pub(crate) fn take_descriptor_if(&mut self, consumed: &SelectionDescriptor) {
        if self.descriptor.as_ref() == Some(consumed) {
            self.descriptor = None;
        }
    }

    pub(crate) fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub(crate) fn in_flight_matches(&self, request_id: RequestId) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|flight| flight.request_id == request_id)
    }

    pub(crate) fn begin_request(
        &mut self,
        descriptor: SelectionDescriptor,
        command: &'static Command,
        text: String,
    ) -> RequestId {
        self.last_request_id += 1;
        let request_id = self.last_request_id;
        self.in_flight = Some(InFlight {
            request_id,
            descriptor,
            command,
            text,
        });
        request_id
    }

    pub(crate) fn finish_request(&mut self) -> Option<InFlight> {
        self.in_flight.take()
    }

    pub(crate) fn hide_generation(&self) -> u64 {
        self.hide_generation
    }

    /// Invalidates any pending hide timer and returns the new generation.
    pub(crate) fn bump_hide_generation(&mut self) -> u64 {
        self.hide_generation += 1;
        self.hide_generation
    }

    pub(crate) fn show_affordance(
        &mut self,
        label: &str,
        spinner: bool,
        anchor: Option<crate::PositionRef>,
    ) {
        let next = AffordanceView {
            visible: true,
            label: label.to_string(),
            spinner,
            anchor: anchor.or_else(|| self.affordance.anchor.clone()),
        };
        if next != self.affordance {
            self.affordance = next;
            self.mark_dirty();
        }
    }

    pub(crate) fn hide_affordance(&mut self) {
        if self.affordance.visible || self.affordance.spinner {
            self.affordance.visible = false;
            self.affordance.spinner = false;
            self.mark_dirty();
        }
    }

    pub(crate) fn listeners_attached(&self) -> bool {
        self.listeners_attached
    }

    pub(crate) fn set_listeners_attached(&mut self, attached: bool) {
        if self.listeners_attached != attached {
            self.listeners_attached = attached;
            self.mark_dirty();
        }
    }

    /// Back to a freshly attached state, keeping settings.
    pub(crate) fn reset(&mut self) {
        let settings = self.settings.clone();
        let hide_generation = self.hide_generation + 1;
        *self = Self {
            settings,
            hide_generation,
            last_request_id: self.last_request_id,
            ..Self::default()
        };
        self.mark_dirty();
    }
}
