//! Engify engine: relay calls, settings persistence, page loading and effect execution.
mod engine;
mod html_dom;
mod relay_client;
mod session;
mod settings;
mod types;

pub use engine::{background_reply, relay_outcome, RelayHandle};
pub use html_dom::{element_by_id, load_document, select_text};
pub use relay_client::{
    CredentialSource, RelayClient, RelaySettings, RelayTransport, ReqwestTransport, StatusSink,
    UNEXPECTED_RESPONSE_FORMAT,
};
pub use session::{PageSession, SessionSettings};
pub use settings::{SettingsError, SettingsStore, UserSettings, SETTINGS_FILENAME};
pub use types::{CallError, FailureKind, RelayEvent};
