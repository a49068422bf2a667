//! Message shapes shared by the page, the background caller and the relay.

use serde::{Deserialize, Serialize};

use crate::RelayReply;

/// One-shot messages exchanged between the page script and the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PageMessage {
    #[serde(rename = "enhanceText")]
    EnhanceText {
        #[serde(
            rename = "selectedText",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        selected_text: Option<String>,
    },
    #[serde(rename = "updateStatus")]
    UpdateStatus { status: String },
    #[serde(rename = "callGeminiAPI")]
    CallRelay {
        #[serde(rename = "textToEnhance")]
        text_to_enhance: String,
        #[serde(
            rename = "threadContext",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        thread_context: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
}

/// Background reply to [`PageMessage::CallRelay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackgroundReply {
    pub fn ok(enhanced_text: impl Into<String>) -> Self {
        Self {
            success: true,
            enhanced_text: Some(enhanced_text.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            enhanced_text: None,
            error: Some(error.into()),
        }
    }

    /// An absent reply means nobody was listening on the other end.
    pub fn into_relay_reply(reply: Option<Self>) -> RelayReply {
        match reply {
            None => RelayReply::NoResponder,
            Some(Self {
                success: true,
                enhanced_text: Some(text),
                ..
            }) => RelayReply::Success(text),
            Some(Self { error, .. }) => {
                RelayReply::Failure(error.unwrap_or_else(|| "Unknown error".to_string()))
            }
        }
    }
}

/// `POST /` body accepted by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequestBody {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// `200` body returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySuccessBody {
    pub success: bool,
    pub enhanced_text: String,
}

/// Non-`200` body returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
}

/// The only outcome shape a relay caller ever observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Success {
        enhanced_text: String,
    },
    Failure {
        error_message: String,
        http_status_hint: Option<u16>,
    },
}

impl RelayOutcome {
    pub fn http_status_hint(&self) -> Option<u16> {
        match self {
            RelayOutcome::Success { .. } => None,
            RelayOutcome::Failure {
                http_status_hint, ..
            } => *http_status_hint,
        }
    }
}

/// The page only sees the message; the status hint stays on the background side.
impl From<RelayOutcome> for BackgroundReply {
    fn from(outcome: RelayOutcome) -> Self {
        match outcome {
            RelayOutcome::Success { enhanced_text } => BackgroundReply::ok(enhanced_text),
            RelayOutcome::Failure { error_message, .. } => BackgroundReply::err(error_message),
        }
    }
}
