use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation requested from the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Enhance,
    Summarize,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Enhance, Mode::Summarize];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Enhance => "enhance",
            Mode::Summarize => "summarize",
        }
    }

    pub fn parse(raw: &str) -> Option<Mode> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Context-only modes work from the surrounding conversation, not the selected text.
    pub fn is_context_only(self) -> bool {
        matches!(self, Mode::Summarize)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub prefix_token: Option<&'static str>,
    pub mode: Mode,
    pub requires_context: bool,
    pub busy_label: &'static str,
    pub idle_label: &'static str,
}

impl Command {
    /// Text to send to the relay: the input with this command's prefix removed.
    pub fn payload<'a>(&self, input: &'a str) -> &'a str {
        match self.prefix_token {
            Some(prefix) => input.trim().strip_prefix(prefix).unwrap_or(input).trim(),
            None => input,
        }
    }
}

/// Explicit commands, scanned in order.
pub static COMMANDS: [Command; 1] = [Command {
    prefix_token: Some("/summarize"),
    mode: Mode::Summarize,
    requires_context: true,
    busy_label: "Summarizing",
    idle_label: "Summarize",
}];

pub static DEFAULT_COMMAND: Command = Command {
    prefix_token: None,
    mode: Mode::Enhance,
    requires_context: false,
    busy_label: "Fixing",
    idle_label: "Fix me!",
};

/// Picks the command for `input`; total and deterministic.
pub fn resolve_command(input: &str) -> &'static Command {
    let trimmed = input.trim();
    COMMANDS
        .iter()
        .find(|command| {
            command
                .prefix_token
                .is_some_and(|prefix| trimmed.starts_with(prefix))
        })
        .unwrap_or(&DEFAULT_COMMAND)
}
