//! Command-line page host for the Engify assistant.
mod enhance;

pub use enhance::{enhance_page, EnhanceOptions, EnhanceOutcome};
