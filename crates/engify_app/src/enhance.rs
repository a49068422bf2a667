use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use engify_core::dom::SelectionSource;
use engify_core::{Document, InteractionTarget, Phase};
use engify_engine::{
    load_document, select_text, PageSession, RelayClient, RelayHandle, RelaySettings,
    SettingsStore,
};
use engify_logging::{engify_info, engify_warn};

/// One enhancement run against a page on disk.
#[derive(Debug, Clone)]
pub struct EnhanceOptions {
    pub page: PathBuf,
    /// Text to select inside an editable region of the page.
    pub selection: String,
    pub relay: RelaySettings,
    pub settings_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhanceOutcome {
    /// The selection was replaced; carries the edited field value or page text.
    Replaced(String),
    /// The assistant showed this message instead of replacing anything.
    Failed(String),
}

pub fn enhance_page(options: &EnhanceOptions) -> Result<EnhanceOutcome> {
    let html = fs::read_to_string(&options.page)
        .with_context(|| format!("failed to read {}", options.page.display()))?;
    let mut document = load_document(&html);
    if !select_text(&mut document, &options.selection) {
        bail!(
            "{:?} was not found in an editable region of {}",
            options.selection,
            options.page.display()
        );
    }

    let client = RelayClient::new(options.relay.clone())
        .with_credentials(Arc::new(SettingsStore::new(&options.settings_dir)));
    let mut session = PageSession::new(document, RelayHandle::new(client));

    session.interaction(Instant::now(), InteractionTarget::Page);
    settle_selection(&mut session);
    if !session.state().view().has_selection {
        bail!("the selection was not accepted (excluded field or blank text)");
    }

    engify_info!("Activating assistant for {}", options.page.display());
    session.activate(Instant::now());
    if !session.wait_until_settled(options.timeout) {
        bail!("no reply from the relay within {:?}", options.timeout);
    }

    let view = session.state().view();
    if view.phase == Phase::Failed {
        engify_warn!("Enhancement failed: {}", view.affordance.label);
        return Ok(EnhanceOutcome::Failed(view.affordance.label));
    }
    Ok(EnhanceOutcome::Replaced(edited_text(session.document())))
}

/// Runs the debounce to completion so the tracker evaluates the selection.
fn settle_selection(session: &mut PageSession) {
    while let Some(deadline) = session.next_deadline() {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        session.tick(Instant::now());
        if session.state().view().has_selection {
            break;
        }
    }
}

fn edited_text(document: &Document) -> String {
    document
        .active_element()
        .and_then(|field| document.field_value(field))
        .map(str::to_string)
        .unwrap_or_else(|| document.body_text())
}
