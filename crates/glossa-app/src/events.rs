use std::sync::Arc;

use kanal::AsyncReceiver;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Submit(String),
    SetSource(String),
    SetTarget(String),
}

/// Turn one input line into an event. `:source XX` and `:target XX`
/// switch the route; anything else is a translation request. Blank
/// lines produce nothing.
pub fn parse_line(line: &str) -> Option<AppEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(lang) = trimmed.strip_prefix(":source ") {
        return Some(AppEvent::SetSource(lang.trim().to_string()));
    }
    if let Some(lang) = trimmed.strip_prefix(":target ") {
        return Some(AppEvent::SetTarget(lang.trim().to_string()));
    }
    Some(AppEvent::Submit(trimmed.to_string()))
}

/// App's main loop
pub async fn event_loop(
    state: Arc<AppState>,
    event_rx: AsyncReceiver<AppEvent>,
) -> anyhow::Result<()> {
    loop {
        let event = event_rx.recv().await?;
        handle_event(&state, event).await;
    }
}

pub(crate) async fn handle_event(state: &Arc<AppState>, event: AppEvent) {
    match event {
        AppEvent::SetSource(lang) => {
            tracing::info!("source language set to {}", lang);
            state.config.write().await.provider.source_lang = lang.clone();
            state.aggregator.set_source(lang);
        }
        AppEvent::SetTarget(lang) => {
            tracing::info!("target language set to {}", lang);
            state.config.write().await.provider.target_lang = lang.clone();
            state.aggregator.set_target(lang);
        }
        AppEvent::Submit(text) => {
            tracing::debug!("submitting {} chars", text.len());
            let pending = state.aggregator.submit(text);
            tokio::spawn(async move {
                match pending.wait().await {
                    Ok(translation) => println!("{}", translation),
                    Err(e) => tracing::error!("translation failed: {}", e),
                }
            });
        }
    }
}
