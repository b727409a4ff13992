use std::sync::Arc;

use clap::Parser;
use glossa_config::Config;
use glossa_core::Aggregator;
use glossa_provider_google::GoogleTranslator;
use glossa_translator::Translator;
use tokio::signal;

pub mod controller;
pub mod events;
pub mod io;
pub mod state;


use self::controller::AppController;
use self::state::AppState;

#[derive(Parser)]
#[command(name = "glossa", about = "Batching client for a remote translation service")]
struct Args {
    /// Source language (ISO 639-1)
    #[arg(long)]
    source: Option<String>,

    /// Target language (ISO 639-1)
    #[arg(long)]
    target: Option<String>,

    /// Texts to translate; reads stdin lines when omitted
    texts: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::new();
    if let Some(source) = args.source {
        config.provider.source_lang = source;
    }
    if let Some(target) = args.target {
        config.provider.target_lang = target;
    }
    validate(&config)?;

    let backend = Arc::new(GoogleTranslator::new(
        config.provider.api_key.clone(),
        config.provider.api_url.clone(),
    ));
    tracing::info!("backend: {}", backend.metadata().name);

    let aggregator = Arc::new(Aggregator::new(
        backend,
        config.batch.clone(),
        config.provider.source_lang.clone(),
        config.provider.target_lang.clone(),
    ));

    if !args.texts.is_empty() {
        return translate_args(&aggregator, args.texts).await;
    }

    let state = Arc::new(AppState::new(config, aggregator.clone()));
    let controller = AppController::new(state);
    let mut tasks = controller.spawn_tasks();

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
        result = tasks.join_next() => {
            match result {
                Some(Ok(Ok(()))) => tracing::info!("input closed, shutting down"),
                Some(Ok(Err(e))) => tracing::error!("task exited: {e}"),
                Some(Err(e)) => tracing::error!("task panicked: {e}"),
                None => {}
            }
        }
    }

    controller.shutdown();
    aggregator.shutdown();

    Ok(())
}

/// Submit every argument up front so they share batches, then print the
/// results in argument order.
async fn translate_args(aggregator: &Aggregator, texts: Vec<String>) -> anyhow::Result<()> {
    let pending: Vec<_> = texts.into_iter().map(|t| aggregator.submit(t)).collect();

    for p in pending {
        println!("{}", p.wait().await?);
    }

    Ok(())
}

fn validate(config: &Config) -> anyhow::Result<()> {
    if config.provider.api_key.is_empty() {
        anyhow::bail!("TRANSLATE_API_KEY is not set");
    }
    if config.provider.source_lang.trim().is_empty() || config.provider.target_lang.trim().is_empty()
    {
        anyhow::bail!("source and target languages must not be blank");
    }
    Ok(())
}
