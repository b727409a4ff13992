use std::env;

use serde::{Deserialize, Serialize};

use self::batch::BatchConfig;
use self::provider::ProviderConfig;

pub mod batch;
pub mod provider;

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub batch: BatchConfig,
}

impl Config {
    pub fn new() -> Self {
        let mut provider = ProviderConfig::default();

        if let Ok(key) = env::var("TRANSLATE_API_KEY") {
            provider.api_key = key;
        }
        if let Ok(url) = env::var("TRANSLATE_API_URL") {
            provider.api_url = url;
        }

        let mut batch = BatchConfig::default();

        batch.max_chars = env::var("BATCH_MAX_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(batch.max_chars);

        batch.max_texts = env::var("BATCH_MAX_TEXTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(batch.max_texts);

        batch.flush_interval_ms = env::var("BATCH_FLUSH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(batch.flush_interval_ms);

        batch.request_timeout_ms = env::var("BATCH_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(batch.request_timeout_ms);

        Config { provider, batch }
    }
}
