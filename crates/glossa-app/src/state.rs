use std::sync::Arc;

use glossa_config::Config;
use glossa_core::Aggregator;
use tokio::sync::RwLock;

pub struct AppState {
    pub config: RwLock<Config>,
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(config: Config, aggregator: Arc<Aggregator>) -> Self {
        Self {
            config: RwLock::new(config),
            aggregator,
        }
    }
}
