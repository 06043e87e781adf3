use crate::config::{ConfigError, ServerConfig};
use crate::gate::SorryPage;
use crate::proxy::build_client;
use std::sync::Arc;

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub http_client: reqwest::Client,
    /// Gate instance, kept here so /health can report its mode
    pub gate: SorryPage,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        let http_client = build_client(config.upstream_timeout)?;
        let gate = SorryPage::new(&config.sorrypage, config.name.as_str())?
            .with_client(http_client.clone());

        Ok(Self {
            config: Arc::new(config),
            http_client,
            gate,
        })
    }
}
