use buybye_core::{Config, Engine, PassthroughTable};
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub routes: Arc<PassthroughTable>,
}

impl AppState {
    pub fn new(engine: Engine, routes: PassthroughTable) -> Self {
        Self {
            engine: Arc::new(engine),
            routes: Arc::new(routes),
        }
    }

    /// The application concepts and rules, with the built-in route lists
    /// extended by `config.passthrough`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let engine = buybye_concepts::engine(config.engine.clone())?;
        let routes = buybye_concepts::default_passthrough(&config.server.base_url)
            .with_config(&config.passthrough);
        Ok(Self::new(engine, routes))
    }
}
