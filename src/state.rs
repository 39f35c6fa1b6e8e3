use crate::config::ServerConfig;
use crate::services::classifier::pipeline::ServingContext;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    /// `None` when the model failed to load at startup.
    pub context: Option<Arc<ServingContext>>,
    /// Why the model is missing, reported on status routes.
    pub load_error: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, context: ServingContext) -> Self {
        Self {
            config,
            context: Some(Arc::new(context)),
            load_error: None,
            started_at: Instant::now(),
        }
    }

    /// Degraded state: the server answers health checks but cannot classify.
    pub fn without_model(config: ServerConfig, load_error: String) -> Self {
        Self {
            config,
            context: None,
            load_error: Some(load_error),
            started_at: Instant::now(),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.context.is_some()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
