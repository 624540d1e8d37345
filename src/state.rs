use crate::{
    ai::{AiService, Classifier, Summarizer},
    config::Config,
    error::Result,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state handed to every command
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub summarizer: Arc<dyn Summarizer>,
    pub classifier: Arc<dyn Classifier>,
    /// Present when the collaborators come from the configured AI provider
    pub ai_service: Option<Arc<AiService>>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let ai_service = Arc::new(AiService::new(&config).await?);
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            summarizer: ai_service.clone(),
            classifier: ai_service.clone(),
            ai_service: Some(ai_service),
        })
    }

    /// State with explicit collaborators instead of the configured provider
    pub fn with_collaborators(
        config: Config,
        summarizer: Arc<dyn Summarizer>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            summarizer,
            classifier,
            ai_service: None,
        }
    }

    pub fn config_snapshot(&self) -> Config {
        self.config.read().clone()
    }
}

/// Identity of one watch session, attached to its logs
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(root: &Path) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            root: root.to_path_buf(),
            started_at: Utc::now(),
        }
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "watch_session",
            session_id = %self.session_id,
            root = %self.root.display()
        )
    }
}
