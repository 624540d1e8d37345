use crate::ai::AiProvider;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub provider: String,
    pub ai_available: bool,
    pub ollama_host: Option<String>,
    pub model: Option<String>,
    pub last_error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Reports whether the configured collaborators are reachable
pub async fn health(state: &AppState) -> HealthStatus {
    let Some(service) = state.ai_service.as_ref() else {
        return HealthStatus {
            status: "ok".to_string(),
            provider: "custom".to_string(),
            ai_available: true,
            ollama_host: None,
            model: None,
            last_error: None,
            timestamp: Utc::now(),
        };
    };

    let status = service.get_status().await;
    let provider = match status.provider {
        AiProvider::Ollama => "ollama",
        AiProvider::Fallback => "fallback",
    };

    HealthStatus {
        status: if status.is_available { "ok" } else { "degraded" }.to_string(),
        provider: provider.to_string(),
        ai_available: status.is_available,
        ollama_host: (status.provider == AiProvider::Ollama).then_some(status.ollama_host),
        model: Some(status.model),
        last_error: status.last_error,
        timestamp: Utc::now(),
    }
}
