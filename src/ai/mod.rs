pub mod content;
pub mod fallback;
pub mod ollama;


use crate::{config::Config, error::Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use fallback::FallbackEngine;
pub use ollama::OllamaClient;

/// Short textual description of one file, as produced by a [`Summarizer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    #[serde(rename = "file_path")]
    pub path: PathBuf,
    pub summary: String,
}

/// One proposed move: where a file lives now and where the classifier wants it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub src_path: PathBuf,
    pub dst_path: PathBuf,
    #[serde(default)]
    pub summary: String,
}

/// Produces a summary for a single file
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, path: &Path) -> Result<FileSummary>;
}

/// Maps the full set of summaries to proposed destinations.
///
/// Summary paths are relative to the directory being organized; returned
/// entries must use the same `src_path` values.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, summaries: &[FileSummary]) -> Result<Vec<PlanEntry>>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum AiProvider {
    Ollama,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiServiceStatus {
    pub provider: AiProvider,
    pub is_available: bool,
    pub ollama_connected: bool,
    pub ollama_host: String,
    pub model: String,
    pub last_error: Option<String>,
}

/// Main AI service that selects between the Ollama client and the offline fallback
pub struct AiService {
    config: Arc<RwLock<Config>>,
    provider: Arc<RwLock<AiProvider>>,
    ollama_client: Arc<RwLock<Option<Arc<OllamaClient>>>>,
    fallback: Arc<FallbackEngine>,
}

impl AiService {
    pub async fn new(config: &Config) -> Result<Self> {
        let provider = match config.ai_provider.to_lowercase().as_str() {
            "fallback" => AiProvider::Fallback,
            "ollama" | "" | "default" => AiProvider::Ollama,
            invalid => {
                tracing::warn!("Unknown AI provider '{}', defaulting to Ollama", invalid);
                AiProvider::Ollama
            }
        };

        let (ollama_client, final_provider) = match provider {
            AiProvider::Ollama => match OllamaClient::from_config(config).await {
                Ok(client) => {
                    tracing::info!(
                        "Ollama client initialized with host {} and model {}",
                        config.ollama_host,
                        config.ollama_model
                    );
                    (Some(Arc::new(client)), AiProvider::Ollama)
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize Ollama client with host '{}': {}. Using fallback mode.",
                        config.ollama_host,
                        e
                    );
                    (None, AiProvider::Fallback)
                }
            },
            AiProvider::Fallback => {
                tracing::info!("AI provider explicitly set to fallback mode");
                (None, AiProvider::Fallback)
            }
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config.clone())),
            provider: Arc::new(RwLock::new(final_provider)),
            ollama_client: Arc::new(RwLock::new(ollama_client)),
            fallback: Arc::new(FallbackEngine::new(config.max_summary_input_chars)),
        })
    }

    pub fn provider(&self) -> AiProvider {
        self.provider.read().clone()
    }

    fn active_client(&self) -> Option<Arc<OllamaClient>> {
        match *self.provider.read() {
            AiProvider::Ollama => self.ollama_client.read().clone(),
            AiProvider::Fallback => None,
        }
    }

    /// Get AI service status
    pub async fn get_status(&self) -> AiServiceStatus {
        let provider = self.provider();
        let (ollama_host, model) = {
            let config = self.config.read();
            (config.ollama_host.clone(), config.ollama_model.clone())
        };

        let mut status = AiServiceStatus {
            provider: provider.clone(),
            is_available: false,
            ollama_connected: false,
            ollama_host,
            model,
            last_error: None,
        };

        match provider {
            AiProvider::Ollama => match self.active_client() {
                Some(client) => match client.health_check().await {
                    Ok(()) => {
                        status.is_available = true;
                        status.ollama_connected = true;
                    }
                    Err(e) => {
                        status.last_error = Some(format!("Ollama health check failed: {}", e));
                    }
                },
                None => {
                    status.last_error = Some("Ollama client not initialized".to_string());
                }
            },
            AiProvider::Fallback => {
                status.is_available = true;
                status.model = "fallback".to_string();
            }
        }

        status
    }
}

#[async_trait]
impl Summarizer for AiService {
    async fn summarize(&self, path: &Path) -> Result<FileSummary> {
        match self.active_client() {
            Some(client) => client.summarize(path).await,
            None => self.fallback.summarize(path).await,
        }
    }
}

#[async_trait]
impl Classifier for AiService {
    async fn classify(&self, summaries: &[FileSummary]) -> Result<Vec<PlanEntry>> {
        match self.active_client() {
            Some(client) => client.classify(summaries).await,
            None => self.fallback.classify(summaries).await,
        }
    }
}
