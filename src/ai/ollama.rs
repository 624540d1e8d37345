use crate::ai::content::read_text_excerpt;
use crate::ai::{Classifier, FileSummary, PlanEntry, Summarizer};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::utils::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use ollama_rs::{generation::completion::request::GenerationRequest, Ollama};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

pub struct OllamaClient {
    client: Ollama,
    host: String,
    model: String,
    request_timeout: Duration,
    max_input_chars: usize,
    retry: RetryConfig,
}

/// One entry of the classifier's JSON answer
#[derive(Debug, Deserialize)]
struct ProposedMove {
    src_path: PathBuf,
    dst_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Wrapped { files: Vec<ProposedMove> },
    Bare(Vec<ProposedMove>),
}

impl OllamaClient {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new(&config.ollama_host, &config.ollama_model).await?;
        client.request_timeout = config.oracle_timeout();
        client.max_input_chars = config.max_summary_input_chars;
        Ok(client)
    }

    /// Connects to an Ollama server and verifies it answers
    pub async fn new(host: &str, model: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(AppError::InvalidInput {
                message: "Ollama host cannot be empty".to_string(),
            });
        }

        let parsed_host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        let url = url::Url::parse(&parsed_host).map_err(|e| AppError::InvalidInput {
            message: format!("Invalid Ollama host URL '{}': {}", host, e),
        })?;

        let hostname = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => {
                return Err(AppError::InvalidInput {
                    message: format!("Invalid hostname in URL: {}", parsed_host),
                });
            }
        };
        let port = url.port().unwrap_or(11434);

        debug!("Checking Ollama availability at {}:{}", hostname, port);
        let client = Ollama::new(format!("{}://{}", url.scheme(), hostname), port);

        match timeout(HEALTH_CHECK_TIMEOUT, client.list_local_models()).await {
            Ok(Ok(models)) => {
                info!(
                    "Successfully connected to Ollama. Found {} models",
                    models.len()
                );
                if !models.iter().any(|m| m.name == model) {
                    warn!(
                        "Model '{}' is not installed locally; requests may fail until it is pulled",
                        model
                    );
                }
            }
            Ok(Err(e)) => {
                error!("Ollama API call failed: {}", e);
                return Err(AppError::AiError {
                    message: format!("Ollama is not responding correctly: {}", e),
                });
            }
            Err(_) => {
                warn!("Ollama health check timed out");
                return Err(AppError::AiError {
                    message: "Ollama server timed out. It may be starting up or under heavy load."
                        .to_string(),
                });
            }
        }

        Ok(Self {
            client,
            host: parsed_host,
            model: model.to_string(),
            request_timeout: Duration::from_secs(60),
            max_input_chars: 4000,
            retry: RetryConfig::default(),
        })
    }

    pub async fn health_check(&self) -> Result<()> {
        match timeout(HEALTH_CHECK_TIMEOUT, self.client.list_local_models()).await {
            Ok(Ok(models)) => {
                debug!(
                    "Ollama at {} is healthy with {} models available",
                    self.host,
                    models.len()
                );
                Ok(())
            }
            Ok(Err(e)) => Err(AppError::AiError {
                message: format!("Ollama at {} is not responding: {}", self.host, e),
            }),
            Err(_) => Err(AppError::AiError {
                message: format!("Ollama connection to {} timed out", self.host),
            }),
        }
    }

    async fn generate_completion(&self, prompt: &str) -> Result<String> {
        let request_timeout = self.request_timeout;

        // A timed-out generation already used the whole budget
        let retryable = |e: &AppError| matches!(e, AppError::AiError { .. });

        with_retry_if("generate_completion", &self.retry, retryable, || {
            let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
            let client = self.client.clone();

            async move {
                let response = timeout(request_timeout, client.generate(request))
                    .await
                    .map_err(|_| AppError::Timeout {
                        message: format!("Generation timed out after {:?}", request_timeout),
                    })?
                    .map_err(|e| AppError::AiError {
                        message: format!("Generation failed: {}", e),
                    })?;

                Ok::<_, AppError>(response.response)
            }
        })
        .await
    }
}

/// Removes characters that break prompt framing
fn clean_prompt_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '\0' && *c != '\r')
        .map(|c| if c == '\t' { ' ' } else { c })
        .collect()
}

fn summary_prompt(path: &Path, excerpt: &str) -> String {
    format!(
        r#"You are a file organization assistant. Summarize the following file in one or two sentences.
Describe what the file is about, not its formatting. Respond with the summary only.

FILE NAME: {}

CONTENT:
{}"#,
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        clean_prompt_text(excerpt)
    )
}

fn classification_prompt(summaries: &[FileSummary]) -> Result<String> {
    let listing = serde_json::to_string_pretty(summaries)?;
    Ok(format!(
        r#"You are a file organization assistant. Below is a list of files with a summary of each.
Propose a tidy nested folder structure and a destination path for every file.

RULES:
1. Destination paths are relative, use "/" separators and never contain "..".
2. Keep the original file extension.
3. Every input file_path must appear exactly once as src_path.

FILES:
{}

Respond with ONLY a JSON object (no additional text):
{{"files": [{{"src_path": "<exact file_path from the list>", "dst_path": "<new relative path>"}}]}}"#,
        clean_prompt_text(&listing)
    ))
}

/// Reads the proposed moves from the first JSON value in `response` that has
/// the expected shape. Bracketed prose before the answer is skipped.
pub(crate) fn parse_classification(response: &str) -> Result<Vec<PlanEntry>> {
    let mut first_error = None;
    let mut parsed = None;

    for (start, _) in response.match_indices(|c: char| c == '{' || c == '[') {
        let mut values = serde_json::Deserializer::from_str(&response[start..])
            .into_iter::<ClassificationResponse>();
        match values.next() {
            Some(Ok(value)) => {
                parsed = Some(value);
                break;
            }
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    let parsed = match (parsed, first_error) {
        (Some(parsed), _) => parsed,
        (None, Some(e)) => {
            error!("Failed to parse classification: {}", e);
            return Err(AppError::ParseError {
                message: format!("Invalid classification format: {}", e),
            });
        }
        (None, None) => {
            return Err(AppError::ParseError {
                message: "Classifier response contains no JSON".to_string(),
            })
        }
    };

    let moves = match parsed {
        ClassificationResponse::Wrapped { files } => files,
        ClassificationResponse::Bare(files) => files,
    };

    Ok(moves
        .into_iter()
        .map(|m| PlanEntry {
            src_path: m.src_path,
            dst_path: m.dst_path,
            summary: String::new(),
        })
        .collect())
}

#[async_trait]
impl Summarizer for OllamaClient {
    async fn summarize(&self, path: &Path) -> Result<FileSummary> {
        let excerpt = read_text_excerpt(path, self.max_input_chars).await?;
        let response = self
            .generate_completion(&summary_prompt(path, &excerpt))
            .await?;

        let summary = response.trim().to_string();
        if summary.is_empty() {
            return Err(AppError::AiError {
                message: format!("Empty summary returned for {}", path.display()),
            });
        }

        Ok(FileSummary {
            path: path.to_path_buf(),
            summary,
        })
    }
}

#[async_trait]
impl Classifier for OllamaClient {
    async fn classify(&self, summaries: &[FileSummary]) -> Result<Vec<PlanEntry>> {
        let prompt = classification_prompt(summaries)?;
        let response = self.generate_completion(&prompt).await?;
        let entries = parse_classification(&response)?;
        debug!(
            "Classifier proposed {} moves for {} files",
            entries.len(),
            summaries.len()
        );
        Ok(entries)
    }
}
