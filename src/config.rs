use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `RESHELVE_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "reshelve.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // AI Settings
    pub ai_provider: String,
    pub ollama_host: String,
    pub ollama_model: String,
    pub oracle_timeout_secs: u64,
    pub summary_timeout_secs: u64,
    pub max_summary_input_chars: usize,

    // Watch Settings
    pub debounce_ms: u64,
    pub channel_capacity: usize,
    pub max_concurrent_summaries: usize,

    // File Settings
    pub excluded_extensions: Vec<String>,
    pub excluded_directories: Vec<String>,
    pub include_hidden: bool,
    pub max_scan_depth: usize,

    // Logging
    pub log_level: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_provider: "ollama".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:3b".to_string(),
            oracle_timeout_secs: 60,
            summary_timeout_secs: 30,
            max_summary_input_chars: 4000,

            debounce_ms: 1000,
            channel_capacity: 16,
            max_concurrent_summaries: 4,

            excluded_extensions: vec![
                ".tmp".to_string(),
                ".lock".to_string(),
                ".part".to_string(),
                ".swp".to_string(),
            ],
            excluded_directories: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
            ],
            include_hidden: false,
            max_scan_depth: 16,

            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file (if any) with environment overrides
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RESHELVE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| AppError::ConfigError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("AI_PROVIDER") {
            self.ai_provider = provider;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama_host = host;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama_model = model;
        }

        override_parsed(&lookup, "RESHELVE_DEBOUNCE_MS", &mut self.debounce_ms);
        override_parsed(
            &lookup,
            "RESHELVE_ORACLE_TIMEOUT_SECS",
            &mut self.oracle_timeout_secs,
        );
        override_parsed(
            &lookup,
            "RESHELVE_CHANNEL_CAPACITY",
            &mut self.channel_capacity,
        );
        override_parsed(
            &lookup,
            "RESHELVE_MAX_CONCURRENT_SUMMARIES",
            &mut self.max_concurrent_summaries,
        );

        if let Some(extensions) = lookup("RESHELVE_EXCLUDED_EXTENSIONS") {
            self.excluded_extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.log_format = format.to_lowercase();
        }

        tracing::debug!("Applied environment variable overrides to configuration");
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !["ollama", "fallback"].contains(&self.ai_provider.as_str()) {
            errors.push(format!("Unsupported AI provider: {}", self.ai_provider));
        }

        if self.ai_provider == "ollama" {
            if self.ollama_host.is_empty() {
                errors.push("Ollama host cannot be empty".to_string());
            } else if !self.ollama_host.starts_with("http://")
                && !self.ollama_host.starts_with("https://")
            {
                errors.push("Ollama host must start with http:// or https://".to_string());
            }
            if self.ollama_model.is_empty() {
                errors.push("Ollama model cannot be empty".to_string());
            }
        }

        if self.oracle_timeout_secs == 0 {
            errors.push("Oracle timeout must be at least 1 second".to_string());
        }
        if self.summary_timeout_secs == 0 {
            errors.push("Summary timeout must be at least 1 second".to_string());
        }
        if self.debounce_ms == 0 {
            errors.push("Debounce window must be greater than 0".to_string());
        }
        if self.channel_capacity == 0 {
            errors.push("Channel capacity must be at least 1".to_string());
        }
        if self.max_concurrent_summaries == 0 {
            errors.push("Max concurrent summaries must be at least 1".to_string());
        }
        if self.max_summary_input_chars == 0 {
            errors.push("Max summary input chars must be greater than 0".to_string());
        }
        if self.max_scan_depth == 0 {
            errors.push("Max scan depth must be at least 1".to_string());
        }

        for ext in &self.excluded_extensions {
            if !ext.starts_with('.') {
                errors.push(format!("File extension '{}' must start with a dot", ext));
            }
        }

        if !["text", "json"].contains(&self.log_format.as_str()) {
            errors.push(format!("Unsupported log format: {}", self.log_format));
        }

        if !errors.is_empty() {
            return Err(AppError::ConfigError {
                message: errors.join(", "),
            });
        }

        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn summary_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_timeout_secs)
    }

    /// Get log filter based on log level
    pub fn get_log_filter(&self) -> String {
        match self.log_level.as_str() {
            "error" => "reshelve=error",
            "warn" => "reshelve=warn",
            "debug" => "reshelve=debug",
            "trace" => "reshelve=trace",
            _ => "reshelve=info",
        }
        .to_string()
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(e) => {
                tracing::warn!("Invalid {} value '{}': {}. Using default.", key, raw, e);
            }
        }
    }
}
