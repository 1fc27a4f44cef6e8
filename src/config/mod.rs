// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Argus

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Model identifier prefix selecting the local Ollama backend
pub const LOCAL_MODEL_PREFIX: &str = "ollama/";

/// Agent configuration, fixed for the lifetime of one agent
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AgentConfig {
    /// Directory scanned for new images
    #[serde(default = "default_watch_directory")]
    pub watch_directory: PathBuf,

    /// Directory receiving reports and the processed set
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Remote model name (`gpt-4o`) or local model (`ollama/llava`)
    #[serde(default = "default_model")]
    pub model: String,

    /// Seconds slept between scans in continuous mode
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Image extensions picked up by the scanner
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,

    /// Credential for the hosted API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the hosted, OpenAI-compatible API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the local Ollama server
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// HTTP request timeout for backend calls
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Leave failed analyses out of the processed set so the next scan retries them
    #[serde(default)]
    pub retry_failed: bool,
}

/// Which backend a model identifier selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSpec {
    /// Hosted API model, e.g. `gpt-4o`
    Remote(String),
    /// Local Ollama model, e.g. `llava` from `ollama/llava`
    Local(String),
}

impl ModelSpec {
    /// Parse a model identifier
    pub fn parse(model: &str) -> crate::Result<Self> {
        let model = model.trim();
        if let Some(local) = model.strip_prefix(LOCAL_MODEL_PREFIX) {
            if local.is_empty() {
                return Err(crate::ArgusError::Config(format!(
                    "Local model identifier '{}' names no model",
                    model
                )));
            }
            return Ok(Self::Local(local.to_string()));
        }
        if model.is_empty() {
            return Err(crate::ArgusError::Config("Model identifier is empty".to_string()));
        }
        Ok(Self::Remote(model.to_string()))
    }

    /// Model name as sent to the backend
    pub fn name(&self) -> &str {
        match self {
            Self::Remote(name) | Self::Local(name) => name,
        }
    }
}

fn default_watch_directory() -> PathBuf { PathBuf::from("./input_images") }
fn default_output_directory() -> PathBuf { PathBuf::from("./analysis_output") }
fn default_model() -> String { "gpt-4o".to_string() }
fn default_check_interval() -> u64 { 5 }
fn default_api_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_timeout() -> u64 { 120 }

fn default_supported_formats() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            watch_directory: default_watch_directory(),
            output_directory: default_output_directory(),
            model: default_model(),
            check_interval_secs: default_check_interval(),
            supported_formats: default_supported_formats(),
            api_key: None,
            api_base_url: default_api_base_url(),
            ollama_url: default_ollama_url(),
            timeout_secs: default_timeout(),
            retry_failed: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::ArgusError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parsed model identifier
    pub fn model_spec(&self) -> crate::Result<ModelSpec> {
        ModelSpec::parse(&self.model)
    }

    /// Explicit API key, falling back to `OPENAI_API_KEY`
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_or(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_or(&self, fallback: Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .or(fallback)
            .filter(|key| !key.trim().is_empty())
    }

    /// Supported extensions, lowercased and without the leading dot
    pub fn normalized_formats(&self) -> Vec<String> {
        self.supported_formats
            .iter()
            .map(|f| f.trim().trim_start_matches('.').to_lowercase())
            .filter(|f| !f.is_empty())
            .collect()
    }

    /// Copy with the credential masked, for display
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("********".to_string());
        }
        shown
    }
}
