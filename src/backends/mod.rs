// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Multimodal model backends
//!
//! A backend takes one image plus instructions and returns descriptive text.
//! The model identifier decides which backend an agent talks to: plain names
//! go to the hosted OpenAI-compatible API, `ollama/<model>` goes to a local
//! Ollama server.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::{AgentConfig, ModelSpec, API_KEY_ENV};
use crate::{ArgusError, Result};

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Backend-agnostic vision request
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Base64-encoded image bytes
    pub image_base64: String,
    pub mime_type: String,
    /// Output token ceiling, honoured when the backend supports it
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Backend-agnostic vision response
#[derive(Debug, Clone, PartialEq)]
pub struct VisionResponse {
    pub text: String,
    /// Total tokens, when the backend reports usage
    pub tokens_used: Option<u64>,
}

/// A model service able to describe an image
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Model name sent with each request
    fn model(&self) -> &str;

    /// Submit an image with instructions and return the generated text
    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse>;
}

/// Build the backend selected by the configured model identifier
pub fn create_backend(config: &AgentConfig) -> Result<Box<dyn VisionBackend>> {
    let timeout = Duration::from_secs(config.timeout_secs);

    match config.model_spec()? {
        ModelSpec::Remote(model) => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                ArgusError::Config(format!(
                    "No API key for model '{}': pass --api-key or set {}",
                    model, API_KEY_ENV
                ))
            })?;
            Ok(Box::new(OpenAiBackend::new(
                &config.api_base_url,
                api_key,
                model,
                timeout,
            )?))
        }
        ModelSpec::Local(model) => Ok(Box::new(OllamaBackend::new(
            &config.ollama_url,
            model,
            timeout,
        )?)),
    }
}

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Turn a non-success HTTP response into a backend error
async fn status_error(backend: &str, response: reqwest::Response) -> ArgusError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.trim().chars().take(500).collect();

    if excerpt.is_empty() {
        ArgusError::Backend(format!("{} returned status {}", backend, status))
    } else {
        ArgusError::Backend(format!("{} returned status {}: {}", backend, status, excerpt))
    }
}
