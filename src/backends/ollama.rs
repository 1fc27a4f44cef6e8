// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama backend for local vision models

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{http_client, status_error, VisionBackend, VisionRequest, VisionResponse};
use crate::{ArgusError, Result};

/// Client for a local Ollama server
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaBackend {
    /// Create a client for `model` served at `base_url`
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: normalize_base_url(base_url),
            model: model.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ArgusError::OllamaUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List pulled models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await);
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check whether the configured model has been pulled
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| self.is_configured_model(m)))
    }

    /// Whether a pulled model name (`llava:latest`) is the configured model
    pub fn is_configured_model(&self, available: &str) -> bool {
        matches_model(available, &self.model)
    }
}

#[async_trait]
impl VisionBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
        let url = format!("{}/api/chat", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                    images: None,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                    images: Some(vec![request.image_base64.as_str()]),
                },
            ],
            stream: false,
            options: ChatOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        debug!("Sending vision request to Ollama: model={}", self.model);

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await);
        }

        let result: ChatResponse = response.json().await?;
        if result.message.content.trim().is_empty() {
            return Err(ArgusError::Backend("Ollama returned an empty response".to_string()));
        }

        // Ollama's eval counts are not comparable to hosted usage totals
        Ok(VisionResponse {
            text: result.message.content,
            tokens_used: None,
        })
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .replace("/api/generate", "")
        .replace("/api/chat", "")
}

fn matches_model(available: &str, wanted: &str) -> bool {
    available == wanted
        || available == format!("{}:latest", wanted)
        || (!wanted.contains(':') && available.split(':').next() == Some(wanted))
}
