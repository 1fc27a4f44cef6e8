// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Hosted OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{http_client, status_error, VisionBackend, VisionRequest, VisionResponse};
use crate::{ArgusError, Result};

/// Client for the `/chat/completions` endpoint
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}

impl OpenAiBackend {
    /// Create a client for `model` at `base_url` (e.g. `https://api.openai.com/v1`)
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: &request.user_prompt,
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: data_url(&request.mime_type, &request.image_base64),
                                detail: "high",
                            },
                        },
                    ]),
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("Sending vision request to {}: model={}", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await);
        }

        let result: ChatResponse = response.json().await?;
        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                ArgusError::Backend("Response contained no message content".to_string())
            })?;

        Ok(VisionResponse {
            text,
            tokens_used: result.usage.map(|u| u.total_tokens),
        })
    }
}

fn data_url(mime_type: &str, payload: &str) -> String {
    format!("data:{};base64,{}", mime_type, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::{sample_request, serve};
    use axum::{http::{HeaderMap, StatusCode}, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_describe_sends_vision_payload() {
        let seen = Arc::new(Mutex::new(None::<(Option<String>, Value)>));
        let captured = seen.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    *captured.lock().unwrap() = Some((auth, body));
                    Json(json!({
                        "choices": [{ "message": { "role": "assistant", "content": "Two cats on a sofa." } }],
                        "usage": { "prompt_tokens": 900, "completion_tokens": 34, "total_tokens": 934 }
                    }))
                }
            }),
        );
        let base = serve(router).await;

        let backend = OpenAiBackend::new(
            &format!("{}/v1/", base),
            "sk-test",
            "gpt-4o",
            Duration::from_secs(5),
        )
        .unwrap();
        let response = backend.describe(&sample_request()).await.unwrap();

        assert_eq!(response.text, "Two cats on a sofa.");
        assert_eq!(response.tokens_used, Some(934));

        let (auth, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["content"], "describe");
        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "look closely");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,aGVsbG8=");
        assert_eq!(parts[1]["image_url"]["detail"], "high");
    }

    #[tokio::test]
    async fn test_describe_surfaces_auth_failure() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key provided" } })),
                )
            }),
        );
        let base = serve(router).await;

        let backend = OpenAiBackend::new(&base, "bad", "gpt-4o", Duration::from_secs(5)).unwrap();
        let err = backend.describe(&sample_request()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("401"), "{}", message);
        assert!(message.contains("Incorrect API key"), "{}", message);
    }

    #[tokio::test]
    async fn test_describe_rejects_empty_choices() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let base = serve(router).await;

        let backend = OpenAiBackend::new(&base, "sk", "gpt-4o", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            backend.describe(&sample_request()).await,
            Err(ArgusError::Backend(_))
        ));
    }
}
