// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image analyzer using vision models

use chrono::Local;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{encode_image, mime_type_for, AnalysisResult};
use crate::backends::{VisionBackend, VisionRequest, VisionResponse};
use crate::Result;

/// Output token ceiling per analysis
pub const MAX_TOKENS: u32 = 2000;

/// Sampling temperature per analysis
pub const TEMPERATURE: f32 = 0.7;

pub const SYSTEM_PROMPT: &str = "\
You are an expert image analyst. Provide extensive, detailed descriptions of images.

Your analysis should include:
1. Overall scene description - what is happening in the image
2. Main subjects and objects - detailed description of people, animals, or objects
3. Actions and activities - what actions are being performed
4. Environment and setting - location, time of day, weather conditions
5. Colors and lighting - dominant colors, lighting conditions, mood
6. Composition and perspective - camera angle, framing, focal points
7. Text or signage - any visible text, labels, or signs
8. Technical details - image quality, resolution observations
9. Context and implications - what this image might represent or document
10. Sequential analysis - if this appears to be part of a series, note patterns or changes

Be thorough and specific. Provide actionable insights about what has been done or what is happening.";

pub const USER_PROMPT: &str = "Analyze this image in extensive detail. Describe everything you \
observe and provide comprehensive instructions or explanations about what has been done or \
what is happening.";

/// Describes images through a vision backend
pub struct ImageAnalyzer {
    backend: Box<dyn VisionBackend>,
    /// Identifier recorded in results, as configured (e.g. `ollama/llava`)
    model_id: String,
}

impl ImageAnalyzer {
    pub fn new(backend: Box<dyn VisionBackend>, model_id: impl Into<String>) -> Self {
        Self {
            backend,
            model_id: model_id.into(),
        }
    }

    /// Analyze one image. Failures are captured in the result, never returned.
    pub async fn analyze(&self, path: &Path) -> AnalysisResult {
        info!("Analyzing image: {:?}", path);

        match self.request_analysis(path).await {
            Ok(response) => {
                debug!(
                    "Analysis of {:?} returned {} chars (tokens: {:?})",
                    path,
                    response.text.len(),
                    response.tokens_used
                );
                AnalysisResult::success(
                    path,
                    Local::now(),
                    self.model_id.as_str(),
                    response.text,
                    response.tokens_used,
                )
            }
            Err(e) => {
                warn!("Error analyzing image {:?}: {}", path, e);
                AnalysisResult::failure(path, Local::now(), e.to_string())
            }
        }
    }

    async fn request_analysis(&self, path: &Path) -> Result<VisionResponse> {
        let request = VisionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: USER_PROMPT.to_string(),
            image_base64: encode_image(path)?,
            mime_type: mime_type_for(path).to_string(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!(
            "Submitting {:?} to {} ({}, {} base64 bytes)",
            path,
            self.backend.name(),
            request.mime_type,
            request.image_base64.len()
        );

        self.backend.describe(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArgusError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records requests and replies with a fixed outcome
    struct StubBackend {
        reply: std::result::Result<VisionResponse, String>,
        seen: Arc<Mutex<Vec<VisionRequest>>>,
    }

    #[async_trait]
    impl VisionBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(ArgusError::Backend)
        }
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.PNG");
        std::fs::write(&path, b"hello").unwrap();

        let backend = StubBackend {
            reply: Ok(VisionResponse {
                text: "A screenshot of a terminal.".into(),
                tokens_used: Some(120),
            }),
            seen: Arc::default(),
        };
        let analyzer = ImageAnalyzer::new(Box::new(backend), "gpt-4o");

        let result = analyzer.analyze(&path).await;
        match &result {
            AnalysisResult::Success { analysis, model, tokens_used, image_name, .. } => {
                assert_eq!(analysis, "A screenshot of a terminal.");
                assert_eq!(model, "gpt-4o");
                assert_eq!(*tokens_used, Some(120));
                assert_eq!(image_name, "shot.PNG");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_builds_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.webp");
        std::fs::write(&path, b"hello").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = StubBackend {
            reply: Ok(VisionResponse { text: "ok".into(), tokens_used: None }),
            seen: seen.clone(),
        };

        let analyzer = ImageAnalyzer::new(Box::new(backend), "ollama/llava");
        analyzer.analyze(&path).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].image_base64, "aGVsbG8=");
        assert_eq!(seen[0].mime_type, "image/webp");
        assert_eq!(seen[0].max_tokens, 2000);
        assert!((seen[0].temperature - 0.7).abs() < f32::EPSILON);
        assert!(seen[0].system_prompt.contains("10. Sequential analysis"));
    }

    #[tokio::test]
    async fn test_backend_failure_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let backend = StubBackend {
            reply: Err("rate limited".into()),
            seen: Arc::default(),
        };
        let analyzer = ImageAnalyzer::new(Box::new(backend), "gpt-4o");

        let result = analyzer.analyze(&path).await;
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("Backend error: rate limited"));
        assert_eq!(result.image_path(), path.to_string_lossy());
    }

    #[tokio::test]
    async fn test_unreadable_image_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StubBackend {
            reply: Ok(VisionResponse { text: "never".into(), tokens_used: None }),
            seen: Arc::default(),
        };
        let analyzer = ImageAnalyzer::new(Box::new(backend), "gpt-4o");

        let result = analyzer.analyze(&dir.path().join("gone.jpg")).await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().starts_with("File system error"));
    }
}
