// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![allow(dead_code)]

use argus::backends::{VisionBackend, VisionRequest, VisionResponse};
use argus::{AgentConfig, ArgusError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Backend that answers from a script and records which images it saw
///
/// Test images contain their own file name, so the decoded payload names the
/// image being analyzed.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    seen: Arc<Mutex<Vec<String>>>,
    failing: Arc<Vec<String>>,
    on_call: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every request for these image names
    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing = Arc::new(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Run a hook during each call, before replying
    pub fn on_call(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    /// Image names in the order they were analyzed
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-vision"
    }

    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
        let bytes = general_purpose::STANDARD
            .decode(&request.image_base64)
            .map_err(|e| ArgusError::Backend(e.to_string()))?;
        let name = String::from_utf8_lossy(&bytes).into_owned();
        self.seen.lock().unwrap().push(name.clone());

        if let Some(hook) = &self.on_call {
            hook(&name);
        }

        if self.failing.contains(&name) {
            return Err(ArgusError::Backend(format!("simulated outage for {}", name)));
        }

        Ok(VisionResponse {
            text: format!("Description of {}: «détaillée» 東京", name),
            tokens_used: Some(100),
        })
    }
}

/// Write an image whose content is its own name, with a fixed mtime
pub fn write_image(dir: &Path, name: &str, secs_after_epoch: u64) {
    let path = dir.join(name);
    std::fs::write(&path, name.as_bytes()).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch))
        .unwrap();
}

pub fn config_for(watch: &Path, output: &Path) -> AgentConfig {
    AgentConfig {
        watch_directory: watch.to_path_buf(),
        output_directory: output.to_path_buf(),
        model: "gpt-4o".to_string(),
        api_key: Some("sk-unused".to_string()),
        check_interval_secs: 3600,
        ..AgentConfig::default()
    }
}

/// Output files with the given extension
pub fn outputs_with_extension(dir: &Path, ext: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(ext) && n != "processed_images.json")
        .collect();
    names.sort();
    names
}

pub fn processed_entries(output: &Path) -> Vec<String> {
    let text = std::fs::read_to_string(output.join("processed_images.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    value["processed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}
