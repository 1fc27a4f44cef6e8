// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Argus

use thiserror::Error;

/// Result type alias for Argus operations
pub type Result<T> = std::result::Result<T, ArgusError>;

/// Argus error types
#[derive(Error, Debug)]
pub enum ArgusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Ollama not available: {0}")]
    OllamaUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid analysis record: {0}")]
    InvalidRecord(String),
}
