// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Argus: AI image analysis agent
//!
//! Polls a directory for new images, asks a multimodal model (hosted API or a
//! local Ollama server) to describe each one, and writes a text report and a
//! JSON record per image. Processed images are remembered across runs.

pub mod agent;
pub mod analyzers;
pub mod backends;
pub mod config;
pub mod error;
pub mod processed;
pub mod progress;
pub mod report;
pub mod scanner;

pub use agent::{Agent, RunSummary};
pub use analyzers::AnalysisResult;
pub use config::AgentConfig;
pub use error::{ArgusError, Result};
