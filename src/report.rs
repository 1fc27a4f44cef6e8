// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Analysis report files
//!
//! Every analysis produces `<stem>_<YYYYMMDD_HHMMSS>_analysis.txt` for people
//! and `<stem>_<YYYYMMDD_HHMMSS>_analysis.json` for tools.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::AnalysisResult;
use crate::Result;

const SEPARATOR_WIDTH: usize = 80;

/// Paths written for one analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReport {
    pub text_path: PathBuf,
    pub json_path: PathBuf,
}

/// Writes report pairs into the output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_directory: PathBuf,
    /// Shown in the header of failure reports, which carry no model
    model: String,
}

impl ReportWriter {
    pub fn new(output_directory: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            output_directory: output_directory.into(),
            model: model.into(),
        }
    }

    /// Write both files. I/O errors propagate.
    ///
    /// Existing reports are never overwritten: when the name is taken, a
    /// counter is inserted before `_analysis` (`photo_<ts>_1_analysis`).
    pub fn save(&self, result: &AnalysisResult) -> Result<SavedReport> {
        let text = self.render_text(result);
        let json = serde_json::to_string_pretty(result)?;

        let mut attempt = 0;
        let (text_path, json_path, mut text_file) = loop {
            let base = report_base_name(result, attempt);
            let text_path = self.output_directory.join(format!("{}.txt", base));
            let json_path = self.output_directory.join(format!("{}.json", base));

            if !json_path.exists() {
                match OpenOptions::new().write(true).create_new(true).open(&text_path) {
                    Ok(file) => break (text_path, json_path, file),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(e.into()),
                }
            }

            debug!("Report name {} is taken", base);
            attempt += 1;
        };

        text_file.write_all(text.as_bytes())?;
        std::fs::write(&json_path, json)?;

        info!("Wrote {:?} and {:?}", text_path, json_path);
        Ok(SavedReport { text_path, json_path })
    }

    /// Human-readable report body
    pub fn render_text(&self, result: &AnalysisResult) -> String {
        let rule = "=".repeat(SEPARATOR_WIDTH);
        let model = match result {
            AnalysisResult::Success { model, .. } => model.as_str(),
            AnalysisResult::Failure { .. } => self.model.as_str(),
        };

        let mut out = format!(
            "Image Analysis Report\n{rule}\n\nImage: {}\nAnalyzed: {}\nModel: {}\n\n{rule}\n\n",
            result.image_name(),
            result.timestamp().to_rfc3339(),
            model,
            rule = rule
        );

        match result {
            AnalysisResult::Success { analysis, tokens_used, .. } => {
                let tokens = tokens_used
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                out.push_str("DETAILED ANALYSIS:\n\n");
                out.push_str(analysis);
                out.push_str(&format!("\n\n{}\nTokens used: {}\n", rule, tokens));
            }
            AnalysisResult::Failure { error, .. } => {
                out.push_str(&format!("ERROR: {}\n", error));
            }
        }

        out
    }
}

/// `<stem>_<YYYYMMDD_HHMMSS>_analysis`, or `<stem>_<YYYYMMDD_HHMMSS>_<n>_analysis` for n > 0
fn report_base_name(result: &AnalysisResult, attempt: u32) -> String {
    let name = result.image_name();
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    let stamp = result.timestamp().format("%Y%m%d_%H%M%S");
    if attempt == 0 {
        format!("{}_{}_analysis", stem, stamp)
    } else {
        format!("{}_{}_{}_analysis", stem, stamp, attempt)
    }
}
