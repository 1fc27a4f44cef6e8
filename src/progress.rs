// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! User-facing progress reporting

use std::path::PathBuf;
use std::sync::Mutex;

/// Events emitted while an agent runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Single-run mode began scanning
    SingleRunStarted { watch_directory: PathBuf },
    /// Continuous mode began monitoring
    MonitoringStarted {
        watch_directory: PathBuf,
        output_directory: PathBuf,
        formats: Vec<String>,
        interval_secs: u64,
        model: String,
    },
    /// A single-run scan found nothing
    NoNewImages,
    /// A scan found images to analyze
    Found { count: usize, continuous: bool },
    /// Analysis of one image started
    Analyzing { index: usize, total: usize, image_name: String },
    /// Report files were written
    Saved { report_path: PathBuf },
    /// Analysis failed; the image is still reported
    Failed { image_name: String, error: String },
    /// A single-run batch finished
    BatchComplete { analyzed: usize },
    /// Continuous mode stopped on request
    Stopped { total_processed: usize },
}

impl ProgressEvent {
    /// Console rendering of the event
    pub fn render(&self) -> String {
        match self {
            Self::SingleRunStarted { watch_directory } => format!(
                "Image Analysis Agent - Single Run Mode\nScanning directory: {}\n",
                watch_directory.display()
            ),
            Self::MonitoringStarted {
                watch_directory,
                output_directory,
                formats,
                interval_secs,
                model,
            } => format!(
                "Image Analysis Agent Started\n\
                 Watching directory: {}\n\
                 Output directory: {}\n\
                 Supported formats: {}\n\
                 Check interval: {} seconds\n\
                 Model: {}\n\n\
                 Monitoring for new images... Press Ctrl+C to stop.\n",
                watch_directory.display(),
                output_directory.display(),
                formats.join(", "),
                interval_secs,
                model
            ),
            Self::NoNewImages => "No new images found to process".to_string(),
            Self::Found { count, continuous: false } => {
                format!("Found {} image(s) to process\n", count)
            }
            Self::Found { count, continuous: true } => {
                format!("\nFound {} new image(s) to process", count)
            }
            Self::Analyzing { index, total, image_name } => {
                format!("[{}/{}] Analyzing image: {}", index, total, image_name)
            }
            Self::Saved { report_path } => {
                format!("Analysis saved to: {}", report_path.display())
            }
            Self::Failed { image_name, error } => {
                format!("Error analyzing image {}: {}", image_name, error)
            }
            Self::BatchComplete { analyzed } => {
                format!("\nProcessing complete. Analyzed {} image(s)", analyzed)
            }
            Self::Stopped { total_processed } => format!(
                "\n\nAgent stopped by user\nTotal images processed: {}",
                total_processed
            ),
        }
    }
}

/// Port for receiving progress events
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Prints events to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Failed { .. } => eprintln!("{}", event.render()),
            _ => println!("{}", event.render()),
        }
    }
}

/// Keeps every event, for tests and embedding
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Rendered lines, in order
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ProgressEvent::render).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
