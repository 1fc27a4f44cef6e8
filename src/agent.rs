// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The image analysis agent: scan, analyze, report, remember
//!
//! One agent owns its configuration and processed set. Images are handled one
//! at a time; a failed analysis is reported and the run continues, while a
//! failure to write reports or the processed set ends the run with an error.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::analyzers::{AnalysisResult, ImageAnalyzer};
use crate::backends::{create_backend, VisionBackend};
use crate::config::AgentConfig;
use crate::processed::{ProcessedSet, PROCESSED_FILE};
use crate::progress::{ConsoleProgress, ProgressEvent, ProgressSink};
use crate::report::{ReportWriter, SavedReport};
use crate::scanner;
use crate::Result;

/// Counts from one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Images analyzed during this run, failures included
    pub analyzed: usize,
    /// Analyses that ended in a failure result
    pub failed: usize,
    /// Size of the processed set when the run ended
    pub total_processed: usize,
}

impl RunSummary {
    fn record(&mut self, result: &AnalysisResult) {
        self.analyzed += 1;
        if !result.is_success() {
            self.failed += 1;
        }
    }
}

/// Watches one directory and analyzes each new image once
pub struct Agent {
    config: AgentConfig,
    formats: Vec<String>,
    analyzer: ImageAnalyzer,
    writer: ReportWriter,
    processed: ProcessedSet,
    progress: Arc<dyn ProgressSink>,
}

impl Agent {
    /// Create an agent using the backend selected by `config.model`
    pub fn new(config: AgentConfig) -> Result<Self> {
        let backend = create_backend(&config)?;
        Self::with_backend(config, backend)
    }

    /// Create an agent around an existing backend
    ///
    /// Both directories are created if missing and made absolute (without
    /// resolving symlinks); the processed set is loaded from the output
    /// directory.
    pub fn with_backend(mut config: AgentConfig, backend: Box<dyn VisionBackend>) -> Result<Self> {
        config.model_spec()?;
        config.watch_directory = absolute_path(&config.watch_directory)?;
        config.output_directory = absolute_path(&config.output_directory)?;

        std::fs::create_dir_all(&config.watch_directory)?;
        std::fs::create_dir_all(&config.output_directory)?;

        let processed = ProcessedSet::load(config.output_directory.join(PROCESSED_FILE))?;
        info!(
            "Agent ready: watching {:?}, {} image(s) already processed",
            config.watch_directory,
            processed.len()
        );

        Ok(Self {
            formats: config.normalized_formats(),
            analyzer: ImageAnalyzer::new(backend, config.model.clone()),
            writer: ReportWriter::new(config.output_directory.clone(), config.model.clone()),
            processed,
            progress: Arc::new(ConsoleProgress),
            config,
        })
    }

    /// Replace the console progress output
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Unprocessed images in the watch directory, oldest first
    pub fn scan_for_new_images(&self) -> Result<Vec<PathBuf>> {
        scanner::scan_for_new_images(&self.config.watch_directory, &self.formats, &self.processed)
    }

    /// Analyze one image without recording it
    pub async fn analyze_image(&self, path: &Path) -> AnalysisResult {
        self.analyzer.analyze(path).await
    }

    /// Write the report pair for a result
    pub fn save_analysis(&self, result: &AnalysisResult) -> Result<SavedReport> {
        let saved = self.writer.save(result)?;
        self.progress.on_event(&ProgressEvent::Saved {
            report_path: saved.text_path.clone(),
        });
        Ok(saved)
    }

    /// Analyze, save, and record one image, flushing the processed set
    pub async fn process_image(&mut self, path: &Path) -> Result<AnalysisResult> {
        let result = self.analyze_image(path).await;

        if let Some(error) = result.error() {
            self.progress.on_event(&ProgressEvent::Failed {
                image_name: result.image_name().to_string(),
                error: error.to_string(),
            });
        }

        self.save_analysis(&result)?;

        if result.is_success() || !self.config.retry_failed {
            self.processed.insert(path.to_string_lossy().into_owned());
            self.processed.save()?;
        } else {
            debug!("Leaving {:?} unrecorded so the next scan retries it", path);
        }

        Ok(result)
    }

    /// Scan once, process everything found, and return
    pub async fn run_once(&mut self) -> Result<RunSummary> {
        self.progress.on_event(&ProgressEvent::SingleRunStarted {
            watch_directory: self.config.watch_directory.clone(),
        });

        let mut summary = RunSummary::default();
        let new_images = self.scan_for_new_images()?;

        if new_images.is_empty() {
            self.progress.on_event(&ProgressEvent::NoNewImages);
            summary.total_processed = self.processed.len();
            return Ok(summary);
        }

        self.progress.on_event(&ProgressEvent::Found {
            count: new_images.len(),
            continuous: false,
        });

        self.process_batch(&new_images, &mut summary, None).await?;

        self.progress.on_event(&ProgressEvent::BatchComplete {
            analyzed: summary.analyzed,
        });

        summary.total_processed = self.processed.len();
        Ok(summary)
    }

    /// Poll until `shutdown` turns true
    ///
    /// Shutdown is honoured between images and during the sleep between
    /// scans; a backend call in flight always completes first.
    pub async fn run_continuous(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        self.progress.on_event(&ProgressEvent::MonitoringStarted {
            watch_directory: self.config.watch_directory.clone(),
            output_directory: self.config.output_directory.clone(),
            formats: self.config.supported_formats.clone(),
            interval_secs: self.config.check_interval_secs,
            model: self.config.model.clone(),
        });

        let interval = Duration::from_secs(self.config.check_interval_secs);
        let mut summary = RunSummary::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let new_images = self.scan_for_new_images()?;
            if !new_images.is_empty() {
                self.progress.on_event(&ProgressEvent::Found {
                    count: new_images.len(),
                    continuous: true,
                });

                let finished = self
                    .process_batch(&new_images, &mut summary, Some(&shutdown))
                    .await?;
                if !finished {
                    break;
                }
            }

            if sleep_or_shutdown(interval, &mut shutdown).await {
                break;
            }
        }

        summary.total_processed = self.processed.len();
        self.progress.on_event(&ProgressEvent::Stopped {
            total_processed: summary.total_processed,
        });

        Ok(summary)
    }

    /// Returns false if shutdown cut the batch short
    async fn process_batch(
        &mut self,
        images: &[PathBuf],
        summary: &mut RunSummary,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<bool> {
        let total = images.len();

        for (i, path) in images.iter().enumerate() {
            self.progress.on_event(&ProgressEvent::Analyzing {
                index: i + 1,
                total,
                image_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });

            let result = self.process_image(path).await?;
            summary.record(&result);

            if shutdown.is_some_and(|rx| *rx.borrow()) {
                info!("Shutdown requested, stopping after {:?}", path);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Sleep for `interval`, waking early on shutdown. True if shutdown was requested.
async fn sleep_or_shutdown(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return *shutdown.borrow(),
            changed = shutdown.changed() => match changed {
                Ok(()) => {
                    if *shutdown.borrow() {
                        return true;
                    }
                }
                // Sender gone: no signal can arrive any more
                Err(_) => {
                    (&mut sleep).await;
                    return *shutdown.borrow();
                }
            },
        }
    }
}

/// Join onto the current directory and drop `.` components; symlinks are kept
fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}
