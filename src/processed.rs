// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Durable record of images already analyzed

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ArgusError, Result};

/// File name of the processed set inside the output directory
pub const PROCESSED_FILE: &str = "processed_images.json";

#[derive(Deserialize)]
struct ProcessedDocument {
    #[serde(default)]
    processed: BTreeSet<String>,
}

/// Set of processed image path strings, backed by a JSON file
///
/// Membership is exact string equality: the same file reached through two
/// different path strings counts as two images.
#[derive(Debug)]
pub struct ProcessedSet {
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl ProcessedSet {
    /// Load the set stored at `path`; a missing file is an empty set
    pub fn load(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let document: ProcessedDocument = serde_json::from_str(&content).map_err(|e| {
                ArgusError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            document.processed
        } else {
            BTreeSet::new()
        };

        tracing::debug!("Loaded {} processed entries from {:?}", entries.len(), path);
        Ok(Self { path, entries })
    }

    pub fn contains(&self, image_path: &str) -> bool {
        self.entries.contains(image_path)
    }

    /// Add an entry; returns false if it was already present
    pub fn insert(&mut self, image_path: impl Into<String>) -> bool {
        self.entries.insert(image_path.into())
    }

    /// Rewrite the whole document
    ///
    /// The new document goes to a sibling temp file first and is renamed over
    /// the old one, so readers see either the old set or the new one.
    pub fn save(&self) -> Result<()> {
        let document = ProcessedDocumentRef {
            processed: &self.entries,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let staging = staging_path(&self.path);
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `processed_images.json` -> `processed_images.json.tmp`
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Serialize)]
struct ProcessedDocumentRef<'a> {
    processed: &'a BTreeSet<String>,
}
