// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Watch directory scanning

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::processed::ProcessedSet;
use crate::Result;

/// List unprocessed images in `dir`, oldest modification time first
///
/// `formats` holds lowercase extensions without the leading dot. The scan is
/// not recursive; directories and other files are skipped.
pub fn scan_for_new_images(
    dir: &Path,
    formats: &[String],
    processed: &ProcessedSet,
) -> Result<Vec<PathBuf>> {
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();

        // Follows symlinks, so a linked image counts as a file
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                debug!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        if !metadata.is_file() || !is_supported(&path, formats) {
            continue;
        }

        if processed.contains(&path.to_string_lossy()) {
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((modified, path));
    }

    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Case-insensitive extension check
pub fn is_supported(path: &Path, formats: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => formats.iter().any(|f| f.eq_ignore_ascii_case(ext)),
        None => false,
    }
}
