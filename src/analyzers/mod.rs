// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image analysis and its results

pub mod image;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

use crate::{ArgusError, Result};

pub use self::image::ImageAnalyzer;

/// Outcome of analysing one image
///
/// Serialised as a flat JSON object: `success`, `image_path`, `image_name`,
/// `timestamp`, then either `analysis`/`model`/`tokens_used` or `error`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "AnalysisRecord")]
pub enum AnalysisResult {
    Success {
        image_path: String,
        image_name: String,
        timestamp: DateTime<Local>,
        analysis: String,
        model: String,
        /// Reported by hosted backends only
        tokens_used: Option<u64>,
    },
    Failure {
        image_path: String,
        image_name: String,
        timestamp: DateTime<Local>,
        error: String,
    },
}

impl AnalysisResult {
    pub fn success(
        path: &Path,
        timestamp: DateTime<Local>,
        model: impl Into<String>,
        analysis: impl Into<String>,
        tokens_used: Option<u64>,
    ) -> Self {
        Self::Success {
            image_path: path.to_string_lossy().into_owned(),
            image_name: file_name(path),
            timestamp,
            analysis: analysis.into(),
            model: model.into(),
            tokens_used,
        }
    }

    pub fn failure(path: &Path, timestamp: DateTime<Local>, error: impl Into<String>) -> Self {
        Self::Failure {
            image_path: path.to_string_lossy().into_owned(),
            image_name: file_name(path),
            timestamp,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn image_path(&self) -> &str {
        match self {
            Self::Success { image_path, .. } | Self::Failure { image_path, .. } => image_path,
        }
    }

    pub fn image_name(&self) -> &str {
        match self {
            Self::Success { image_name, .. } | Self::Failure { image_name, .. } => image_name,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            Self::Success { timestamp, .. } | Self::Failure { timestamp, .. } => *timestamp,
        }
    }

    /// Error message of a failed analysis
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error, .. } => Some(error),
            Self::Success { .. } => None,
        }
    }
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Success {
                image_path,
                image_name,
                timestamp,
                analysis,
                model,
                tokens_used,
            } => {
                let mut record = serializer.serialize_struct("AnalysisResult", 7)?;
                record.serialize_field("success", &true)?;
                record.serialize_field("image_path", image_path)?;
                record.serialize_field("image_name", image_name)?;
                record.serialize_field("timestamp", timestamp)?;
                record.serialize_field("analysis", analysis)?;
                record.serialize_field("model", model)?;
                record.serialize_field("tokens_used", tokens_used)?;
                record.end()
            }
            Self::Failure {
                image_path,
                image_name,
                timestamp,
                error,
            } => {
                let mut record = serializer.serialize_struct("AnalysisResult", 5)?;
                record.serialize_field("success", &false)?;
                record.serialize_field("image_path", image_path)?;
                record.serialize_field("image_name", image_name)?;
                record.serialize_field("timestamp", timestamp)?;
                record.serialize_field("error", error)?;
                record.end()
            }
        }
    }
}

/// Flat on-disk shape of an [`AnalysisResult`]
#[derive(Deserialize)]
struct AnalysisRecord {
    success: bool,
    image_path: String,
    image_name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Local>,
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tokens_used: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<AnalysisRecord> for AnalysisResult {
    type Error = ArgusError;

    fn try_from(record: AnalysisRecord) -> Result<Self> {
        if record.success {
            let analysis = record
                .analysis
                .ok_or_else(|| ArgusError::InvalidRecord("missing field `analysis`".to_string()))?;
            let model = record
                .model
                .ok_or_else(|| ArgusError::InvalidRecord("missing field `model`".to_string()))?;
            Ok(Self::Success {
                image_path: record.image_path,
                image_name: record.image_name,
                timestamp: record.timestamp,
                analysis,
                model,
                tokens_used: record.tokens_used,
            })
        } else {
            let error = record
                .error
                .ok_or_else(|| ArgusError::InvalidRecord("missing field `error`".to_string()))?;
            Ok(Self::Failure {
                image_path: record.image_path,
                image_name: record.image_name,
                timestamp: record.timestamp,
                error,
            })
        }
    }
}

/// RFC 3339, or an ISO 8601 local time without offset (`2025-01-01T12:00:00.123456`)
fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Local>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid timestamp '{}'", raw))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Read an image and encode it as standard base64
pub fn encode_image(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    Ok(general_purpose::STANDARD.encode(&data))
}

/// MIME type for an image path, defaulting to JPEG
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::path::PathBuf;

    #[test]
    fn test_record_without_offset_reads_as_local_time() {
        let json = r#"{
            "success": true,
            "image_path": "/in/old.jpg",
            "image_name": "old.jpg",
            "timestamp": "2025-01-01T12:00:00.123456",
            "analysis": "From a previous install",
            "model": "gpt-4o",
            "tokens_used": 12
        }"#;

        let parsed: AnalysisResult = serde_json::from_str(json).unwrap();
        let expected = NaiveDateTime::parse_from_str("2025-01-01T12:00:00.123456", "%Y-%m-%dT%H:%M:%S%.f")
            .unwrap();
        assert_eq!(parsed.timestamp().naive_local(), expected);
        assert_eq!(parsed.image_name(), "old.jpg");

        let no_fraction: AnalysisResult = serde_json::from_str(
            &json.replace("2025-01-01T12:00:00.123456", "2025-01-01T12:00:00"),
        )
        .unwrap();
        assert_eq!(no_fraction.timestamp().naive_local(), expected.with_nanosecond(0).unwrap());
    }

    #[test]
    fn test_record_with_unparseable_timestamp_is_rejected() {
        let json = r#"{"success": false, "image_path": "a", "image_name": "a", "timestamp": "yesterday", "error": "x"}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_mime_type_table() {
        assert_eq!(mime_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.JPEG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("a.gif")), "image/gif");
        assert_eq!(mime_type_for(Path::new("a.bmp")), "image/bmp");
        assert_eq!(mime_type_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type_for(Path::new("a.tiff")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("noext")), "image/jpeg");
    }

    #[test]
    fn test_encode_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(encode_image(&path).unwrap(), "aGVsbG8=");
        assert!(encode_image(&dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_success_record_shape() {
        let path = PathBuf::from("/data/in/photo1.jpg");
        let result = AnalysisResult::success(&path, at(), "gpt-4o", "A harbour at dawn.", Some(812));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["image_path"], "/data/in/photo1.jpg");
        assert_eq!(value["image_name"], "photo1.jpg");
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["tokens_used"], 812);
        assert!(value.get("error").is_none());

        let text = serde_json::to_string(&result).unwrap();
        let keys: Vec<usize> = ["\"success\"", "\"image_path\"", "\"image_name\"", "\"timestamp\"", "\"analysis\""]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_local_success_has_null_tokens() {
        let result = AnalysisResult::success(Path::new("b.png"), at(), "ollama/llava", "text", None);
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["tokens_used"].is_null());
        assert!(value.as_object().unwrap().contains_key("tokens_used"));
    }

    #[test]
    fn test_round_trip_preserves_non_ascii() {
        let result = AnalysisResult::success(
            Path::new("/srv/фото/café.webp"),
            at(),
            "gpt-4o",
            "Ein Straßencafé, 東京 - «très» lumineux ☀",
            Some(42),
        );
        let json = serde_json::to_string_pretty(&result).unwrap();
        assert!(json.contains("東京"));

        let parsed: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_failure_round_trip() {
        let result = AnalysisResult::failure(Path::new("c.gif"), at(), "Backend error: timeout");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Backend error: timeout");
        assert!(value.get("analysis").is_none());
        assert!(value.get("model").is_none());

        let parsed: AnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, result);
        assert_eq!(parsed.error(), Some("Backend error: timeout"));
    }

    #[test]
    fn test_incomplete_record_rejected() {
        let json = r#"{"success": true, "image_path": "a.jpg", "image_name": "a.jpg",
                       "timestamp": "2025-03-14T09:26:53+00:00"}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }
}
