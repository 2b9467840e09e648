//! Document normalizer.
//!
//! Turns source records into [`CanonicalDocument`]s. The dump and stream
//! variants live in their own modules; this one holds the shared pieces.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::instrument;

use crate::errors::PipelineError;
use crate::processor::thumbnail::{self, ThumbnailConfig};
use media_indexer_shared::{CanonicalDocument, SourceRecord};

/// Placeholder some dumps carry instead of image data.
const NO_IMAGE: &str = "NO_IMAGE";

/// How the normalizer treats `image_thumb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailPolicy {
    /// Regenerate the thumbnail from raw bytes, or from the existing thumbnail.
    #[default]
    Redo,
    /// Keep an existing thumbnail, otherwise generate one from raw bytes.
    IfMissing,
    /// Pass any existing thumbnail through untouched.
    Ignore,
}

impl FromStr for ThumbnailPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redo" => Ok(Self::Redo),
            "if-missing" | "if_missing" => Ok(Self::IfMissing),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown thumbnail policy: {other}")),
        }
    }
}

/// Configuration for the normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerConfig {
    pub thumbnail: ThumbnailConfig,
    pub policy: ThumbnailPolicy,
}

/// Normalizer that turns source records into canonical documents.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize any source record.
    ///
    /// Returns `Ok(None)` for stream events that are not artifacts.
    #[instrument(skip_all)]
    pub fn normalize(&self, record: SourceRecord) -> Result<Option<CanonicalDocument>, PipelineError> {
        match record {
            SourceRecord::Dump(record) => self.normalize_dump(record).map(Some),
            SourceRecord::Stream(event) => self.normalize_event(&event),
        }
    }

    /// Apply the thumbnail policy.
    ///
    /// `raw` is full-size image data, `existing` a thumbnail the record
    /// already carries. Both are data URLs.
    pub(crate) fn ensure_thumbnail(
        &self,
        id: &str,
        raw: Option<&str>,
        existing: Option<String>,
    ) -> Result<Option<String>, PipelineError> {
        let raw = raw.filter(|r| *r != NO_IMAGE);
        let existing = existing.filter(|e| e != NO_IMAGE);

        match self.config.policy {
            ThumbnailPolicy::Ignore => Ok(existing),
            ThumbnailPolicy::Redo => match (raw, existing) {
                (Some(raw), _) => self.shrink(raw).map(Some),
                (None, Some(existing)) => self.shrink(&existing).map(Some),
                (None, None) => Err(PipelineError::ThumbnailUnavailable(id.to_string())),
            },
            ThumbnailPolicy::IfMissing => match (existing, raw) {
                (Some(existing), _) => Ok(Some(existing)),
                (None, Some(raw)) => self.shrink(raw).map(Some),
                (None, None) => Err(PipelineError::ThumbnailUnavailable(id.to_string())),
            },
        }
    }

    fn shrink(&self, data_url: &str) -> Result<String, PipelineError> {
        let bytes = thumbnail::decode(data_url)?;
        thumbnail::shrink_and_encode(
            &bytes,
            self.config.thumbnail.max_width,
            self.config.thumbnail.max_height,
        )
    }
}

/// Parse a source timestamp.
///
/// Accepts RFC 3339, naive ISO-8601 date-times (taken as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(PipelineError::normalization(format!(
        "unparseable timestamp {raw:?}"
    )))
}
