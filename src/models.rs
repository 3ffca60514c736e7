use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::subtitles::format_timestamp;

/// A downloaded or locally supplied source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSource {
    pub video_id: String,
    pub url: Option<String>,
    pub title: String,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub local_path: PathBuf,
    /// Subtitle files keyed by language code.
    #[serde(default)]
    pub subtitle_paths: HashMap<String, PathBuf>,
    pub file_size_bytes: u64,
}

/// One named, described unit of riding instruction extracted from the
/// analysis report. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technique {
    pub name: String,
    pub description: String,
    /// Search keywords derived from the name and description.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Technique {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
        }
    }
}

/// A deduplicated group of subtitle cues that matched a technique's
/// keywords. Groups produced by the matcher are non-overlapping and
/// ordered by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampMatch {
    /// Every keyword that contributed a cue to this group, in
    /// first-contribution order, deduplicated.
    pub keywords: Vec<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub mid_seconds: f64,
    /// Text of the first matching cue in the group.
    pub text: String,
}

impl TimestampMatch {
    pub fn span_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// The group's time range in cue-timing notation.
    pub fn timing_label(&self) -> String {
        format!(
            "{} --> {}",
            format_timestamp(self.start_seconds),
            format_timestamp(self.end_seconds)
        )
    }
}

/// Matching outcome for a single technique. A technique without a
/// resolved group is still carried so callers can report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniqueMatch {
    pub technique: Technique,
    pub matched: Option<TimestampMatch>,
}

/// Kind of media generated for a key moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Single frame extracted at the timestamp.
    Still,
    /// Short animated clip covering the matched span.
    Clip,
}

impl MediaKind {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Still => "jpg",
            MediaKind::Clip => "gif",
        }
    }
}

/// A technique with a resolved timestamp and media-kind decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMoment {
    pub technique: String,
    pub timestamp_seconds: f64,
    pub description: String,
    pub media_kind: MediaKind,
    /// Clip length in seconds; only set for `MediaKind::Clip`.
    pub clip_duration_seconds: Option<f64>,
    /// At most one generated asset per moment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_asset: Option<MediaAsset>,
}

/// A generated media file, optionally uploaded to the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub local_path: PathBuf,
    pub timestamp_seconds: f64,
    pub description: String,
    pub size_bytes: u64,
    /// Remote identifier assigned by the media upload endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

/// Full analysis of one video: parsed report joined with matched
/// subtitle timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub video_id: String,
    pub title: String,
    pub summary: String,
    pub key_moments: Vec<KeyMoment>,
    /// Per-technique matching results, including unmatched techniques.
    pub techniques: Vec<TechniqueMatch>,
    #[serde(default)]
    pub metadata: AnalysisMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub total_techniques: usize,
    pub matched_timestamps: usize,
    pub subtitle_language: String,
    pub report_path: Option<PathBuf>,
    pub subtitle_path: Option<PathBuf>,
}
