use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// One subtitle entry: a start time, end time, and associated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text: text.into(),
        }
    }

    pub fn mid_seconds(&self) -> f64 {
        (self.start_seconds + self.end_seconds) / 2.0
    }
}

/// Load and parse a WebVTT (or SRT) subtitle file.
pub async fn load_cues(path: &Path) -> Result<Vec<SubtitleCue>> {
    if !path.exists() {
        return Err(anyhow!("Subtitle file not found: {}", path.display()));
    }
    let content = tokio::fs::read_to_string(path).await?;
    let cues = parse_cues(&content);
    debug!("Parsed {} cues from {}", cues.len(), path.display());
    Ok(cues)
}

/// Parse subtitle content into cues.
///
/// A cue is a timing line (`HH:MM:SS.mmm --> HH:MM:SS.mmm`, comma
/// accepted as the millisecond separator) followed by text lines up to
/// the next blank line or timing line. Header lines, numeric cue ids
/// and inline styling tags are ignored. Malformed timing lines are
/// skipped, never fatal.
pub fn parse_cues(content: &str) -> Vec<SubtitleCue> {
    let timing = timing_regex();
    let tag = Regex::new(r"<[^>]+>").expect("valid tag pattern");

    let lines: Vec<&str> = content.lines().collect();
    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        let Some(caps) = timing.captures(line) else {
            i += 1;
            continue;
        };

        let start = parse_timestamp(&caps[1]);
        let end = parse_timestamp(&caps[2]);
        let (start, end) = match (start, end) {
            (Ok(s), Ok(e)) => (s, e),
            _ => {
                warn!("Skipping malformed timing line: {}", line);
                i += 1;
                continue;
            }
        };

        let mut text_lines = Vec::new();
        let mut j = i + 1;
        while j < lines.len() {
            let text = lines[j].trim();
            if text.is_empty() || timing.is_match(text) {
                break;
            }
            text_lines.push(tag.replace_all(text, "").into_owned());
            j += 1;
        }

        let text = text_lines.join(" ").trim().to_string();
        if !text.is_empty() {
            cues.push(SubtitleCue::new(start, end, text));
        }
        i = j.max(i + 1);
    }

    cues
}

fn timing_regex() -> Regex {
    Regex::new(r"(\d{1,2}:\d{2}:\d{2}[.,]\d{3})\s*-->\s*(\d{1,2}:\d{2}:\d{2}[.,]\d{3})")
        .expect("valid timing pattern")
}

/// Parse a `HH:MM:SS.mmm` timestamp into seconds. The SRT comma form
/// is accepted too.
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let normalized = timestamp.replace(',', ".");
    let (hms, millis) = normalized
        .split_once('.')
        .ok_or_else(|| anyhow!("Invalid timestamp: {}", timestamp))?;

    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return Err(anyhow!("Invalid timestamp: {}", timestamp));
    }

    let hours: u64 = parts[0].parse()?;
    let minutes: u64 = parts[1].parse()?;
    let seconds: u64 = parts[2].parse()?;
    let millis: u64 = millis.parse()?;

    Ok((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

/// Format seconds as a `HH:MM:SS.mmm` timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
