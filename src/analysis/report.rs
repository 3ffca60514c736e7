use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::Technique;

/// An inline time marker from the report, e.g. `**2:04** - hard on the
/// front brake`. Used as a preferred-time hint when matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeMarker {
    pub label: String,
    pub seconds: f64,
    pub description: String,
}

/// Structured contents of an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedReport {
    pub title: String,
    pub summary: String,
    pub techniques: Vec<Technique>,
    pub time_markers: Vec<TimeMarker>,
}

/// Parses semi-structured text reports into title, summary, technique
/// list and inline time markers.
pub struct ReportParser;

impl ReportParser {
    pub fn new() -> Self {
        Self
    }

    /// Check that a report file exists, has a supported extension and
    /// carries enough content to be worth parsing.
    pub async fn validate_report(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(anyhow!("Report file not found: {}", path.display()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if ext != "txt" && ext != "md" {
            return Err(anyhow!("Unsupported report format: .{}", ext));
        }

        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().len() < 50 {
            return Err(anyhow!("Report content too short: {}", path.display()));
        }

        Ok(())
    }

    pub async fn parse_file(&self, path: &Path) -> Result<ParsedReport> {
        let content = tokio::fs::read_to_string(path).await?;
        let report = self.parse(&content);
        info!(
            "📄 Parsed report: \"{}\" ({} techniques, {} time markers)",
            report.title,
            report.techniques.len(),
            report.time_markers.len()
        );
        Ok(report)
    }

    pub fn parse(&self, content: &str) -> ParsedReport {
        ParsedReport {
            title: self.extract_title(content),
            summary: self.extract_summary(content),
            techniques: self.extract_techniques(content),
            time_markers: self.extract_time_markers(content),
        }
    }

    fn extract_title(&self, content: &str) -> String {
        let patterns = [r"(?m)^#\s+(.+)$", r"(?m)^Title:\s*(.+)$"];

        for pattern in patterns {
            if let Ok(re) = Regex::new(pattern) {
                if let Some(caps) = re.captures(content) {
                    return caps[1].trim().to_string();
                }
            }
        }

        // Fall back to the first non-empty line
        content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("Untitled video")
            .to_string()
    }

    fn extract_summary(&self, content: &str) -> String {
        let patterns = [
            r"(?s)##\s*Summary\s*\n+(.*?)(\n##|\n\n|$)",
            r"(?s)Summary[:：]\s*\n+(.*?)(\n\n|$)",
        ];

        for pattern in patterns {
            if let Ok(re) = Regex::new(pattern) {
                if let Some(caps) = re.captures(content) {
                    let summary = caps[1].trim();
                    if !summary.is_empty() {
                        return collapse_blank_runs(summary);
                    }
                }
            }
        }

        // No dedicated section; take the leading prose
        let mut summary_lines = Vec::new();
        for line in content.lines().take(10) {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                summary_lines.push(line);
            }
            if summary_lines.join("\n").len() > 300 {
                break;
            }
        }

        let summary = summary_lines.join("\n");
        if summary.is_empty() {
            "No summary".to_string()
        } else {
            summary
        }
    }

    fn extract_techniques(&self, content: &str) -> Vec<Technique> {
        // `- **Name**: description` bullets
        let mut techniques = self.extract_listed_techniques(content, r"^[-*]\s+\*\*(.+?)\*\*[:：]\s*(.*)$");

        // `1. **Name**: description` numbered items
        if techniques.is_empty() {
            techniques = self.extract_listed_techniques(content, r"^\d+\.\s+\*\*(.+?)\*\*[:：]\s*(.*)$");
        }

        if techniques.is_empty() {
            warn!("No technique list found in report, falling back to term scan");
            techniques = self.fallback_technique_scan(content);
        }

        techniques
    }

    /// Line-wise list extraction: an item line starts a technique, and
    /// indented or plain continuation lines extend its description
    /// until the next item, heading or blank line.
    fn extract_listed_techniques(&self, content: &str, item_pattern: &str) -> Vec<Technique> {
        let Ok(item_re) = Regex::new(item_pattern) else {
            return Vec::new();
        };

        let mut techniques: Vec<Technique> = Vec::new();
        let mut current: Option<Technique> = None;

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(caps) = item_re.captures(trimmed) {
                if let Some(done) = current.take() {
                    techniques.push(done);
                }
                current = Some(Technique::new(caps[1].trim(), caps[2].trim()));
                continue;
            }

            match current.as_mut() {
                Some(tech) if !trimmed.is_empty() && !trimmed.starts_with('#') => {
                    // Flatten continuation lines into the description
                    if !tech.description.is_empty() {
                        tech.description.push(' ');
                    }
                    tech.description.push_str(trimmed);
                }
                Some(_) => {
                    if let Some(done) = current.take() {
                        techniques.push(done);
                    }
                }
                None => {}
            }
        }

        if let Some(done) = current.take() {
            techniques.push(done);
        }

        techniques
    }

    /// Last-resort extraction: scan for well-known riding terms when
    /// the report has no recognizable list structure.
    fn fallback_technique_scan(&self, content: &str) -> Vec<Technique> {
        let patterns = [
            r"(?i)(body position|weight transfer|braking|cornering|jumping|acceleration|clutch control|throttle control)",
            r"(?i)(front suspension|rear suspension|compression|rebound)",
            r"(?i)(line selection|apex|corner entry|corner exit|track standing)",
        ];

        let mut seen = Vec::new();
        for pattern in patterns {
            if let Ok(re) = Regex::new(pattern) {
                for caps in re.captures_iter(content) {
                    let term = caps[1].to_lowercase();
                    if !seen.contains(&term) {
                        seen.push(term);
                    }
                }
            }
        }

        seen.into_iter()
            .map(|term| {
                let mut tech = Technique::new(
                    title_case(&term),
                    format!("Instruction covering {}", term),
                );
                tech.keywords = vec![term];
                tech
            })
            .collect()
    }

    fn extract_time_markers(&self, content: &str) -> Vec<TimeMarker> {
        let patterns = [
            r"\*\*(\d{1,2}:\d{2}(?::\d{2})?)\*\*\s*[-–—]\s*(.+)",
            r"^(\d{1,2}:\d{2}(?::\d{2})?)\s*[-–—]\s*(.+)",
            r"(?i)at\s+(\d{1,2}:\d{2}(?::\d{2})?)[:：]\s*(.+)",
        ];
        let regexes: Vec<Regex> = patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let mut markers = Vec::new();
        for line in content.lines() {
            let trimmed = line.trim();
            let unbulleted = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .unwrap_or(trimmed);
            // First pattern wins per line, so a bold marker is not
            // also counted by the plain form.
            for re in &regexes {
                if let Some(caps) = re.captures(unbulleted) {
                    let label = caps[1].to_string();
                    match clock_to_seconds(&label) {
                        Ok(seconds) => markers.push(TimeMarker {
                            label,
                            seconds,
                            description: caps[2].trim().to_string(),
                        }),
                        Err(e) => debug!("Ignoring time marker \"{}\": {}", label, e),
                    }
                    break;
                }
            }
        }

        markers.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));
        markers
    }
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a `M:SS` or `H:MM:SS` clock string to seconds.
pub fn clock_to_seconds(clock: &str) -> Result<f64> {
    let parts: Vec<&str> = clock.split(':').collect();
    match parts.as_slice() {
        [m, s] => {
            let minutes: u64 = m.parse()?;
            let seconds: f64 = s.parse()?;
            Ok(minutes as f64 * 60.0 + seconds)
        }
        [h, m, s] => {
            let hours: u64 = h.parse()?;
            let minutes: u64 = m.parse()?;
            let seconds: f64 = s.parse()?;
            Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
        }
        _ => Err(anyhow!("Unrecognized clock format: {}", clock)),
    }
}

fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blanks = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blanks += 1;
            if blanks > 1 {
                continue;
            }
        } else {
            blanks = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

fn title_case(term: &str) -> String {
    term.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = "\
# Mastering Front Brake Control

## Summary

A deep dive into braking technique on loose terrain.
Covers modulation, weight transfer and common mistakes.

## Techniques

- **Front Brake Modulation**: progressive lever pressure keeps the front wheel from washing out.
- **Weight Transfer**: shift your hips back while braking hard to load the rear.

## Key Moments

- **2:04** - demonstration of trail braking into a rutted corner
- **5:30** - slow-motion replay of the front suspension compressing
";

    #[test]
    fn test_extract_title() {
        let parser = ReportParser::new();
        let report = parser.parse(SAMPLE_REPORT);
        assert_eq!(report.title, "Mastering Front Brake Control");
    }

    #[test]
    fn test_title_fallback_first_line() {
        let parser = ReportParser::new();
        let report = parser.parse("Just a plain first line\n\nMore text.");
        assert_eq!(report.title, "Just a plain first line");
    }

    #[test]
    fn test_extract_summary() {
        let parser = ReportParser::new();
        let report = parser.parse(SAMPLE_REPORT);
        assert!(report.summary.starts_with("A deep dive into braking technique"));
    }

    #[test]
    fn test_extract_bulleted_techniques() {
        let parser = ReportParser::new();
        let report = parser.parse(SAMPLE_REPORT);
        assert_eq!(report.techniques.len(), 2);
        assert_eq!(report.techniques[0].name, "Front Brake Modulation");
        assert!(report.techniques[1]
            .description
            .starts_with("shift your hips back"));
    }

    #[test]
    fn test_extract_numbered_techniques() {
        let parser = ReportParser::new();
        let content = "# T\n\n1. **Clutch Control**: feather the clutch on climbs.\n2. **Throttle Control**: roll on smoothly.\n";
        let report = parser.parse(content);
        assert_eq!(report.techniques.len(), 2);
        assert_eq!(report.techniques[1].name, "Throttle Control");
    }

    #[test]
    fn test_fallback_term_scan() {
        let parser = ReportParser::new();
        let content = "# T\n\nThis video is mostly about braking and cornering, \
with a short section on body position near the end of the lap.";
        let report = parser.parse(content);
        let names: Vec<&str> = report.techniques.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"Braking"));
        assert!(names.contains(&"Cornering"));
        assert!(names.contains(&"Body Position"));
    }

    #[test]
    fn test_extract_time_markers_sorted() {
        let parser = ReportParser::new();
        let report = parser.parse(SAMPLE_REPORT);
        assert_eq!(report.time_markers.len(), 2);
        assert_eq!(report.time_markers[0].label, "2:04");
        assert_eq!(report.time_markers[0].seconds, 124.0);
        assert_eq!(report.time_markers[1].seconds, 330.0);
    }

    #[test]
    fn test_time_marker_not_double_counted() {
        let parser = ReportParser::new();
        let report = parser.parse("# T\n\n- **1:30** - one marker only\n");
        assert_eq!(report.time_markers.len(), 1);
    }

    #[test]
    fn test_clock_to_seconds() {
        assert_eq!(clock_to_seconds("2:04").unwrap(), 124.0);
        assert_eq!(clock_to_seconds("1:05:30").unwrap(), 3930.0);
        assert!(clock_to_seconds("99").is_err());
    }

    #[tokio::test]
    async fn test_validate_report() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("report.txt");
        tokio::fs::write(&good, SAMPLE_REPORT).await.unwrap();
        let parser = ReportParser::new();
        assert!(parser.validate_report(&good).await.is_ok());

        let short = dir.path().join("short.txt");
        tokio::fs::write(&short, "tiny").await.unwrap();
        assert!(parser.validate_report(&short).await.is_err());

        let wrong_ext = dir.path().join("report.pdf");
        tokio::fs::write(&wrong_ext, SAMPLE_REPORT).await.unwrap();
        assert!(parser.validate_report(&wrong_ext).await.is_err());

        assert!(parser
            .validate_report(Path::new("/nonexistent/report.txt"))
            .await
            .is_err());
    }
}
