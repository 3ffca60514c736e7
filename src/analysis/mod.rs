pub mod keywords;
pub mod matcher;
pub mod report;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::MatchingConfig;
use crate::models::{AnalysisMetadata, KeyMoment, MediaKind, VideoAnalysis};
use crate::subtitles;

pub use keywords::KeywordGenerator;
pub use matcher::TimestampMatcher;
pub use report::{ParsedReport, ReportParser, TimeMarker};

/// Joins the parsed report with subtitle cues: derives keywords,
/// matches timestamps and builds the key-moment list.
pub struct ContentAnalyzer {
    parser: ReportParser,
    keyword_generator: KeywordGenerator,
    matcher: TimestampMatcher,
    clip_threshold_seconds: f64,
    subtitle_language: String,
}

impl ContentAnalyzer {
    pub fn new(config: &MatchingConfig, subtitle_language: impl Into<String>) -> Self {
        Self {
            parser: ReportParser::new(),
            keyword_generator: KeywordGenerator::new(config.max_keywords),
            matcher: TimestampMatcher::new(config.merge_gap_seconds),
            clip_threshold_seconds: config.clip_threshold_seconds,
            subtitle_language: subtitle_language.into(),
        }
    }

    /// Run the full analysis for one video.
    pub async fn analyze(
        &self,
        report_path: &Path,
        subtitle_path: &Path,
        video_id: &str,
    ) -> Result<VideoAnalysis> {
        info!("🧭 Analyzing report {} for video {}", report_path.display(), video_id);

        self.parser
            .validate_report(report_path)
            .await
            .context("report validation failed")?;

        let mut parsed = self.parser.parse_file(report_path).await?;
        for technique in &mut parsed.techniques {
            self.keyword_generator.ensure_keywords(technique);
        }

        let cues = subtitles::load_cues(subtitle_path).await?;
        if cues.is_empty() {
            warn!("Subtitle file {} has no cues", subtitle_path.display());
        }

        let matches = self
            .matcher
            .match_all(&parsed.techniques, &cues, &parsed.time_markers);

        let key_moments = self.build_key_moments(&matches);
        let matched = key_moments.len();

        let analysis = VideoAnalysis {
            video_id: video_id.to_string(),
            title: parsed.title,
            summary: parsed.summary,
            key_moments,
            metadata: AnalysisMetadata {
                total_techniques: matches.len(),
                matched_timestamps: matched,
                subtitle_language: self.subtitle_language.clone(),
                report_path: Some(report_path.to_path_buf()),
                subtitle_path: Some(subtitle_path.to_path_buf()),
            },
            techniques: matches,
        };

        info!(
            "✅ Analysis complete: \"{}\" ({}/{} techniques matched)",
            analysis.title, analysis.metadata.matched_timestamps, analysis.metadata.total_techniques
        );

        Ok(analysis)
    }

    /// A matched span longer than the clip threshold becomes a short
    /// clip covering the span; anything shorter becomes a still frame
    /// at the midpoint.
    fn build_key_moments(&self, matches: &[crate::models::TechniqueMatch]) -> Vec<KeyMoment> {
        let mut moments = Vec::new();

        for technique_match in matches {
            let Some(matched) = &technique_match.matched else {
                continue;
            };

            let span = matched.span_seconds();
            let media_kind = if span > self.clip_threshold_seconds {
                MediaKind::Clip
            } else {
                MediaKind::Still
            };

            moments.push(KeyMoment {
                technique: technique_match.technique.name.clone(),
                timestamp_seconds: matched.mid_seconds,
                description: technique_match.technique.description.clone(),
                media_kind,
                clip_duration_seconds: (media_kind == MediaKind::Clip).then_some(span),
                media_asset: None,
            });
        }

        moments
    }

    /// Dump the analysis to pretty-printed JSON for inspection.
    pub async fn save_analysis(&self, analysis: &VideoAnalysis, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(analysis)?;
        tokio::fs::write(path, json).await?;
        info!("💾 Analysis saved to {}", path.display());
        Ok(())
    }

    pub async fn load_analysis(&self, path: &Path) -> Result<VideoAnalysis> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read analysis {}", path.display()))?;
        let analysis = serde_json::from_str(&json)?;
        Ok(analysis)
    }
}
