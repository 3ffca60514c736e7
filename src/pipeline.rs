use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::analysis::ContentAnalyzer;
use crate::compose::ArticleComposer;
use crate::config::{ArticleFormat, Config};
use crate::fetcher::VideoFetcher;
use crate::media::{Ffmpeg, MediaProcessor};
use crate::models::{VideoAnalysis, VideoSource};
use crate::publisher::WeChatClient;

/// Inputs for one pipeline run. Exactly one of `url` / `video_path`
/// must be set.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub url: Option<String>,
    pub video_path: Option<PathBuf>,
    pub report_path: PathBuf,
    pub subtitle_path: Option<PathBuf>,
    pub publish: bool,
}

/// Summary of a completed run, serialized next to the articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub video_id: String,
    pub title: String,
    pub techniques_total: usize,
    pub techniques_matched: usize,
    pub assets_generated: usize,
    pub assets_failed: usize,
    pub article_paths: BTreeMap<ArticleFormat, PathBuf>,
    pub draft_media_id: Option<String>,
    pub elapsed: Duration,
}

/// Sequential pipeline: fetch -> analyze -> media -> compose ->
/// optional publish. Per-item failures inside a stage are logged and
/// skipped; only missing required inputs abort.
pub struct Pipeline {
    config: Config,
    fetcher: VideoFetcher,
    analyzer: ContentAnalyzer,
    media: MediaProcessor,
    composer: ArticleComposer,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let ffmpeg = Ffmpeg::new(&config.media);
        let fetcher = VideoFetcher::new(config.fetch.clone(), ffmpeg, config.videos_dir());
        let subtitle_language = config
            .fetch
            .subtitle_languages
            .first()
            .cloned()
            .unwrap_or_else(|| "en".to_string());
        let analyzer = ContentAnalyzer::new(&config.matching, subtitle_language);
        let media = MediaProcessor::new(config.media.clone());
        let composer = ArticleComposer::new(
            config.article.clone(),
            config.matching.asset_tolerance_seconds,
        );

        Self {
            config,
            fetcher,
            analyzer,
            media,
            composer,
        }
    }

    pub async fn run(&self, input: PipelineInput) -> Result<PipelineReport> {
        let start = Instant::now();

        info!("🚀 Pipeline starting");
        let (video, subtitle_path) = self.resolve_video(&input).await?;

        info!("🧭 Stage: analysis");
        let mut analysis = self
            .analyzer
            .analyze(&input.report_path, &subtitle_path, &video.video_id)
            .await?;

        if self.config.output.save_analysis {
            let analysis_path = self
                .config
                .articles_dir()
                .join(format!("{}_analysis.json", video.video_id));
            self.analyzer
                .save_analysis(&analysis, &analysis_path)
                .await?;
        }

        info!("🖼️ Stage: media generation");
        let media_dir = self.config.media_dir();
        let assets = self
            .media
            .generate_assets(&video.local_path, &analysis.key_moments, &media_dir)
            .await;
        let assets_failed = analysis.key_moments.len().saturating_sub(assets.len());

        info!("📝 Stage: article composition");
        let article_paths = self
            .composer
            .compose_all(&mut analysis, &assets, &self.config.articles_dir())
            .await?;

        let draft_media_id = if input.publish {
            info!("📮 Stage: publish draft");
            match self.publish(&analysis, &media_dir, &article_paths).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Publishing failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let report = PipelineReport {
            video_id: video.video_id.clone(),
            title: analysis.title.clone(),
            techniques_total: analysis.metadata.total_techniques,
            techniques_matched: analysis.metadata.matched_timestamps,
            assets_generated: assets.len(),
            assets_failed,
            article_paths,
            draft_media_id,
            elapsed: start.elapsed(),
        };

        let report_path = self
            .config
            .articles_dir()
            .join(format!("{}_pipeline.json", video.video_id));
        if let Ok(json) = serde_json::to_string_pretty(&report) {
            if let Err(e) = tokio::fs::write(&report_path, json).await {
                warn!("Could not write pipeline report: {}", e);
            }
        }

        info!(
            "🎉 Pipeline finished in {:.1}s ({} matched, {} assets)",
            report.elapsed.as_secs_f64(),
            report.techniques_matched,
            report.assets_generated
        );

        Ok(report)
    }

    /// Resolve the source video and subtitle file, downloading when a
    /// URL was given.
    async fn resolve_video(&self, input: &PipelineInput) -> Result<(VideoSource, PathBuf)> {
        let video = match (&input.video_path, &input.url) {
            (Some(path), _) => self.fetcher.describe_local(path).await?,
            (None, Some(url)) => {
                let mut video = self.fetcher.download_video(url).await?;
                video.subtitle_paths = self
                    .fetcher
                    .download_subtitles(url, &video.video_id)
                    .await?;
                video
            }
            (None, None) => return Err(anyhow!("either a video path or a URL is required")),
        };

        let subtitle_path = match &input.subtitle_path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("subtitle file not found: {}", path.display()));
                }
                path.clone()
            }
            None => self
                .config
                .fetch
                .subtitle_languages
                .iter()
                .find_map(|lang| video.subtitle_paths.get(lang).cloned())
                .ok_or_else(|| anyhow!("no subtitle file available; pass one explicitly"))?,
        };

        Ok((video, subtitle_path))
    }

    async fn publish(
        &self,
        analysis: &VideoAnalysis,
        media_dir: &std::path::Path,
        article_paths: &BTreeMap<ArticleFormat, PathBuf>,
    ) -> Result<String> {
        let html_path = article_paths
            .get(&ArticleFormat::Html)
            .ok_or_else(|| anyhow!("no HTML article was composed"))?;
        let html = tokio::fs::read_to_string(html_path).await?;

        let mut client = WeChatClient::new(self.config.wechat.clone());
        client.fetch_access_token().await?;

        let mapping = client.upload_media_dir(media_dir, &self.media).await;
        client
            .publish_draft(
                &analysis.title,
                &self.config.article.author,
                &html,
                &mapping,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[tokio::test]
    async fn test_run_requires_video_or_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .with_output_dir(dir.path().to_path_buf())
            .build();
        let pipeline = Pipeline::new(config);

        let err = pipeline
            .run(PipelineInput {
                url: None,
                video_path: None,
                report_path: dir.path().join("report.txt"),
                subtitle_path: None,
                publish: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("video path or a URL"));
    }

    #[tokio::test]
    async fn test_missing_subtitle_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip. [abc123xyz00].mp4");
        tokio::fs::write(&video, b"fake").await.unwrap();

        let config = ConfigBuilder::new()
            .with_output_dir(dir.path().to_path_buf())
            .build();
        let pipeline = Pipeline::new(config);

        let err = pipeline
            .run(PipelineInput {
                url: None,
                video_path: Some(video),
                report_path: dir.path().join("report.txt"),
                subtitle_path: Some(dir.path().join("missing.vtt")),
                publish: false,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("subtitle file not found"));
    }
}
