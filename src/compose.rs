use anyhow::Result;
use chrono::Local;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ArticleConfig, ArticleFormat};
use crate::models::{MediaAsset, MediaKind, VideoAnalysis};

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Renders matched techniques and media into article files.
pub struct ArticleComposer {
    config: ArticleConfig,
    asset_tolerance_seconds: f64,
}

impl ArticleComposer {
    pub fn new(config: ArticleConfig, asset_tolerance_seconds: f64) -> Self {
        Self {
            config,
            asset_tolerance_seconds,
        }
    }

    /// Attach generated assets to their key moments by timestamp
    /// proximity; first asset within tolerance wins. Returns the
    /// number of moments that got an asset.
    pub fn attach_assets(&self, analysis: &mut VideoAnalysis, assets: &[MediaAsset]) -> usize {
        let mut matched = 0;

        for moment in &mut analysis.key_moments {
            let hit = assets.iter().find(|asset| {
                (asset.timestamp_seconds - moment.timestamp_seconds).abs()
                    < self.asset_tolerance_seconds
            });
            if let Some(asset) = hit {
                debug!("Attached {} -> {}", moment.technique, asset.local_path.display());
                moment.media_asset = Some(asset.clone());
                matched += 1;
            }
        }

        info!(
            "🔗 Attached media to {}/{} key moments",
            matched,
            analysis.key_moments.len()
        );
        matched
    }

    /// WeChat-ready HTML with inline CSS only. Media references use
    /// `src="media/<file>"` so the publisher can rewrite them to
    /// uploaded media ids.
    pub fn render_html(&self, analysis: &VideoAnalysis) -> String {
        let mut html = String::new();

        html.push_str("<section style=\"font-size:16px;line-height:1.8;color:#333;\">\n");
        let _ = writeln!(
            html,
            "<h1 style=\"font-size:22px;border-bottom:2px solid #e33;padding-bottom:8px;\">{}</h1>",
            escape_html(&analysis.title)
        );

        if !analysis.summary.is_empty() {
            let _ = writeln!(
                html,
                "<p style=\"background:#f7f7f7;padding:12px;border-radius:6px;\">{}</p>",
                escape_html(&analysis.summary).replace('\n', "<br/>")
            );
        }

        for (i, moment) in analysis.key_moments.iter().enumerate() {
            let _ = writeln!(
                html,
                "<h2 style=\"font-size:18px;margin-top:24px;\">{}. {}</h2>",
                i + 1,
                escape_html(&moment.technique)
            );

            if let Some(asset) = &moment.media_asset {
                let file_name = asset
                    .local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let _ = writeln!(
                    html,
                    "<p style=\"text-align:center;\"><img src=\"media/{}\" style=\"max-width:100%;\" alt=\"{}\"/></p>",
                    file_name,
                    escape_html(&moment.technique)
                );
            }

            let _ = writeln!(html, "<p>{}</p>", escape_html(&moment.description));

            let label = match moment.media_kind {
                MediaKind::Clip => "clip",
                MediaKind::Still => "frame",
            };
            let _ = writeln!(
                html,
                "<p style=\"color:#999;font-size:13px;\">⏱ {:.0}s · {}</p>",
                moment.timestamp_seconds, label
            );
        }

        let _ = writeln!(
            html,
            "<p style=\"color:#bbb;font-size:12px;margin-top:32px;\">Generated by {} · {}</p>",
            escape_html(&self.config.generator),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        html.push_str("</section>\n");

        html
    }

    pub fn render_markdown(&self, analysis: &VideoAnalysis) -> String {
        let mut md = String::new();

        let _ = writeln!(md, "# {}\n", analysis.title);
        let _ = writeln!(md, "> Source video: {}\n", analysis.video_id);

        if !analysis.summary.is_empty() {
            let _ = writeln!(md, "{}\n", analysis.summary);
        }

        for (i, moment) in analysis.key_moments.iter().enumerate() {
            let _ = writeln!(md, "## {}. {}\n", i + 1, moment.technique);

            if let Some(asset) = &moment.media_asset {
                let file_name = asset
                    .local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let _ = writeln!(md, "![{}](media/{})\n", moment.technique, file_name);
            }

            let _ = writeln!(md, "{}\n", moment.description);
            let _ = writeln!(md, "*At {:.0}s*\n", moment.timestamp_seconds);
        }

        let _ = writeln!(
            md,
            "---\n\nGenerated by {} on {}",
            self.config.generator,
            Local::now().format("%Y-%m-%d")
        );

        md
    }

    /// Plain text rendition usable on any platform.
    pub fn render_plain(&self, analysis: &VideoAnalysis) -> String {
        let mut lines: Vec<String> = Vec::new();

        lines.push(analysis.title.clone());
        lines.push(String::new());
        lines.push(format!("Source: {}", analysis.video_id));
        lines.push(format!(
            "Generated: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        lines.push(String::new());
        lines.push(SEPARATOR.to_string());
        lines.push(String::new());

        if !analysis.summary.is_empty() {
            lines.push("Overview:".to_string());
            lines.push(String::new());
            lines.push(analysis.summary.clone());
            lines.push(String::new());
            lines.push(SEPARATOR.to_string());
            lines.push(String::new());
        }

        if !analysis.key_moments.is_empty() {
            lines.push("Key techniques:".to_string());
            lines.push(String::new());

            for (i, moment) in analysis.key_moments.iter().enumerate() {
                lines.push(format!("{}. {}", i + 1, moment.technique));
                lines.push(String::new());
                lines.push(format!("Time: {:.0}s", moment.timestamp_seconds));
                if let Some(duration) = moment.clip_duration_seconds {
                    lines.push(format!("Length: {:.1}s", duration));
                }
                lines.push(String::new());
                lines.push(
                    match moment.media_kind {
                        MediaKind::Clip => "[animated clip]",
                        MediaKind::Still => "[still frame]",
                    }
                    .to_string(),
                );
                lines.push(String::new());
                lines.push(moment.description.clone());
                lines.push(String::new());
                lines.push(SEPARATOR.to_string());
                lines.push(String::new());
            }

            let clips = analysis
                .key_moments
                .iter()
                .filter(|m| m.media_kind == MediaKind::Clip)
                .count();
            lines.push("Statistics:".to_string());
            lines.push(String::new());
            lines.push(format!("• Techniques: {}", analysis.key_moments.len()));
            lines.push(format!("• Animated clips: {}", clips));
            lines.push(format!(
                "• Still frames: {}",
                analysis.key_moments.len() - clips
            ));
            lines.push(String::new());
        }

        lines.push(SEPARATOR.to_string());
        lines.push(String::new());
        lines.push(format!("Generated by {}", self.config.generator));

        lines.join("\n")
    }

    /// Write every configured format under `articles_dir/<title>/` and
    /// return the path per format.
    pub async fn compose_all(
        &self,
        analysis: &mut VideoAnalysis,
        assets: &[MediaAsset],
        articles_dir: &Path,
    ) -> Result<BTreeMap<ArticleFormat, PathBuf>> {
        self.attach_assets(analysis, assets);

        let base = sanitize_filename(&analysis.title);
        let article_dir = articles_dir.join(&base);
        tokio::fs::create_dir_all(&article_dir).await?;

        let mut paths = BTreeMap::new();
        for format in &self.config.formats {
            let (content, file_name) = match format {
                ArticleFormat::Html => (self.render_html(analysis), format!("{}.html", base)),
                ArticleFormat::Markdown => (self.render_markdown(analysis), format!("{}.md", base)),
                ArticleFormat::Text => (self.render_plain(analysis), format!("{}.txt", base)),
            };

            let path = article_dir.join(file_name);
            tokio::fs::write(&path, &content).await?;
            info!("📝 Wrote {} ({:.1} KB)", path.display(), content.len() as f64 / 1024.0);
            paths.insert(*format, path);
        }

        Ok(paths)
    }
}

/// Strip characters that are illegal in file names and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect();

    sanitized.trim().chars().take(100).collect()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeyMoment, TechniqueMatch};

    fn sample_analysis() -> VideoAnalysis {
        VideoAnalysis {
            video_id: "abc123xyz00".to_string(),
            title: "Brake Clinic".to_string(),
            summary: "Braking fundamentals.".to_string(),
            key_moments: vec![
                KeyMoment {
                    technique: "Front Brake".to_string(),
                    timestamp_seconds: 33.5,
                    description: "Squeeze progressively.".to_string(),
                    media_kind: MediaKind::Clip,
                    clip_duration_seconds: Some(7.0),
                    media_asset: None,
                },
                KeyMoment {
                    technique: "Apex".to_string(),
                    timestamp_seconds: 120.0,
                    description: "Look through the corner.".to_string(),
                    media_kind: MediaKind::Still,
                    clip_duration_seconds: None,
                    media_asset: None,
                },
            ],
            techniques: Vec::<TechniqueMatch>::new(),
            metadata: Default::default(),
        }
    }

    fn asset(timestamp: f64, path: &str) -> MediaAsset {
        MediaAsset {
            kind: MediaKind::Clip,
            local_path: PathBuf::from(path),
            timestamp_seconds: timestamp,
            description: String::new(),
            size_bytes: 1024,
            media_id: None,
        }
    }

    fn composer() -> ArticleComposer {
        ArticleComposer::new(crate::config::Config::default().article, 1.0)
    }

    #[test]
    fn test_attach_assets_within_tolerance() {
        let composer = composer();
        let mut analysis = sample_analysis();
        let assets = vec![asset(33.8, "media/01_clip_33.500_wm.gif")];

        let matched = composer.attach_assets(&mut analysis, &assets);
        assert_eq!(matched, 1);
        assert!(analysis.key_moments[0].media_asset.is_some());
        assert!(analysis.key_moments[1].media_asset.is_none());
    }

    #[test]
    fn test_attach_assets_outside_tolerance() {
        let composer = composer();
        let mut analysis = sample_analysis();
        let assets = vec![asset(36.0, "media/far.gif")];

        let matched = composer.attach_assets(&mut analysis, &assets);
        assert_eq!(matched, 0);
    }

    #[test]
    fn test_html_media_reference_shape() {
        let composer = composer();
        let mut analysis = sample_analysis();
        composer.attach_assets(&mut analysis, &[asset(33.5, "/out/media/01_clip_wm.gif")]);

        let html = composer.render_html(&analysis);
        assert!(html.contains("src=\"media/01_clip_wm.gif\""));
        assert!(html.contains("<h1"));
        assert!(html.contains("Brake Clinic"));
        // Inline styles only
        assert!(!html.contains("<style"));
    }

    #[test]
    fn test_html_escapes_title() {
        let composer = composer();
        let mut analysis = sample_analysis();
        analysis.title = "Brakes <& more>".to_string();
        let html = composer.render_html(&analysis);
        assert!(html.contains("Brakes &lt;&amp; more&gt;"));
    }

    #[test]
    fn test_markdown_rendering() {
        let composer = composer();
        let analysis = sample_analysis();
        let md = composer.render_markdown(&analysis);
        assert!(md.starts_with("# Brake Clinic"));
        assert!(md.contains("## 1. Front Brake"));
        assert!(md.contains("*At 34s*") || md.contains("*At 33s*"));
    }

    #[test]
    fn test_plain_text_statistics() {
        let composer = composer();
        let analysis = sample_analysis();
        let text = composer.render_plain(&analysis);
        assert!(text.contains("• Techniques: 2"));
        assert!(text.contains("• Animated clips: 1"));
        assert!(text.contains("• Still frames: 1"));
        assert!(text.contains("[animated clip]"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
        let long = "x".repeat(150);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[tokio::test]
    async fn test_compose_all_writes_files() {
        let composer = composer();
        let mut analysis = sample_analysis();
        let dir = tempfile::tempdir().unwrap();

        let paths = composer
            .compose_all(&mut analysis, &[], dir.path())
            .await
            .unwrap();

        assert_eq!(paths.len(), 3);
        for path in paths.values() {
            assert!(path.exists());
        }
        assert!(paths[&ArticleFormat::Html]
            .to_string_lossy()
            .ends_with("Brake Clinic.html"));
    }
}
