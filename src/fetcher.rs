use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::media::Ffmpeg;
use crate::models::VideoSource;

/// Downloads videos and subtitles via yt-dlp and probes the result.
pub struct VideoFetcher {
    config: FetchConfig,
    ffmpeg: Ffmpeg,
    output_dir: PathBuf,
}

impl VideoFetcher {
    pub fn new(config: FetchConfig, ffmpeg: Ffmpeg, output_dir: PathBuf) -> Self {
        Self {
            config,
            ffmpeg,
            output_dir,
        }
    }

    /// Download the video at `url` and return its probed description.
    pub async fn download_video(&self, url: &str) -> Result<VideoSource> {
        Url::parse(url).with_context(|| format!("invalid video URL: {}", url))?;
        let video_id = extract_video_id(url)?;

        info!("⬇️ Downloading video {} ({})", video_id, self.config.quality);
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let format_spec = match self.config.quality.as_str() {
            "1080p" => "bestvideo[height<=1080]+bestaudio",
            _ => "bestvideo[height<=720]+bestaudio",
        };
        let output_template = self
            .output_dir
            .join("%(title)s. [%(id)s].%(ext)s")
            .to_string_lossy()
            .into_owned();
        let cookies = self.config.cookies_path.to_string_lossy().into_owned();

        let output = tokio::process::Command::new(&self.config.ytdlp_bin)
            .args([
                "--cookies",
                cookies.as_str(),
                "-f",
                format_spec,
                "--merge-output-format",
                "mp4",
                "-o",
                output_template.as_str(),
                url,
            ])
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.config.ytdlp_bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("video download failed: {}", stderr.trim()));
        }

        let local_path = self
            .find_downloaded_file(&video_id, "mp4")
            .await?
            .ok_or_else(|| anyhow!("downloaded video file not found for id {}", video_id))?;
        info!("✅ Downloaded: {}", local_path.display());

        self.describe_video(url, &video_id, &local_path).await
    }

    /// Download subtitles for each configured language. Per-language
    /// failures are logged and skipped.
    pub async fn download_subtitles(
        &self,
        url: &str,
        video_id: &str,
    ) -> Result<HashMap<String, PathBuf>> {
        info!(
            "⬇️ Downloading subtitles: {}",
            self.config.subtitle_languages.join(", ")
        );

        let output_template = self
            .output_dir
            .join("%(title)s. [%(id)s].%(ext)s")
            .to_string_lossy()
            .into_owned();
        let cookies = self.config.cookies_path.to_string_lossy().into_owned();
        let mut subtitle_paths = HashMap::new();

        for lang in &self.config.subtitle_languages {
            let result = tokio::process::Command::new(&self.config.ytdlp_bin)
                .args([
                    "--cookies",
                    cookies.as_str(),
                    "--write-subs",
                    "--write-auto-subs",
                    "--sub-langs",
                    lang.as_str(),
                    "--sub-format",
                    "vtt",
                    "--skip-download",
                    "-o",
                    output_template.as_str(),
                    url,
                ])
                .output()
                .await;

            match result {
                Ok(output) if output.status.success() => {
                    let suffix = format!("{}.vtt", lang);
                    match self.find_downloaded_file(video_id, &suffix).await? {
                        Some(path) => {
                            info!("  ✓ {} subtitles: {}", lang, path.display());
                            subtitle_paths.insert(lang.clone(), path);
                        }
                        None => warn!("  ✗ No {} subtitle file produced", lang),
                    }
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!("  ✗ {} subtitle download failed: {}", lang, stderr.trim());
                }
                Err(e) => warn!("  ✗ {} subtitle download failed: {}", lang, e),
            }
        }

        Ok(subtitle_paths)
    }

    /// Describe a video file that is already on disk.
    pub async fn describe_local(&self, path: &Path) -> Result<VideoSource> {
        if !path.exists() {
            return Err(anyhow!("video file not found: {}", path.display()));
        }

        let video_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| bracketed_id(s))
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "local".to_string())
            });

        self.describe_video("", &video_id, path).await
    }

    async fn describe_video(
        &self,
        url: &str,
        video_id: &str,
        local_path: &Path,
    ) -> Result<VideoSource> {
        let (width, height, duration) = match self.ffmpeg.probe(local_path).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Probe failed for {}: {}", local_path.display(), e);
                (1280, 720, 0.0)
            }
        };

        let file_size_bytes = tokio::fs::metadata(local_path).await?.len();
        let title = title_from_filename(local_path, video_id);

        debug!(
            "Video {}: {}x{}, {:.1}s, {} bytes",
            video_id, width, height, duration, file_size_bytes
        );

        Ok(VideoSource {
            video_id: video_id.to_string(),
            url: (!url.is_empty()).then(|| url.to_string()),
            title,
            duration_seconds: duration,
            width,
            height,
            local_path: local_path.to_path_buf(),
            subtitle_paths: HashMap::new(),
            file_size_bytes,
        })
    }

    /// Find the file the downloader produced for this id: the output
    /// template always embeds `[<id>]` in the name.
    async fn find_downloaded_file(&self, video_id: &str, suffix: &str) -> Result<Option<PathBuf>> {
        let marker = format!("[{}]", video_id);
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(&marker) && name.ends_with(suffix) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

/// Extract the 11-character video id from a YouTube-style URL.
pub fn extract_video_id(url: &str) -> Result<String> {
    let patterns = [
        r"[?&]v=([0-9A-Za-z_-]{11})",
        r"embed/([0-9A-Za-z_-]{11})",
        r"youtu\.be/([0-9A-Za-z_-]{11})",
    ];

    for pattern in patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(url) {
                return Ok(caps[1].to_string());
            }
        }
    }

    Err(anyhow!("cannot extract video id from URL: {}", url))
}

/// `My Ride. [abc123xyz00].mp4` -> `My Ride`.
fn title_from_filename(path: &Path, video_id: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.replace(&format!(". [{}]", video_id), "")
        .replace(&format!("[{}]", video_id), "")
        .trim()
        .trim_end_matches('.')
        .to_string()
}

fn bracketed_id(stem: &str) -> Option<String> {
    let re = Regex::new(r"\[([0-9A-Za-z_-]{11})\]").ok()?;
    re.captures(stem).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_variants() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=abc123xyz00").unwrap(),
            "abc123xyz00"
        );
        assert_eq!(
            extract_video_id("https://youtu.be/abc123xyz00").unwrap(),
            "abc123xyz00"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/abc123xyz00?t=10").unwrap(),
            "abc123xyz00"
        );
        assert!(extract_video_id("https://example.com/nothing-here").is_err());
    }

    #[test]
    fn test_title_from_filename() {
        let path = Path::new("/videos/Front Brake Clinic. [abc123xyz00].mp4");
        assert_eq!(title_from_filename(path, "abc123xyz00"), "Front Brake Clinic");
    }

    #[test]
    fn test_bracketed_id() {
        assert_eq!(
            bracketed_id("Some title. [abc123xyz00]"),
            Some("abc123xyz00".to_string())
        );
        assert_eq!(bracketed_id("no id here"), None);
    }

    #[tokio::test]
    async fn test_find_downloaded_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Clinic. [abc123xyz00].mp4");
        let subs = dir.path().join("Clinic. [abc123xyz00].en.vtt");
        tokio::fs::write(&video, b"v").await.unwrap();
        tokio::fs::write(&subs, b"s").await.unwrap();

        let fetcher = VideoFetcher::new(
            crate::config::Config::default().fetch,
            Ffmpeg::new(&crate::config::Config::default().media),
            dir.path().to_path_buf(),
        );

        let found = fetcher
            .find_downloaded_file("abc123xyz00", "mp4")
            .await
            .unwrap();
        assert_eq!(found, Some(video));

        let found = fetcher
            .find_downloaded_file("abc123xyz00", "en.vtt")
            .await
            .unwrap();
        assert_eq!(found, Some(subs));

        let found = fetcher
            .find_downloaded_file("otheridxxxx", "mp4")
            .await
            .unwrap();
        assert_eq!(found, None);
    }
}
