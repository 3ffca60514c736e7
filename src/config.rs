use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the moto-publisher pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Video and subtitle download settings
    pub fetch: FetchConfig,

    /// Screenshot / clip / watermark settings
    pub media: MediaConfig,

    /// Timestamp matching thresholds
    pub matching: MatchingConfig,

    /// Article composition settings
    pub article: ArticleConfig,

    /// WeChat Official Account API settings
    pub wechat: WeChatConfig,

    /// Output directory layout
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Target quality: "720p" or "1080p"
    pub quality: String,

    /// Cookies file passed to the downloader
    pub cookies_path: PathBuf,

    /// Subtitle languages to fetch, in preference order
    pub subtitle_languages: Vec<String>,

    /// Downloader binary name
    pub ytdlp_bin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// JPEG quality for stills (1-31, lower is better)
    pub screenshot_quality: u32,

    /// Output width for clips, in pixels
    pub gif_width: u32,

    /// Frame rate for clips
    pub gif_fps: u32,

    /// Use the two-pass palette encode for clips
    pub gif_use_palette: bool,

    /// Watermark text drawn on every asset
    pub watermark_text: String,

    /// Watermark placement
    pub watermark_position: WatermarkPosition,

    /// Watermark font size in points
    pub watermark_font_size: u32,

    /// Watermark opacity (0.0-1.0)
    pub watermark_opacity: f64,

    /// Transcoder binary names
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Candidates closer than this merge into one group (seconds)
    pub merge_gap_seconds: f64,

    /// Spans longer than this become clips instead of stills (seconds)
    pub clip_threshold_seconds: f64,

    /// Asset-to-moment matching tolerance (seconds)
    pub asset_tolerance_seconds: f64,

    /// Keyword cap per technique
    pub max_keywords: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleConfig {
    /// Author byline for drafts
    pub author: String,

    /// Generator label stamped into article footers
    pub generator: String,

    /// Formats to emit
    pub formats: Vec<ArticleFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleFormat {
    Html,
    Markdown,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeChatConfig {
    /// Official Account credentials
    pub app_id: String,
    pub app_secret: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Upload ceiling for animated media, in megabytes
    pub gif_size_limit_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory
    pub base_dir: PathBuf,

    /// Subdirectory names under the base
    pub videos_subdir: String,
    pub media_subdir: String,
    pub articles_subdir: String,

    /// Write the JSON analysis dump next to the articles
    pub save_analysis: bool,
}

impl Config {
    /// Load configuration from the first parseable candidate file,
    /// falling back to environment variables.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "moto-publisher.toml",
            "config/moto-publisher.toml",
            "~/.config/moto-publisher/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::default().with_env_overrides())
    }

    /// Apply `MOTO_PUBLISHER_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(quality) = std::env::var("MOTO_PUBLISHER_QUALITY") {
            self.fetch.quality = quality;
        }
        if let Ok(app_id) = std::env::var("MOTO_PUBLISHER_WECHAT_APP_ID") {
            self.wechat.app_id = app_id;
        }
        if let Ok(secret) = std::env::var("MOTO_PUBLISHER_WECHAT_APP_SECRET") {
            self.wechat.app_secret = secret;
        }
        if let Ok(output_dir) = std::env::var("MOTO_PUBLISHER_OUTPUT_DIR") {
            self.output.base_dir = PathBuf::from(output_dir);
        }
        if let Ok(text) = std::env::var("MOTO_PUBLISHER_WATERMARK") {
            self.media.watermark_text = text;
        }
        self
    }

    /// Save configuration to file.
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration. `publishing` adds the credential checks
    /// only draft submission needs.
    pub fn validate(&self, publishing: bool) -> Result<()> {
        if self.matching.merge_gap_seconds <= 0.0 {
            return Err(anyhow!("merge_gap_seconds must be positive"));
        }
        if self.matching.clip_threshold_seconds <= 0.0 {
            return Err(anyhow!("clip_threshold_seconds must be positive"));
        }
        if self.matching.asset_tolerance_seconds <= 0.0 {
            return Err(anyhow!("asset_tolerance_seconds must be positive"));
        }
        if self.media.screenshot_quality == 0 || self.media.screenshot_quality > 31 {
            return Err(anyhow!("screenshot_quality must be in 1..=31"));
        }
        if !(0.0..=1.0).contains(&self.media.watermark_opacity) {
            return Err(anyhow!("watermark_opacity must be in 0.0..=1.0"));
        }
        if self.fetch.quality != "720p" && self.fetch.quality != "1080p" {
            return Err(anyhow!("unsupported quality: {}", self.fetch.quality));
        }
        if publishing && (self.wechat.app_id.is_empty() || self.wechat.app_secret.is_empty()) {
            return Err(anyhow!("WeChat app_id/app_secret required for publishing"));
        }
        Ok(())
    }

    /// Get runtime configuration summary.
    pub fn summary(&self) -> String {
        format!(
            "moto-publisher configuration:\n\
            - Quality: {}\n\
            - Subtitle languages: {}\n\
            - Clip: {}px @ {}fps (palette: {})\n\
            - Watermark: \"{}\"\n\
            - Output directory: {}",
            self.fetch.quality,
            self.fetch.subtitle_languages.join(", "),
            self.media.gif_width,
            self.media.gif_fps,
            self.media.gif_use_palette,
            self.media.watermark_text,
            self.output.base_dir.display(),
        )
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.output.base_dir.join(&self.output.videos_subdir)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.output.base_dir.join(&self.output.media_subdir)
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.output.base_dir.join(&self.output.articles_subdir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig {
                quality: "720p".to_string(),
                cookies_path: PathBuf::from("cookies.txt"),
                subtitle_languages: vec![
                    "en".to_string(),
                    "zh-Hans".to_string(),
                    "zh-Hant".to_string(),
                ],
                ytdlp_bin: "yt-dlp".to_string(),
            },
            media: MediaConfig {
                screenshot_quality: 2,
                gif_width: 480,
                gif_fps: 10,
                gif_use_palette: true,
                watermark_text: "FreeSoloDirtbike".to_string(),
                watermark_position: WatermarkPosition::BottomLeft,
                watermark_font_size: 16,
                watermark_opacity: 0.7,
                ffmpeg_bin: "ffmpeg".to_string(),
                ffprobe_bin: "ffprobe".to_string(),
            },
            matching: MatchingConfig::default(),
            article: ArticleConfig {
                author: "MotoPublisher".to_string(),
                generator: "moto-publisher".to_string(),
                formats: vec![
                    ArticleFormat::Html,
                    ArticleFormat::Markdown,
                    ArticleFormat::Text,
                ],
            },
            wechat: WeChatConfig {
                app_id: String::new(),
                app_secret: String::new(),
                base_url: "https://api.weixin.qq.com/cgi-bin".to_string(),
                timeout_seconds: 60,
                gif_size_limit_mb: 1.8,
            },
            output: OutputConfig {
                base_dir: PathBuf::from("./output"),
                videos_subdir: "videos".to_string(),
                media_subdir: "media".to_string(),
                articles_subdir: "articles".to_string(),
                save_analysis: true,
            },
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            merge_gap_seconds: 3.0,
            clip_threshold_seconds: 3.0,
            asset_tolerance_seconds: 1.0,
            max_keywords: 10,
        }
    }
}

/// Configuration builder for programmatic config creation.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.config.fetch.quality = quality.into();
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_watermark(mut self, text: impl Into<String>) -> Self {
        self.config.media.watermark_text = text.into();
        self
    }

    pub fn with_wechat_credentials(
        mut self,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        self.config.wechat.app_id = app_id.into();
        self.config.wechat.app_secret = app_secret.into();
        self
    }

    pub fn with_merge_gap(mut self, seconds: f64) -> Self {
        self.config.matching.merge_gap_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.matching.merge_gap_seconds, 3.0);
        assert_eq!(config.media.gif_width, 480);
        assert_eq!(config.fetch.quality, "720p");
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_publishing_requires_credentials() {
        let config = Config::default();
        assert!(config.validate(true).is_err());

        let config = ConfigBuilder::new()
            .with_wechat_credentials("wx123", "secret")
            .build();
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_quality("1080p")
            .with_watermark("TrailNotes")
            .with_merge_gap(2.5)
            .build();

        assert_eq!(config.fetch.quality, "1080p");
        assert_eq!(config.media.watermark_text, "TrailNotes");
        assert_eq!(config.matching.merge_gap_seconds, 2.5);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.matching.merge_gap_seconds = 0.0;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.media.screenshot_quality = 40;
        assert!(config.validate(false).is_err());

        let mut config = Config::default();
        config.fetch.quality = "480p".to_string();
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.media.gif_fps, config.media.gif_fps);
        assert_eq!(parsed.wechat.base_url, config.wechat.base_url);
    }

    #[test]
    fn test_output_dirs() {
        let config = ConfigBuilder::new()
            .with_output_dir(PathBuf::from("/tmp/out"))
            .build();
        assert_eq!(config.media_dir(), PathBuf::from("/tmp/out/media"));
        assert_eq!(config.articles_dir(), PathBuf::from("/tmp/out/articles"));
    }
}
