pub mod ffmpeg;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::MediaConfig;
use crate::models::{KeyMoment, MediaAsset, MediaKind};

pub use ffmpeg::Ffmpeg;

/// Generates stills, clips and watermarks for key moments.
pub struct MediaProcessor {
    config: MediaConfig,
    ffmpeg: Ffmpeg,
}

impl MediaProcessor {
    pub fn new(config: MediaConfig) -> Self {
        let ffmpeg = Ffmpeg::new(&config);
        Self { config, ffmpeg }
    }

    /// Extract a single frame at the timestamp.
    pub async fn extract_still(
        &self,
        video: &Path,
        timestamp: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        info!("📷 Extracting still at {:.3}s -> {}", timestamp, output.display());

        let args = self.ffmpeg.screenshot_args(
            video,
            timestamp,
            output,
            self.config.screenshot_quality,
        );
        self.ffmpeg.run(&args).await?;
        self.verify_output(output).await
    }

    /// Render an animated clip for the given window. With palette mode
    /// on, a failed palette pass degrades to the one-pass encode.
    pub async fn render_clip(
        &self,
        video: &Path,
        start: f64,
        duration: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        info!(
            "🎬 Rendering clip {:.1}s +{:.1}s -> {}",
            start,
            duration,
            output.display()
        );

        let width = self.config.gif_width;
        let fps = self.config.gif_fps;

        if self.config.gif_use_palette {
            let palette = output.with_extension("palette.png");
            let palette_args = self
                .ffmpeg
                .palette_args(video, start, duration, &palette, width, fps);

            match self.ffmpeg.run(&palette_args).await {
                Ok(_) => {
                    let clip_args = self.ffmpeg.clip_with_palette_args(
                        video, start, duration, &palette, output, width, fps,
                    );
                    let result = self.ffmpeg.run(&clip_args).await;
                    let _ = tokio::fs::remove_file(&palette).await;
                    result?;
                }
                Err(e) => {
                    warn!("Palette pass failed ({}), using one-pass encode", e);
                    let args = self
                        .ffmpeg
                        .clip_plain_args(video, start, duration, output, width, fps);
                    self.ffmpeg.run(&args).await?;
                }
            }
        } else {
            let args = self
                .ffmpeg
                .clip_plain_args(video, start, duration, output, width, fps);
            self.ffmpeg.run(&args).await?;
        }

        self.verify_output(output).await
    }

    /// Overlay the configured watermark, writing a `_wm` sibling when
    /// no output path is given.
    pub async fn add_watermark(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => watermarked_sibling(input),
        };

        let args = self.ffmpeg.watermark_args(
            input,
            &output,
            &self.config.watermark_text,
            self.config.watermark_position,
            self.config.watermark_font_size,
            self.config.watermark_opacity,
        );
        self.ffmpeg.run(&args).await?;
        self.verify_output(&output).await
    }

    /// Produce one watermarked asset per key moment. A failed moment
    /// is logged and skipped; the batch always completes.
    pub async fn generate_assets(
        &self,
        video: &Path,
        moments: &[KeyMoment],
        media_dir: &Path,
    ) -> Vec<MediaAsset> {
        tokio::fs::create_dir_all(media_dir).await.ok();

        info!("🖼️ Generating media for {} key moments", moments.len());
        let mut assets = Vec::new();

        for (i, moment) in moments.iter().enumerate() {
            match self.generate_one(video, moment, media_dir, i + 1).await {
                Ok(asset) => assets.push(asset),
                Err(e) => {
                    warn!("✗ Media for \"{}\" failed: {}", moment.technique, e);
                }
            }
        }

        info!("✅ Generated {}/{} assets", assets.len(), moments.len());
        assets
    }

    async fn generate_one(
        &self,
        video: &Path,
        moment: &KeyMoment,
        media_dir: &Path,
        index: usize,
    ) -> Result<MediaAsset> {
        let ext = moment.media_kind.extension();
        let raw_path = media_dir.join(format!(
            "{:02}_{}_{:.3}.{}",
            index,
            match moment.media_kind {
                MediaKind::Still => "still",
                MediaKind::Clip => "clip",
            },
            moment.timestamp_seconds,
            ext
        ));

        match moment.media_kind {
            MediaKind::Still => {
                self.extract_still(video, moment.timestamp_seconds, &raw_path)
                    .await?;
            }
            MediaKind::Clip => {
                let duration = moment
                    .clip_duration_seconds
                    .ok_or_else(|| anyhow!("clip moment without a duration"))?;
                let start = moment.timestamp_seconds - duration / 2.0;
                self.render_clip(video, start.max(0.0), duration, &raw_path)
                    .await?;
            }
        }

        let final_path = self.add_watermark(&raw_path, None).await?;
        let size_bytes = tokio::fs::metadata(&final_path).await?.len();

        Ok(MediaAsset {
            kind: moment.media_kind,
            local_path: final_path,
            timestamp_seconds: moment.timestamp_seconds,
            description: moment.description.clone(),
            size_bytes,
            media_id: None,
        })
    }

    /// Shrink an animated clip under the byte ceiling, stepping down
    /// the fps/width ladder. Files already under the ceiling are
    /// copied through. Returns the path that should be uploaded.
    pub async fn compress_gif_for_upload(
        &self,
        input: &Path,
        output: &Path,
        ceiling_bytes: u64,
    ) -> Result<PathBuf> {
        let original = tokio::fs::metadata(input).await?.len();
        if original <= ceiling_bytes {
            tokio::fs::copy(input, output).await?;
            return Ok(output.to_path_buf());
        }

        info!(
            "🗜️ Compressing {} ({:.1} MB over ceiling)",
            input.display(),
            original as f64 / (1024.0 * 1024.0)
        );

        // Ladder: 8fps/400px, then 5fps/320px
        let args = self.ffmpeg.recompress_args(input, output, 8, 400);
        self.ffmpeg.run(&args).await?;

        let mut size = tokio::fs::metadata(output).await?.len();
        if size > ceiling_bytes {
            warn!(
                "Still {:.1} MB after first pass, stepping down",
                size as f64 / (1024.0 * 1024.0)
            );
            let tmp = output.with_extension("step2.gif");
            let args = self.ffmpeg.recompress_args(output, &tmp, 5, 320);
            self.ffmpeg.run(&args).await?;
            tokio::fs::rename(&tmp, output).await?;
            size = tokio::fs::metadata(output).await?.len();
        }

        if size > ceiling_bytes {
            return Err(anyhow!(
                "Cannot compress {} under {} bytes (got {})",
                input.display(),
                ceiling_bytes,
                size
            ));
        }

        Ok(output.to_path_buf())
    }

    async fn verify_output(&self, path: &Path) -> Result<PathBuf> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| anyhow!("Output file missing: {}", path.display()))?;
        info!("✅ Wrote {} ({:.1} KB)", path.display(), metadata.len() as f64 / 1024.0);
        Ok(path.to_path_buf())
    }
}

/// `foo.gif` -> `foo_wm.gif` next to the input.
fn watermarked_sibling(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("asset");
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("out");
    input.with_file_name(format!("{}_wm.{}", stem, ext))
}
