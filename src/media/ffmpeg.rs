use anyhow::{anyhow, Result};
use std::path::Path;
use std::process::Output;
use tracing::debug;

use crate::config::{MediaConfig, WatermarkPosition};

/// Thin wrapper over the ffmpeg/ffprobe command line: pure argument
/// constructors plus an async runner.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Ffmpeg {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
        }
    }

    /// Single-frame extraction at a timestamp. `-ss` before `-i` seeks
    /// on the demuxer, which is what makes this fast on long videos.
    pub fn screenshot_args(
        &self,
        video: &Path,
        timestamp: f64,
        output: &Path,
        quality: u32,
    ) -> Vec<String> {
        vec![
            "-ss".into(),
            format!("{timestamp}"),
            "-i".into(),
            video.to_string_lossy().into_owned(),
            "-vframes".into(),
            "1".into(),
            "-q:v".into(),
            quality.to_string(),
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// First pass of the palette encode: derive a 256-color palette
    /// from the clip window.
    pub fn palette_args(
        &self,
        video: &Path,
        start: f64,
        duration: f64,
        palette: &Path,
        width: u32,
        fps: u32,
    ) -> Vec<String> {
        vec![
            "-ss".into(),
            format!("{start}"),
            "-t".into(),
            format!("{duration}"),
            "-i".into(),
            video.to_string_lossy().into_owned(),
            "-vf".into(),
            format!("fps={fps},scale={width}:-1:flags=lanczos,palettegen"),
            "-y".into(),
            palette.to_string_lossy().into_owned(),
        ]
    }

    /// Second pass: encode the animated clip through the palette.
    pub fn clip_with_palette_args(
        &self,
        video: &Path,
        start: f64,
        duration: f64,
        palette: &Path,
        output: &Path,
        width: u32,
        fps: u32,
    ) -> Vec<String> {
        vec![
            "-ss".into(),
            format!("{start}"),
            "-t".into(),
            format!("{duration}"),
            "-i".into(),
            video.to_string_lossy().into_owned(),
            "-i".into(),
            palette.to_string_lossy().into_owned(),
            "-filter_complex".into(),
            format!("fps={fps},scale={width}:-1:flags=lanczos[x];[x][1:v]paletteuse"),
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// One-pass clip encode, used when the palette pass is disabled or
    /// failed.
    pub fn clip_plain_args(
        &self,
        video: &Path,
        start: f64,
        duration: f64,
        output: &Path,
        width: u32,
        fps: u32,
    ) -> Vec<String> {
        vec![
            "-ss".into(),
            format!("{start}"),
            "-t".into(),
            format!("{duration}"),
            "-i".into(),
            video.to_string_lossy().into_owned(),
            "-vf".into(),
            format!("fps={fps},scale={width}:-1"),
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Text overlay via drawtext. Single quotes in the text would end
    /// the filter string, so they are dropped.
    pub fn watermark_args(
        &self,
        input: &Path,
        output: &Path,
        text: &str,
        position: WatermarkPosition,
        font_size: u32,
        opacity: f64,
    ) -> Vec<String> {
        let (x, y) = match position {
            WatermarkPosition::BottomLeft => ("10", "h-th-10"),
            WatermarkPosition::BottomRight => ("w-tw-10", "h-th-10"),
            WatermarkPosition::TopLeft => ("10", "10"),
            WatermarkPosition::TopRight => ("w-tw-10", "10"),
        };

        let text = text.replace('\'', "");
        let filter = format!(
            "drawtext=text='{text}':fontsize={font_size}:fontcolor=white@{opacity}:x={x}:y={y}"
        );

        vec![
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vf".into(),
            filter,
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Recompression step of the size ladder: lower frame rate and
    /// width to shrink an animated clip.
    pub fn recompress_args(
        &self,
        input: &Path,
        output: &Path,
        fps: u32,
        width: u32,
    ) -> Vec<String> {
        vec![
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vf".into(),
            format!("fps={fps},scale={width}:-1"),
            "-f".into(),
            "gif".into(),
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Run ffmpeg with the given arguments, surfacing nonzero exits as
    /// errors that carry stderr.
    pub async fn run(&self, args: &[String]) -> Result<Output> {
        debug!("Running: {} {}", self.ffmpeg_bin, args.join(" "));

        let output = tokio::process::Command::new(&self.ffmpeg_bin)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.ffmpeg_bin,
                output.status,
                stderr.trim()
            ));
        }

        Ok(output)
    }

    /// ffprobe the primary video stream: (width, height, duration).
    pub async fn probe(&self, video: &Path) -> Result<(u32, u32, f64)> {
        let output = tokio::process::Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration",
                "-of",
                "json",
            ])
            .arg(video)
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", video.display()));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let stream = json["streams"]
            .get(0)
            .ok_or_else(|| anyhow!("No video stream found in {}", video.display()))?;

        let width = stream["width"].as_u64().unwrap_or(1280) as u32;
        let height = stream["height"].as_u64().unwrap_or(720) as u32;
        let duration = stream["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        Ok((width, height, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use std::path::PathBuf;

    fn ffmpeg() -> Ffmpeg {
        Ffmpeg::new(&crate::config::Config::default().media)
    }

    #[test]
    fn test_screenshot_args_seek_before_input() {
        let args = ffmpeg().screenshot_args(
            &PathBuf::from("video.mp4"),
            33.5,
            &PathBuf::from("out.jpg"),
            2,
        );
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(args[ss + 1], "33.5");
        assert!(args.contains(&"-vframes".to_string()));
        assert_eq!(args.last().unwrap(), "out.jpg");
    }

    #[test]
    fn test_palette_two_pass_filters() {
        let f = ffmpeg();
        let video = PathBuf::from("video.mp4");
        let palette = PathBuf::from("clip_palette.png");

        let pass1 = f.palette_args(&video, 30.0, 7.0, &palette, 480, 10);
        assert!(pass1
            .iter()
            .any(|a| a.contains("palettegen") && a.contains("fps=10") && a.contains("scale=480")));

        let pass2 =
            f.clip_with_palette_args(&video, 30.0, 7.0, &palette, &PathBuf::from("out.gif"), 480, 10);
        assert!(pass2.iter().any(|a| a.contains("paletteuse")));
        assert_eq!(pass2.iter().filter(|a| *a == "-i").count(), 2);
    }

    #[test]
    fn test_watermark_positions() {
        let f = ffmpeg();
        let input = PathBuf::from("in.gif");
        let output = PathBuf::from("out.gif");

        let args = f.watermark_args(&input, &output, "Trail", WatermarkPosition::BottomRight, 16, 0.7);
        let filter = args.iter().find(|a| a.starts_with("drawtext")).unwrap();
        assert!(filter.contains("x=w-tw-10"));
        assert!(filter.contains("y=h-th-10"));
        assert!(filter.contains("fontcolor=white@0.7"));

        let args = f.watermark_args(&input, &output, "Trail", WatermarkPosition::TopLeft, 16, 0.7);
        let filter = args.iter().find(|a| a.starts_with("drawtext")).unwrap();
        assert!(filter.contains("x=10:y=10"));
    }

    #[test]
    fn test_watermark_strips_quotes() {
        let f = ffmpeg();
        let args = f.watermark_args(
            &PathBuf::from("in.jpg"),
            &PathBuf::from("out.jpg"),
            "it's mine",
            WatermarkPosition::BottomLeft,
            16,
            0.7,
        );
        let filter = args.iter().find(|a| a.starts_with("drawtext")).unwrap();
        assert!(filter.contains("text='its mine'"));
    }

    #[test]
    fn test_recompress_args() {
        let f = ffmpeg();
        let args = f.recompress_args(&PathBuf::from("in.gif"), &PathBuf::from("out.gif"), 8, 400);
        assert!(args.contains(&"fps=8,scale=400:-1".to_string()));
        assert!(args.contains(&"gif".to_string()));
    }

    #[test]
    fn test_custom_binary_names() {
        let mut config: MediaConfig = crate::config::Config::default().media;
        config.ffmpeg_bin = "ffmpeg6".to_string();
        let f = Ffmpeg::new(&config);
        assert_eq!(f.ffmpeg_bin, "ffmpeg6");
    }
}
