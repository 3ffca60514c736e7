/// moto-publisher
///
/// Content pipeline for instructional riding videos: downloads a video
/// and its subtitles, matches technique descriptions from an analysis
/// report against subtitle timestamps, renders screenshots and clips,
/// composes articles and optionally pushes a WeChat draft.
pub mod analysis;
pub mod compose;
pub mod config;
pub mod fetcher;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod subtitles;

// Re-export main types for easy access
pub use crate::analysis::{ContentAnalyzer, KeywordGenerator, ReportParser, TimestampMatcher};
pub use crate::compose::ArticleComposer;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::fetcher::VideoFetcher;
pub use crate::media::{Ffmpeg, MediaProcessor};
pub use crate::models::{
    KeyMoment, MediaAsset, MediaKind, Technique, TechniqueMatch, TimestampMatch, VideoAnalysis,
    VideoSource,
};
pub use crate::pipeline::{Pipeline, PipelineInput, PipelineReport};
pub use crate::publisher::{WeChatClient, WeChatError};
pub use crate::subtitles::SubtitleCue;
