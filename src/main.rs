use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

use moto_publisher::config::Config;
use moto_publisher::pipeline::{Pipeline, PipelineInput};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("moto_publisher=info,warn")
        .init();

    let matches = Command::new("moto-publisher")
        .version("0.1.0")
        .author("FreeSoloDirtbike")
        .about("Turns instructional riding videos into illustrated articles")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Video URL to download")
                .conflicts_with("video"),
        )
        .arg(
            Arg::new("video")
                .short('i')
                .long("video")
                .value_name("FILE")
                .help("Local video file to use instead of downloading"),
        )
        .arg(
            Arg::new("report")
                .short('r')
                .long("report")
                .value_name("FILE")
                .help("Analysis report file (.txt or .md)")
                .required(true),
        )
        .arg(
            Arg::new("subtitle")
                .short('s')
                .long("subtitle")
                .value_name("FILE")
                .help("Subtitle file (.vtt); downloaded when omitted"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for media and articles"),
        )
        .arg(
            Arg::new("publish")
                .long("publish")
                .help("Upload media and submit a WeChat draft")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("verbose") {
        info!("Verbose logging enabled");
    }

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    if let Some(output_dir) = matches.get_one::<String>("output-dir") {
        config.output.base_dir = PathBuf::from(output_dir);
    }

    let publish = matches.get_flag("publish");
    if let Err(e) = config.validate(publish) {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }
    if matches.get_flag("verbose") {
        info!("{}", config.summary());
    }

    let report_path = match matches.get_one::<String>("report") {
        Some(path) => PathBuf::from(path),
        None => return Err(anyhow::anyhow!("report is required")),
    };

    let input = PipelineInput {
        url: matches.get_one::<String>("url").cloned(),
        video_path: matches.get_one::<String>("video").map(PathBuf::from),
        report_path,
        subtitle_path: matches.get_one::<String>("subtitle").map(PathBuf::from),
        publish,
    };

    if input.url.is_none() && input.video_path.is_none() {
        error!("Either --url or --video is required");
        return Err(anyhow::anyhow!("no video source given"));
    }
    if !input.report_path.exists() {
        error!("Report file does not exist: {}", input.report_path.display());
        return Err(anyhow::anyhow!("report file not found"));
    }

    info!("🏍️ moto-publisher starting...");
    info!("📄 Report: {}", input.report_path.display());
    info!("📂 Output: {}", config.output.base_dir.display());

    tokio::fs::create_dir_all(&config.output.base_dir).await?;

    let pipeline = Pipeline::new(config);
    let report = pipeline.run(input).await?;

    // Print results
    info!("🎉 Done in {:.1}s", report.elapsed.as_secs_f64());
    info!(
        "✅ Techniques matched: {}/{}",
        report.techniques_matched, report.techniques_total
    );
    info!(
        "🖼️ Assets generated: {} ({} failed)",
        report.assets_generated, report.assets_failed
    );
    for (format, path) in &report.article_paths {
        info!("📝 {:?}: {}", format, path.display());
    }
    if let Some(draft_id) = &report.draft_media_id {
        info!("📮 Draft created: {}", draft_id);
    }

    Ok(())
}
