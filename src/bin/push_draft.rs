use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

use moto_publisher::config::Config;
use moto_publisher::media::MediaProcessor;
use moto_publisher::publisher::WeChatClient;

/// Standalone draft-push tool: uploads the media directory of an
/// already composed article and submits the draft.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("moto_publisher=info,push_draft=info,warn")
        .init();

    let matches = Command::new("push-draft")
        .version("0.1.0")
        .about("Pushes a composed HTML article to the WeChat draft box")
        .arg(
            Arg::new("article")
                .short('a')
                .long("article")
                .value_name("FILE")
                .help("Composed HTML article")
                .required(true),
        )
        .arg(
            Arg::new("media-dir")
                .short('m')
                .long("media-dir")
                .value_name("DIR")
                .help("Directory with the article's media files"),
        )
        .arg(
            Arg::new("title")
                .short('t')
                .long("title")
                .value_name("TITLE")
                .help("Draft title; defaults to the article file name"),
        )
        .arg(
            Arg::new("cover")
                .short('c')
                .long("cover")
                .value_name("FILE")
                .help("Cover image to upload; its hosted URL is printed"),
        )
        .get_matches();

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    if let Err(e) = config.validate(true) {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let article_path = match matches.get_one::<String>("article") {
        Some(path) => PathBuf::from(path),
        None => return Err(anyhow!("article is required")),
    };
    if !article_path.exists() {
        return Err(anyhow!("article not found: {}", article_path.display()));
    }

    let media_dir = matches
        .get_one::<String>("media-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            article_path
                .parent()
                .map(|p| p.join("media"))
                .unwrap_or_else(|| PathBuf::from("media"))
        });

    let title = matches
        .get_one::<String>("title")
        .cloned()
        .unwrap_or_else(|| {
            article_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        });

    info!("📰 Article: {}", article_path.display());
    info!("🖼️ Media: {}", media_dir.display());

    let html = tokio::fs::read_to_string(&article_path).await?;
    let media = MediaProcessor::new(config.media.clone());
    let author = config.article.author.clone();

    let mut client = WeChatClient::new(config.wechat);
    client.fetch_access_token().await?;

    if let Some(cover) = matches.get_one::<String>("cover") {
        let cover_path = PathBuf::from(cover);
        match client.upload_thumbnail(&cover_path).await {
            Ok(url) => info!("🖼️ Cover hosted at: {}", url),
            Err(e) => warn!("Cover upload failed: {}", e),
        }
    }

    let mapping = if media_dir.exists() {
        client.upload_media_dir(&media_dir, &media).await
    } else {
        warn!("Media directory does not exist: {}", media_dir.display());
        Default::default()
    };

    let draft_id = client.publish_draft(&title, &author, &html, &mapping).await?;

    info!("✅ Draft created: {}", draft_id);
    info!("Next steps:");
    info!("1. Open the Official Account console: https://mp.weixin.qq.com/");
    info!("2. Open the draft box and review formatting and media");
    info!("3. Publish from there when it looks right");

    Ok(())
}
