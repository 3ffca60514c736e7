use moto_publisher::compose::ArticleComposer;
use moto_publisher::config::{ArticleFormat, Config, ConfigBuilder};
use moto_publisher::models::{MediaAsset, MediaKind};
use moto_publisher::publisher::{digest_of, rewrite_media_refs};
use moto_publisher::{ContentAnalyzer, KeywordGenerator, TimestampMatcher};
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::fs;

const REPORT: &str = "\
# Loose Surface Braking Masterclass

## Summary

How to slow a dirt bike on marbles without tucking the front.
Focuses on lever feel and body position under braking.

## Techniques

- **Front Brake Modulation**: build front brake pressure progressively so the contact patch keeps biting.
- **Body Position**: slide your weight back and grip the tank so the rear stays planted under braking.
- **Corner Entry**: release the brakes as you tip in and carry momentum to the apex.

## Key Moments

- **0:32** - front brake demonstration on the gravel straight
- **2:10** - body position drill, braking from standing
- **4:45** - corner entry line choice
";

const SUBTITLES: &str = "\
WEBVTT
Kind: captions
Language: en

00:00:30.000 --> 00:00:33.000
squeeze the front brake gently at first

00:00:34.500 --> 00:00:37.000
then add front brake power as the weight transfers

00:02:08.000 --> 00:02:12.000
move your body back, weight over the rear wheel

00:04:40.000 --> 00:04:43.500
pick your line early and release the brakes

00:04:44.000 --> 00:04:47.000
carry the speed to the apex
";

async fn write_inputs(dir: &TempDir) -> (PathBuf, PathBuf) {
    let report = dir.path().join("report.md");
    let subs = dir.path().join("subs.en.vtt");
    fs::write(&report, REPORT).await.unwrap();
    fs::write(&subs, SUBTITLES).await.unwrap();
    (report, subs)
}

#[tokio::test]
async fn test_report_to_analysis_flow() {
    let dir = TempDir::new().unwrap();
    let (report, subs) = write_inputs(&dir).await;

    let config = Config::default();
    let analyzer = ContentAnalyzer::new(&config.matching, "en");
    let analysis = analyzer.analyze(&report, &subs, "abc123xyz00").await.unwrap();

    assert_eq!(analysis.title, "Loose Surface Braking Masterclass");
    assert_eq!(analysis.metadata.total_techniques, 3);
    assert_eq!(analysis.metadata.matched_timestamps, 3);

    // The two front-brake cues are 1.5s apart, so they merge into one
    // span wide enough to become a clip
    let front_brake = &analysis.key_moments[0];
    assert_eq!(front_brake.technique, "Front Brake Modulation");
    assert_eq!(front_brake.media_kind, MediaKind::Clip);
    assert!((front_brake.timestamp_seconds - 33.5).abs() < 1e-9);
    assert_eq!(front_brake.clip_duration_seconds, Some(7.0));
}

#[tokio::test]
async fn test_analysis_survives_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let (report, subs) = write_inputs(&dir).await;

    let config = Config::default();
    let analyzer = ContentAnalyzer::new(&config.matching, "en");
    let analysis = analyzer.analyze(&report, &subs, "abc123xyz00").await.unwrap();

    let json_path = dir.path().join("analysis.json");
    analyzer.save_analysis(&analysis, &json_path).await.unwrap();
    let reloaded = analyzer.load_analysis(&json_path).await.unwrap();

    assert_eq!(reloaded.key_moments.len(), analysis.key_moments.len());
    for (original, restored) in analysis.techniques.iter().zip(&reloaded.techniques) {
        assert_eq!(original.technique, restored.technique);
        assert_eq!(original.matched, restored.matched);
    }
}

#[tokio::test]
async fn test_compose_and_rewrite_media_refs() {
    let dir = TempDir::new().unwrap();
    let (report, subs) = write_inputs(&dir).await;

    let config = ConfigBuilder::new()
        .with_output_dir(dir.path().to_path_buf())
        .build();
    let analyzer = ContentAnalyzer::new(&config.matching, "en");
    let mut analysis = analyzer.analyze(&report, &subs, "abc123xyz00").await.unwrap();

    // Pretend media generation produced an asset for the first moment
    let asset_path = dir.path().join("media/01_clip_33.500_wm.gif");
    let assets = vec![MediaAsset {
        kind: MediaKind::Clip,
        local_path: asset_path.clone(),
        timestamp_seconds: analysis.key_moments[0].timestamp_seconds,
        description: analysis.key_moments[0].description.clone(),
        size_bytes: 2048,
        media_id: None,
    }];

    let composer = ArticleComposer::new(
        config.article.clone(),
        config.matching.asset_tolerance_seconds,
    );
    let paths = composer
        .compose_all(&mut analysis, &assets, &config.articles_dir())
        .await
        .unwrap();

    assert_eq!(paths.len(), 3);
    let html = fs::read_to_string(&paths[&ArticleFormat::Html]).await.unwrap();
    assert!(html.contains("src=\"media/01_clip_33.500_wm.gif\""));

    // Uploading assigns media ids, and the publisher rewrites refs
    let mut mapping = HashMap::new();
    mapping.insert(asset_path, "REMOTE_MEDIA_ID".to_string());
    let rewritten = rewrite_media_refs(&html, &mapping);
    assert!(rewritten.contains("src=\"REMOTE_MEDIA_ID\""));
    assert!(!rewritten.contains("src=\"media/01_clip_33.500_wm.gif\""));

    let digest = digest_of(&rewritten);
    assert!(digest.starts_with("Loose Surface Braking Masterclass"));
    assert!(digest.chars().count() <= 100);
}

#[tokio::test]
async fn test_keyword_generation_feeds_matching() {
    let generator = KeywordGenerator::default();
    let keywords = generator.generate(
        "Front Brake Modulation",
        "build front brake pressure progressively so the contact patch keeps biting",
    );
    assert!(keywords.contains(&"front brake".to_string()));

    let matcher = TimestampMatcher::default();
    let cues = moto_publisher::subtitles::parse_cues(SUBTITLES);
    let groups = matcher.search_keywords(&cues, &keywords);
    assert!(!groups.is_empty());
    // Groups stay ordered and disjoint no matter the keyword set
    for pair in groups.windows(2) {
        assert!(pair[0].end_seconds < pair[1].start_seconds);
    }
}
