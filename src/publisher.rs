use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WeChatConfig;
use crate::media::MediaProcessor;

/// Errors from the WeChat Official Account API.
#[derive(Debug, Error)]
pub enum WeChatError {
    #[error("WeChat API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("missing `{0}` in WeChat response")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    media_id: Option<String>,
    url: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

#[derive(Debug, Serialize)]
struct DraftArticle {
    title: String,
    author: String,
    digest: String,
    content: String,
    content_source_url: String,
    thumb_media_id: String,
    show_cover_pic: u8,
    need_open_comment: u8,
    only_fans_can_comment: u8,
}

/// Client for the WeChat Official Account publishing API: token
/// authentication, permanent-material upload, and draft submission.
pub struct WeChatClient {
    config: WeChatConfig,
    client: reqwest::Client,
    access_token: Option<String>,
}

impl WeChatClient {
    pub fn new(config: WeChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            access_token: None,
        }
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| anyhow!("access token not fetched yet"))
    }

    /// Fetch and cache an access token for subsequent calls.
    pub async fn fetch_access_token(&mut self) -> Result<()> {
        info!("🔑 Fetching WeChat access token...");

        let url = format!("{}/token", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.config.app_id.as_str()),
                ("secret", self.config.app_secret.as_str()),
            ])
            .send()
            .await
            .context("token request failed")?;

        let body: TokenResponse = response.json().await?;
        match body.access_token {
            Some(token) => {
                self.access_token = Some(token);
                info!("✅ Access token acquired");
                Ok(())
            }
            None => Err(api_error(body.errcode, body.errmsg).into()),
        }
    }

    /// Upload an image or GIF as permanent material; returns its
    /// media id. Oversized GIFs are recompressed into a temp file
    /// first; if compression fails the original is uploaded anyway.
    pub async fn upload_image(&self, path: &Path, media: &MediaProcessor) -> Result<String> {
        let upload_path = self.prepare_upload(path, media).await;
        let file_name = file_name_of(&upload_path);
        info!("⬆️ Uploading {}", file_name);

        let url = format!(
            "{}/material/add_material?access_token={}&type=image",
            self.config.base_url,
            self.token()?
        );

        let bytes = tokio::fs::read(&upload_path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_for(&upload_path))?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let body: UploadResponse = response.json().await?;

        if upload_path != path {
            let _ = tokio::fs::remove_file(&upload_path).await;
        }

        match body.media_id {
            Some(media_id) => {
                info!("  ✓ {} -> {}", file_name, media_id);
                Ok(media_id)
            }
            None => Err(api_error(body.errcode, body.errmsg).into()),
        }
    }

    /// Upload a cover image; returns the hosted URL rather than a
    /// media id.
    pub async fn upload_thumbnail(&self, path: &Path) -> Result<String> {
        info!("⬆️ Uploading thumbnail {}", file_name_of(path));

        let url = format!(
            "{}/media/uploadimg?access_token={}",
            self.config.base_url,
            self.token()?
        );

        let bytes = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name_of(path))
            .mime_str(mime_for(path))?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let body: UploadResponse = response.json().await?;

        match body.url {
            Some(url) => Ok(url),
            None => Err(api_error(body.errcode, body.errmsg).into()),
        }
    }

    /// Upload every media file in a directory. Failures are logged
    /// and recorded as misses; the batch always completes.
    pub async fn upload_media_dir(
        &self,
        dir: &Path,
        media: &MediaProcessor,
    ) -> HashMap<PathBuf, String> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("gif") | Some("jpg") | Some("jpeg") | Some("png")
                )
            })
            .collect();
        files.sort();

        info!("📦 Uploading {} media files from {}", files.len(), dir.display());

        let mut mapping = HashMap::new();
        for (i, file) in files.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, files.len(), file_name_of(file));
            match self.upload_image(file, media).await {
                Ok(media_id) => {
                    mapping.insert(file.clone(), media_id);
                }
                Err(e) => warn!("  ✗ Upload failed for {}: {}", file.display(), e),
            }
        }

        info!("✅ Uploaded {}/{} files", mapping.len(), files.len());
        mapping
    }

    /// Submit an article draft; returns the draft's media id.
    pub async fn publish_draft(
        &self,
        title: &str,
        author: &str,
        html: &str,
        media_mapping: &HashMap<PathBuf, String>,
    ) -> Result<String> {
        info!("📮 Submitting draft \"{}\"", title);

        let content = rewrite_media_refs(html, media_mapping);
        let draft = json!({
            "articles": [DraftArticle {
                title: title.to_string(),
                author: author.to_string(),
                digest: digest_of(&content),
                content,
                content_source_url: String::new(),
                thumb_media_id: String::new(),
                show_cover_pic: 0,
                need_open_comment: 1,
                only_fans_can_comment: 0,
            }]
        });

        let url = format!(
            "{}/draft/add?access_token={}",
            self.config.base_url,
            self.token()?
        );

        let response = self.client.post(&url).json(&draft).send().await?;
        let body: UploadResponse = response.json().await?;

        match body.media_id {
            Some(draft_id) => {
                info!("✅ Draft created: {}", draft_id);
                Ok(draft_id)
            }
            None => Err(api_error(body.errcode, body.errmsg).into()),
        }
    }

    /// Compress an over-ceiling GIF into a temp sibling before upload.
    async fn prepare_upload(&self, path: &Path, media: &MediaProcessor) -> PathBuf {
        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("gif"))
            .unwrap_or(false);
        if !is_gif {
            return path.to_path_buf();
        }

        let ceiling = (self.config.gif_size_limit_mb * 1024.0 * 1024.0) as u64;
        let compressed = path.with_file_name(format!("compressed_{}", file_name_of(path)));

        match media
            .compress_gif_for_upload(path, &compressed, ceiling)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!("Compression failed ({}), uploading original", e);
                let _ = tokio::fs::remove_file(&compressed).await;
                path.to_path_buf()
            }
        }
    }
}

fn api_error(errcode: Option<i64>, errmsg: Option<String>) -> WeChatError {
    match errcode {
        Some(code) => WeChatError::Api {
            code,
            msg: errmsg.unwrap_or_else(|| "unknown error".to_string()),
        },
        None => WeChatError::MissingField("media_id"),
    }
}

/// Rewrite `src="media/<file>"` references to uploaded media ids. A
/// reference with no uploaded counterpart is left untouched.
pub fn rewrite_media_refs(html: &str, mapping: &HashMap<PathBuf, String>) -> String {
    let Ok(re) = Regex::new(r#"src="media/([^"]+)""#) else {
        return html.to_string();
    };

    re.replace_all(html, |caps: &regex::Captures| {
        let file_name = &caps[1];
        for (local_path, media_id) in mapping {
            let matches_file = local_path
                .file_name()
                .map(|n| n.to_string_lossy() == *file_name)
                .unwrap_or(false);
            if matches_file {
                return format!(r#"src="{}""#, media_id);
            }
        }
        caps[0].to_string()
    })
    .into_owned()
}

/// The draft digest: tag-stripped article text, first 100 characters.
pub fn digest_of(html: &str) -> String {
    let stripped = match Regex::new(r"<[^>]+>") {
        Ok(re) => re.replace_all(html, "").into_owned(),
        Err(_) => html.to_string(),
    };
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(100)
        .collect::<String>()
        .trim()
        .to_string()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string())
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_media_refs() {
        let mut mapping = HashMap::new();
        mapping.insert(
            PathBuf::from("/out/media/01_clip_wm.gif"),
            "MEDIA_ID_1".to_string(),
        );

        let html = r#"<img src="media/01_clip_wm.gif"/><img src="media/unknown.jpg"/>"#;
        let rewritten = rewrite_media_refs(html, &mapping);

        assert!(rewritten.contains(r#"src="MEDIA_ID_1""#));
        // Unmapped references stay as-is
        assert!(rewritten.contains(r#"src="media/unknown.jpg""#));
    }

    #[test]
    fn test_digest_strips_tags_and_truncates() {
        let html = format!("<h1>Title</h1><p>{}</p>", "word ".repeat(50));
        let digest = digest_of(&html);
        assert!(!digest.contains('<'));
        assert!(digest.starts_with("Title word"));
        assert!(digest.chars().count() <= 100);
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_for(Path::new("a.gif")), "image/gif");
        assert_eq!(mime_for(Path::new("a.png")), "image/png");
        assert_eq!(mime_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a")), "image/jpeg");
    }

    #[test]
    fn test_api_error_mapping() {
        let err = api_error(Some(40001), Some("invalid credential".to_string()));
        assert_eq!(
            err.to_string(),
            "WeChat API error 40001: invalid credential"
        );

        let err = api_error(None, None);
        assert!(err.to_string().contains("media_id"));
    }

    #[test]
    fn test_token_required_before_calls() {
        let client = WeChatClient::new(crate::config::Config::default().wechat);
        assert!(client.token().is_err());
    }
}
