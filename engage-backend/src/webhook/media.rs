//! Media re-hosting: copy provider media into our own storage so links don't expire

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::models::MessageType;
use super::content::MediaRef;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("no media source in payload")]
    NoSource,
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("download returned HTTP {0}")]
    Status(u16),
    #[error("media exceeds {0} bytes")]
    TooLarge(u64),
    #[error("invalid inline base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
    #[error("storage write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Object storage for re-hosted media
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store `bytes` under `path` and return the public URL
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, MediaError>;
}

/// Files on local disk, served by the HTTP server under `/media`
pub struct LocalMediaStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<String, MediaError> {
        let relative = Path::new(path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(MediaError::InvalidPath(path.to_string()));
        }

        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        Ok(format!("{}/media/{}", self.public_base_url, path))
    }
}

/// Keep only characters that are safe in a single path segment
fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

fn extension_for_mime(mimetype: &str) -> Option<&'static str> {
    let essence = mimetype.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "video/quicktime" => "mov",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/aac" => "aac",
        "audio/wav" | "audio/x-wav" => "wav",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/zip" => "zip",
        "text/plain" => "txt",
        "text/csv" => "csv",
        _ => return None,
    };
    Some(ext)
}

fn extension_from_file_name(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

fn default_extension(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Image => "jpg",
        MessageType::Video => "mp4",
        MessageType::Audio => "ogg",
        MessageType::Sticker => "webp",
        _ => "bin",
    }
}

/// Extension for a stored object: mimetype, then file name, then a per-type default
pub fn pick_extension(media: &MediaRef, message_type: MessageType) -> String {
    media
        .mimetype
        .as_deref()
        .and_then(extension_for_mime)
        .map(str::to_string)
        .or_else(|| media.file_name.as_deref().and_then(extension_from_file_name))
        .unwrap_or_else(|| default_extension(message_type).to_string())
}

/// Storage key `<company_id>/<phone>/<external_id>.<ext>`
pub fn storage_path(company_id: &str, phone: &str, external_id: &str, ext: &str) -> String {
    format!(
        "{}/{}/{}.{}",
        sanitize_segment(company_id),
        sanitize_segment(phone),
        sanitize_segment(external_id),
        ext
    )
}

/// Identifies where a media object belongs
pub struct MediaTarget<'a> {
    pub company_id: &'a str,
    pub phone: &'a str,
    pub external_id: &'a str,
    pub message_type: MessageType,
}

pub struct MediaRehoster {
    http: reqwest::Client,
    storage: Arc<dyn MediaStorage>,
    max_bytes: u64,
}

impl MediaRehoster {
    pub fn new(http: reqwest::Client, storage: Arc<dyn MediaStorage>, max_bytes: u64) -> Self {
        Self {
            http,
            storage,
            max_bytes,
        }
    }

    /// Best-effort re-host. Falls back to the provider URL (or None) on any failure.
    pub async fn rehost(&self, media: &MediaRef, target: &MediaTarget<'_>) -> Option<String> {
        match self.try_rehost(media, target).await {
            Ok(url) => Some(url),
            Err(MediaError::NoSource) => None,
            Err(e) => {
                log::warn!(
                    "[MEDIA] Re-host failed for {} ({}), keeping original URL: {}",
                    target.external_id,
                    target.message_type.as_ref(),
                    e
                );
                media.url.clone()
            }
        }
    }

    async fn try_rehost(&self, media: &MediaRef, target: &MediaTarget<'_>) -> Result<String, MediaError> {
        let bytes = if let Some(inline) = &media.inline_base64 {
            self.decode_inline(inline)?
        } else if let Some(url) = &media.url {
            self.download(url).await?
        } else {
            return Err(MediaError::NoSource);
        };

        let ext = pick_extension(media, target.message_type);
        let path = storage_path(target.company_id, target.phone, target.external_id, &ext);
        let content_type = media.mimetype.as_deref().unwrap_or("application/octet-stream");

        let url = self.storage.put(&path, &bytes, content_type).await?;
        log::info!("[MEDIA] Stored {} ({} bytes)", path, bytes.len());
        Ok(url)
    }

    fn decode_inline(&self, inline: &str) -> Result<Vec<u8>, MediaError> {
        // Some providers send a data URI instead of bare base64
        let payload = match inline.split_once(";base64,") {
            Some((_, data)) => data,
            None => inline,
        };
        let bytes = BASE64.decode(payload.trim())?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(MediaError::TooLarge(self.max_bytes));
        }
        Ok(bytes)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let mut response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MediaError::Status(response.status().as_u16()));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(MediaError::TooLarge(self.max_bytes));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(MediaError::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn rehoster(dir: &TempDir, max_bytes: u64) -> MediaRehoster {
        let storage = Arc::new(LocalMediaStorage::new(dir.path(), "https://crm.example.com/"));
        MediaRehoster::new(reqwest::Client::new(), storage, max_bytes)
    }

    fn target(message_type: MessageType) -> MediaTarget<'static> {
        MediaTarget {
            company_id: "acme",
            phone: "5511999990000",
            external_id: "3EB0ABC",
            message_type,
        }
    }

    #[test]
    fn test_extension_priority() {
        let by_mime = MediaRef {
            mimetype: Some("audio/ogg; codecs=opus".into()),
            file_name: Some("voz.mp3".into()),
            ..Default::default()
        };
        assert_eq!(pick_extension(&by_mime, MessageType::Audio), "ogg");

        let by_name = MediaRef {
            mimetype: Some("application/x-unknown".into()),
            file_name: Some("Planilha.XLSX".into()),
            ..Default::default()
        };
        assert_eq!(pick_extension(&by_name, MessageType::Document), "xlsx");

        assert_eq!(pick_extension(&MediaRef::default(), MessageType::Sticker), "webp");
        assert_eq!(pick_extension(&MediaRef::default(), MessageType::Document), "bin");
    }

    #[test]
    fn test_storage_path_is_sanitized() {
        assert_eq!(
            storage_path("acme", "5511999990000", "3EB0ABC", "jpg"),
            "acme/5511999990000/3EB0ABC.jpg"
        );
        assert_eq!(storage_path("../etc", "x/y", "", "bin"), "___etc/x_y/_.bin");
    }

    #[tokio::test]
    async fn test_inline_base64_is_stored() {
        let dir = TempDir::new().unwrap();
        let media = MediaRef {
            mimetype: Some("image/png".into()),
            inline_base64: Some(BASE64.encode(b"fake-png")),
            ..Default::default()
        };

        let url = rehoster(&dir, 1024).rehost(&media, &target(MessageType::Image)).await;

        assert_eq!(
            url.as_deref(),
            Some("https://crm.example.com/media/acme/5511999990000/3EB0ABC.png")
        );
        let stored = std::fs::read(dir.path().join("acme/5511999990000/3EB0ABC.png")).unwrap();
        assert_eq!(stored, b"fake-png");
    }

    #[tokio::test]
    async fn test_download_is_stored() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/file.enc");
                then.status(200).body("pdf-bytes");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let media = MediaRef {
            url: Some(server.url("/file.enc")),
            mimetype: Some("application/pdf".into()),
            ..Default::default()
        };

        let url = rehoster(&dir, 1024).rehost(&media, &target(MessageType::Document)).await;

        mock.assert_async().await;
        assert!(url.unwrap().ends_with("/media/acme/5511999990000/3EB0ABC.pdf"));
        assert!(dir.path().join("acme/5511999990000/3EB0ABC.pdf").exists());
    }

    #[tokio::test]
    async fn test_failed_download_falls_back_to_original_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.enc");
                then.status(404);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let original = server.url("/gone.enc");
        let media = MediaRef {
            url: Some(original.clone()),
            ..Default::default()
        };

        let url = rehoster(&dir, 1024).rehost(&media, &target(MessageType::Image)).await;
        assert_eq!(url, Some(original));
    }

    #[tokio::test]
    async fn test_oversized_download_falls_back() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big.enc");
                then.status(200).body("0123456789abcdef");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let original = server.url("/big.enc");
        let media = MediaRef {
            url: Some(original.clone()),
            ..Default::default()
        };

        let url = rehoster(&dir, 8).rehost(&media, &target(MessageType::Video)).await;
        assert_eq!(url, Some(original));
        assert!(!dir.path().join("acme").exists());
    }

    #[tokio::test]
    async fn test_no_source_gives_none() {
        let dir = TempDir::new().unwrap();
        let url = rehoster(&dir, 8)
            .rehost(&MediaRef::default(), &target(MessageType::Audio))
            .await;
        assert!(url.is_none());
    }
}
