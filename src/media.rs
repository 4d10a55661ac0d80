//! Media reference resolver
//!
//! Turns an uploaded file into a durable URL, either on local disk (served
//! under `/uploads`) or on a hosted media service. Content only ever sees
//! the resulting string.

use std::path::PathBuf;

use axum::body::Bytes;
use serde::Deserialize;
use uuid::Uuid;

/// Public path prefix the local upload directory is served under
pub const LOCAL_PREFIX: &str = "/uploads";

/// Extensions kept on stored files. `/uploads` picks the served content type
/// from the extension, so nothing script-capable may land here.
const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "mp4", "webm", "mov", "m4v", "mkv", "ogv",
];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Only image and video files are allowed")]
    UnsupportedType(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media host request failed: {0}")]
    Upload(#[from] reqwest::Error),

    #[error("Media host returned an unexpected response: {0}")]
    BadResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_content_type(content_type: &str) -> Result<Self, MediaError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "image/svg+xml" {
            return Err(MediaError::UnsupportedType(content_type.to_string()));
        }

        match essence.split('/').next() {
            Some("image") => Ok(MediaKind::Image),
            Some("video") => Ok(MediaKind::Video),
            _ => Err(MediaError::UnsupportedType(content_type.to_string())),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Upload {
    /// Extension from the client's file name, falling back to the MIME
    /// subtype; anything outside `MEDIA_EXTENSIONS` is stored as `bin`
    fn extension(&self) -> String {
        let known = |ext: &str| {
            let ext = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
        };

        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| known(ext))
            .or_else(|| {
                self.content_type
                    .split('/')
                    .nth(1)
                    .and_then(|sub| sub.split(['+', ';']).next())
                    .and_then(known)
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct HostedResponse {
    secure_url: String,
}

#[derive(Debug, Clone)]
pub enum MediaResolver {
    Local {
        dir: PathBuf,
    },
    Hosted {
        client: reqwest::Client,
        upload_url: String,
        upload_preset: String,
        folder: String,
    },
}

impl MediaResolver {
    pub async fn resolve(&self, upload: Upload) -> Result<String, MediaError> {
        let kind = MediaKind::from_content_type(&upload.content_type)?;

        match self {
            MediaResolver::Local { dir } => {
                let name = format!("{}.{}", Uuid::new_v4(), upload.extension());
                tokio::fs::create_dir_all(dir).await?;
                tokio::fs::write(dir.join(&name), &upload.bytes).await?;

                tracing::debug!(file = %name, size = upload.bytes.len(), "Stored upload locally");
                Ok(format!("{}/{}", LOCAL_PREFIX, name))
            }
            MediaResolver::Hosted {
                client,
                upload_url,
                upload_preset,
                folder,
            } => {
                let file_name = upload
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("upload.{}", upload.extension()));
                let part = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
                    .file_name(file_name)
                    .mime_str(&upload.content_type)?;
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("upload_preset", upload_preset.clone())
                    .text("folder", folder.clone());

                let url = format!("{}/{}/upload", upload_url.trim_end_matches('/'), kind.as_str());
                let response = client.post(&url).multipart(form).send().await?;

                if !response.status().is_success() {
                    return Err(MediaError::BadResponse(format!(
                        "status {}",
                        response.status()
                    )));
                }

                let body: HostedResponse = response
                    .json()
                    .await
                    .map_err(|e| MediaError::BadResponse(e.to_string()))?;

                tracing::debug!(url = %body.secure_url, "Uploaded media to host");
                Ok(body.secure_url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(file_name: Option<&str>, content_type: &str) -> Upload {
        Upload {
            file_name: file_name.map(str::to_string),
            content_type: content_type.into(),
            bytes: Bytes::from_static(b"not really a png"),
        }
    }

    #[test]
    fn only_images_and_videos() {
        assert_eq!(MediaKind::from_content_type("image/png").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_content_type("video/mp4").unwrap(), MediaKind::Video);
        assert!(matches!(
            MediaKind::from_content_type("application/pdf"),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn svg_is_refused() {
        for content_type in ["image/svg+xml", "IMAGE/SVG+XML; charset=utf-8"] {
            assert!(matches!(
                MediaKind::from_content_type(content_type),
                Err(MediaError::UnsupportedType(_))
            ));
        }

        let dir = std::env::temp_dir().join(format!("newsroom-media-{}", Uuid::new_v4()));
        let resolver = MediaResolver::Local { dir: dir.clone() };
        let result = resolver.resolve(upload(Some("logo.svg"), "image/svg+xml")).await;
        assert!(matches!(result, Err(MediaError::UnsupportedType(_))));
        assert!(!dir.exists());
    }

    #[test]
    fn extension_prefers_file_name() {
        assert_eq!(upload(Some("Photo.JPG"), "image/jpeg").extension(), "jpg");
        assert_eq!(upload(None, "video/webm").extension(), "webm");
        assert_eq!(upload(Some("cover.svg"), "image/png").extension(), "png");
        assert_eq!(upload(Some("page.html"), "video/x-unknown").extension(), "bin");
        assert_eq!(upload(Some("../../etc/passwd"), "image/png").extension(), "png");
        assert_eq!(upload(Some("clip.m/p4"), "video/mp4").extension(), "mp4");
    }

    #[tokio::test]
    async fn local_backend_writes_file_and_returns_public_path() {
        let dir = std::env::temp_dir().join(format!("newsroom-media-{}", Uuid::new_v4()));
        let resolver = MediaResolver::Local { dir: dir.clone() };

        let url = resolver.resolve(upload(Some("cover.png"), "image/png")).await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        let name = url.trim_start_matches("/uploads/");
        let stored = tokio::fs::read(dir.join(name)).await.unwrap();
        assert_eq!(stored, b"not really a png");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_upload_is_not_written() {
        let dir = std::env::temp_dir().join(format!("newsroom-media-{}", Uuid::new_v4()));
        let resolver = MediaResolver::Local { dir: dir.clone() };

        let err = resolver.resolve(upload(Some("doc.pdf"), "application/pdf")).await.unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedType(_)));
        assert!(!dir.exists());
    }
}
