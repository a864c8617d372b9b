//! Media inputs sent to vendors and artifacts written back to disk.

use base64::Engine;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// A local file loaded into memory, ready to upload.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    /// File name sent with multipart uploads
    pub file_name: String,
    /// MIME type (e.g., "image/jpeg", "audio/mpeg")
    pub media_type: String,
    /// Raw file bytes
    pub bytes: Bytes,
}

impl LocalMedia {
    /// Create a `LocalMedia` from raw bytes, inferring the MIME type from the
    /// file name's extension.
    pub fn from_bytes(bytes: impl Into<Bytes>, file_name: &str) -> Self {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let media_type = match extension.as_str() {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "m4a" => "audio/mp4",
            "ogg" => "audio/ogg",
            "flac" => "audio/flac",
            other => {
                tracing::warn!(
                    "Unknown media extension '{other}' for {file_name}, sending as application/octet-stream"
                );
                "application/octet-stream"
            }
        };

        Self {
            file_name: file_name.to_string(),
            media_type: media_type.to_string(),
            bytes: bytes.into(),
        }
    }

    /// Return a base64 data URL suitable for JSON payloads.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// An input image or audio clip, either uploaded from disk or referenced by URL.
#[derive(Debug, Clone)]
pub enum MediaInput {
    Local(LocalMedia),
    Remote(String),
}

impl MediaInput {
    /// Load a media input from a path or an `http(s)://` URL.
    ///
    /// URLs are passed through untouched; paths are read fully into memory.
    pub async fn load(source: &str) -> std::io::Result<Self> {
        if is_url(source) {
            return Ok(Self::Remote(source.to_string()));
        }

        let path = Path::new(source);
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::Local(LocalMedia::from_bytes(bytes, &file_name)))
    }

    /// A URL the vendor can dereference: the remote URL itself, or a data URL.
    pub fn as_url(&self) -> String {
        match self {
            Self::Local(media) => media.data_url(),
            Self::Remote(url) => url.clone(),
        }
    }

    /// Human-readable description for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::Local(media) => format!("{} ({} bytes)", media.file_name, media.bytes.len()),
            Self::Remote(url) => url.clone(),
        }
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// A generated artifact persisted at a caller-owned path.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub bytes: Bytes,
}

impl MediaAsset {
    /// Write `bytes` to `path`, creating parent directories as needed.
    ///
    /// The payload goes to a sibling `.part` file first and is renamed into
    /// place, so `path` never holds a truncated artifact.
    pub async fn write(path: &Path, bytes: Bytes) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut staging = path.as_os_str().to_owned();
        staging.push(".part");
        let staging = PathBuf::from(staging);

        let staged = match tokio::fs::write(&staging, &bytes).await {
            Ok(()) => tokio::fs::rename(&staging, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
