//! Local storage for uploaded post media and profile pictures.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tracing::{debug, warn};

/// What an upload is for; decides allowed formats and the storage folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Video,
    ProfilePicture,
}

impl UploadKind {
    const fn allowed_mime_types(self) -> &'static [&'static str] {
        match self {
            Self::Photo => &["image/jpeg", "image/png", "image/gif"],
            Self::Video => &["video/mp4", "video/avi", "video/x-msvideo", "video/quicktime"],
            Self::ProfilePicture => &["image/jpeg", "image/jpg", "image/png", "image/gif"],
        }
    }

    const fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Photo | Self::ProfilePicture => &["jpg", "jpeg", "png", "gif"],
            Self::Video => &["mp4", "avi", "mov"],
        }
    }

    const fn folder(self) -> &'static str {
        match self {
            Self::Photo | Self::Video => "posts",
            Self::ProfilePicture => "profiles",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::ProfilePicture => "profile picture",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file uploaded")]
    Empty,
    #[error("File too large. Maximum size is {} MB", max_bytes / (1024 * 1024))]
    TooLarge { max_bytes: usize },
    #[error("Invalid file type for {kind}. Allowed extensions: {allowed}")]
    UnsupportedType { kind: &'static str, allowed: String },
}

/// Check an upload's size, extension and content type.
///
/// Returns the normalized (lowercase) extension to store the file under.
/// When the client sent no content type, it is guessed from the file name.
pub fn validate_upload(
    kind: UploadKind,
    file_name: &str,
    content_type: Option<&str>,
    size: usize,
    max_bytes: usize,
) -> Result<String, UploadError> {
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > max_bytes {
        return Err(UploadError::TooLarge { max_bytes });
    }

    let unsupported = || UploadError::UnsupportedType {
        kind: kind.label(),
        allowed: kind.allowed_extensions().join(", "),
    };

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(unsupported)?;
    if !kind.allowed_extensions().contains(&extension.as_str()) {
        return Err(unsupported());
    }

    let mime = content_type
        .filter(|c| !c.is_empty() && *c != "application/octet-stream")
        .map(|c| c.split(';').next().unwrap_or(c).trim().to_ascii_lowercase())
        .or_else(|| mime_guess::from_path(file_name).first_raw().map(str::to_string))
        .ok_or_else(unsupported)?;
    if !kind.allowed_mime_types().contains(&mime.as_str()) {
        return Err(unsupported());
    }

    Ok(extension)
}

/// Files stored under `root`, served at `url_prefix`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: PathBuf, url_prefix: impl Into<String>) -> Self {
        Self {
            root,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload as `{user_id}_{unix}_{random}.{ext}` and return its URL.
    pub async fn save(
        &self,
        kind: UploadKind,
        user_id: i64,
        extension: &str,
        data: &[u8],
    ) -> Result<String> {
        let folder = self.root.join(kind.folder());
        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("Failed to create media directory: {}", folder.display()))?;

        let suffix: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let file_name = format!(
            "{user_id}_{}_{suffix}.{extension}",
            chrono::Utc::now().timestamp()
        );
        let path = folder.join(&file_name);

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        debug!(path = %path.display(), bytes = data.len(), "Stored upload");

        Ok(format!("{}/{}/{file_name}", self.url_prefix, kind.folder()))
    }

    /// Map a URL produced by [`MediaStore::save`] back to its file.
    /// Anything outside the store (or trying to escape it) maps to `None`.
    #[must_use]
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.url_prefix)?.strip_prefix('/')?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Delete a stored file. Missing files and foreign URLs are ignored.
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.path_for_url(url) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove media file: {e}"),
        }
    }
}
