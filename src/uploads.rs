use std::path::PathBuf;

use url::Url;
use uuid::Uuid;

/// Hard cap on attachment size.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const FORBIDDEN_FILE_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("attachment of {size} bytes exceeds the 10 MiB limit")]
    TooLarge { size: usize },
    #[error("forbidden file name: {name}")]
    ForbiddenFileName { name: String },
    #[error("error persisting attachment")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Policy violations are the caller's fault; IO failures are ours.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Io(_))
    }
}

/// A stored attachment: the externally reachable url plus the sanitized
/// original file name for display.
#[derive(Clone, Debug)]
pub struct StoredUpload {
    pub url: String,
    pub file_name: String,
}

/// File-backed store for post attachments. Files land under a local
/// directory and are served from a configured public base url.
#[derive(Debug)]
pub struct UploadStore {
    storage_dir: PathBuf,
    public_base_url: Url,
}

impl UploadStore {
    pub fn new(storage_dir: PathBuf, public_base_url: Url) -> Result<Self, anyhow::Error> {
        if public_base_url.cannot_be_a_base() {
            anyhow::bail!("upload base url cannot hold a path: {}", public_base_url);
        }
        std::fs::create_dir_all(&storage_dir)?;
        Ok(Self {
            storage_dir,
            public_base_url,
        })
    }

    /// Persist one attachment and return its public url and display name.
    ///
    /// The stored name is uuid-prefixed so two uploads with the same
    /// original name never collide.
    #[tracing::instrument(name = "storing attachment", skip(self, content))]
    pub fn store(&self, original_name: &str, content: &[u8]) -> Result<StoredUpload, UploadError> {
        if content.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                size: content.len(),
            });
        }
        let file_name = sanitized_file_name(original_name)?;
        let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
        std::fs::write(self.storage_dir.join(&stored_name), content)?;

        let mut url = self.public_base_url.clone();
        url.path_segments_mut()
            .expect("upload base url is validated at construction")
            .push(&stored_name);
        Ok(StoredUpload {
            url: url.to_string(),
            file_name,
        })
    }
}

fn sanitized_file_name(original_name: &str) -> Result<String, UploadError> {
    let trimmed = original_name.trim();
    let is_traversal = trimmed.contains("..");
    let has_forbidden_chars = trimmed
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_FILE_NAME_CHARS.contains(&c));

    if trimmed.is_empty() || is_traversal || has_forbidden_chars {
        Err(UploadError::ForbiddenFileName {
            name: original_name.to_string(),
        })
    } else {
        Ok(trimmed.to_string())
    }
}
