//! Filesystem object store for comment attachments
//!
//! Objects are written under a generated `uuid.ext` key and addressed
//! afterward via a public URL ({public_base}/objects/{key}).

use medscan_common::records::Attachment;
use medscan_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    public_base: String,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    /// Create the backing directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| Error::Storage(format!("cannot create object dir: {e}")))
    }

    /// Write an attachment, returning its generated key
    pub async fn store(&self, attachment: &Attachment) -> Result<String> {
        let key = format!(
            "{}.{}",
            Uuid::new_v4(),
            extension_for(&attachment.file_name, &attachment.content_type)
        );
        let path = self.root.join(&key);

        tokio::fs::write(&path, &attachment.bytes)
            .await
            .map_err(|e| Error::Storage(format!("attachment write failed: {e}")))?;

        debug!(key = %key, size = attachment.bytes.len(), "stored attachment");
        Ok(key)
    }

    /// Remove a stored object (used to compensate a failed row insert)
    pub async fn remove(&self, key: &str) -> Result<()> {
        tokio::fs::remove_file(self.root.join(key))
            .await
            .map_err(|e| Error::Storage(format!("attachment removal failed: {e}")))
    }

    /// Read an object back along with its content type
    pub async fn read(&self, key: &str) -> Result<(Vec<u8>, String)> {
        if !Self::valid_key(key) {
            return Err(Error::InvalidInput(format!("invalid object key: {key}")));
        }
        let bytes = tokio::fs::read(self.root.join(key))
            .await
            .map_err(|_| Error::NotFound(format!("no stored object: {key}")))?;
        Ok((bytes, content_type_for(key).to_string()))
    }

    /// Public URL a stored key is addressable under
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/objects/{}", self.public_base.trim_end_matches('/'), key)
    }

    /// Keys are single flat path segments of the shape we generate
    pub fn valid_key(key: &str) -> bool {
        !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !key.contains("..")
    }
}

/// Pick the stored extension from the original file name, falling back to
/// the declared content type
fn extension_for(file_name: &str, content_type: &str) -> &'static str {
    let from_name = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match from_name.as_deref() {
        Some("png") => "png",
        Some("jpg") | Some("jpeg") => "jpg",
        Some("webp") => "webp",
        Some("gif") => "gif",
        _ => match content_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        },
    }
}

fn content_type_for(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
