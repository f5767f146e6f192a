//! Bucket-scoped object storage on local disk, with public URLs served from
//! the `/uploads` tree. No signing, no expiry.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid bucket or file name: {0}")]
    InvalidName(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not build a public url for {0}")]
    PublicUrl(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct StoredObject {
    pub bucket: String,
    pub object: String,
    pub public_url: String,
}

#[derive(Clone)]
pub struct StorageService {
    root: PathBuf,
    public_base: Url,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>, public_base: Url) -> Self {
        Self {
            root: root.into(),
            public_base,
        }
    }

    /// Write an object and return its stored name and public URL. The stored
    /// name gets a UUID prefix so repeated uploads of the same file never
    /// collide.
    pub async fn store(
        &self,
        bucket: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredObject, StorageError> {
        let bucket = sanitize_component(bucket)?;
        let object = format!("{}-{}", Uuid::new_v4(), sanitize_component(filename)?);

        let dir = self.root.join(&bucket);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&object), bytes).await?;

        let public_url = self.public_url(&bucket, &object)?;
        info!(bucket = %bucket, object = %object, size = bytes.len(), "object stored");

        Ok(StoredObject {
            bucket,
            object,
            public_url: public_url.to_string(),
        })
    }

    pub fn public_url(&self, bucket: &str, object: &str) -> Result<Url, StorageError> {
        self.public_base
            .join(&format!("uploads/{bucket}/{object}"))
            .map_err(|_| StorageError::PublicUrl(format!("{bucket}/{object}")))
    }
}

/// Keep names to a conservative character set; anything else (separators,
/// dots-only names, traversal attempts) is rejected rather than cleaned.
fn sanitize_component(name: &str) -> Result<String, StorageError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(name.to_string())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn service(root: &std::path::Path) -> StorageService {
        StorageService::new(root, Url::parse("http://localhost:3400").unwrap())
    }

    #[tokio::test]
    async fn stores_and_exposes_a_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());

        let stored = storage
            .store("gallery", "clinic-front.jpg", b"not really a jpeg")
            .await
            .unwrap();

        assert_eq!(stored.bucket, "gallery");
        assert!(stored.object.ends_with("-clinic-front.jpg"));
        assert_eq!(
            stored.public_url,
            format!("http://localhost:3400/uploads/gallery/{}", stored.object)
        );

        let on_disk = dir.path().join("gallery").join(&stored.object);
        assert_eq!(std::fs::read(on_disk).unwrap(), b"not really a jpeg");
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(dir.path());

        for bad in ["../escape", "a/b", "", "..", ".hidden"] {
            let err = storage.store(bad, "file.png", b"x").await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{bad}");
        }

        let err = storage
            .store("logo", "../../etc/passwd", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }
}
