//! Storage for delivery evidence photos.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::FulfillmentError;

/// Public path prefix under which stored evidence is served.
pub const EVIDENCE_PREFIX: &str = "/evidence/";

/// An uploaded photo.
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl EvidenceUpload {
    pub fn new(file_name: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name,
            bytes: bytes.into(),
        }
    }

    /// Random stored name keeping the upload's extension, if it has a sane one.
    fn stored_name(&self) -> String {
        let id = Uuid::new_v4();
        let extension = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            });
        match extension {
            Some(ext) => format!("{id}.{ext}"),
            None => id.to_string(),
        }
    }
}

/// Stores evidence out of band and hands back the URL kept on the shipment.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Stores the photo. An empty upload is rejected.
    async fn store(&self, upload: EvidenceUpload) -> Result<String, FulfillmentError>;

    /// Reads back a stored photo by its file name.
    async fn load(&self, file_name: &str) -> Result<Option<Bytes>, FulfillmentError>;

    /// Deletes a photo by the URL `store` returned. A missing file is not an
    /// error.
    async fn discard(&self, url: &str) -> Result<(), FulfillmentError>;
}

fn check_upload(upload: &EvidenceUpload) -> Result<(), FulfillmentError> {
    if upload.bytes.is_empty() {
        return Err(FulfillmentError::validation("Photo is required"));
    }
    Ok(())
}

fn name_from_url(url: &str) -> Result<&str, FulfillmentError> {
    let name = url.strip_prefix(EVIDENCE_PREFIX).unwrap_or(url);
    check_name(name)?;
    Ok(name)
}

fn check_name(file_name: &str) -> Result<(), FulfillmentError> {
    if file_name.is_empty() || file_name.contains("..") || file_name.contains(['/', '\\']) {
        return Err(FulfillmentError::validation("Invalid evidence file name"));
    }
    Ok(())
}

/// Keeps evidence as files in a local directory.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    dir: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl EvidenceStore for FsEvidenceStore {
    async fn store(&self, upload: EvidenceUpload) -> Result<String, FulfillmentError> {
        check_upload(&upload)?;
        let name = upload.stored_name();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FulfillmentError::Internal(format!("could not create evidence dir: {e}")))?;
        tokio::fs::write(self.dir.join(&name), &upload.bytes)
            .await
            .map_err(|e| FulfillmentError::Internal(format!("could not store evidence file: {e}")))?;

        tracing::debug!(%name, size = upload.bytes.len(), "evidence stored");
        Ok(format!("{EVIDENCE_PREFIX}{name}"))
    }

    async fn load(&self, file_name: &str) -> Result<Option<Bytes>, FulfillmentError> {
        check_name(file_name)?;
        match tokio::fs::read(self.dir.join(file_name)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FulfillmentError::Internal(format!(
                "could not read evidence file: {e}"
            ))),
        }
    }

    async fn discard(&self, url: &str) -> Result<(), FulfillmentError> {
        let name = name_from_url(url)?;
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => {
                tracing::debug!(%name, "evidence discarded");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FulfillmentError::Internal(format!(
                "could not remove evidence file: {e}"
            ))),
        }
    }
}

/// In-memory evidence store for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEvidenceStore {
    files: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_count(&self) -> usize {
        self.files.read().unwrap().len()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn store(&self, upload: EvidenceUpload) -> Result<String, FulfillmentError> {
        check_upload(&upload)?;
        let name = upload.stored_name();
        self.files
            .write()
            .unwrap()
            .insert(name.clone(), upload.bytes);
        Ok(format!("{EVIDENCE_PREFIX}{name}"))
    }

    async fn load(&self, file_name: &str) -> Result<Option<Bytes>, FulfillmentError> {
        check_name(file_name)?;
        Ok(self.files.read().unwrap().get(file_name).cloned())
    }

    async fn discard(&self, url: &str) -> Result<(), FulfillmentError> {
        let name = name_from_url(url)?;
        self.files.write().unwrap().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_keeps_extension() {
        let upload = EvidenceUpload::new(Some("door.JPG".into()), vec![1u8]);
        assert!(upload.stored_name().ends_with(".jpg"));

        let upload = EvidenceUpload::new(Some("no-extension".into()), vec![1u8]);
        assert!(!upload.stored_name().contains('.'));

        let upload = EvidenceUpload::new(Some("weird.p/ng".into()), vec![1u8]);
        assert!(!upload.stored_name().contains('.'));
    }

    #[tokio::test]
    async fn empty_photo_is_rejected() {
        let store = InMemoryEvidenceStore::new();
        let result = store.store(EvidenceUpload::new(None, Bytes::new())).await;
        assert!(matches!(result, Err(FulfillmentError::Validation(_))));
        assert_eq!(store.file_count(), 0);
    }

    #[tokio::test]
    async fn fs_store_round_trips_through_the_public_url() {
        let dir = std::env::temp_dir().join(format!("evidence-{}", Uuid::new_v4()));
        let store = FsEvidenceStore::new(&dir);

        let url = store
            .store(EvidenceUpload::new(Some("photo.png".into()), vec![7u8, 8, 9]))
            .await
            .unwrap();
        let name = url.strip_prefix(EVIDENCE_PREFIX).unwrap();
        assert!(name.ends_with(".png"));

        let bytes = store.load(name).await.unwrap().unwrap();
        assert_eq!(bytes.as_ref(), &[7u8, 8, 9]);
        assert!(store.load("missing.png").await.unwrap().is_none());
        assert!(store.load("../etc/passwd").await.is_err());

        store.discard(&url).await.unwrap();
        assert!(store.load(name).await.unwrap().is_none());
        store.discard(&url).await.unwrap();
        assert!(store.discard("/evidence/../secrets").await.is_err());

        let _ = std::fs::remove_dir_all(dir);
    }
}
