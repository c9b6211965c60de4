//! File attachments stored for documents.
//!
//! `FileManager` is the seam the form handlers use; `LocalFileManager`
//! keeps the bytes on local disk and an in-memory index of which record
//! each file belongs to.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::FileConfig;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file stored for a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub file_name: String,
    pub file_url: String,
    pub content_hash: String,
    pub file_size: usize,
    pub attached_to_doctype: String,
    pub attached_to_name: String,
}

#[async_trait]
pub trait FileManager: Send + Sync {
    /// Store `content` as `filename` attached to `(doctype, name)`.
    /// With `decode`, `content` is a data URL (or bare base64) and is decoded first.
    async fn save_file(
        &self,
        filename: &str,
        content: &str,
        doctype: &str,
        name: &str,
        decode: bool,
    ) -> Result<StoredFile, FileError>;

    /// Remove the file at `file_url` if it is attached to `(doctype, name)`
    async fn remove_file_by_url(&self, file_url: &str, doctype: &str, name: &str) -> Result<(), FileError>;

    /// Remove every file attached to `(doctype, name)`
    async fn remove_attached(&self, doctype: &str, name: &str) -> Result<usize, FileError>;
}

/// Decode `data:<mime>;base64,<payload>` or a bare base64 payload
pub fn decode_data_url(content: &str) -> Result<Vec<u8>, FileError> {
    let payload = match content.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| FileError::InvalidDataUrl("missing ',' separator".to_string()))?;
            if !header.ends_with(";base64") {
                // Non-base64 data URLs carry the payload verbatim
                return Ok(payload.as_bytes().to_vec());
            }
            payload
        }
        None => content,
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| FileError::InvalidDataUrl(e.to_string()))
}

fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Strip any directory part and reject names that cannot be stored
fn sanitize_file_name(filename: &str) -> Result<String, FileError> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(FileError::InvalidFileName(filename.to_string()));
    }
    Ok(base.to_string())
}

/// Insert a short hash before the extension: `photo.png` → `photo-1a2b3c.png`
fn with_hash_suffix(file_name: &str, hash: &str) -> String {
    let suffix = &hash[..6];
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{suffix}.{ext}"),
        _ => format!("{file_name}-{suffix}"),
    }
}

/// Disk-backed file manager rooted at `FileConfig::root_dir`.
///
/// The index keeps one entry per attachment. Identical uploads share a URL,
/// and the bytes leave the disk only with the last attachment.
#[derive(Clone)]
pub struct LocalFileManager {
    root: PathBuf,
    url_prefix: String,
    max_file_size: usize,
    index: Arc<Mutex<HashMap<String, Vec<StoredFile>>>>,
}

impl LocalFileManager {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>, max_file_size: usize) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            max_file_size,
            index: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(&config.root_dir, &config.url_prefix, config.max_file_size_bytes)
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.url_prefix, file_name)
    }

    fn path_for_url(&self, file_url: &str) -> Option<PathBuf> {
        file_url
            .strip_prefix(&self.url_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|file_name| self.root.join(file_name))
    }

    async fn delete_from_disk(&self, file_url: &str) -> Result<(), FileError> {
        let Some(path) = self.path_for_url(file_url) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File already gone from disk: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_attached(file: &StoredFile, doctype: &str, name: &str) -> bool {
    file.attached_to_doctype == doctype && file.attached_to_name == name
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn save_file(
        &self,
        filename: &str,
        content: &str,
        doctype: &str,
        name: &str,
        decode: bool,
    ) -> Result<StoredFile, FileError> {
        let bytes = if decode { decode_data_url(content)? } else { content.as_bytes().to_vec() };
        if bytes.len() > self.max_file_size {
            return Err(FileError::TooLarge { size: bytes.len(), limit: self.max_file_size });
        }

        let hash = content_hash(&bytes);
        let mut file_name = sanitize_file_name(filename)?;

        let mut index = self.index.lock().await;
        let clashes = index
            .get(&self.url_for(&file_name))
            .and_then(|files| files.first())
            .map(|existing| existing.content_hash != hash)
            .unwrap_or(false);
        if clashes {
            file_name = with_hash_suffix(&file_name, &hash);
        }
        let file_url = self.url_for(&file_name);

        let attachments = index.entry(file_url.clone()).or_default();
        if attachments.is_empty() {
            tokio::fs::create_dir_all(&self.root).await?;
            tokio::fs::write(self.root.join(&file_name), &bytes).await?;
        }

        let stored = StoredFile {
            file_name,
            file_url,
            content_hash: hash,
            file_size: bytes.len(),
            attached_to_doctype: doctype.to_string(),
            attached_to_name: name.to_string(),
        };
        if !attachments.iter().any(|f| is_attached(f, doctype, name)) {
            attachments.push(stored.clone());
        }

        info!(
            "Stored file {} for {} {} ({} attachments)",
            stored.file_url,
            doctype,
            name,
            attachments.len()
        );
        Ok(stored)
    }

    async fn remove_file_by_url(&self, file_url: &str, doctype: &str, name: &str) -> Result<(), FileError> {
        let mut index = self.index.lock().await;
        let Some(attachments) = index.get_mut(file_url) else {
            warn!("Not removing {}: unknown file", file_url);
            return Ok(());
        };

        let before = attachments.len();
        attachments.retain(|f| !is_attached(f, doctype, name));
        if attachments.len() == before {
            warn!("Not removing {}: not attached to {} {}", file_url, doctype, name);
            return Ok(());
        }

        if attachments.is_empty() {
            index.remove(file_url);
            self.delete_from_disk(file_url).await?;
        }
        info!("Detached file {} from {} {}", file_url, doctype, name);
        Ok(())
    }

    async fn remove_attached(&self, doctype: &str, name: &str) -> Result<usize, FileError> {
        let mut index = self.index.lock().await;
        let mut removed = 0;
        let mut orphaned = Vec::new();

        for (url, attachments) in index.iter_mut() {
            let before = attachments.len();
            attachments.retain(|f| !is_attached(f, doctype, name));
            removed += before - attachments.len();
            if attachments.is_empty() {
                orphaned.push(url.clone());
            }
        }

        for url in &orphaned {
            index.remove(url);
            self.delete_from_disk(url).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_DATA_URL: &str = "data:image/png;base64,aGVsbG8gd29ybGQ=";

    fn manager(dir: &tempfile::TempDir) -> LocalFileManager {
        LocalFileManager::new(dir.path(), "/files", 1024)
    }

    #[test]
    fn decodes_base64_data_url() {
        assert_eq!(decode_data_url(PNG_DATA_URL).unwrap(), b"hello world");
        assert_eq!(decode_data_url("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_data_url("data:text/plain,hi").unwrap(), b"hi");
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,***").is_err());
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name("C:\\tmp\\cv.pdf").unwrap(), "cv.pdf");
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("dir/").is_err());
    }

    #[tokio::test]
    async fn saves_and_removes_attached_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(&dir);

        let stored = files
            .save_file("photo.png", PNG_DATA_URL, "Job Application", "abc", true)
            .await
            .unwrap();
        assert_eq!(stored.file_url, "/files/photo.png");
        assert_eq!(std::fs::read(dir.path().join("photo.png")).unwrap(), b"hello world");

        // Wrong owner record: left alone
        files.remove_file_by_url(&stored.file_url, "Job Application", "other").await.unwrap();
        assert!(dir.path().join("photo.png").exists());

        files.remove_file_by_url(&stored.file_url, "Job Application", "abc").await.unwrap();
        assert!(!dir.path().join("photo.png").exists());
        assert!(!files.index.lock().await.contains_key("/files/photo.png"));
    }

    #[tokio::test]
    async fn clashing_name_with_new_content_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(&dir);

        let first = files.save_file("cv.txt", "one", "Job Application", "a", false).await.unwrap();
        let second = files.save_file("cv.txt", "two", "Job Application", "b", false).await.unwrap();

        assert_eq!(first.file_url, "/files/cv.txt");
        assert_ne!(second.file_url, first.file_url);
        assert!(second.file_name.starts_with("cv-") && second.file_name.ends_with(".txt"));
    }

    #[tokio::test]
    async fn identical_upload_is_shared_until_last_record_lets_go() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(&dir);

        let ann = files.save_file("cv.txt", "same", "Job Application", "ann", false).await.unwrap();
        let bob = files.save_file("cv.txt", "same", "Job Application", "bob", false).await.unwrap();
        assert_eq!(ann.file_url, bob.file_url);

        assert_eq!(files.remove_attached("Job Application", "bob").await.unwrap(), 1);
        assert!(dir.path().join("cv.txt").exists());

        // Replacing bob's attachment again must not touch ann's file either
        files.save_file("cv.txt", "same", "Job Application", "bob", false).await.unwrap();
        files.remove_file_by_url(&bob.file_url, "Job Application", "bob").await.unwrap();
        assert!(dir.path().join("cv.txt").exists());

        files.remove_file_by_url(&ann.file_url, "Job Application", "ann").await.unwrap();
        assert!(!dir.path().join("cv.txt").exists());
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalFileManager::new(dir.path(), "/files", 4);
        let err = files.save_file("big.txt", "too big", "ToDo", "x", false).await;
        assert!(matches!(err, Err(FileError::TooLarge { size: 7, limit: 4 })));
    }

    #[tokio::test]
    async fn remove_attached_clears_all_files_of_record() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(&dir);
        files.save_file("a.txt", "a", "ToDo", "t1", false).await.unwrap();
        files.save_file("b.txt", "b", "ToDo", "t1", false).await.unwrap();
        files.save_file("c.txt", "c", "ToDo", "t2", false).await.unwrap();

        assert_eq!(files.remove_attached("ToDo", "t1").await.unwrap(), 2);
        assert!(!dir.path().join("a.txt").exists());
        assert!(dir.path().join("c.txt").exists());
    }
}
