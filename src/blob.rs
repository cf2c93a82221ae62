//! Object storage collaborator.
//!
//! Key-addressed blob storage for uploaded files (test papers, answer
//! files). Keys follow the layout
//! `testpapers/{owner}/{paper}/[attempts/{attempt}/]answers/{question}/{filename}`.
//! `FsBlobStore` is the bundled local implementation returning `file://`
//! URLs.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;

/// Key for a paper's primary uploaded file.
pub fn paper_file_key(owner: &str, paper: &str, filename: &str) -> String {
    format!("testpapers/{}/{}/{}", owner, paper, filename)
}

/// Key for a model-answer file attached to a question at upload time.
pub fn answer_key(owner: &str, paper: &str, question: &str, filename: &str) -> String {
    format!("testpapers/{}/{}/answers/{}/{}", owner, paper, question, filename)
}

/// Key for a file answer submitted during an attempt.
pub fn attempt_answer_key(
    owner: &str,
    paper: &str,
    attempt: &str,
    question: &str,
    filename: &str,
) -> String {
    format!(
        "testpapers/{}/{}/attempts/{}/answers/{}/{}",
        owner, paper, attempt, question, filename
    )
}

/// Key-addressed blob storage contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the bytes and return a retrieval URL.
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String>;

    async fn url(&self, key: &str) -> Result<String>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Blobs on the local filesystem under a root directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            path = path.join(segment);
        }
        path
    }

    fn file_url(&self, key: &str) -> String {
        format!("file://{}", self.blob_path(key).display())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.blob_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(self.file_url(key))
    }

    async fn url(&self, key: &str) -> Result<String> {
        if !self.blob_path(key).exists() {
            return Err(Error::NotFound(format!("blob {}", key)));
        }
        Ok(self.file_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
