//! Document store collaborator.
//!
//! The real deployment target is a cloud document database; this module
//! defines the contract the gateway programs against plus `JsonFileStore`,
//! a local implementation keeping one JSON file per document.
//!
//! Documents are schemaless values keyed by `(owner, collection path, id)`.
//! Writes are last-writer-wins; there is no version check, so two clients
//! saving the same document overwrite each other silently.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tokio::sync::{watch, Mutex};

/// Hierarchical, subscription-capable document database contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, owner: &str, path: &str, id: &str) -> Result<Option<Value>>;

    async fn set(&self, owner: &str, path: &str, id: &str, doc: Value) -> Result<()>;

    async fn delete(&self, owner: &str, path: &str, id: &str) -> Result<()>;

    async fn list(&self, owner: &str, path: &str) -> Result<Vec<Value>>;

    /// Push-based live query: the receiver carries the full (unordered)
    /// document list and is replaced on every change under the same key.
    /// Dropping the receiver cancels the subscription.
    async fn subscribe(&self, owner: &str, path: &str) -> Result<watch::Receiver<Vec<Value>>>;
}

/// One JSON file per document under `root/{owner}/{path}/{id}.json`.
pub struct JsonFileStore {
    root: PathBuf,
    watchers: Mutex<HashMap<(String, String), watch::Sender<Vec<Value>>>>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            watchers: Mutex::new(HashMap::new()),
        })
    }

    fn collection_dir(&self, owner: &str, path: &str) -> PathBuf {
        let mut dir = self.root.join(owner);
        for segment in path.split('/') {
            dir = dir.join(segment);
        }
        dir
    }

    fn doc_path(&self, owner: &str, path: &str, id: &str) -> PathBuf {
        self.collection_dir(owner, path).join(format!("{}.json", id))
    }

    fn read_collection(&self, owner: &str, path: &str) -> Result<Vec<Value>> {
        let dir = self.collection_dir(owner, path);
        let mut docs = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(docs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str(&raw) {
                Ok(doc) => docs.push(doc),
                // A torn write leaves an unparseable file; skip it rather
                // than failing the whole listing.
                Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        Ok(docs)
    }

    /// Re-publish the collection to any live subscription.
    async fn notify(&self, owner: &str, path: &str) -> Result<()> {
        let key = (owner.to_string(), path.to_string());
        let mut watchers = self.watchers.lock().await;
        if let Some(tx) = watchers.get(&key) {
            let docs = self.read_collection(owner, path)?;
            if tx.send(docs).is_err() {
                // Every receiver was dropped; tear the channel down.
                watchers.remove(&key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, owner: &str, path: &str, id: &str) -> Result<Option<Value>> {
        let file = self.doc_path(owner, path, id);
        match fs::read_to_string(&file) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, owner: &str, path: &str, id: &str, doc: Value) -> Result<()> {
        let dir = self.collection_dir(owner, path);
        fs::create_dir_all(&dir)?;
        let raw = serde_json::to_string_pretty(&doc)?;
        fs::write(self.doc_path(owner, path, id), raw)?;
        self.notify(owner, path).await
    }

    async fn delete(&self, owner: &str, path: &str, id: &str) -> Result<()> {
        let file = self.doc_path(owner, path, id);
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("{}/{}", path, id)))
            }
            Err(e) => return Err(e.into()),
        }
        self.notify(owner, path).await
    }

    async fn list(&self, owner: &str, path: &str) -> Result<Vec<Value>> {
        self.read_collection(owner, path)
    }

    async fn subscribe(&self, owner: &str, path: &str) -> Result<watch::Receiver<Vec<Value>>> {
        let key = (owner.to_string(), path.to_string());
        let mut watchers = self.watchers.lock().await;
        if let Some(tx) = watchers.get(&key) {
            return Ok(tx.subscribe());
        }
        let (tx, rx) = watch::channel(self.read_collection(owner, path)?);
        watchers.insert(key, tx);
        Ok(rx)
    }
}
