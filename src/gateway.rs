//! Persistence Gateway
//!
//! CRUD, tagging and live-list subscriptions for the three document kinds
//! (summaries, mind maps, test papers), plus attempt records nested under
//! their paper. Wraps the document store and object storage collaborators;
//! storage cleanup on paper delete is best-effort while the document
//! delete is authoritative.

use crate::blob::{answer_key, attempt_answer_key, paper_file_key, BlobStore};
use crate::error::{Error, Result};
use crate::grading::GradeSheet;
use crate::store::DocumentStore;
use crate::types::{Answer, AttemptDoc, QuestionType, StudyDocument, TestPaperDoc};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

fn attempts_path(paper_id: &str) -> String {
    format!("testpapers/{}/attempts", paper_id)
}

#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Gateway {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Create a document: assigns a fresh id and the server timestamp.
    pub async fn create<T: StudyDocument>(&self, owner: &str, mut doc: T) -> Result<String> {
        if doc.id().is_empty() {
            doc.set_id(Uuid::new_v4().to_string());
        }
        doc.set_created(Utc::now());
        let id = doc.id().to_string();
        self.store
            .set(owner, T::collection(), &id, serde_json::to_value(&doc)?)
            .await?;
        Ok(id)
    }

    pub async fn get<T: StudyDocument>(&self, owner: &str, id: &str) -> Result<T> {
        let raw = self
            .store
            .get(owner, T::collection(), id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{}/{}", T::collection(), id)))?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Write a document back in full (last-writer-wins).
    pub async fn save<T: StudyDocument>(&self, owner: &str, doc: &T) -> Result<()> {
        if doc.id().is_empty() {
            return Err(Error::Validation("document has no id".to_string()));
        }
        self.store
            .set(owner, T::collection(), doc.id(), serde_json::to_value(doc)?)
            .await
    }

    /// Current documents of one kind, newest first.
    pub async fn list<T: StudyDocument>(&self, owner: &str) -> Result<Vec<T>> {
        let raw = self.store.list(owner, T::collection()).await?;
        Ok(decode_sorted::<T>(raw))
    }

    /// Live dashboard listing: the receiver carries the full typed list,
    /// newest first, replaced on every remote change. Drop it to cancel.
    pub async fn subscribe<T: StudyDocument>(
        &self,
        owner: &str,
    ) -> Result<watch::Receiver<Vec<T>>> {
        let mut raw = self.store.subscribe(owner, T::collection()).await?;
        let initial = decode_sorted::<T>(raw.borrow().clone());
        let (tx, rx) = watch::channel(initial);
        tokio::spawn(async move {
            while raw.changed().await.is_ok() {
                let docs = decode_sorted::<T>(raw.borrow().clone());
                if tx.send(docs).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    /// Rename a document. Blank titles are rejected before any write.
    pub async fn rename<T: StudyDocument>(
        &self,
        owner: &str,
        id: &str,
        new_title: &str,
    ) -> Result<()> {
        if new_title.trim().is_empty() {
            return Err(Error::Validation("title must not be blank".to_string()));
        }
        let mut doc: T = self.get(owner, id).await?;
        doc.set_title(new_title.to_string());
        self.save(owner, &doc).await
    }

    /// Delete a single document. Test papers go through
    /// [`Gateway::delete_test_paper`] so their storage objects are cleaned
    /// up first.
    pub async fn delete<T: StudyDocument>(&self, owner: &str, id: &str) -> Result<()> {
        self.store.delete(owner, T::collection(), id).await
    }

    /// Add a tag; a case-sensitive exact duplicate is a no-op with no write.
    pub async fn add_tag<T: StudyDocument>(&self, owner: &str, id: &str, tag: &str) -> Result<()> {
        let mut doc: T = self.get(owner, id).await?;
        if doc.tags().iter().any(|t| t == tag) {
            return Ok(());
        }
        doc.tags_mut().push(tag.to_string());
        self.save(owner, &doc).await
    }

    pub async fn remove_tag<T: StudyDocument>(
        &self,
        owner: &str,
        id: &str,
        tag: &str,
    ) -> Result<()> {
        let mut doc: T = self.get(owner, id).await?;
        doc.tags_mut().retain(|t| t != tag);
        self.save(owner, &doc).await
    }

    /// Store a new test paper: the primary PDF uploads first, then any
    /// model-answer files for `Other` questions, then the document record.
    pub async fn upload_test_paper(
        &self,
        owner: &str,
        mut paper: TestPaperDoc,
        file_bytes: &[u8],
        answer_files: &[(String, String, Vec<u8>)],
    ) -> Result<String> {
        if paper.paper_title.trim().is_empty() {
            return Err(Error::Validation("paper title must not be blank".to_string()));
        }
        if paper.id.is_empty() {
            paper.id = Uuid::new_v4().to_string();
        }

        let key = paper_file_key(owner, &paper.id, &paper.file_name);
        paper.file_url = self.blobs.upload(&key, file_bytes).await?;

        for (question_id, name, bytes) in answer_files {
            let key = answer_key(owner, &paper.id, question_id, name);
            let url = self.blobs.upload(&key, bytes).await?;
            for question in paper
                .questions_by_page
                .iter_mut()
                .flat_map(|p| p.questions.iter_mut())
            {
                if &question.id == question_id {
                    question.correct_answer = Some(Answer::File {
                        name: name.clone(),
                        url: url.clone(),
                    });
                }
            }
        }

        self.create(owner, paper).await
    }

    /// Delete a test paper. Storage objects (primary file, model-answer
    /// files, attempt answer files) are removed first; any blob failure is
    /// logged and swallowed, then the document delete proceeds regardless.
    pub async fn delete_test_paper(&self, owner: &str, id: &str) -> Result<()> {
        let paper: TestPaperDoc = self.get(owner, id).await?;

        let mut keys = Vec::new();
        if !paper.file_name.is_empty() {
            keys.push(paper_file_key(owner, id, &paper.file_name));
        }
        for question in paper.questions() {
            if question.qtype == QuestionType::Other {
                if let Some(Answer::File { name, .. }) = &question.correct_answer {
                    keys.push(answer_key(owner, id, &question.id, name));
                }
            }
        }
        for attempt in self.list_attempts(owner, id).await.unwrap_or_default() {
            for (question_id, answer) in &attempt.answers {
                if let Answer::File { name, .. } = answer {
                    keys.push(attempt_answer_key(owner, id, &attempt.id, question_id, name));
                }
            }
        }

        for key in keys {
            if let Err(e) = self.blobs.delete(&key).await {
                tracing::warn!(%key, error = %e, "failed to delete storage object");
            }
        }

        self.store.delete(owner, TestPaperDoc::collection(), id).await
    }

    /// Record a finished attempt under its paper. The id and server
    /// timestamp are assigned here; grading state only ever enters through
    /// [`save_grades`](Self::save_grades), so whatever the caller supplied
    /// is discarded and the record is written ungraded.
    pub async fn create_attempt(
        &self,
        owner: &str,
        paper_id: &str,
        mut attempt: AttemptDoc,
    ) -> Result<String> {
        if attempt.id.is_empty() {
            attempt.id = Uuid::new_v4().to_string();
        }
        attempt.timestamp = Utc::now();
        attempt.graded = false;
        attempt.scores = BTreeMap::new();
        attempt.total_scored = 0.0;
        let id = attempt.id.clone();
        self.store
            .set(
                owner,
                &attempts_path(paper_id),
                &id,
                serde_json::to_value(&attempt)?,
            )
            .await?;
        Ok(id)
    }

    pub async fn get_attempt(
        &self,
        owner: &str,
        paper_id: &str,
        attempt_id: &str,
    ) -> Result<AttemptDoc> {
        let raw = self
            .store
            .get(owner, &attempts_path(paper_id), attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("attempt {}", attempt_id)))?;
        Ok(serde_json::from_value(raw)?)
    }

    /// All attempts for a paper, newest first.
    pub async fn list_attempts(&self, owner: &str, paper_id: &str) -> Result<Vec<AttemptDoc>> {
        let raw = self.store.list(owner, &attempts_path(paper_id)).await?;
        let mut attempts: Vec<AttemptDoc> = raw.into_iter().filter_map(decode).collect();
        attempts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(attempts)
    }

    /// Apply the grading pass to an attempt, exactly once. An attempt that
    /// already carries grades is rejected with [`Error::AlreadyGraded`].
    pub async fn save_grades(
        &self,
        owner: &str,
        paper_id: &str,
        attempt_id: &str,
        sheet: &GradeSheet,
    ) -> Result<()> {
        let mut attempt = self.get_attempt(owner, paper_id, attempt_id).await?;
        if attempt.graded {
            return Err(Error::AlreadyGraded);
        }
        attempt.scores = sheet.score_values();
        attempt.total_scored = sheet.total_scored();
        attempt.graded = true;
        self.store
            .set(
                owner,
                &attempts_path(paper_id),
                attempt_id,
                serde_json::to_value(&attempt)?,
            )
            .await
    }
}

fn decode<T: serde::de::DeserializeOwned>(raw: Value) -> Option<T> {
    match serde_json::from_value(raw) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!(error = %e, "skipping undecodable document");
            None
        }
    }
}

fn decode_sorted<T: StudyDocument>(raw: Vec<Value>) -> Vec<T> {
    let mut docs: Vec<T> = raw.into_iter().filter_map(decode).collect();
    docs.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
    docs
}
