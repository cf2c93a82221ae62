//! Timed attempt engine
//!
//! Drives one sitting of a test paper: a wall-clock countdown, in-progress
//! answers keyed by question id, and the submit step that uploads file
//! answers and writes the attempt record. Elapsed time follows the wall
//! clock, so a suspended process does not stretch the allowance.

use crate::blob::attempt_answer_key;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::types::{Answer, AttemptDoc, TestPaperDoc};
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Where a sitting currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Answering, countdown live (or frozen at zero after a continue).
    Running,
    /// The countdown just hit zero; answering is blocked until the user
    /// chooses to continue or submit.
    TimeExpired,
    Submitting,
    Submitted,
}

/// An answer as entered during the sitting. Files hold their bytes until
/// submit uploads them.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerInput {
    Choices(Vec<String>),
    Text(String),
    File { name: String, bytes: Vec<u8> },
}

/// One live sitting of a paper.
pub struct TestSession {
    paper: TestPaperDoc,
    allowance: Option<Duration>,
    started: Instant,
    state: SessionState,
    /// Set once when the countdown first reaches zero; never cleared, so
    /// the display stays frozen at 00:00 after a continue.
    expired: bool,
    answers: BTreeMap<String, AnswerInput>,
}

impl TestSession {
    pub fn new(paper: TestPaperDoc, allowance: Option<Duration>) -> Self {
        Self {
            paper,
            allowance,
            started: Instant::now(),
            state: SessionState::Running,
            expired: false,
            answers: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn paper(&self) -> &TestPaperDoc {
        &self.paper
    }

    /// Countdown remaining; zero forever once the allowance ran out.
    pub fn remaining(&self) -> Option<Duration> {
        let allowance = self.allowance?;
        if self.expired {
            return Some(Duration::ZERO);
        }
        Some(allowance.saturating_sub(self.started.elapsed()))
    }

    /// Advance the clock. Flips to [`SessionState::TimeExpired`] the first
    /// time the countdown reaches zero while running.
    pub fn poll(&mut self) -> SessionState {
        if self.state == SessionState::Running && !self.expired {
            if let Some(allowance) = self.allowance {
                if self.started.elapsed() >= allowance {
                    self.expired = true;
                    self.state = SessionState::TimeExpired;
                }
            }
        }
        self.state
    }

    /// Resume answering after expiry; the countdown stays at zero.
    pub fn continue_answering(&mut self) -> Result<()> {
        if self.state != SessionState::TimeExpired {
            return Err(Error::Validation(
                "session is not waiting on an expired timer".to_string(),
            ));
        }
        self.state = SessionState::Running;
        Ok(())
    }

    /// Record or replace the answer to one question.
    pub fn set_answer(&mut self, question_id: &str, input: AnswerInput) -> Result<()> {
        if self.state != SessionState::Running {
            return Err(Error::Validation(format!(
                "cannot answer in state {:?}",
                self.state
            )));
        }
        if !self.paper.questions().any(|q| q.id == question_id) {
            return Err(Error::NotFound(format!("question {}", question_id)));
        }
        self.answers.insert(question_id.to_string(), input);
        Ok(())
    }

    pub fn clear_answer(&mut self, question_id: &str) {
        self.answers.remove(question_id);
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerInput> {
        self.answers.get(question_id)
    }

    /// Wall-clock seconds since the sitting started.
    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Finish the sitting: upload file answers, then write the attempt
    /// record. Unanswered questions are simply absent from the record.
    /// On failure the session returns to its pre-submit state so the
    /// user can retry without losing answers.
    pub async fn submit(&mut self, gateway: &Gateway, owner: &str) -> Result<String> {
        let resume_to = match self.state {
            SessionState::Running | SessionState::TimeExpired => self.state,
            _ => {
                return Err(Error::Validation(format!(
                    "cannot submit in state {:?}",
                    self.state
                )))
            }
        };
        self.state = SessionState::Submitting;

        match self.upload_and_record(gateway, owner).await {
            Ok(id) => {
                self.state = SessionState::Submitted;
                Ok(id)
            }
            Err(e) => {
                self.state = resume_to;
                Err(e)
            }
        }
    }

    async fn upload_and_record(&self, gateway: &Gateway, owner: &str) -> Result<String> {
        let attempt_id = Uuid::new_v4().to_string();
        let mut answers = BTreeMap::new();

        for (question_id, input) in &self.answers {
            let answer = match input {
                AnswerInput::Choices(choices) => Answer::Choices(choices.clone()),
                AnswerInput::Text(text) => Answer::Text(text.clone()),
                AnswerInput::File { name, bytes } => {
                    let key =
                        attempt_answer_key(owner, &self.paper.id, &attempt_id, question_id, name);
                    let url = gateway.blobs().upload(&key, bytes).await?;
                    Answer::File {
                        name: name.clone(),
                        url,
                    }
                }
            };
            answers.insert(question_id.clone(), answer);
        }

        let attempt = AttemptDoc {
            id: attempt_id,
            answers,
            scores: BTreeMap::new(),
            total_scored: 0.0,
            graded: false,
            time_taken: self.elapsed_secs(),
            timestamp: Utc::now(),
        };

        gateway.create_attempt(owner, &self.paper.id, attempt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FsBlobStore;
    use crate::store::JsonFileStore;
    use crate::types::{Question, QuestionPage, QuestionType};
    use std::sync::Arc;
    use tempfile::TempDir;

    const OWNER: &str = "alice";

    fn paper() -> TestPaperDoc {
        TestPaperDoc {
            id: "p1".into(),
            paper_title: "History".into(),
            file_name: String::new(),
            file_url: String::new(),
            num_pages: 1,
            questions_by_page: vec![QuestionPage {
                page: 1,
                questions: vec![
                    Question {
                        id: "q1".into(),
                        question_number: "1".into(),
                        qtype: QuestionType::Mcq,
                        marks: 2.0,
                        options: vec!["A".into(), "B".into()],
                        correct_answer: None,
                    },
                    Question {
                        id: "q2".into(),
                        question_number: "2".into(),
                        qtype: QuestionType::Other,
                        marks: 10.0,
                        options: Vec::new(),
                        correct_answer: None,
                    },
                ],
            }],
            tags: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }

    fn gateway(dir: &TempDir) -> Gateway {
        let store = Arc::new(JsonFileStore::new(dir.path().join("documents")).unwrap());
        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
        Gateway::new(store, blobs)
    }

    #[test]
    fn test_untimed_session_never_expires() {
        let mut session = TestSession::new(paper(), None);
        assert_eq!(session.poll(), SessionState::Running);
        assert_eq!(session.remaining(), None);
    }

    #[test]
    fn test_expiry_blocks_answering_until_continue() {
        let mut session = TestSession::new(paper(), Some(Duration::ZERO));
        assert_eq!(session.poll(), SessionState::TimeExpired);
        assert!(session
            .set_answer("q1", AnswerInput::Choices(vec!["A".into()]))
            .is_err());

        session.continue_answering().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        session
            .set_answer("q1", AnswerInput::Choices(vec!["A".into()]))
            .unwrap();

        // Countdown stays frozen at zero and never re-fires.
        assert_eq!(session.remaining(), Some(Duration::ZERO));
        assert_eq!(session.poll(), SessionState::Running);
    }

    #[test]
    fn test_continue_only_valid_after_expiry() {
        let mut session = TestSession::new(paper(), Some(Duration::from_secs(3600)));
        assert!(session.continue_answering().is_err());
    }

    #[test]
    fn test_answer_unknown_question_rejected() {
        let mut session = TestSession::new(paper(), None);
        assert!(matches!(
            session.set_answer("q9", AnswerInput::Text("x".into())),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_set_answer_replaces() {
        let mut session = TestSession::new(paper(), None);
        session
            .set_answer("q1", AnswerInput::Choices(vec!["A".into()]))
            .unwrap();
        session
            .set_answer("q1", AnswerInput::Choices(vec!["B".into()]))
            .unwrap();
        assert_eq!(
            session.answer("q1"),
            Some(&AnswerInput::Choices(vec!["B".into()]))
        );
        session.clear_answer("q1");
        assert!(session.answer("q1").is_none());
    }

    #[tokio::test]
    async fn test_submit_uploads_files_and_omits_unanswered() {
        let dir = TempDir::new().unwrap();
        let gw = gateway(&dir);
        let paper_id = gw.create(OWNER, paper()).await.unwrap();

        let mut stored = gw.get::<TestPaperDoc>(OWNER, &paper_id).await.unwrap();
        stored.id = paper_id.clone();
        let mut session = TestSession::new(stored, None);
        session
            .set_answer(
                "q2",
                AnswerInput::File {
                    name: "working.pdf".into(),
                    bytes: b"%PDF-1.4 scan".to_vec(),
                },
            )
            .unwrap();

        let attempt_id = session.submit(&gw, OWNER).await.unwrap();
        assert_eq!(session.state(), SessionState::Submitted);

        let attempt = gw.get_attempt(OWNER, &paper_id, &attempt_id).await.unwrap();
        assert!(!attempt.answers.contains_key("q1"));
        match &attempt.answers["q2"] {
            Answer::File { name, url } => {
                assert_eq!(name, "working.pdf");
                assert!(url.starts_with("file://"));
            }
            other => panic!("unexpected answer shape: {:?}", other),
        }
        assert!(!attempt.graded);
    }

    #[tokio::test]
    async fn test_double_submit_rejected() {
        let dir = TempDir::new().unwrap();
        let gw = gateway(&dir);
        let paper_id = gw.create(OWNER, paper()).await.unwrap();
        let mut stored = gw.get::<TestPaperDoc>(OWNER, &paper_id).await.unwrap();
        stored.id = paper_id;

        let mut session = TestSession::new(stored, None);
        session.submit(&gw, OWNER).await.unwrap();
        assert!(session.submit(&gw, OWNER).await.is_err());
    }
}
