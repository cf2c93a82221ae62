//! # StudyGraph
//!
//! Study toolkit built around three document kinds: summaries, mind maps
//! and timed past-paper attempts.
//!
//! ## Architecture
//! - **Graph editor**: id-addressed mind map editing with stable node ids
//! - **Gateway**: CRUD, tags and live subscriptions over the document store
//! - **Generation client**: summaries and concept graphs from an external service
//! - **Test mode**: timed sittings, a single grading pass, result aggregates
//! - **Export**: mind maps rendered to PNG and PDF

pub mod attempt;
pub mod blob;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod gateway;
pub mod generate;
pub mod grading;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

pub use attempt::{AnswerInput, SessionState, TestSession};
pub use blob::{BlobStore, FsBlobStore};
pub use config::Config;
pub use editor::{ClickOutcome, GraphEditor, PendingEdit};
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use generate::{GenerationClient, MindMapResponse, SummaryStyle};
pub use grading::{extract_score, paper_stats, GradeSheet, PaperStats, QuestionStats};
pub use session::{AuthProvider, Session, StaticAuth, User};
pub use store::{DocumentStore, JsonFileStore};
pub use types::*;
