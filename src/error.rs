//! Typed failure taxonomy shared by every fallible operation.
//!
//! One enum per failure kind; the HTTP layer owns the single mapping
//! from kind to user-facing status/message.

/// Errors produced by the gateway, generation client, export pipeline
/// and attempt engine.
#[derive(Debug)]
pub enum Error {
    /// Operation requires a signed-in user.
    AuthRequired,
    /// Document (or blob) does not exist.
    NotFound(String),
    /// Caller-supplied input rejected before any remote call.
    Validation(String),
    /// Generation API failure; carries the endpoint's message verbatim.
    Remote(String),
    /// Document store or object storage failure.
    Storage(String),
    /// Export pipeline failure (rasterization, PDF wrapping, IO).
    Export(String),
    /// Attempt already carries a grading pass; grades are written exactly once.
    AlreadyGraded,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AuthRequired => write!(f, "sign in required"),
            Error::NotFound(what) => write!(f, "not found: {}", what),
            Error::Validation(msg) => write!(f, "invalid input: {}", msg),
            Error::Remote(msg) => write!(f, "generation API error: {}", msg),
            Error::Storage(msg) => write!(f, "storage error: {}", msg),
            Error::Export(msg) => write!(f, "export failed: {}", msg),
            Error::AlreadyGraded => write!(f, "attempt is already graded"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(format!("serialization: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
