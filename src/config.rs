//! Configuration
//!
//! Environment-driven settings with sensible local defaults.

use std::path::PathBuf;

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for documents and uploaded files.
    pub data_dir: PathBuf,
    /// Base URL of the generation service.
    pub api_url: String,
    pub host: String,
    pub port: u16,
    /// Owner id used when running without a real auth backend.
    pub user: String,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("STUDYGRAPH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("studygraph")
            });

        let api_url = std::env::var("STUDYGRAPH_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let host = std::env::var("STUDYGRAPH_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("STUDYGRAPH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3030);

        let user = std::env::var("STUDYGRAPH_USER").unwrap_or_else(|_| "local".to_string());

        Self {
            data_dir,
            api_url,
            host,
            port,
            user,
        }
    }

    pub fn document_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }
}
