//! bunny-store - Path-addressed key/value persistence
//!
//! The bot records the raw NLU parameters behind every ticket proposal at
//! `<team>/<channel>`. Only a blind `set` is needed: no reads on the hot
//! path, no conditional writes, no schema. Backends:
//! - [`FirebaseStore`]: Firebase Realtime Database over its REST API
//! - [`SqliteStore`]: a local SQLite file, handy for development
//! - [`MemoryStore`]: process-local map, used in tests

pub mod firebase;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Characters Firebase refuses inside a key
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store path: {0}")]
    InvalidPath(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

/// A slash-separated location in the store, e.g. `T024BE7LD/C1H9RESGL`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(Vec<String>);

impl StorePath {
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidPath("path has no segments".to_string()));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(StoreError::InvalidPath("empty path segment".to_string()));
            }
            if segment.contains(FORBIDDEN_KEY_CHARS) {
                return Err(StoreError::InvalidPath(format!(
                    "segment '{}' contains a reserved character",
                    segment
                )));
            }
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Write-only key/value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Replace whatever lives at `path` with `value`
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Backend name for log lines
    fn backend(&self) -> &'static str;
}
