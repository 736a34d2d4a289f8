// src/ingest/types.rs
//! Shared ingestion types: the candidate post shape, the provider seam and
//! the fetch error taxonomy the scheduler reacts to.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One post as fetched from a source, before classification.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CandidatePost {
    pub text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Why a fetch failed. The scheduler only distinguishes "this handle is
/// rate-limited" (penalize the handle) from everything else (error backoff).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by provider")]
    RateLimited,
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().map(|s| s.as_u16()) == Some(429) {
            FetchError::RateLimited
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

pub type FetchResult = Result<Vec<CandidatePost>, FetchError>;

/// Capability seam over "fetch recent posts for one handle".
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Most recent posts for this provider's handle, newest first, at most
    /// `max_posts` of them.
    async fn fetch_recent(&self, max_posts: usize) -> FetchResult;

    /// The account handle this provider polls.
    fn handle(&self) -> &str;
}
