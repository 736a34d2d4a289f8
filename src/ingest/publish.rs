// src/ingest/publish.rs
//! Publishing seam between the ingestion loop and the external store.
//!
//! The loop only needs "publish one classified post" and "what is the latest
//! stored post"; `HttpStoreClient` is the production implementation over the
//! store's HTTP interface, tests drop in fakes.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::types::CandidatePost;

pub const DEFAULT_STORE_URL: &str = "http://localhost:8000";
const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Wire form of a classified post, as the store accepts and returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TweetPayload {
    pub text: String,
    pub author: String,
    pub created_at: String, // ISO-8601
    pub disaster_confidence: f32,
}

impl TweetPayload {
    pub fn from_candidate(post: &CandidatePost, confidence: f32) -> Self {
        Self {
            text: post.text.clone(),
            author: post.author.clone(),
            created_at: post.created_at.to_rfc3339(),
            disaster_confidence: confidence,
        }
    }
}

#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    async fn publish(&self, tweet: &TweetPayload) -> Result<()>;
    async fn latest(&self) -> Result<Option<TweetPayload>>;
}

pub struct HttpStoreClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Base URL from `STORE_URL`, falling back to the local default.
    pub fn from_env() -> Self {
        let base = std::env::var("STORE_URL").unwrap_or_else(|_| DEFAULT_STORE_URL.to_string());
        Self::new(base)
    }
}

#[async_trait::async_trait]
impl StoreClient for HttpStoreClient {
    async fn publish(&self, tweet: &TweetPayload) -> Result<()> {
        self.client
            .post(format!("{}/disaster-tweets", self.base_url))
            .json(tweet)
            .send()
            .await
            .context("store post")?
            .error_for_status()
            .context("store non-2xx")?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<TweetPayload>> {
        let mut list: Vec<TweetPayload> = self
            .client
            .get(format!("{}/disaster-tweets", self.base_url))
            .query(&[("limit", "1")])
            .send()
            .await
            .context("store get")?
            .error_for_status()
            .context("store non-2xx")?
            .json()
            .await
            .context("store json")?;

        Ok(if list.is_empty() {
            None
        } else {
            Some(list.remove(0))
        })
    }
}
