// src/ingest/providers/twitter.rs
//! Source provider over the Twitter v2 recent-search API, one instance per
//! polled handle. The query restricts to the handle's own posts mentioning
//! at least one disaster keyword, so most filtering happens server-side and
//! the classifier only sees plausible candidates.

use async_trait::async_trait;
use metrics::histogram;
use serde::Deserialize;

use crate::classify::DISASTER_KEYWORDS;
use crate::ingest::types::{CandidatePost, FetchError, FetchResult, SourceProvider};

const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub struct TwitterProvider {
    handle: String,
    mode: Mode,
}

enum Mode {
    /// Canned posts, returned as-is. Tests build providers this way.
    Fixture(Vec<CandidatePost>),
    Http {
        bearer_token: String,
        client: reqwest::Client,
    },
}

/// `from:<handle> (<kw> OR <kw> OR ...)` over the fixed disaster vocabulary.
fn search_query(handle: &str) -> String {
    format!("from:{handle} ({})", DISASTER_KEYWORDS.join(" OR "))
}

impl TwitterProvider {
    pub fn from_fixture(handle: impl Into<String>, posts: Vec<CandidatePost>) -> Self {
        Self {
            handle: handle.into(),
            mode: Mode::Fixture(posts),
        }
    }

    pub fn from_bearer(handle: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            mode: Mode::Http {
                bearer_token: bearer_token.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    fn parse_search_body(&self, body: &str) -> FetchResult {
        let t0 = std::time::Instant::now();
        let resp: SearchResponse = serde_json::from_str(body)?;
        let posts = resp
            .data
            .into_iter()
            .map(|t| CandidatePost {
                // The API escapes &, < and > in post text.
                text: html_escape::decode_html_entities(&t.text).into_owned(),
                author: self.handle.clone(),
                created_at: t.created_at,
            })
            .collect();
        histogram!("provider_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(posts)
    }
}

#[async_trait]
impl SourceProvider for TwitterProvider {
    async fn fetch_recent(&self, max_posts: usize) -> FetchResult {
        match &self.mode {
            Mode::Fixture(posts) => Ok(posts.iter().take(max_posts).cloned().collect()),
            Mode::Http {
                bearer_token,
                client,
            } => {
                let resp = client
                    .get(SEARCH_URL)
                    .bearer_auth(bearer_token)
                    .query(&[
                        ("query", search_query(&self.handle).as_str()),
                        ("max_results", &max_posts.to_string()),
                        ("tweet.fields", "created_at,text"),
                    ])
                    .send()
                    .await?;

                if resp.status().as_u16() == 429 {
                    return Err(FetchError::RateLimited);
                }
                let resp = resp.error_for_status()?;
                let body = resp
                    .text()
                    .await
                    .map_err(|e| FetchError::Network(e.to_string()))?;
                self.parse_search_body(&body)
            }
        }
    }

    fn handle(&self) -> &str {
        &self.handle
    }
}
