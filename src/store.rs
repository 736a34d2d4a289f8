//! In-memory tweet store behind the HTTP API. Newest-in at the back, capped
//! so a long-running instance cannot grow without bound; queries filter by
//! recency window and confidence floor, ordered by confidence.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
pub const RECENCY_WINDOW_HOURS: i64 = 24;

const MAX_STORED: usize = 2_000;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTweet {
    pub text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub disaster_confidence: f32,
}

#[derive(Default)]
pub struct TweetStore {
    inner: Mutex<Vec<StoredTweet>>,
}

impl TweetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one tweet, evicting the oldest entries past the cap.
    pub fn push(&self, tweet: StoredTweet) {
        let mut rows = self.inner.lock().expect("store lock poisoned");
        rows.push(tweet);
        let len = rows.len();
        if len > MAX_STORED {
            rows.drain(..len - MAX_STORED);
        }
    }

    /// Tweets created within the last [`RECENCY_WINDOW_HOURS`] of `now` with
    /// confidence at or above `min_confidence`, highest confidence first,
    /// at most `limit` of them.
    pub fn recent(&self, now: DateTime<Utc>, limit: usize, min_confidence: f32) -> Vec<StoredTweet> {
        let cutoff = now - Duration::hours(RECENCY_WINDOW_HOURS);
        let rows = self.inner.lock().expect("store lock poisoned");
        let mut hits: Vec<StoredTweet> = rows
            .iter()
            .filter(|t| t.created_at >= cutoff && t.disaster_confidence >= min_confidence)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.disaster_confidence.total_cmp(&a.disaster_confidence));
        hits.truncate(limit);
        hits
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
