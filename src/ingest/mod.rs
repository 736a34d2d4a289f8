// src/ingest/mod.rs
//! Polling loop over source providers: fetch recent posts per handle,
//! classify, publish the first relevant hit, and hand the outcome to the
//! scheduler for pacing.

pub mod config;
pub mod providers;
pub mod publish;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;

use crate::classify::DisasterClassifier;
use crate::ingest::publish::{StoreClient, TweetPayload};
use crate::ingest::scheduler::{CycleOutcome, SchedulerState};
use crate::ingest::types::{FetchError, SourceProvider};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("aggregator_cycles_total", "Polling cycles started.");
        describe_counter!(
            "aggregator_posts_fetched_total",
            "Candidate posts fetched across all handles."
        );
        describe_counter!(
            "aggregator_posts_published_total",
            "Relevant posts published to the store."
        );
        describe_counter!(
            "aggregator_publish_errors_total",
            "Failed publish attempts against the store."
        );
        describe_counter!(
            "aggregator_provider_errors_total",
            "Provider fetch/parse errors (rate limits excluded)."
        );
        describe_counter!(
            "aggregator_rate_limits_total",
            "Rate-limit responses that penalized a handle."
        );
        describe_counter!(
            "aggregator_fallback_total",
            "Empty cycles that fell back to the latest stored post."
        );
        describe_histogram!("classify_ms", "Classification time in milliseconds.");
        describe_histogram!("provider_parse_ms", "Provider response parse time in milliseconds.");
        describe_gauge!(
            "aggregator_last_cycle_ts",
            "Unix ts when the last polling cycle started."
        );
    });
}

pub fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Poll every eligible handle once, in random order, publishing at most one
/// relevant post.
///
/// The first relevant post that publishes successfully ends the cycle; the
/// remaining handles wait for the next one. Rate limits penalize the handle
/// and do not count as errors, the penalty is already the response.
pub async fn run_cycle(
    state: &mut SchedulerState,
    providers: &[Box<dyn SourceProvider>],
    classifier: &DisasterClassifier,
    store: &dyn StoreClient,
    max_posts: usize,
    now: u64,
) -> CycleOutcome {
    ensure_metrics_described();
    counter!("aggregator_cycles_total").increment(1);
    gauge!("aggregator_last_cycle_ts").set(now as f64);

    let handles: Vec<String> = providers.iter().map(|p| p.handle().to_string()).collect();
    let eligible = state.eligible_handles(&handles, now);
    let mut order: Vec<usize> = providers
        .iter()
        .enumerate()
        .filter(|(_, p)| eligible.contains(&p.handle()))
        .map(|(i, _)| i)
        .collect();
    order.shuffle(&mut rand::rng());

    let mut errored = false;
    for i in order {
        let provider = &providers[i];
        let posts = match provider.fetch_recent(max_posts).await {
            Ok(posts) => posts,
            Err(FetchError::RateLimited) => {
                tracing::warn!(
                    target: "aggregator",
                    handle = provider.handle(),
                    "rate limited; penalizing handle"
                );
                counter!("aggregator_rate_limits_total").increment(1);
                state.penalize(provider.handle(), now);
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    target: "aggregator",
                    handle = provider.handle(),
                    error = %e,
                    "fetch failed"
                );
                counter!("aggregator_provider_errors_total").increment(1);
                errored = true;
                continue;
            }
        };
        counter!("aggregator_posts_fetched_total").increment(posts.len() as u64);

        for post in &posts {
            let c = classifier.classify(&post.text);
            if !c.is_relevant {
                continue;
            }
            let payload = TweetPayload::from_candidate(post, c.confidence);
            match store.publish(&payload).await {
                Ok(()) => {
                    counter!("aggregator_posts_published_total").increment(1);
                    tracing::info!(
                        target: "aggregator",
                        handle = provider.handle(),
                        confidence = c.confidence,
                        "published relevant post"
                    );
                    return CycleOutcome::Published;
                }
                Err(e) => {
                    tracing::warn!(target: "aggregator", error = ?e, "store publish failed");
                    counter!("aggregator_publish_errors_total").increment(1);
                    errored = true;
                }
            }
        }
    }

    if errored {
        CycleOutcome::Errored
    } else {
        CycleOutcome::Empty
    }
}

/// After an empty cycle, surface the newest stored post so operators can see
/// the loop is alive and what the map is currently showing.
pub async fn fallback_latest(store: &dyn StoreClient) {
    counter!("aggregator_fallback_total").increment(1);
    match store.latest().await {
        Ok(Some(t)) => tracing::info!(
            target: "aggregator",
            author = %t.author,
            created_at = %t.created_at,
            "no new posts; latest stored post still current"
        ),
        Ok(None) => tracing::info!(target: "aggregator", "no new posts and store is empty"),
        Err(e) => tracing::warn!(
            target: "aggregator",
            error = ?e,
            "failed to fetch latest stored post"
        ),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AggregatorCfg {
    /// Posts requested per handle per cycle.
    pub max_posts_per_handle: usize,
}

impl Default for AggregatorCfg {
    fn default() -> Self {
        Self {
            max_posts_per_handle: 10,
        }
    }
}

/// Spawn the long-running aggregator loop.
///
/// The loop enforces the global cooldown, runs one cycle, folds the outcome
/// into the scheduler state and sleeps the resulting delay. It never exits.
pub fn spawn_aggregator(
    cfg: AggregatorCfg,
    providers: Vec<Box<dyn SourceProvider>>,
    classifier: DisasterClassifier,
    store: Arc<dyn StoreClient>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = SchedulerState::new();
        loop {
            let now = now_unix();
            let wait = state.cooldown_remaining(now);
            if wait > 0 {
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }
            state.begin_cycle(now);
            let outcome = run_cycle(
                &mut state,
                &providers,
                &classifier,
                store.as_ref(),
                cfg.max_posts_per_handle,
                now,
            )
            .await;
            if outcome == CycleOutcome::Empty {
                fallback_latest(store.as_ref()).await;
            }
            let delay = state.advance(outcome);
            tracing::info!(
                target: "aggregator",
                ?outcome,
                delay_secs = delay,
                empty_streak = state.consecutive_empty(),
                error_streak = state.consecutive_errors(),
                "cycle complete"
            );
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
    })
}
