// src/ingest/scheduler.rs
//! Adaptive polling state machine.
//!
//! All timing decisions live here as pure functions over [`SchedulerState`]
//! and an injected "now" in unix seconds, so every branch is testable without
//! sleeping. The async driver in `ingest::mod` owns the actual clock and
//! `tokio::time::sleep`.
//!
//! Pacing rules:
//! - a global cooldown of [`GLOBAL_COOLDOWN_SECS`] between cycle starts,
//!   anchored on when the previous cycle *began*;
//! - per-handle penalties of [`RATE_LIMIT_PENALTY_SECS`] after a provider
//!   reports rate limiting;
//! - geometric backoff on consecutive empty cycles, capped at
//!   [`MAX_EMPTY_BACKOFF_SECS`];
//! - steeper geometric backoff on consecutive error cycles, capped at
//!   [`MAX_ERROR_BACKOFF_SECS`];
//! - a long quiet period of [`POST_PUBLISH_DELAY_SECS`] after a successful
//!   publish.

use std::collections::HashMap;

pub const GLOBAL_COOLDOWN_SECS: u64 = 300;
pub const RATE_LIMIT_PENALTY_SECS: u64 = 900;
pub const POST_PUBLISH_DELAY_SECS: u64 = 900;
pub const MAX_EMPTY_BACKOFF_SECS: u64 = 1_800;
pub const MAX_ERROR_BACKOFF_SECS: u64 = 3_600;

const EMPTY_EXPONENT_CAP: u32 = 5;
const ERROR_EXPONENT_CAP: u32 = 4;

/// What a polling cycle produced, as far as pacing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A relevant post was published to the store.
    Published,
    /// Every eligible handle was polled and nothing relevant surfaced.
    Empty,
    /// At least one fetch or publish failed and nothing was published.
    Errored,
}

/// Delay before the next cycle after `n` consecutive empty cycles:
/// `300 * 1.5^min(n, 5)`, capped at 30 minutes.
pub fn empty_backoff(consecutive_empty: u32) -> u64 {
    let exp = consecutive_empty.min(EMPTY_EXPONENT_CAP);
    let secs = GLOBAL_COOLDOWN_SECS as f64 * 1.5_f64.powi(exp as i32);
    (secs as u64).min(MAX_EMPTY_BACKOFF_SECS)
}

/// Delay before the next cycle after `n` consecutive error cycles:
/// `300 * 2^min(n, 4)`, capped at one hour.
pub fn error_backoff(consecutive_errors: u32) -> u64 {
    let exp = consecutive_errors.min(ERROR_EXPONENT_CAP);
    (GLOBAL_COOLDOWN_SECS * 2_u64.pow(exp)).min(MAX_ERROR_BACKOFF_SECS)
}

/// Mutable pacing state carried across cycles.
#[derive(Debug, Default)]
pub struct SchedulerState {
    /// Unix seconds when the most recent cycle began, if any.
    last_cycle_started_at: Option<u64>,
    consecutive_empty_cycles: u32,
    consecutive_error_cycles: u32,
    /// Handle -> unix seconds until which the handle is skipped.
    penalized_until: HashMap<String, u64>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds still left of the global cooldown at `now`, zero when a cycle
    /// may start.
    pub fn cooldown_remaining(&self, now: u64) -> u64 {
        match self.last_cycle_started_at {
            Some(started) => (started + GLOBAL_COOLDOWN_SECS).saturating_sub(now),
            None => 0,
        }
    }

    /// Mark a cycle as starting at `now`. The cooldown anchors here, not on
    /// cycle completion, so slow cycles do not stretch the pacing.
    pub fn begin_cycle(&mut self, now: u64) {
        self.last_cycle_started_at = Some(now);
    }

    /// Penalize `handle` until `now + RATE_LIMIT_PENALTY_SECS`.
    pub fn penalize(&mut self, handle: &str, now: u64) {
        self.penalized_until
            .insert(handle.to_string(), now + RATE_LIMIT_PENALTY_SECS);
    }

    pub fn is_penalized(&self, handle: &str, now: u64) -> bool {
        self.penalized_until
            .get(handle)
            .is_some_and(|&until| now < until)
    }

    /// Handles currently eligible for polling, in caller-supplied order.
    /// Expired penalties are dropped as a side effect.
    pub fn eligible_handles<'a>(&mut self, handles: &'a [String], now: u64) -> Vec<&'a str> {
        self.penalized_until.retain(|_, &mut until| now < until);
        handles
            .iter()
            .map(String::as_str)
            .filter(|h| !self.is_penalized(h, now))
            .collect()
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty_cycles
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_error_cycles
    }

    /// Fold a finished cycle into the counters and return the delay in
    /// seconds before the next cycle may start.
    ///
    /// Empty and error streaks are tracked independently: an error cycle
    /// does not clear an empty streak and vice versa. Only a publish clears
    /// both.
    pub fn advance(&mut self, outcome: CycleOutcome) -> u64 {
        match outcome {
            CycleOutcome::Published => {
                self.consecutive_empty_cycles = 0;
                self.consecutive_error_cycles = 0;
                POST_PUBLISH_DELAY_SECS
            }
            CycleOutcome::Empty => {
                self.consecutive_empty_cycles += 1;
                empty_backoff(self.consecutive_empty_cycles)
            }
            CycleOutcome::Errored => {
                self.consecutive_error_cycles += 1;
                error_backoff(self.consecutive_error_cycles)
            }
        }
    }
}
