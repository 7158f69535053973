//! Request-rate tracking for the rate sub-scorer.
//!
//! A sliding window counter per client IP: the reading blends the previous
//! and current fixed windows, which approximates a true sliding window with
//! minimal memory per key. Unlike a limiter this never denies anything; it
//! produces a requests-per-window reading that feeds the bot scorer and the
//! `rate_limit` rule condition.

use async_trait::async_trait;
use botshield_bot_score::{RateReading, RateSignal};
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct WindowState {
    current_count: u64,
    previous_count: u64,
    window_start: Instant,
}

/// Concurrent sliding-window request tracker keyed by client IP.
pub struct RateTracker {
    windows: DashMap<String, WindowState>,
    window_secs: u64,
    /// Reading above which the signal starts contributing.
    sustained_threshold: u64,
    /// Reading treated as burst pressure.
    burst_threshold: u64,
}

impl RateTracker {
    pub fn new(window_secs: u64, sustained_threshold: u64, burst_threshold: u64) -> Self {
        tracing::info!(
            window_secs,
            sustained_threshold,
            burst_threshold,
            "creating rate tracker"
        );
        Self {
            windows: DashMap::new(),
            window_secs,
            sustained_threshold,
            burst_threshold,
        }
    }

    /// Record a hit for `key` and return the blended requests-in-window
    /// reading including this hit.
    pub fn observe(&self, key: &str) -> u64 {
        let now = Instant::now();
        let window_duration = Duration::from_secs(self.window_secs);

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowState {
                current_count: 0,
                previous_count: 0,
                window_start: now,
            });

        let state = entry.value_mut();

        // Rotate windows if the current window has elapsed. Loop in case the
        // client was idle for several full windows.
        while now.duration_since(state.window_start) >= window_duration {
            state.previous_count = state.current_count;
            state.current_count = 0;
            state.window_start += window_duration;
        }

        state.current_count += 1;

        let elapsed_fraction = (now.duration_since(state.window_start).as_secs_f64()
            / self.window_secs as f64)
            .min(1.0);

        // Blend the previous window's tail with the current count.
        let weighted = (state.previous_count as f64) * (1.0 - elapsed_fraction)
            + state.current_count as f64;
        weighted.round() as u64
    }

    /// Map a reading to the score contribution used by the bot scorer.
    pub fn contribution(&self, requests_in_window: u64) -> u8 {
        if requests_in_window > self.burst_threshold {
            25
        } else if requests_in_window > self.sustained_threshold {
            10
        } else {
            0
        }
    }

    /// Remove entries whose window started more than `2 * window_secs` ago.
    /// Call periodically to stop one-off client keys accumulating.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let stale_threshold = Duration::from_secs(self.window_secs * 2);

        self.windows
            .retain(|_key, state| now.duration_since(state.window_start) < stale_threshold);

        tracing::debug!(remaining = self.windows.len(), "rate tracker cleanup complete");
    }

    /// Spawn a background thread that sweeps stale entries every 60 seconds.
    /// The thread holds its own handle, so the tracker stays alive as long
    /// as the sweep runs.
    pub fn start_cleanup_task(tracker: std::sync::Arc<Self>) {
        std::thread::Builder::new()
            .name("rate-tracker-cleanup".into())
            .spawn(move || loop {
                std::thread::sleep(Duration::from_secs(60));
                tracker.cleanup();
            })
            .expect("failed to spawn rate-tracker cleanup thread");
    }
}

#[async_trait]
impl RateSignal for RateTracker {
    async fn sample(&self, client_ip: &str) -> anyhow::Result<RateReading> {
        let requests_in_window = self.observe(client_ip);
        Ok(RateReading {
            requests_in_window,
            contribution: self.contribution(requests_in_window),
        })
    }
}
