use std::collections::VecDeque;
use std::time::{Duration, Instant};

use local_forwarder::DeliveryOutcome;

/// Number of most recent deliveries the average latency is computed over.
pub const LATENCY_WINDOW: usize = 100;

/// Running delivery counters for one session.
///
/// `success + failure == total` always holds. The latency window keeps the
/// last [`LATENCY_WINDOW`] elapsed times, oldest evicted first.
#[derive(Debug, Clone)]
pub struct StatsWindow {
    total: u64,
    success: u64,
    failure: u64,
    latencies: VecDeque<Duration>,
    avg_latency: Duration,
    started_at: Instant,
}

impl Default for StatsWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsWindow {
    pub fn new() -> Self {
        Self {
            total: 0,
            success: 0,
            failure: 0,
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            avg_latency: Duration::ZERO,
            started_at: Instant::now(),
        }
    }

    /// Restart the uptime clock; called when the connection opens.
    pub fn reset_start(&mut self) {
        self.started_at = Instant::now();
    }

    pub fn record(&mut self, outcome: &DeliveryOutcome) {
        self.total += 1;
        if outcome.is_success() {
            self.success += 1;
        } else {
            self.failure += 1;
        }

        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(outcome.elapsed);

        let sum: Duration = self.latencies.iter().sum();
        self.avg_latency = sum / self.latencies.len() as u32;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whether anything was delivered yet. Periodic summaries are skipped
    /// until this is true.
    pub fn has_activity(&self) -> bool {
        self.total > 0
    }

    pub fn summarize(&self) -> StatsSummary {
        self.summarize_at(Instant::now())
    }

    pub fn summarize_at(&self, now: Instant) -> StatsSummary {
        let success_rate_percent = if self.total == 0 {
            0.0
        } else {
            let rate = self.success as f64 / self.total as f64 * 100.0;
            (rate * 10.0).round() / 10.0
        };

        StatsSummary {
            total: self.total,
            success: self.success,
            failure: self.failure,
            success_rate_percent,
            avg_latency: self.avg_latency,
            uptime: now.saturating_duration_since(self.started_at),
        }
    }
}

/// Point-in-time view of a [`StatsWindow`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    /// Rounded to one decimal; `0.0` when nothing was delivered.
    pub success_rate_percent: f64,
    pub avg_latency: Duration,
    pub uptime: Duration,
}
