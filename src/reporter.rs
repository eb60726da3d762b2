//! The single telemetry sink of a run.
//!
//! Consumes match names and per-batch deltas from bounded queues, keeps the
//! run-wide counters, and logs a progress line on a fixed interval. It stops
//! once every sender of both queues is gone.

use crate::models::{RunStats, StatsDelta, StatsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTotals {
    pub stats: StatsSnapshot,
    pub names: u64,
}

pub struct Reporter {
    stats: Arc<RunStats>,
    interval: Duration,
    started: Instant,
    deadline: Instant,
}

impl Reporter {
    pub fn new(stats: Arc<RunStats>, interval: Duration, run_for: Duration) -> Self {
        let started = Instant::now();
        Self {
            stats,
            interval,
            started,
            deadline: started + run_for,
        }
    }

    pub fn progress_line(&self, snapshot: StatsSnapshot) -> String {
        let now = Instant::now();
        let left = self.deadline.saturating_duration_since(now);
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let speed = if elapsed > 0.0 {
            snapshot.examined as f64 / elapsed
        } else {
            0.0
        };
        format!(
            "time left {}s. raid parties: {}. raided: {}. looted: {}. {:.2} per second",
            left.as_secs(),
            snapshot.requests,
            snapshot.examined,
            snapshot.matched,
            speed
        )
    }

    pub async fn run(
        self,
        mut names: mpsc::Receiver<String>,
        mut deltas: mpsc::Receiver<StatsDelta>,
    ) -> ReportTotals {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut name_count = 0;
        let mut names_open = true;
        let mut deltas_open = true;

        while names_open || deltas_open {
            tokio::select! {
                name = names.recv(), if names_open => match name {
                    Some(name) => {
                        name_count += 1;
                        info!("Say hi to {}", name);
                    }
                    None => names_open = false,
                },
                delta = deltas.recv(), if deltas_open => match delta {
                    Some(delta) => self.stats.apply(delta),
                    None => deltas_open = false,
                },
                _ = ticker.tick() => {
                    info!("{}", self.progress_line(self.stats.snapshot()));
                }
            }
        }

        let stats = self.stats.snapshot();
        info!("{}", self.progress_line(stats));
        info!("Total monKeys confirmed alive {}", name_count);
        ReportTotals {
            stats,
            names: name_count,
        }
    }
}
