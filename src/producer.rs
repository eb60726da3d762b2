//! The fetch → filter → emit loop.

use crate::errors::AppError;
use crate::filter::{self, FilterSpec};
use crate::models::{Candidate, StatsDelta};
use crate::monkey_client::MonkeyApiClient;
use crate::wallet::WalletBatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one loop iteration ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A full batch was examined and its delta reported.
    Batch(StatsDelta),
    /// The fetch failed in a recoverable way; nothing was examined.
    Skipped,
    Cancelled,
}

/// Cumulative counters of a single producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerTotals {
    pub examined: u64,
    pub matched: u64,
    pub requests: u64,
}

pub struct Producer {
    raid_name: String,
    client: MonkeyApiClient,
    filter: Arc<FilterSpec>,
    batch_size: usize,
    cooldown: Duration,
    matches: mpsc::Sender<Candidate>,
    deltas: mpsc::Sender<StatsDelta>,
    token: CancellationToken,
    totals: ProducerTotals,
}

impl Producer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        raid_name: String,
        client: MonkeyApiClient,
        filter: Arc<FilterSpec>,
        batch_size: usize,
        cooldown: Duration,
        matches: mpsc::Sender<Candidate>,
        deltas: mpsc::Sender<StatsDelta>,
        token: CancellationToken,
    ) -> Self {
        Self {
            raid_name,
            client,
            filter,
            batch_size,
            cooldown,
            matches,
            deltas,
            token,
            totals: ProducerTotals::default(),
        }
    }

    pub fn totals(&self) -> ProducerTotals {
        self.totals
    }

    /// Loops until cancelled. Only key generation failures end the loop early.
    pub async fn run(mut self) -> Result<ProducerTotals, AppError> {
        info!("Raiding with {} clan", self.raid_name);

        loop {
            match self.step().await {
                Ok(Step::Cancelled) => break,
                Ok(_) => {}
                Err(e) => {
                    error!("The {} raid cannot continue: {}", self.raid_name, e);
                    return Err(e);
                }
            }
        }

        info!(
            "The {} raided with a total of {} monKeys and {} survivors",
            self.raid_name, self.totals.examined, self.totals.matched
        );
        Ok(self.totals)
    }

    /// Runs one fetch → filter → emit iteration.
    pub async fn step(&mut self) -> Result<Step, AppError> {
        if self.token.is_cancelled() {
            debug!("Stopping the {} raid", self.raid_name);
            return Ok(Step::Cancelled);
        }

        let size = self.batch_size;
        let batch = tokio::task::spawn_blocking(move || WalletBatch::generate(size)).await??;

        let fetched = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Ok(Step::Cancelled),
            fetched = self.client.fetch_traits(&batch) => fetched,
        };

        let candidates = match fetched {
            Ok(candidates) => candidates,
            Err(AppError::UnexpectedStatus(code)) => {
                warn!(
                    "Trait API returned {}, sleeping {:?} because the server is probably loaded",
                    code, self.cooldown
                );
                tokio::select! {
                    _ = self.token.cancelled() => return Ok(Step::Cancelled),
                    _ = tokio::time::sleep(self.cooldown) => {}
                }
                return Ok(Step::Skipped);
            }
            Err(e @ AppError::Decode(_)) => {
                debug!("Could not decode trait response: {}", e);
                return Ok(Step::Skipped);
            }
            Err(e) if e.is_transient() => {
                if !self.token.is_cancelled() {
                    error!("Could not get monKey traits: {}", e);
                }
                return Ok(Step::Skipped);
            }
            Err(e) => return Err(e),
        };

        self.totals.requests += 1;
        let mut delta = StatsDelta {
            requests: 1,
            ..StatsDelta::default()
        };

        for candidate in candidates {
            if self.token.is_cancelled() {
                return Ok(Step::Cancelled);
            }
            delta.examined += 1;
            self.totals.examined += 1;

            if !filter::matches(&candidate, &self.filter) {
                continue;
            }
            delta.matched += 1;
            self.totals.matched += 1;

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(Step::Cancelled),
                sent = self.matches.send(candidate) => {
                    if sent.is_err() {
                        warn!("Match queue closed, stopping the {} raid", self.raid_name);
                        return Ok(Step::Cancelled);
                    }
                }
            }
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => return Ok(Step::Cancelled),
            _ = self.deltas.send(delta) => {}
        }

        Ok(Step::Batch(delta))
    }
}
