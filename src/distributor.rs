//! Fan-out of matched candidates.
//!
//! Every match must reach persistence; previews are a convenience and are
//! dropped whenever the preview queue is full.

use crate::models::Candidate;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tracing::{debug, error};

/// Result of a best-effort [`FanOut::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// The queue was full or its consumer is gone.
    Dropped,
    /// No best-effort consumer is registered.
    Disabled,
}

/// A reliable queue plus an optional lossy one.
pub struct FanOut<T> {
    reliable: mpsc::Sender<T>,
    best_effort: Option<mpsc::Sender<T>>,
}

impl<T> FanOut<T> {
    pub fn new(reliable: mpsc::Sender<T>, best_effort: Option<mpsc::Sender<T>>) -> Self {
        Self {
            reliable,
            best_effort,
        }
    }

    /// Waits for room on the reliable queue. Fails only if its consumers are gone.
    pub async fn send_reliable(&self, item: T) -> Result<(), SendError<T>> {
        self.reliable.send(item).await
    }

    /// Never waits.
    pub fn offer(&self, item: T) -> Offer {
        let Some(queue) = &self.best_effort else {
            return Offer::Disabled;
        };
        match queue.try_send(item) {
            Ok(()) => Offer::Delivered,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => Offer::Dropped,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributorStats {
    /// Matches accepted onto the persistence queue.
    pub forwarded: u64,
    /// Matches the persistence queue refused because every writer had stopped.
    pub undeliverable: u64,
    pub previews_sent: u64,
    pub previews_dropped: u64,
}

pub struct Distributor {
    fan_out: FanOut<Candidate>,
    names: mpsc::Sender<String>,
}

impl Distributor {
    pub fn new(fan_out: FanOut<Candidate>, names: mpsc::Sender<String>) -> Self {
        Self { fan_out, names }
    }

    /// Drains `inbound` until every producer has dropped its sender.
    ///
    /// Returning drops the persistence and preview senders, which closes
    /// those queues for their workers.
    pub async fn run(self, mut inbound: mpsc::Receiver<Candidate>) -> DistributorStats {
        let mut stats = DistributorStats::default();

        while let Some(candidate) = inbound.recv().await {
            let name = candidate.display_name.clone();
            let preview = candidate.clone();

            match self.fan_out.send_reliable(candidate).await {
                Ok(()) => stats.forwarded += 1,
                Err(SendError(lost)) => {
                    stats.undeliverable += 1;
                    error!(
                        "Persistence queue closed, match {} ({}) was not saved",
                        lost.display_name, lost.address
                    );
                    continue;
                }
            }

            match self.fan_out.offer(preview) {
                Offer::Delivered => stats.previews_sent += 1,
                Offer::Dropped => {
                    stats.previews_dropped += 1;
                    debug!("Preview queue full, skipping preview of {}", name);
                }
                Offer::Disabled => {}
            }

            if self.names.send(name).await.is_err() {
                debug!("Name reporter is gone");
            }
        }

        debug!(
            "Distributor drained: {} forwarded, {} previews dropped",
            stats.forwarded, stats.previews_dropped
        );
        stats
    }
}
