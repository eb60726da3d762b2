//! Wiring and shutdown of a run.
//!
//! ```text
//! producers ─► distributor ─┬─► persistence queue ─► writers
//!                           ├─► preview queue (lossy) ─► preview worker
//!                           └─► names ─┐
//! producers ─► stat deltas ────────────┴─► reporter
//! ```
//!
//! Producers and the preview worker stop on cancellation. The distributor,
//! writers and reporter stop when their inbound queues close, so every match
//! a producer handed over is written before [`Pipeline::run`] returns.

use crate::config::Config;
use crate::distributor::{Distributor, FanOut};
use crate::errors::AppError;
use crate::models::{Candidate, RunStats, RunSummary, StatsDelta};
use crate::monkey_client::MonkeyApiClient;
use crate::names;
use crate::persistence::{PersistQueue, PersistenceWorker};
use crate::preview::{Preview, PreviewWorker};
use crate::producer::Producer;
use crate::reporter::Reporter;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const INBOUND_CAPACITY: usize = 1000;
const PERSIST_CAPACITY: usize = 100;
const PREVIEW_CAPACITY: usize = 10;
const NAMES_CAPACITY: usize = 100;
const DELTAS_CAPACITY: usize = 100;

/// Unwraps a joined stage. A panicked stage cancels the run and records the
/// failure so the remaining stages are still joined.
fn settle<T>(
    joined: Result<T, JoinError>,
    token: &CancellationToken,
    failure: &mut Option<AppError>,
) -> Option<T> {
    match joined {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Pipeline stage failed: {}", e);
            token.cancel();
            failure.get_or_insert(e.into());
            None
        }
    }
}

pub struct Pipeline {
    config: Config,
    client: MonkeyApiClient,
}

impl Pipeline {
    pub fn new(config: Config, client: MonkeyApiClient) -> Self {
        Self { config, client }
    }

    /// Runs until the configured duration elapses, `token` is cancelled, or a
    /// fatal error occurs. Previews go to `previews` when given and enabled.
    pub async fn run(
        self,
        token: CancellationToken,
        previews: Option<mpsc::Sender<Preview>>,
    ) -> Result<RunSummary, AppError> {
        let config = self.config;
        let client = self.client;

        info!(
            "Raiding for {:?} with {} parties, saving {} images to {}",
            config.duration,
            config.max_requests,
            config.format,
            config.output_dir.display()
        );

        let deadline = {
            let token = token.clone();
            let duration = config.duration;
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(duration) => {
                        info!("Time is up, calling the raid parties back");
                        token.cancel();
                    }
                }
            })
        };

        let (inbound_tx, inbound_rx) = mpsc::channel::<Candidate>(INBOUND_CAPACITY);
        let (persist_tx, persist_rx) = mpsc::channel::<Candidate>(PERSIST_CAPACITY);
        let (names_tx, names_rx) = mpsc::channel::<String>(NAMES_CAPACITY);
        let (deltas_tx, deltas_rx) = mpsc::channel::<StatsDelta>(DELTAS_CAPACITY);

        let stats = Arc::new(RunStats::default());
        let reporter = tokio::spawn(
            Reporter::new(stats.clone(), config.report_interval, config.duration)
                .run(names_rx, deltas_rx),
        );

        let queue: PersistQueue = Arc::new(Mutex::new(persist_rx));
        let mut writers = JoinSet::new();
        let worker = PersistenceWorker::new(
            client.clone(),
            config.output_dir.clone(),
            config.format,
            config.image_size,
        );
        for id in 0..config.writers {
            writers.spawn(worker.clone().run(id, queue.clone(), token.clone()));
        }
        drop(queue);

        let (preview_tx, preview) = match previews.filter(|_| config.preview) {
            Some(output) => {
                let (tx, rx) = mpsc::channel::<Candidate>(PREVIEW_CAPACITY);
                let handle =
                    tokio::spawn(PreviewWorker::new(client.clone()).run(rx, output, token.clone()));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        let distributor = tokio::spawn(
            Distributor::new(FanOut::new(persist_tx, preview_tx), names_tx).run(inbound_rx),
        );

        let filter = Arc::new(config.filter.clone());
        let mut producers = JoinSet::new();
        for _ in 0..config.max_requests {
            let producer = Producer::new(
                names::raid_name(),
                client.clone(),
                filter.clone(),
                config.batch_size,
                config.cooldown,
                inbound_tx.clone(),
                deltas_tx.clone(),
                token.clone(),
            );
            producers.spawn(producer.run());
        }
        drop(inbound_tx);
        drop(deltas_tx);

        let mut failure: Option<AppError> = None;

        while let Some(joined) = producers.join_next().await {
            match joined.map_err(AppError::from).and_then(|result| result) {
                Ok(totals) => debug!("Producer finished: {:?}", totals),
                Err(e) => {
                    token.cancel();
                    failure.get_or_insert(e);
                }
            }
        }
        debug!("All raid parties are back");

        let distributed = settle(distributor.await, &token, &mut failure).unwrap_or_default();

        let mut persisted = 0;
        while let Some(joined) = writers.join_next().await {
            match joined.map_err(AppError::from).and_then(|result| result) {
                Ok(written) => persisted += written,
                Err(e) => {
                    token.cancel();
                    failure.get_or_insert(e);
                }
            }
        }
        debug!("All writers are done, {} matches saved", persisted);

        if let Some(preview) = preview {
            if let Some(shown) = settle(preview.await, &token, &mut failure) {
                debug!("{} previews shown", shown);
            }
        }

        let reported = settle(reporter.await, &token, &mut failure).unwrap_or_default();
        deadline.abort();

        if let Some(e) = failure {
            error!("Raid aborted: {}", e);
            return Err(e);
        }

        Ok(RunSummary {
            stats: reported.stats,
            forwarded: distributed.forwarded,
            persisted,
            previews_dropped: distributed.previews_dropped,
            names_reported: reported.names,
        })
    }
}
