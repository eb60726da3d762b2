use crate::image::{rasterize_svg, PREVIEW_SIZE};
use crate::models::Candidate;
use crate::monkey_client::MonkeyApiClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A rendered thumbnail ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub title: String,
    pub png: Vec<u8>,
}

pub struct PreviewWorker {
    client: MonkeyApiClient,
}

impl PreviewWorker {
    pub fn new(client: MonkeyApiClient) -> Self {
        Self { client }
    }

    pub async fn render(&self, candidate: &Candidate) -> Option<Preview> {
        let svg = match self.client.fetch_svg(&candidate.address).await {
            Ok(svg) => svg,
            Err(e) => {
                warn!("Could not fetch monKey to preview {}: {}", candidate.display_name, e);
                return None;
            }
        };

        let png = match tokio::task::spawn_blocking(move || rasterize_svg(&svg, PREVIEW_SIZE)).await
        {
            Ok(Ok(png)) => png,
            Ok(Err(e)) => {
                warn!("Could not convert preview of {}: {}", candidate.display_name, e);
                return None;
            }
            Err(e) => {
                warn!("Preview conversion task failed: {}", e);
                return None;
            }
        };

        Some(Preview {
            title: candidate.display_name.clone(),
            png,
        })
    }

    /// Renders previews until the queue closes or the run is cancelled.
    pub async fn run(
        self,
        mut queue: mpsc::Receiver<Candidate>,
        output: mpsc::Sender<Preview>,
        token: CancellationToken,
    ) -> u64 {
        let mut shown = 0;
        loop {
            let candidate = tokio::select! {
                _ = token.cancelled() => break,
                next = queue.recv() => match next {
                    Some(candidate) => candidate,
                    None => break,
                },
            };

            let rendered = tokio::select! {
                _ = token.cancelled() => break,
                rendered = self.render(&candidate) => rendered,
            };
            let Some(preview) = rendered else {
                continue;
            };

            tokio::select! {
                _ = token.cancelled() => break,
                sent = output.send(preview) => {
                    if sent.is_err() {
                        break;
                    }
                    shown += 1;
                }
            }
        }
        debug!("Stopping the monKey preview after {} previews", shown);
        shown
    }
}
