use clap::Parser;
use legion_van::config::{Args, Config};
use legion_van::monkey_client::MonkeyApiClient;
use legion_van::persistence::prepare_output_dir;
use legion_van::pipeline::Pipeline;
use legion_van::preview::Preview;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.debug {
        "legion_van=debug"
    } else {
        "legion_van=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_args(args)?;
    config.output_dir = prepare_output_dir(&config.output_dir)?;
    tracing::info!("Saving matches to {}", config.output_dir.display());

    let client = MonkeyApiClient::new(&config.monkey_api, config.request_timeout)?;
    tracing::info!("MonKey API client initialized: {}", client.base_url());

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, waiting for the writers to finish");
                token.cancel();
            }
        });
    }

    let previews = if config.preview {
        let (tx, mut rx) = mpsc::channel::<Preview>(1);
        tokio::spawn(async move {
            while let Some(preview) = rx.recv().await {
                tracing::info!(
                    "Preview of {} ready ({} bytes of png)",
                    preview.title,
                    preview.png.len()
                );
            }
        });
        Some(tx)
    } else {
        None
    };

    let summary = Pipeline::new(config, client).run(token, previews).await?;

    tracing::info!(
        "Raid finished: {} monKeys examined in {} requests, {} matched, {} saved, {} previews skipped",
        summary.stats.examined,
        summary.stats.requests,
        summary.stats.matched,
        summary.persisted,
        summary.previews_dropped
    );
    Ok(())
}
