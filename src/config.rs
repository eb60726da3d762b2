use crate::filter::{FilterSpec, TraitSlot};
use crate::image::ImageFormat;
use crate::monkey_client::DEFAULT_MONKEY_API;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command line surface. Every scalar flag can also come from a
/// `LEGION_VAN_*` environment variable or a `.env` file.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "legion-van",
    version,
    about = "Generate Banano wallets until their monKeys match your vanity filters"
)]
pub struct Args {
    /// How long to raid before shutting down.
    #[arg(long, env = "LEGION_VAN_DURATION", default_value = "1m", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Maximum outstanding trait requests (one producer each).
    #[arg(long, env = "LEGION_VAN_MAX_REQUESTS", default_value_t = 4)]
    pub max_requests: usize,

    /// Number of wallets tested per API request.
    #[arg(long, env = "LEGION_VAN_BATCH_SIZE", default_value_t = 2500)]
    pub batch_size: usize,

    /// Image format saved for each match: svg or png.
    #[arg(long, env = "LEGION_VAN_FORMAT", default_value = "svg")]
    pub format: String,

    /// Longest side in pixels of saved png images.
    #[arg(long, env = "LEGION_VAN_IMAGE_SIZE", default_value_t = 250)]
    pub image_size: u32,

    /// Number of concurrent writers saving matches.
    #[arg(long, env = "LEGION_VAN_WRITERS", default_value_t = 10)]
    pub writers: usize,

    /// Pause after the API answers with a non-success status.
    #[arg(long, env = "LEGION_VAN_COOLDOWN", default_value = "10s", value_parser = humantime::parse_duration)]
    pub cooldown: Duration,

    /// How often progress is logged.
    #[arg(long, env = "LEGION_VAN_INTERVAL", default_value = "10s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// MonKey API server.
    #[arg(long, env = "LEGION_VAN_MONKEY_API", default_value = DEFAULT_MONKEY_API)]
    pub monkey_api: String,

    /// Directory the matches are written to.
    #[arg(long, env = "LEGION_VAN_OUTPUT_DIR", default_value = "foundMonKeys")]
    pub output_dir: PathBuf,

    /// Disable previews of found monKeys.
    #[arg(long, env = "LEGION_VAN_DISABLE_PREVIEW")]
    pub disable_preview: bool,

    /// Verbose logging.
    #[arg(long, env = "LEGION_VAN_DEBUG")]
    pub debug: bool,

    /// Hat prefix, repeatable.
    #[arg(short = 'H', long = "hat")]
    pub hat: Vec<String>,

    /// Glasses prefix, repeatable.
    #[arg(short = 'G', long = "glasses")]
    pub glasses: Vec<String>,

    /// Mouth prefix, repeatable.
    #[arg(short = 'O', long = "mouth")]
    pub mouth: Vec<String>,

    /// Clothing prefix, repeatable.
    #[arg(short = 'C', long = "clothing")]
    pub clothing: Vec<String>,

    /// Footwear prefix, repeatable.
    #[arg(short = 'F', long = "feet")]
    pub feet: Vec<String>,

    /// Tail accessory prefix, repeatable.
    #[arg(short = 'T', long = "tail")]
    pub tail: Vec<String>,

    /// Misc prefix, repeatable.
    #[arg(short = 'M', long = "misc")]
    pub misc: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub monkey_api: String,
    pub duration: Duration,
    pub max_requests: usize,
    pub batch_size: usize,
    pub format: ImageFormat,
    pub image_size: u32,
    pub writers: usize,
    pub cooldown: Duration,
    pub report_interval: Duration,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub preview: bool,
    pub debug: bool,
    pub filter: FilterSpec,
}

/// Lowercases and trims vanity prefixes, dropping blank ones.
fn fold_prefixes(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|prefix| prefix.trim().to_lowercase())
        .filter(|prefix| !prefix.is_empty())
        .collect()
}

impl Config {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Validates parsed arguments and builds the normalized vanity filter.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let filter = FilterSpec::default()
            .with(TraitSlot::Hat, fold_prefixes(args.hat))
            .with(TraitSlot::Glasses, fold_prefixes(args.glasses))
            .with(TraitSlot::Mouth, fold_prefixes(args.mouth))
            .with(TraitSlot::Clothing, fold_prefixes(args.clothing))
            .with(TraitSlot::Footwear, fold_prefixes(args.feet))
            .with(TraitSlot::Tail, fold_prefixes(args.tail))
            .with(TraitSlot::Misc, fold_prefixes(args.misc))
            .normalized();

        let config = Self {
            monkey_api: Some(args.monkey_api.trim().to_string())
                .filter(|url| !url.is_empty())
                .ok_or_else(|| anyhow::anyhow!("monkey API URL cannot be empty"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("monkey API URL must start with http:// or https://");
                    }
                    url::Url::parse(&url)
                        .map_err(|e| anyhow::anyhow!("invalid monkey API URL {}: {}", url, e))?;
                    Ok(url)
                })?,
            duration: Some(args.duration)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| anyhow::anyhow!("duration must be greater than zero"))?,
            max_requests: Some(args.max_requests)
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("max requests must be at least 1"))?,
            batch_size: Some(args.batch_size)
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("batch size must be at least 1"))?,
            format: args
                .format
                .parse::<ImageFormat>()
                .map_err(|e| anyhow::anyhow!("{}", e))?,
            image_size: Some(args.image_size)
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("image size must be at least 1 pixel"))?,
            writers: Some(args.writers)
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("at least one writer is required"))?,
            cooldown: args.cooldown,
            report_interval: Some(args.interval)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| anyhow::anyhow!("report interval must be greater than zero"))?,
            request_timeout: Self::REQUEST_TIMEOUT,
            output_dir: args.output_dir,
            preview: !args.disable_preview,
            debug: args.debug,
            filter,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("MonKey API: {}", config.monkey_api);
        tracing::debug!(
            "Raiding for {:?} with {} producers of {} wallets",
            config.duration,
            config.max_requests,
            config.batch_size
        );
        tracing::info!("Vanity filter: {}", config.filter);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Config> {
        let mut argv = vec!["legion-van"];
        argv.extend_from_slice(args);
        Config::from_args(Args::try_parse_from(argv)?)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.duration, Duration::from_secs(60));
        assert_eq!(config.max_requests, 4);
        assert_eq!(config.batch_size, 2500);
        assert_eq!(config.writers, 10);
        assert_eq!(config.cooldown, Duration::from_secs(10));
        assert_eq!(config.format, ImageFormat::Svg);
        assert!(config.preview);
        assert!(config.filter.is_empty());
    }

    #[test]
    fn test_vanity_flags_are_folded_and_normalized() {
        let config = parse(&["-H", "Crown", "-H", "crown-gold", "--misc", " FLAME ", "-M", ""])
            .unwrap();
        assert_eq!(config.filter.hat, vec!["crown"]);
        assert_eq!(config.filter.misc, vec!["flame"]);
        assert!(config.filter.glasses.is_empty());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(parse(&["--batch-size", "0"]).is_err());
        assert!(parse(&["--max-requests", "0"]).is_err());
        assert!(parse(&["--format", "gif"]).is_err());
        assert!(parse(&["--monkey-api", "ftp://monkey"]).is_err());
        assert!(parse(&["--duration", "0s"]).is_err());
        assert!(parse(&["--duration", "soon"]).is_err());
    }

    #[test]
    fn test_png_and_preview_flags() {
        let config = parse(&["--format", "PNG", "--disable-preview", "--duration", "5m"]).unwrap();
        assert_eq!(config.format, ImageFormat::Png);
        assert!(!config.preview);
        assert_eq!(config.duration, Duration::from_secs(300));
    }
}
