//! Legion Van library
//!
//! Generates Banano wallets in batches, looks up the monKey avatar each
//! address owns, and keeps the ones whose traits match a vanity filter.
//!
//! # Modules
//!
//! - `config`: Command line and environment configuration.
//! - `distributor`: Fan-out of matches to persistence, previews and the reporter.
//! - `errors`: Error handling types.
//! - `filter`: Trait prefix filters.
//! - `image`: SVG to PNG conversion.
//! - `models`: Trait records, candidates and run statistics.
//! - `monkey_client`: MonKey API client.
//! - `names`: Silly monKey and raid party names.
//! - `persistence`: Writing matches to the output directory.
//! - `pipeline`: Wiring, cancellation and shutdown of a run.
//! - `preview`: Thumbnail rendering of found monKeys.
//! - `producer`: The generate, fetch and filter loop.
//! - `reporter`: Progress and totals.
//! - `wallet`: Banano key derivation and address encoding.

pub mod config;
pub mod distributor;
pub mod errors;
pub mod filter;
pub mod image;
pub mod models;
pub mod monkey_client;
pub mod names;
pub mod persistence;
pub mod pipeline;
pub mod preview;
pub mod producer;
pub mod reporter;
pub mod wallet;
