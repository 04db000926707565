//! # solcov-utils
//!
//! Utilities shared by solcov crates and the tools embedding them.

use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes a tracing Subscriber for logging, filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already installed, so tests may call it freely.
pub fn subscriber() {
    let _ = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
