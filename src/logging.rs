//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use peerfiles::logging::*;
//!
//! init_tracing();
//! info!("Connected to head unit");
//! ```

use std::io;

use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Meant for the embedding application; the library itself never installs a
/// subscriber. Logs at INFO level and above unless `RUST_LOG` says otherwise:
///
/// ```bash
/// RUST_LOG=peerfiles=debug cargo run
/// RUST_LOG=peerfiles::protocol=trace cargo run
/// ```
pub fn init_tracing() {
	subscriber().init();
}

/// Like `init_tracing`, but leaves an already installed subscriber in place
///
/// Returns false when another subscriber was already set.
pub fn try_init_tracing() -> bool {
	subscriber().try_init().is_ok()
}

fn subscriber() -> SubscriberBuilder<DefaultFields, Format, EnvFilter, fn() -> io::Stderr> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr as fn() -> io::Stderr)
}


// vim: ts=4
