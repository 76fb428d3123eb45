//! Edge Uplink - live video and telemetry from an edge device to a tracking
//! backend.
//!
//! The crate coordinates three activities for one device: registering it as
//! a source with the backend, relaying captured video frames to the media
//! transport, and uploading position/orientation telemetry at a fixed rate.
//! Camera capture, the wire transport and sensor acquisition are supplied by
//! the host platform through the traits in [`capture`], [`relay`] and
//! [`sensors`].

pub mod backend;
pub mod capture;
pub mod config;
pub mod relay;
pub mod sensors;
pub mod session;
pub mod telemetry;
pub mod utils;

pub use session::{SessionCoordinator, SessionDeps, SessionEvent, SessionState, StartOutcome};
pub use utils::error::{UplinkError, UplinkResult};

use anyhow::Context;
use config::StreamConfig;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// Reads the filter from `RUST_LOG`, defaulting to debug output for this crate.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edge_uplink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Load the stream configuration and the stable source id of this device.
///
/// Environment overrides are applied on top of the config file.
pub fn load_runtime(
    config_path: &Path,
    source_id_path: &Path,
) -> anyhow::Result<(StreamConfig, String)> {
    let mut stream_config = config::read_config(config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    config::apply_env_overrides(&mut stream_config);
    stream_config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration after environment overrides")?;

    let source_id = config::load_or_create_source_id(source_id_path)
        .with_context(|| format!("failed to resolve source id at {}", source_id_path.display()))?;

    tracing::info!(
        "Edge Uplink v{} ready: source {} -> {}",
        env!("CARGO_PKG_VERSION"),
        source_id,
        stream_config.backend_url
    );

    Ok((stream_config, source_id))
}
