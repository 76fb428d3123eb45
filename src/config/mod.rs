//! Device configuration
//!
//! Stream settings, session timings and the persisted source identity.

pub mod schema;
pub mod store;

pub use schema::{SessionTimings, StreamConfig, VideoConfig, VideoResolution};
pub use store::{
    apply_env_overrides, load_or_create_source_id, read_config, write_config, ConfigError,
};
