//! Configuration system for the Geoid planet streamer.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, LodConfig, MAX_OCTAVES, MAX_RESOLUTION, PlanetConfig, TerrainConfig,
    WorkerConfig,
};
pub use error::ConfigError;
