//! Command-line argument parsing for the `geoid` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Geoid command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "geoid", about = "Adaptive planet surface streamer")]
pub struct CliArgs {
    /// Deepest quadtree level.
    #[arg(long)]
    pub max_level: Option<u32>,

    /// Grid cells per patch edge.
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Geometry worker threads (0 = hardware concurrency).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum tasks dispatched at once.
    #[arg(long)]
    pub max_tasks: Option<usize>,

    /// Noise seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Frames to run the headless flight for.
    #[arg(long)]
    pub frames: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(level) = args.max_level {
            self.lod.max_level = level;
        }
        if let Some(res) = args.resolution {
            self.lod.resolution = res;
        }
        if let Some(workers) = args.workers {
            self.workers.worker_count = workers;
        }
        if let Some(max) = args.max_tasks {
            self.workers.max_concurrent_tasks = max;
        }
        if let Some(seed) = args.seed {
            self.planet.seed = seed;
        }
        if let Some(frames) = args.frames {
            self.debug.frames = frames;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            max_level: None,
            resolution: None,
            workers: None,
            max_tasks: None,
            seed: None,
            frames: None,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            max_level: Some(6),
            seed: Some(99),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.lod.max_level, 6);
        assert_eq!(config.planet.seed, 99);
        // Non-overridden fields retain defaults
        assert_eq!(config.lod.resolution, 32);
        assert_eq!(config.workers.max_concurrent_tasks, 8);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "geoid",
            "--resolution",
            "8",
            "--max-tasks",
            "2",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.resolution, Some(8));
        assert_eq!(args.max_tasks, Some(2));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.config.is_none());
    }
}
