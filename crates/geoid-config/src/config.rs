//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest `lod.resolution` accepted; matches the geometry workers' limit.
pub const MAX_RESOLUTION: u32 = 1024;

/// Largest `terrain.octaves` accepted; matches the heightmap sampler's limit.
pub const MAX_OCTAVES: u32 = 16;

/// Top-level streamer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Planet body and camera start settings.
    pub planet: PlanetConfig,
    /// Quadtree subdivision policy.
    pub lod: LodConfig,
    /// Surface displacement noise.
    pub terrain: TerrainConfig,
    /// Geometry worker pool.
    pub workers: WorkerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Planet configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Planet radius in meters.
    pub radius_m: f64,
    /// Noise seed shared by every generation task.
    pub seed: u64,
    /// Camera starting altitude above the surface in meters.
    pub start_altitude_m: f64,
    /// Scripted camera speed in meters per second.
    pub camera_speed_m_s: f64,
}

/// Quadtree level-of-detail policy.
///
/// A patch at `level` subdivides when the camera is closer than
/// `radius * range_multiplier * range_decay^level`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Deepest quadtree level a patch may reach.
    pub max_level: u32,
    /// Grid cells per patch edge.
    pub resolution: u32,
    /// Activation range multiplier (`k`).
    pub range_multiplier: f64,
    /// Per-level shrink factor of the activation range.
    pub range_decay: f64,
    /// Extra fraction of the range the camera must retreat before a collapse.
    pub hysteresis: f64,
}

/// Fractal noise displacement applied to the sphere surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Displace vertices along the surface normal.
    pub displacement: bool,
    /// Number of noise octaves.
    pub octaves: u32,
    /// Amplitude of the first octave in meters.
    pub amplitude_m: f64,
    /// Frequency of the first octave, in cycles per unit-sphere radian.
    pub base_frequency: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
}

/// Geometry worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads to spawn (0 = hardware concurrency).
    pub worker_count: usize,
    /// Maximum tasks dispatched to workers at once.
    pub max_concurrent_tasks: usize,
    /// Times a failed patch is re-requested before it is left stalled.
    pub max_retries: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Number of frames the headless flight runs for.
    pub frames: u64,
    /// Log planet statistics every N frames (0 = never).
    pub stats_interval: u64,
}

// --- Default implementations ---

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius_m: 6_371_000.0,
            seed: 1337,
            start_altitude_m: 2_000_000.0,
            camera_speed_m_s: 150_000.0,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            max_level: 12,
            resolution: 32,
            range_multiplier: 3.0,
            range_decay: 0.6,
            hysteresis: 0.1,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            displacement: true,
            octaves: 6,
            amplitude_m: 4_000.0,
            base_frequency: 2.0,
            lacunarity: 2.0,
            persistence: 0.5,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_concurrent_tasks: 8,
            max_retries: 2,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames: 1_200,
            stats_interval: 120,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Reject values that would make the quadtree or the pool unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidValue {
                field,
                reason: reason.into(),
            }
        }

        if !(self.planet.radius_m.is_finite() && self.planet.radius_m > 0.0) {
            return Err(invalid("planet.radius_m", "must be a positive number"));
        }
        if self.lod.resolution == 0 || self.lod.resolution > MAX_RESOLUTION {
            return Err(invalid(
                "lod.resolution",
                format!("must be in 1..={MAX_RESOLUTION}"),
            ));
        }
        if !(self.lod.range_decay > 0.0 && self.lod.range_decay <= 1.0) {
            return Err(invalid("lod.range_decay", "must be in (0, 1]"));
        }
        if !(self.lod.range_multiplier.is_finite() && self.lod.range_multiplier > 0.0) {
            return Err(invalid("lod.range_multiplier", "must be a positive number"));
        }
        if !(self.lod.hysteresis.is_finite() && self.lod.hysteresis >= 0.0) {
            return Err(invalid("lod.hysteresis", "must be a non-negative number"));
        }

        let terrain = &self.terrain;
        if terrain.octaves > MAX_OCTAVES {
            return Err(invalid(
                "terrain.octaves",
                format!("must be at most {MAX_OCTAVES}"),
            ));
        }
        if !(terrain.base_frequency.is_finite() && terrain.base_frequency > 0.0) {
            return Err(invalid("terrain.base_frequency", "must be a positive number"));
        }
        if !terrain.amplitude_m.is_finite() {
            return Err(invalid("terrain.amplitude_m", "must be a finite number"));
        }
        if !(terrain.lacunarity.is_finite() && terrain.lacunarity > 0.0) {
            return Err(invalid("terrain.lacunarity", "must be a positive number"));
        }
        if !terrain.persistence.is_finite() {
            return Err(invalid("terrain.persistence", "must be a finite number"));
        }
        let top_frequency =
            terrain.base_frequency * terrain.lacunarity.powi(terrain.octaves as i32);
        if !top_frequency.is_finite() {
            return Err(invalid(
                "terrain.lacunarity",
                "overflows the frequency of the last octave",
            ));
        }

        if self.workers.max_concurrent_tasks == 0 {
            return Err(invalid("workers.max_concurrent_tasks", "must be at least 1"));
        }
        Ok(())
    }
}
