//! Conversions from the persisted [`Config`] into runtime planet settings.

use geoid_config::{Config, LodConfig};
use geoid_lod::{LodSettings, PlanetSettings, WorkerPoolConfig};
use geoid_terrain::HeightmapParams;

/// Subdivision policy from the `lod` section.
pub fn lod_settings(lod: &LodConfig) -> LodSettings {
    LodSettings {
        max_level: lod.max_level,
        resolution: lod.resolution,
        range_multiplier: lod.range_multiplier,
        range_decay: lod.range_decay,
        hysteresis: lod.hysteresis,
    }
}

/// Displacement noise, or `None` for a smooth sphere.
pub fn heightmap_params(config: &Config) -> Option<HeightmapParams> {
    let terrain = &config.terrain;
    terrain.displacement.then(|| HeightmapParams {
        seed: config.planet.seed,
        octaves: terrain.octaves,
        lacunarity: terrain.lacunarity,
        persistence: terrain.persistence,
        base_frequency: terrain.base_frequency,
        amplitude: terrain.amplitude_m,
    })
}

/// Everything the planet needs from the config.
pub fn planet_settings(config: &Config) -> PlanetSettings {
    PlanetSettings {
        radius: config.planet.radius_m,
        seed: config.planet.seed,
        lod: lod_settings(&config.lod),
        displacement: heightmap_params(config),
        max_retries: config.workers.max_retries,
    }
}

/// Worker pool sizing from the `workers` section.
pub fn pool_config(config: &Config) -> WorkerPoolConfig {
    WorkerPoolConfig {
        worker_count: config.workers.worker_count,
        max_concurrent_tasks: config.workers.max_concurrent_tasks,
    }
}
