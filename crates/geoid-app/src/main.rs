//! The `geoid` binary: a headless flight over a procedurally displaced planet.
//!
//! Loads `config.ron`, builds the planet at a distant world position and flies
//! the camera down to the surface and back, logging LOD statistics. The config
//! file is polled for changes and LOD edits are applied without a restart.
//!
//! Run with: `cargo run -p geoid-app -- --max-level 8 --frames 2000`

mod platform;

use std::time::{Duration, Instant};

use clap::Parser;
use geoid_app::flight::FlightScript;
use geoid_app::game_loop::{FIXED_DT, GameLoop};
use geoid_app::settings;
use geoid_config::{CliArgs, Config};
use geoid_lod::{HeadlessScene, Planet};
use geoid_origin::PrecisionFrame;
use glam::DVec3;
use tracing::{error, info, warn};

use platform::PlatformDirs;

/// Where the planet sits in world space: one astronomical unit out, far
/// beyond what `f32` can place to the meter.
const PLANET_POSITION: DVec3 = DVec3::new(1.496e11, 2.0e9, -7.5e8);

/// Lowest point of the scripted descent, in meters above the base sphere.
const FLOOR_ALTITUDE_M: f64 = 1_000.0;

/// Frames between checks of `config.ron` for edits.
const RELOAD_INTERVAL_FRAMES: u64 = 120;

fn main() {
    let args = CliArgs::parse();

    let dirs = match &args.config {
        Some(root) => PlatformDirs::resolve_with_root(root),
        None => match PlatformDirs::resolve() {
            Ok(dirs) => dirs,
            Err(e) => {
                eprintln!("Failed to resolve platform directories: {e}");
                std::process::exit(1);
            }
        },
    };
    if let Err(e) = dirs.create_dirs() {
        eprintln!("Failed to create platform directories: {e}");
        std::process::exit(1);
    }

    let mut config = match Config::load_or_create(&dirs.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config, using defaults: {e}");
            Config::default()
        }
    };
    config.apply_cli_overrides(&args);

    geoid_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    info!("Geoid planet streamer");
    info!("  config: {}", dirs.config_dir.display());
    info!("  logs:   {}", dirs.log_dir.display());

    if let Err(e) = config.validate() {
        error!("Invalid configuration after CLI overrides: {e}");
        std::process::exit(1);
    }

    run(config, &dirs);
}

fn run(mut config: Config, dirs: &PlatformDirs) {
    let mut script = FlightScript::new(
        config.planet.radius_m,
        config.planet.start_altitude_m,
        FLOOR_ALTITUDE_M,
        config.planet.camera_speed_m_s,
    );

    let mut frame = PrecisionFrame::new(PLANET_POSITION + script.offset());
    let entity = frame.add(PLANET_POSITION);

    let planet_settings = settings::planet_settings(&config);
    info!(
        "Planet: radius={:.0}km, max_level={}, resolution={}, displacement={}",
        planet_settings.radius / 1000.0,
        planet_settings.lod.max_level,
        planet_settings.lod.resolution,
        planet_settings.displacement.is_some(),
    );

    let mut planet = match Planet::new(entity, planet_settings, settings::pool_config(&config)) {
        Ok(planet) => planet,
        Err(e) => {
            error!("Failed to build planet: {e}");
            std::process::exit(1);
        }
    };
    let mut scene = HeadlessScene::new();
    let mut game_loop = GameLoop::new();
    let started = Instant::now();

    while game_loop.frame_count() < config.debug.frames {
        let frame_start = Instant::now();

        game_loop.tick(
            |dt, _sim_time| {
                script.step(dt);
                let target = frame.position(entity).unwrap_or(PLANET_POSITION) + script.offset();
                let current =
                    frame.camera_position() + frame.camera_render_position().as_dvec3();
                if let Err(e) = frame.translate_camera((target - current).as_vec3()) {
                    warn!("Camera step rejected: {e}");
                }
            },
            |_alpha| {},
        );

        frame.update();
        if let Err(e) = planet.update(&mut frame, &mut scene) {
            error!("Planet update failed: {e}");
        }

        let frame_index = game_loop.frame_count();
        let interval = config.debug.stats_interval;
        if interval > 0 && frame_index % interval == 0 {
            let stats = planet.stats();
            info!(
                frame = frame_index,
                altitude_km = script.altitude() / 1000.0,
                patches = stats.patches,
                leaves = stats.leaves,
                deepest = stats.deepest_level,
                visible = stats.visible_meshes,
                generating = stats.generating,
                transitions = stats.transitions,
                queued = stats.queued_tasks,
                stalled = stats.stalled,
                triangles = scene.enabled_triangles(),
                "planet stats"
            );
        }

        if frame_index % RELOAD_INTERVAL_FRAMES == 0 {
            reload_config(&mut config, dirs, &mut planet);
        }

        let elapsed = frame_start.elapsed().as_secs_f64();
        if elapsed < FIXED_DT {
            std::thread::sleep(Duration::from_secs_f64(FIXED_DT - elapsed));
        }
    }

    let stats = planet.stats();
    info!(
        "Flight finished after {} frames in {:.1}s: {} meshes created, {} disposed, {} leaves",
        game_loop.frame_count(),
        started.elapsed().as_secs_f64(),
        scene.created(),
        scene.disposed(),
        stats.leaves,
    );

    planet.teardown(&mut frame);
    info!("Teardown complete: {} meshes alive", scene.alive());
}

/// Apply LOD edits from `config.ron`. Other sections take effect on restart.
fn reload_config<H: geoid_lod::MeshHandle>(
    config: &mut Config,
    dirs: &PlatformDirs,
    planet: &mut Planet<H>,
) {
    let new_config = match config.reload(&dirs.config_dir) {
        Ok(Some(new_config)) => new_config,
        Ok(None) => return,
        Err(e) => {
            warn!("Config reload failed: {e}");
            return;
        }
    };

    if new_config.lod != config.lod {
        match planet.apply_lod_settings(settings::lod_settings(&new_config.lod)) {
            Ok(()) => info!("Applied LOD settings: {:?}", new_config.lod),
            Err(e) => {
                warn!("Rejected LOD settings from config: {e}");
                return;
            }
        }
    }
    *config = new_config;
}
