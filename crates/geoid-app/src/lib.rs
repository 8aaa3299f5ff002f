//! Geoid application framework.
//!
//! Wires the configuration into a planet, drives it from a fixed-timestep
//! loop and scripts the camera for the headless flight binary.

pub mod flight;
pub mod game_loop;
pub mod settings;
