//! Scripted camera path for the headless flight: a descent from orbit to
//! just above the surface, then a climb back out, drifting eastward.

use glam::DVec3;

/// Vertical speed as a fraction of the current altitude, per second.
const ALTITUDE_RATE: f64 = 0.5;

/// Which way the camera is heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightPhase {
    /// Losing altitude towards the floor.
    Descending,
    /// Climbing back to the start altitude.
    Climbing,
    /// Back at the start altitude; the camera hovers.
    Holding,
}

/// Camera script around a planet of a given radius.
///
/// Vertical speed is capped by `speed` and shrinks with altitude, so the
/// camera lingers where the quadtree is deepest.
#[derive(Clone, Debug)]
pub struct FlightScript {
    radius: f64,
    start_altitude: f64,
    floor_altitude: f64,
    speed: f64,
    drift_rate: f64,
    altitude: f64,
    longitude: f64,
    phase: FlightPhase,
}

impl FlightScript {
    /// Start at `start_altitude` above the surface.
    pub fn new(radius: f64, start_altitude: f64, floor_altitude: f64, speed: f64) -> Self {
        let floor_altitude = floor_altitude.max(1.0);
        let start_altitude = start_altitude.max(floor_altitude);
        Self {
            radius,
            start_altitude,
            floor_altitude,
            speed: speed.max(0.0),
            drift_rate: 0.01,
            altitude: start_altitude,
            longitude: 0.0,
            phase: FlightPhase::Descending,
        }
    }

    /// Angular drift around the planet in radians per second.
    pub fn with_drift_rate(mut self, drift_rate: f64) -> Self {
        self.drift_rate = drift_rate;
        self
    }

    /// Advance the script by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let rate = self.speed.min(self.altitude * ALTITUDE_RATE) * dt;
        match self.phase {
            FlightPhase::Descending => {
                self.altitude -= rate;
                if self.altitude <= self.floor_altitude {
                    self.altitude = self.floor_altitude;
                    self.phase = FlightPhase::Climbing;
                }
            }
            FlightPhase::Climbing => {
                self.altitude += rate;
                if self.altitude >= self.start_altitude {
                    self.altitude = self.start_altitude;
                    self.phase = FlightPhase::Holding;
                }
            }
            FlightPhase::Holding => {}
        }
        self.longitude += self.drift_rate * dt;
    }

    /// Current altitude above the base sphere in meters.
    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    /// Current phase.
    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// Unit direction from the planet center to the camera.
    pub fn direction(&self) -> DVec3 {
        // Tilted off the equator so the path crosses face seams.
        let (sin, cos) = self.longitude.sin_cos();
        DVec3::new(cos, 0.35, sin).normalize()
    }

    /// Camera offset from the planet center.
    pub fn offset(&self) -> DVec3 {
        self.direction() * (self.radius + self.altitude)
    }
}
