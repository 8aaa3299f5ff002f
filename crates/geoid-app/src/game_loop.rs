//! Fixed-timestep frame driver.
//!
//! Simulation (camera motion) runs at a fixed 60 Hz from an accumulator; the
//! planet update runs once per frame after it.

use std::time::Instant;
use tracing::warn;

/// Fixed simulation timestep: 60 Hz.
pub const FIXED_DT: f64 = 1.0 / 60.0;

/// Longest frame the accumulator accepts. Slower frames are clamped and the
/// simulation slows down instead of running dozens of catch-up steps.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Fixed-timestep loop state.
pub struct GameLoop {
    previous_time: Instant,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl GameLoop {
    /// Creates a new `GameLoop` starting from the current instant.
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Runs one frame using the wall-clock time since the previous frame.
    ///
    /// - `update_fn(fixed_dt, total_sim_time)` is called zero or more times at
    ///   the fixed rate.
    /// - `frame_fn(alpha)` is called exactly once with the interpolation alpha
    ///   in `[0.0, 1.0)`.
    pub fn tick(&mut self, update_fn: impl FnMut(f64, f64), frame_fn: impl FnMut(f64)) {
        let current_time = Instant::now();
        let frame_time = current_time
            .duration_since(self.previous_time)
            .as_secs_f64();
        self.previous_time = current_time;
        self.advance(frame_time, update_fn, frame_fn);
    }

    /// Runs one frame with an explicit frame time in seconds.
    pub fn advance(
        &mut self,
        frame_time: f64,
        mut update_fn: impl FnMut(f64, f64),
        mut frame_fn: impl FnMut(f64),
    ) {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }

        self.accumulator += frame_time;

        while self.accumulator >= FIXED_DT {
            update_fn(FIXED_DT, self.total_sim_time);
            self.total_sim_time += FIXED_DT;
            self.accumulator -= FIXED_DT;
            self.update_count += 1;
        }

        frame_fn(self.alpha());
        self.frame_count += 1;
    }

    /// Returns the current interpolation alpha without running a frame.
    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / FIXED_DT
        } else {
            0.0
        }
    }

    /// Returns the total number of frames run.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns the total number of simulation update steps executed.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Returns the total simulation time in seconds.
    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step() {
        let mut game_loop = GameLoop::new();
        let mut updates = 0u32;
        game_loop.advance(FIXED_DT, |_, _| updates += 1, |_| {});
        assert_eq!(updates, 1);
        assert!(game_loop.accumulator.abs() < 1e-12);
    }

    #[test]
    fn test_multiple_steps_pass_sim_time() {
        let mut game_loop = GameLoop::new();
        let mut times = Vec::new();
        game_loop.advance(3.0 * FIXED_DT + 1e-9, |_, t| times.push(t), |_| {});
        assert_eq!(times.len(), 3);
        assert!(times[0].abs() < 1e-12);
        assert!((times[2] - 2.0 * FIXED_DT).abs() < 1e-12);
        assert!((game_loop.total_sim_time() - 3.0 * FIXED_DT).abs() < 1e-12);
    }

    #[test]
    fn test_partial_frame_still_runs_frame_fn() {
        let mut game_loop = GameLoop::new();
        let mut updates = 0u32;
        let mut alpha = -1.0;
        game_loop.advance(0.25 * FIXED_DT, |_, _| updates += 1, |a| alpha = a);
        assert_eq!(updates, 0);
        assert!((alpha - 0.25).abs() < 1e-10);
        assert!((0.0..1.0).contains(&alpha));
    }

    #[test]
    fn test_max_frame_time_clamp() {
        let mut game_loop = GameLoop::new();
        let mut updates = 0u32;
        game_loop.advance(1.0, |_, _| updates += 1, |_| {});
        let max_updates = (MAX_FRAME_TIME / FIXED_DT).ceil() as u32;
        assert!(updates <= max_updates, "{updates} updates for a clamped frame");
        assert!(updates > 0);
    }

    #[test]
    fn test_negative_frame_time_is_ignored() {
        let mut game_loop = GameLoop::new();
        let mut updates = 0u32;
        game_loop.advance(-1.0, |_, _| updates += 1, |_| {});
        assert_eq!(updates, 0);
        assert_eq!(game_loop.alpha(), 0.0);
        assert_eq!(game_loop.frame_count(), 1);
    }

    #[test]
    fn test_sim_time_matches_update_count() {
        let mut game_loop = GameLoop::new();
        let frame_times = [0.017, 0.015, 0.020, 0.016, 0.033, 0.008, 0.018];
        for &ft in &frame_times {
            game_loop.advance(ft, |_, _| {}, |_| {});
        }
        let expected = game_loop.update_count() as f64 * FIXED_DT;
        assert!((game_loop.total_sim_time() - expected).abs() < 1e-10);
        assert_eq!(game_loop.frame_count(), frame_times.len() as u64);
    }

    #[test]
    fn test_game_loop_default() {
        let game_loop = GameLoop::default();
        assert_eq!(game_loop.frame_count(), 0);
        assert_eq!(game_loop.update_count(), 0);
        assert_eq!(game_loop.total_sim_time(), 0.0);
    }
}
