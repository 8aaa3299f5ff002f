//! Multi-octave fractal Brownian motion (fBm) heightmap sampler.
//!
//! Composites octaves of simplex noise sampled at a unit-sphere direction, so
//! heights are continuous across cube-face seams.

use glam::DVec3;
use noise::{NoiseFn, Simplex};
use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// Most octaves a sampler will composite per vertex.
pub const MAX_OCTAVES: u32 = 16;

/// Configuration for multi-octave fBm noise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightmapParams {
    /// Seed for deterministic generation.
    pub seed: u64,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per unit of sphere direction.
    pub base_frequency: f64,
    /// Amplitude of the first octave in meters.
    pub amplitude: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 6,
            lacunarity: 2.0,
            persistence: 0.5,
            amplitude: 4000.0,
            base_frequency: 2.0,
        }
    }
}

impl HeightmapParams {
    /// Reject parameters that would make sampling unbounded or produce
    /// non-finite noise coordinates.
    pub fn validate(&self) -> Result<(), GeometryError> {
        fn invalid(field: &'static str, value: f64) -> GeometryError {
            GeometryError::InvalidDisplacement { field, value }
        }

        if self.octaves > MAX_OCTAVES {
            return Err(invalid("octaves", f64::from(self.octaves)));
        }
        if !(self.base_frequency.is_finite() && self.base_frequency > 0.0) {
            return Err(invalid("base_frequency", self.base_frequency));
        }
        if !self.amplitude.is_finite() {
            return Err(invalid("amplitude", self.amplitude));
        }
        if !(self.lacunarity.is_finite() && self.lacunarity > 0.0) {
            return Err(invalid("lacunarity", self.lacunarity));
        }
        if !self.persistence.is_finite() {
            return Err(invalid("persistence", self.persistence));
        }
        // The last octave's frequency must still be a usable coordinate scale.
        let top_frequency = self.base_frequency * self.lacunarity.powi(self.octaves as i32);
        if !top_frequency.is_finite() {
            return Err(invalid("lacunarity", self.lacunarity));
        }
        Ok(())
    }
}

/// Generates terrain heights using fractal Brownian motion over simplex noise.
///
/// Each successive octave doubles in frequency and halves in amplitude (with
/// the default parameters), producing self-similar detail at finer scales.
pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
}

impl HeightmapSampler {
    /// Create a new sampler with the given parameters.
    ///
    /// The noise takes a 32-bit seed; both halves of the `u64` seed are
    /// folded into it.
    pub fn new(params: HeightmapParams) -> Self {
        let noise = Simplex::new(fold_seed(params.seed));
        Self { noise, params }
    }

    /// Height in meters above the base sphere at a unit direction.
    pub fn sample(&self, direction: DVec3) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            let p = direction * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;

            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// Theoretical maximum absolute height (geometric series of amplitudes).
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp.abs();
            amp *= self.params.persistence;
        }
        sum
    }

    /// Return a reference to the current parameters.
    pub fn params(&self) -> &HeightmapParams {
        &self.params
    }
}

fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(seed: u64) -> HeightmapSampler {
        HeightmapSampler::new(HeightmapParams {
            seed,
            ..Default::default()
        })
    }

    #[test]
    fn test_determinism_same_seed_same_direction() {
        let dir = DVec3::new(0.3, 0.8, -0.52).normalize();
        let h1 = sampler(42).sample(dir);
        let h2 = sampler(42).sample(dir);
        assert_eq!(h1.to_bits(), h2.to_bits());
    }

    #[test]
    fn test_different_seeds_differ() {
        let dir = DVec3::new(0.6, -0.1, 0.79).normalize();
        let a = sampler(1).sample(dir);
        let b = sampler(2).sample(dir);
        assert!((a - b).abs() > 1e-9, "seeds 1 and 2 produced the same height {a}");
    }

    #[test]
    fn test_heights_within_max_amplitude() {
        let s = sampler(7);
        let max = s.max_amplitude();
        for i in 0..200 {
            let t = i as f64 * 0.1;
            let dir = DVec3::new(t.sin(), (t * 0.7).cos(), (t * 1.3).sin()).normalize();
            let h = s.sample(dir);
            assert!(h.abs() <= max, "height {h} exceeds max amplitude {max}");
        }
    }

    #[test]
    fn test_zero_octaves_is_flat() {
        let s = HeightmapSampler::new(HeightmapParams {
            octaves: 0,
            ..Default::default()
        });
        assert_eq!(s.sample(DVec3::X), 0.0);
        assert_eq!(s.max_amplitude(), 0.0);
    }

    #[test]
    fn test_max_amplitude_geometric_sum() {
        let s = HeightmapSampler::new(HeightmapParams {
            octaves: 3,
            amplitude: 100.0,
            persistence: 0.5,
            ..Default::default()
        });
        assert!((s.max_amplitude() - 175.0).abs() < 1e-12);
    }

    #[test]
    fn test_high_seed_bits_change_terrain() {
        let dir = DVec3::new(0.6, -0.1, 0.79).normalize();
        let low = sampler(5).sample(dir);
        let high = sampler(5 | (1 << 40)).sample(dir);
        assert!((low - high).abs() > 1e-9, "high seed bits were dropped");
        assert_ne!(fold_seed(5), fold_seed(5 | (1 << 40)));
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(HeightmapParams::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unbounded_params() {
        let field_of = |params: HeightmapParams| match params.validate() {
            Err(GeometryError::InvalidDisplacement { field, .. }) => field,
            other => panic!("expected a rejection, got {other:?}"),
        };
        let base = HeightmapParams::default();
        assert_eq!(
            field_of(HeightmapParams { octaves: MAX_OCTAVES + 1, ..base.clone() }),
            "octaves"
        );
        assert_eq!(
            field_of(HeightmapParams { base_frequency: f64::NAN, ..base.clone() }),
            "base_frequency"
        );
        assert_eq!(
            field_of(HeightmapParams { base_frequency: 0.0, ..base.clone() }),
            "base_frequency"
        );
        assert_eq!(
            field_of(HeightmapParams { amplitude: f64::INFINITY, ..base.clone() }),
            "amplitude"
        );
        assert_eq!(
            field_of(HeightmapParams { lacunarity: 1e300, ..base.clone() }),
            "lacunarity"
        );
        assert_eq!(
            field_of(HeightmapParams { persistence: f64::NAN, ..base }),
            "persistence"
        );
    }
}
