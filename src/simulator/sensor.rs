//! Continuous glucose monitor with seeded, autocorrelated measurement noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Catalog entry describing a CGM model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Catalog name.
    pub name: String,
    /// Minutes between readings.
    pub sample_time: u32,
    /// Lowest reportable reading (mg/dL).
    pub min: f64,
    /// Highest reportable reading (mg/dL).
    pub max: f64,
    /// Noise standard deviation (mg/dL).
    pub noise_sd: f64,
    /// Lag-one autocorrelation of the noise.
    pub pacf: f64,
}

impl SensorSpec {
    /// Checks that readings can be produced: a non-empty clamp range, a
    /// non-negative noise level and a stationary AR(1) coefficient.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidSensor {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.sample_time == 0 {
            return Err(invalid("sample_time must be > 0"));
        }
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(invalid("min and max must be finite with min <= max"));
        }
        if !self.noise_sd.is_finite() || self.noise_sd < 0.0 {
            return Err(invalid("noise_sd must be finite and >= 0"));
        }
        if self.pacf.is_nan() || self.pacf.abs() > 1.0 {
            return Err(invalid("pacf must lie in [-1, 1]"));
        }
        Ok(())
    }
}

/// A CGM sensor instance with a fixed noise seed.
///
/// Noise comes from a [`CgmReader`] seeded from `seed` at the start of every
/// run, so two runs of equal environments read identical noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CgmSensor {
    /// Sensor model.
    pub spec: SensorSpec,
    /// Noise seed.
    pub seed: u64,
}

impl CgmSensor {
    /// Creates a sensor with the given noise seed.
    #[must_use]
    pub fn new(spec: SensorSpec, seed: u64) -> Self {
        Self { spec, seed }
    }

    /// Minutes between readings.
    #[must_use]
    pub const fn sample_time(&self) -> u32 {
        self.spec.sample_time
    }

    /// Starts a fresh noise sequence for one run.
    #[must_use]
    pub fn reader(&self) -> CgmReader<'_> {
        CgmReader {
            spec: &self.spec,
            rng: StdRng::seed_from_u64(self.seed),
            last: 0.0,
        }
    }
}

/// Per-run reading state of a [`CgmSensor`].
pub struct CgmReader<'a> {
    spec: &'a SensorSpec,
    rng: StdRng,
    last: f64,
}

impl CgmReader<'_> {
    /// Reads the sensor for a true plasma glucose value.
    pub fn measure(&mut self, glucose: f64) -> f64 {
        let spec = self.spec;
        let z: f64 = self.rng.sample(StandardNormal);
        let innovation = (1.0 - spec.pacf * spec.pacf).max(0.0).sqrt() * z * spec.noise_sd;
        let e = spec.pacf * self.last + innovation;
        self.last = e;
        // Not `clamp`: a spec that skipped validation must not panic mid-run.
        (glucose + e).max(spec.min).min(spec.max)
    }
}
