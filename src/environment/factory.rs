//! Builds baseline environments and batches of patched copies.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{ConfigurationError, DimensionError, GlucoseResult};
use crate::params::{InferredParamsSpec, ParameterMatrix};
use crate::simulator::{
    today_midnight_utc, BasalBolusController, Catalog, CgmSensor, InsulinPump, Patient, Scenario,
    SimulationEnvironment, MAX_HOURS,
};

use super::patch::{apply, PatchOptions};
use super::{DefaultEnvironmentSpec, SENSOR_SEED};

/// Resolves names against a [`Catalog`] and produces runnable environments.
#[derive(Debug, Clone)]
pub struct EnvironmentFactory {
    catalog: Arc<Catalog>,
}

impl Default for EnvironmentFactory {
    fn default() -> Self {
        Self::new(Catalog::builtin())
    }
}

impl EnvironmentFactory {
    /// Creates a factory over a catalog.
    #[must_use]
    pub const fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// The catalog used for lookups.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Builds the baseline environment, starting at today's UTC midnight.
    pub fn build_default(
        &self,
        spec: &DefaultEnvironmentSpec,
        hours: u32,
    ) -> GlucoseResult<SimulationEnvironment> {
        self.build_default_at(spec, hours, today_midnight_utc())
    }

    /// Builds the baseline environment with an explicit start time.
    pub fn build_default_at(
        &self,
        spec: &DefaultEnvironmentSpec,
        hours: u32,
        start_time: DateTime<Utc>,
    ) -> GlucoseResult<SimulationEnvironment> {
        if hours > MAX_HOURS {
            return Err(ConfigurationError::InvalidHorizon {
                hours,
                max: MAX_HOURS,
            }
            .into());
        }
        let profile = self.catalog.patient(&spec.patient_name)?;
        let sensor = self.catalog.sensor(&spec.sensor_name)?;
        let pump = self.catalog.pump(&spec.pump_name)?;

        Ok(SimulationEnvironment::new(
            Patient::new(spec.patient_name.clone(), profile.params),
            CgmSensor::new(sensor.clone(), SENSOR_SEED),
            InsulinPump::new(pump.clone()),
            Scenario::new(start_time, spec.scenario.clone()),
            BasalBolusController::new(profile.therapy),
            hours,
        ))
    }

    /// Builds one patched environment per row of `theta`, in row order.
    ///
    /// The baseline is built once and only read afterwards; each row gets its
    /// own clone before patching.
    pub fn build_batch(
        &self,
        theta: &ParameterMatrix,
        spec: &DefaultEnvironmentSpec,
        inferred: &InferredParamsSpec,
        hours: u32,
        options: PatchOptions,
    ) -> GlucoseResult<Vec<SimulationEnvironment>> {
        self.build_batch_at(theta, spec, inferred, hours, options, today_midnight_utc())
    }

    /// [`Self::build_batch`] with an explicit start time.
    pub fn build_batch_at(
        &self,
        theta: &ParameterMatrix,
        spec: &DefaultEnvironmentSpec,
        inferred: &InferredParamsSpec,
        hours: u32,
        options: PatchOptions,
        start_time: DateTime<Utc>,
    ) -> GlucoseResult<Vec<SimulationEnvironment>> {
        // Checked once up front so a bad matrix fails before any build work.
        if !theta.is_empty() && theta.cols() != inferred.len() {
            return Err(DimensionError::ParameterCount {
                expected: inferred.len(),
                actual: theta.cols(),
            }
            .into());
        }

        let baseline = self.build_default_at(spec, hours, start_time)?;
        let mut environments = Vec::with_capacity(theta.rows());
        for row in theta.iter_rows() {
            let mut env = baseline.clone();
            apply(&mut env, row, inferred, options)?;
            environments.push(env);
        }
        Ok(environments)
    }
}

/// Builds the baseline environment against the built-in catalog.
pub fn build_default(spec: &DefaultEnvironmentSpec, hours: u32) -> GlucoseResult<SimulationEnvironment> {
    EnvironmentFactory::default().build_default(spec, hours)
}

/// Builds a batch of patched environments against the built-in catalog.
pub fn build_batch(
    theta: &ParameterMatrix,
    spec: &DefaultEnvironmentSpec,
    inferred: &InferredParamsSpec,
    hours: u32,
    options: PatchOptions,
) -> GlucoseResult<Vec<SimulationEnvironment>> {
    EnvironmentFactory::default().build_batch(theta, spec, inferred, hours, options)
}
