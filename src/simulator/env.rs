//! Runnable simulation environment and its tabular results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SimulationFailure;

use super::controller::BasalBolusController;
use super::patient::Patient;
use super::pump::InsulinPump;
use super::scenario::Scenario;
use super::sensor::CgmSensor;
use super::Runnable;

/// Longest horizon (hours) whose length in minutes fits in a `u32`.
pub const MAX_HOURS: u32 = u32::MAX / 60;

/// One row of simulation output, taken at a sensor sample time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    /// Wall-clock time of the sample.
    pub time: DateTime<Utc>,
    /// True plasma glucose (mg/dL).
    pub bg: f64,
    /// Sensor reading (mg/dL).
    pub cgm: f64,
    /// Carbohydrate eaten during the following step (g).
    pub cho: f64,
    /// Insulin delivered during the following step (U).
    pub insulin: f64,
}

/// Result columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    /// True plasma glucose.
    Bg,
    /// Sensor reading.
    Cgm,
    /// Carbohydrate intake.
    Cho,
    /// Insulin delivery.
    Insulin,
}

/// Tabular output of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    /// Records in time order.
    pub records: Vec<SimulationRecord>,
}

impl SimulationResults {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no samples were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Extracts one column as a flat series.
    #[must_use]
    pub fn column(&self, column: Column) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| match column {
                Column::Bg => r.bg,
                Column::Cgm => r.cgm,
                Column::Cho => r.cho,
                Column::Insulin => r.insulin,
            })
            .collect()
    }

    /// The glucose-sensor reading column.
    #[must_use]
    pub fn cgm(&self) -> Vec<f64> {
        self.column(Column::Cgm)
    }
}

/// Everything one simulation run needs, owned outright.
///
/// `Clone` produces a fully independent copy; nothing is shared with the
/// value it was cloned from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEnvironment {
    /// Virtual patient.
    pub patient: Patient,
    /// CGM sensor.
    pub sensor: CgmSensor,
    /// Insulin pump.
    pub pump: InsulinPump,
    /// Meal scenario.
    pub scenario: Scenario,
    /// Controller.
    pub controller: BasalBolusController,
    /// Simulated horizon (hours).
    pub hours: u32,
    /// Live visualization. Not supported; runs ignore it.
    pub animate: bool,
    results: Option<SimulationResults>,
}

impl SimulationEnvironment {
    /// Assembles an environment.
    #[must_use]
    pub fn new(
        patient: Patient,
        sensor: CgmSensor,
        pump: InsulinPump,
        scenario: Scenario,
        controller: BasalBolusController,
        hours: u32,
    ) -> Self {
        Self {
            patient,
            sensor,
            pump,
            scenario,
            controller,
            hours,
            animate: false,
            results: None,
        }
    }

    /// Simulated horizon.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::hours(i64::from(self.hours))
    }

    /// Number of samples a completed run produces.
    #[must_use]
    pub fn expected_samples(&self) -> usize {
        let steps = u64::from(self.hours) * 60 / u64::from(self.sensor.sample_time().max(1));
        usize::try_from(steps).map_or(usize::MAX, |s| s.saturating_add(1))
    }

    /// Runs the simulation to completion, replacing earlier results.
    pub fn simulate(&mut self) -> Result<(), SimulationFailure> {
        if self.animate {
            log::warn!("animation is not supported; running headless");
        }
        self.results = None;
        let Some(horizon) = self.hours.checked_mul(60) else {
            return Err(SimulationFailure::InvalidParameter {
                name: "hours".to_string(),
                value: f64::from(self.hours),
                reason: format!("horizon must not exceed {MAX_HOURS} hours"),
            });
        };
        self.patient.reset()?;

        let sample = self.sensor.sample_time().max(1);
        let steps = horizon / sample;
        let mut reader = self.sensor.reader();
        let mut records = Vec::with_capacity(steps as usize + 1);

        for step in 0..steps {
            let minute = step * sample;
            let bg = self.patient.glucose();
            let cgm = reader.measure(bg);
            let cho = self.scenario.carbs_between(minute, sample);

            let action = self.controller.policy(&self.patient.params, cgm, cho);
            let basal = self.pump.basal(action.basal);
            let bolus = self.pump.bolus(action.bolus);

            records.push(SimulationRecord {
                time: self.scenario.start_time + Duration::minutes(i64::from(minute)),
                bg,
                cgm,
                cho,
                insulin: basal * f64::from(sample) + bolus,
            });

            for k in 0..sample {
                let dose = if k == 0 { basal + bolus } else { basal };
                self.patient
                    .step(minute + k, self.scenario.carbs_at(minute + k), dose)?;
            }
        }

        let minute = steps * sample;
        let bg = self.patient.glucose();
        records.push(SimulationRecord {
            time: self.scenario.start_time + Duration::minutes(i64::from(minute)),
            bg,
            cgm: reader.measure(bg),
            cho: 0.0,
            insulin: 0.0,
        });

        self.results = Some(SimulationResults { records });
        Ok(())
    }

    /// Results of the last completed run.
    #[must_use]
    pub fn results(&self) -> Option<&SimulationResults> {
        self.results.as_ref()
    }
}

impl Runnable for SimulationEnvironment {
    fn simulate(&mut self) -> Result<(), SimulationFailure> {
        Self::simulate(self)
    }

    fn cgm_series(&self) -> Option<Vec<f64>> {
        self.results().map(SimulationResults::cgm)
    }
}
