//! Baseline environment description, parameter patching and batch construction.

pub mod factory;
pub mod patch;

pub use factory::{build_batch, build_default, EnvironmentFactory};
pub use patch::{apply, MealPatchMode, PatchOptions, PatchPlan};

use serde::{Deserialize, Serialize};

use crate::simulator::Meal;

/// Sensor noise seed used for every baseline environment.
pub const SENSOR_SEED: u64 = 1;

const fn default_hours() -> u32 {
    24
}

/// Read-only template for the baseline simulation environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultEnvironmentSpec {
    /// Catalog name of the patient.
    pub patient_name: String,
    /// Catalog name of the CGM sensor.
    pub sensor_name: String,
    /// Catalog name of the insulin pump.
    pub pump_name: String,
    /// Baseline meals, in order.
    #[serde(default)]
    pub scenario: Vec<Meal>,
    /// Default simulated horizon (hours).
    #[serde(default = "default_hours")]
    pub hours: u32,
}

impl DefaultEnvironmentSpec {
    /// Creates a spec with no meals and a 24 hour horizon.
    #[must_use]
    pub fn new(
        patient_name: impl Into<String>,
        sensor_name: impl Into<String>,
        pump_name: impl Into<String>,
    ) -> Self {
        Self {
            patient_name: patient_name.into(),
            sensor_name: sensor_name.into(),
            pump_name: pump_name.into(),
            scenario: Vec::new(),
            hours: default_hours(),
        }
    }

    /// Appends a baseline meal.
    #[must_use]
    pub fn with_meal(mut self, name: impl Into<String>, hour: f64, carbs: f64) -> Self {
        self.scenario.push(Meal::new(name, hour, carbs));
        self
    }

    /// Sets the default horizon.
    #[must_use]
    pub const fn with_hours(mut self, hours: u32) -> Self {
        self.hours = hours;
        self
    }
}
