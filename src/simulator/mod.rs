//! Simulator collaborator: named catalog, virtual patient, sensor, pump,
//! controller, scenario and the runnable environment that ties them together.
//!
//! Batch execution only relies on the [`Runnable`] contract; everything else in
//! this module is the built-in reference simulator behind it.

pub mod catalog;
pub mod controller;
pub mod env;
pub mod patient;
pub mod pump;
pub mod scenario;
pub mod sensor;

pub use catalog::{Catalog, PatientProfile};
pub use controller::{BasalBolusController, ControlAction, TherapyProfile};
pub use env::{Column, SimulationEnvironment, SimulationRecord, SimulationResults, MAX_HOURS};
pub use patient::{Patient, PatientParams, PatientState, PARAM_NAMES};
pub use pump::{InsulinPump, PumpSpec};
pub use scenario::{today_midnight_utc, Meal, Scenario};
pub use sensor::{CgmReader, CgmSensor, SensorSpec};

use crate::error::SimulationFailure;

/// A self-contained unit of simulation work.
///
/// Implementors own all of their state, so a value can be moved to a worker
/// thread and executed without coordination.
pub trait Runnable: Send + 'static {
    /// Executes the simulation to completion.
    fn simulate(&mut self) -> Result<(), SimulationFailure>;

    /// The glucose-sensor series of the last completed run.
    fn cgm_series(&self) -> Option<Vec<f64>>;
}
