//! # glucose-sbi-sim - Batch simulation for glucose model inference
//!
//! Turns a matrix of candidate parameter sets, as produced by a
//! simulation-based inference procedure, into a batch of Type-1 diabetes
//! simulations and returns the resulting CGM traces as one tensor.
//!
//! ## Core Concepts
//!
//! - **DefaultEnvironmentSpec**: Read-only baseline (patient, sensor, pump, meals, horizon)
//! - **InferredParamsSpec**: Ordered parameter names; names containing `meal` patch the scenario
//! - **Patching**: Each parameter row is written into its own clone of the baseline
//! - **BatchRunner**: Runs environments on a scoped worker pool, preserving input order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use glucose_sbi_sim::{
//!     run_simulation, DefaultEnvironmentSpec, InferredParamsSpec, ParameterMatrix,
//!     SimulatorOptions,
//! };
//!
//! let spec = DefaultEnvironmentSpec::new("adult#001", "Dexcom", "Insulet")
//!     .with_meal("breakfast", 7.0, 40.0);
//! let inferred = InferredParamsSpec::new(["BW", "meal_1"]);
//! let theta = ParameterMatrix::from_rows([[70.0, 60.0], [82.0, 35.0]])?;
//!
//! let options = SimulatorOptions { infer_meal_params: true, ..Default::default() };
//! let cgm = run_simulation(&theta, &spec, &inferred, 24, &options)?;
//! assert_eq!(cgm.shape()[0], 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod environment;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod runner;
pub mod simulator;

// Re-export primary types at crate root for convenience
pub use environment::{
    build_batch, build_default, DefaultEnvironmentSpec, EnvironmentFactory, MealPatchMode,
    PatchOptions,
};
pub use error::{ConfigurationError, DimensionError, GlucoseError, GlucoseResult, SimulationFailure};
pub use orchestrator::{run_simulation, GlucoseSimulator, SimulatorOptions};
pub use params::{InferredParamsSpec, ParameterMatrix};
pub use runner::{
    BatchRunner, BatchRunnerConfig, DType, Device, ExecutionMode, OutputSpec, ResultBatch, Tensor,
};
pub use simulator::{Catalog, Runnable, SimulationEnvironment};
