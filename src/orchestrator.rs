//! Single entry point: parameter matrix in, CGM tensor out.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::environment::{DefaultEnvironmentSpec, EnvironmentFactory, MealPatchMode, PatchOptions};
use crate::error::GlucoseResult;
use crate::params::{InferredParamsSpec, ParameterMatrix};
use crate::runner::{BatchRunner, BatchRunnerConfig, OutputSpec, Tensor};

/// Options for a full simulation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorOptions {
    /// Output element type and placement.
    pub output: OutputSpec,
    /// Patch meal parameters into the scenario.
    pub infer_meal_params: bool,
    /// Meal matching strategy.
    pub meal_mode: MealPatchMode,
    /// Batch execution settings.
    pub runner: BatchRunnerConfig,
}

impl SimulatorOptions {
    /// Patch switches derived from these options.
    #[must_use]
    pub const fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            infer_meal_params: self.infer_meal_params,
            meal_mode: self.meal_mode,
        }
    }
}

/// Builds one environment per row of `theta`, runs them all and returns the
/// stacked CGM series as a `(rows, samples)` tensor.
///
/// `hours` is the simulated horizon of every run.
pub fn run_simulation(
    theta: &ParameterMatrix,
    default_spec: &DefaultEnvironmentSpec,
    inferred: &InferredParamsSpec,
    hours: u32,
    options: &SimulatorOptions,
) -> GlucoseResult<Tensor> {
    run_with_factory(
        &EnvironmentFactory::default(),
        theta,
        default_spec,
        inferred,
        hours,
        options,
    )
}

fn run_with_factory(
    factory: &EnvironmentFactory,
    theta: &ParameterMatrix,
    default_spec: &DefaultEnvironmentSpec,
    inferred: &InferredParamsSpec,
    hours: u32,
    options: &SimulatorOptions,
) -> GlucoseResult<Tensor> {
    let started = Instant::now();
    let runner = BatchRunner::new(options.runner.clone())?;
    log::info!(
        "simulating {} parameter sets of {} parameters over {hours} h",
        theta.rows(),
        theta.cols()
    );

    let environments =
        factory.build_batch(theta, default_spec, inferred, hours, options.patch_options())?;
    let tensor = runner.run(environments, options.output)?;

    log::info!(
        "output shape {:?}, total {:.3} seconds",
        tensor.shape(),
        started.elapsed().as_secs_f64()
    );
    Ok(tensor)
}

/// Simulator bound to one baseline and one set of inferred parameters.
///
/// Uses the baseline's own `hours` as the horizon of every call.
#[derive(Debug, Clone)]
pub struct GlucoseSimulator {
    default_spec: DefaultEnvironmentSpec,
    inferred: InferredParamsSpec,
    options: SimulatorOptions,
    factory: EnvironmentFactory,
}

impl GlucoseSimulator {
    /// Creates a simulator over the built-in catalog.
    #[must_use]
    pub fn new(
        default_spec: DefaultEnvironmentSpec,
        inferred: InferredParamsSpec,
        options: SimulatorOptions,
    ) -> Self {
        Self::with_factory(default_spec, inferred, options, EnvironmentFactory::default())
    }

    /// Creates a simulator over a custom factory.
    #[must_use]
    pub const fn with_factory(
        default_spec: DefaultEnvironmentSpec,
        inferred: InferredParamsSpec,
        options: SimulatorOptions,
        factory: EnvironmentFactory,
    ) -> Self {
        Self {
            default_spec,
            inferred,
            options,
            factory,
        }
    }

    /// The inferred parameter names, in column order.
    #[must_use]
    pub const fn inferred(&self) -> &InferredParamsSpec {
        &self.inferred
    }

    /// The options applied to every call.
    #[must_use]
    pub const fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    /// Simulates every row of `theta`.
    pub fn run(&self, theta: &ParameterMatrix) -> GlucoseResult<Tensor> {
        run_with_factory(
            &self.factory,
            theta,
            &self.default_spec,
            &self.inferred,
            self.default_spec.hours,
            &self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::DType;

    fn spec() -> DefaultEnvironmentSpec {
        DefaultEnvironmentSpec::new("adolescent#002", "GuardianRT", "Cozmo")
            .with_meal("breakfast", 1.0, 40.0)
            .with_hours(3)
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SimulatorOptions = serde_json::from_str(r#"{"infer_meal_params":true}"#).unwrap();
        assert!(options.infer_meal_params);
        assert_eq!(options.meal_mode, MealPatchMode::Positional);
        assert_eq!(options.output, OutputSpec::default());
        assert_eq!(options.patch_options(), PatchOptions::with_meals());
    }

    #[test]
    fn run_simulation_returns_one_row_per_parameter_set() {
        let theta = ParameterMatrix::from_rows([[50.0], [55.0]]).unwrap();
        let tensor = run_simulation(
            &theta,
            &spec(),
            &InferredParamsSpec::new(["BW"]),
            2,
            &SimulatorOptions::default(),
        )
        .unwrap();
        // GuardianRT samples every 5 minutes: 120 / 5 + 1.
        assert_eq!(tensor.shape(), [2, 25]);
        assert_eq!(tensor.dtype(), DType::F32);
    }

    #[test]
    fn simulator_uses_baseline_horizon() {
        let sim = GlucoseSimulator::new(
            spec(),
            InferredParamsSpec::new(["meal_breakfast"]),
            SimulatorOptions {
                infer_meal_params: true,
                meal_mode: MealPatchMode::ByName,
                ..SimulatorOptions::default()
            },
        );
        let tensor = sim.run(&ParameterMatrix::from_rows([[20.0], [80.0]]).unwrap()).unwrap();
        assert_eq!(tensor.shape(), [2, 37]);
        assert_eq!(sim.inferred().len(), 1);
    }

    #[test]
    fn invalid_runner_config_fails_before_building() {
        let options = SimulatorOptions {
            runner: BatchRunnerConfig {
                queue_capacity: 0,
                ..BatchRunnerConfig::default()
            },
            ..SimulatorOptions::default()
        };
        let err = run_simulation(
            &ParameterMatrix::without_params(1),
            &spec(),
            &InferredParamsSpec::default(),
            1,
            &options,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
