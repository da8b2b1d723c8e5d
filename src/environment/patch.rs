//! Applies one parameter vector to a simulation environment.
//!
//! Parameters whose name contains `"meal"` replace carbohydrate amounts in the
//! scenario; every other parameter is written to the patient record by name.
//! The whole patch is validated before the environment is touched, so a
//! failed patch never leaves a half-patched environment behind.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DimensionError, GlucoseResult};
use crate::params::{is_meal_param, InferredParamsSpec, MEAL_MARKER};
use crate::simulator::{Meal, PatientParams, SimulationEnvironment};

/// How meal parameters are matched to scenario entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealPatchMode {
    /// The i-th meal parameter replaces the i-th scenario entry. Names are
    /// ignored; the caller keeps both lists aligned.
    #[default]
    Positional,
    /// Each meal parameter replaces the entry it names (`meal_lunch` patches
    /// `lunch`). Falls back to positional when no parameter names a meal.
    ByName,
}

/// Patch behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOptions {
    /// Apply meal parameters to the scenario. When false they are ignored.
    pub infer_meal_params: bool,
    /// Meal matching strategy.
    pub meal_mode: MealPatchMode,
}

impl PatchOptions {
    /// Options that patch meals positionally.
    #[must_use]
    pub const fn with_meals() -> Self {
        Self {
            infer_meal_params: true,
            meal_mode: MealPatchMode::Positional,
        }
    }
}

/// One parameter vector split into meal and patient values, order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPlan<'a> {
    meal: Vec<(&'a str, f64)>,
    patient: Vec<(&'a str, f64)>,
}

impl<'a> PatchPlan<'a> {
    /// Partitions `vector` by the meal/non-meal classification of `spec.names`.
    pub fn partition(spec: &'a InferredParamsSpec, vector: &[f64]) -> Result<Self, DimensionError> {
        spec.check_vector(vector)?;
        let (meal, patient): (Vec<_>, Vec<_>) = spec
            .names
            .iter()
            .zip(vector)
            .map(|(name, value)| (name.as_str(), *value))
            .partition(|(name, _)| is_meal_param(name));
        Ok(Self { meal, patient })
    }

    /// Meal parameters, in input order.
    #[must_use]
    pub fn meal(&self) -> &[(&'a str, f64)] {
        &self.meal
    }

    /// Patient parameters, in input order.
    #[must_use]
    pub fn patient(&self) -> &[(&'a str, f64)] {
        &self.patient
    }

    /// Scenario index for each meal value.
    fn meal_targets(&self, meals: &[Meal], mode: MealPatchMode) -> GlucoseResult<Vec<usize>> {
        if mode == MealPatchMode::ByName {
            if let Some(targets) = self.named_targets(meals)? {
                return Ok(targets);
            }
        }
        if self.meal.len() != meals.len() {
            return Err(DimensionError::MealCount {
                expected: meals.len(),
                actual: self.meal.len(),
            }
            .into());
        }
        Ok((0..meals.len()).collect())
    }

    /// Resolves meal parameters by name. `None` when no parameter names a meal.
    fn named_targets(&self, meals: &[Meal]) -> GlucoseResult<Option<Vec<usize>>> {
        let matches: Vec<(&str, Vec<usize>)> = self
            .meal
            .iter()
            .map(|(param, _)| {
                let key = meal_key(param);
                let hits = meals
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| !key.is_empty() && m.name.eq_ignore_ascii_case(&key))
                    .map(|(i, _)| i)
                    .collect();
                (*param, hits)
            })
            .collect();

        if matches.iter().all(|(_, hits)| hits.is_empty()) {
            return Ok(None);
        }

        let mut targets = Vec::with_capacity(matches.len());
        for (param, hits) in matches {
            match hits.as_slice() {
                [] => {
                    return Err(ConfigurationError::UnknownMeal {
                        param: param.to_string(),
                    }
                    .into())
                }
                [index] if !targets.contains(index) => targets.push(*index),
                _ => {
                    return Err(ConfigurationError::AmbiguousMeal {
                        param: param.to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(Some(targets))
    }
}

/// Reduces a meal parameter name to the meal it names: `meal_lunch` -> `lunch`.
fn meal_key(param: &str) -> String {
    param
        .replacen(MEAL_MARKER, "", 1)
        .trim_matches(|c: char| matches!(c, '_' | '-' | ':' | '.'))
        .to_ascii_lowercase()
}

/// Applies one parameter vector to `env` in place.
///
/// Fails with [`DimensionError`] when the vector or meal counts do not line up
/// and with [`ConfigurationError`] on unknown patient parameters or meal
/// names. Nothing is modified unless the whole patch is valid.
pub fn apply(
    env: &mut SimulationEnvironment,
    vector: &[f64],
    spec: &InferredParamsSpec,
    options: PatchOptions,
) -> GlucoseResult<()> {
    let plan = PatchPlan::partition(spec, vector)?;

    let meal_targets = if options.infer_meal_params && !plan.meal.is_empty() {
        Some(plan.meal_targets(&env.scenario.meals, options.meal_mode)?)
    } else {
        None
    };

    if let Some((name, _)) = plan.patient.iter().find(|(name, _)| !PatientParams::has(name)) {
        return Err(ConfigurationError::UnknownParameter {
            name: (*name).to_string(),
        }
        .into());
    }

    if let Some(targets) = meal_targets {
        for (target, (_, value)) in targets.into_iter().zip(&plan.meal) {
            env.scenario.meals[target].carbs = *value;
        }
    }
    for (name, value) in &plan.patient {
        env.patient.params.set(name, *value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{build_default, DefaultEnvironmentSpec};
    use crate::error::GlucoseError;

    fn env_with(meals: &[(&str, f64, f64)]) -> SimulationEnvironment {
        let mut spec = DefaultEnvironmentSpec::new("adolescent#001", "Dexcom", "Insulet");
        for (name, hour, carbs) in meals {
            spec = spec.with_meal(*name, *hour, *carbs);
        }
        build_default(&spec, 24).unwrap()
    }

    fn carbs(env: &SimulationEnvironment) -> Vec<(String, f64)> {
        env.scenario
            .meals
            .iter()
            .map(|m| (m.name.clone(), m.carbs))
            .collect()
    }

    #[test]
    fn partition_preserves_relative_order() {
        let spec = InferredParamsSpec::new(["meal_2", "BW", "meal_1", "kabs"]);
        let plan = PatchPlan::partition(&spec, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(plan.meal(), &[("meal_2", 1.0), ("meal_1", 3.0)]);
        assert_eq!(plan.patient(), &[("BW", 2.0), ("kabs", 4.0)]);
    }

    #[test]
    fn patches_patient_and_meal_positionally() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0)]);
        let spec = InferredParamsSpec::new(["BW", "meal_1"]);
        apply(&mut env, &[70.0, 60.0], &spec, PatchOptions::with_meals()).unwrap();
        assert_eq!(env.patient.params.BW, 70.0);
        assert_eq!(carbs(&env), vec![("breakfast".to_string(), 60.0)]);
        // Meal time is untouched.
        assert_eq!(env.scenario.meals[0].hour, 7.0);
    }

    #[test]
    fn positional_mode_ignores_meal_names() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0), ("lunch", 12.0, 60.0)]);
        let spec = InferredParamsSpec::new(["meal_lunch", "meal_breakfast"]);
        apply(&mut env, &[10.0, 20.0], &spec, PatchOptions::with_meals()).unwrap();
        assert_eq!(
            carbs(&env),
            vec![("breakfast".to_string(), 10.0), ("lunch".to_string(), 20.0)]
        );
    }

    #[test]
    fn by_name_mode_matches_meal_names() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0), ("lunch", 12.0, 60.0)]);
        let spec = InferredParamsSpec::new(["meal_lunch", "meal_Breakfast"]);
        let options = PatchOptions {
            infer_meal_params: true,
            meal_mode: MealPatchMode::ByName,
        };
        apply(&mut env, &[10.0, 20.0], &spec, options).unwrap();
        assert_eq!(
            carbs(&env),
            vec![("breakfast".to_string(), 20.0), ("lunch".to_string(), 10.0)]
        );
    }

    #[test]
    fn by_name_mode_falls_back_to_positional() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0), ("lunch", 12.0, 60.0)]);
        let spec = InferredParamsSpec::new(["meal_1", "meal_2"]);
        let options = PatchOptions {
            infer_meal_params: true,
            meal_mode: MealPatchMode::ByName,
        };
        apply(&mut env, &[11.0, 22.0], &spec, options).unwrap();
        assert_eq!(
            carbs(&env),
            vec![("breakfast".to_string(), 11.0), ("lunch".to_string(), 22.0)]
        );
    }

    #[test]
    fn by_name_mode_rejects_partial_and_ambiguous_matches() {
        let options = PatchOptions {
            infer_meal_params: true,
            meal_mode: MealPatchMode::ByName,
        };

        let mut env = env_with(&[("breakfast", 7.0, 40.0), ("lunch", 12.0, 60.0)]);
        let spec = InferredParamsSpec::new(["meal_lunch", "meal_dinner"]);
        let err = apply(&mut env, &[1.0, 2.0], &spec, options).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(env, env_with(&[("breakfast", 7.0, 40.0), ("lunch", 12.0, 60.0)]));

        let mut env = env_with(&[("snack", 10.0, 15.0), ("snack", 15.0, 15.0)]);
        let spec = InferredParamsSpec::new(["meal_snack"]);
        let err = apply(&mut env, &[5.0], &spec, options).unwrap_err();
        assert!(matches!(
            err,
            GlucoseError::Configuration(ConfigurationError::AmbiguousMeal { .. })
        ));
    }

    #[test]
    fn meal_params_are_ignored_unless_inferred() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0)]);
        let spec = InferredParamsSpec::new(["Gb", "meal_1"]);
        apply(&mut env, &[120.0, 99.0], &spec, PatchOptions::default()).unwrap();
        assert_eq!(env.patient.params.Gb, 120.0);
        assert_eq!(carbs(&env), vec![("breakfast".to_string(), 40.0)]);
    }

    #[test]
    fn patient_only_patch_leaves_scenario_alone() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0)]);
        let before = env.scenario.clone();
        let spec = InferredParamsSpec::new(["BW", "p3"]);
        apply(&mut env, &[55.0, 3.0e-6], &spec, PatchOptions::with_meals()).unwrap();
        assert_eq!(env.scenario, before);
        assert_eq!(env.patient.params.p3, 3.0e-6);
    }

    #[test]
    fn meal_only_patch_leaves_patient_alone() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0)]);
        let before = env.patient.clone();
        let spec = InferredParamsSpec::new(["meal_1"]);
        apply(&mut env, &[75.0], &spec, PatchOptions::with_meals()).unwrap();
        assert_eq!(env.patient, before);
        assert_eq!(env.scenario.meals[0].carbs, 75.0);
    }

    #[test]
    fn unknown_parameter_fails_without_mutation() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0)]);
        let pristine = env.clone();
        let spec = InferredParamsSpec::new(["meal_1", "BW", "insulin_sensitivity"]);
        let err = apply(&mut env, &[60.0, 80.0, 1.0], &spec, PatchOptions::with_meals()).unwrap_err();
        assert_eq!(
            err,
            GlucoseError::from(ConfigurationError::UnknownParameter {
                name: "insulin_sensitivity".to_string()
            })
        );
        assert_eq!(env, pristine);
    }

    #[test]
    fn meal_count_mismatch_fails_without_mutation() {
        let mut env = env_with(&[("breakfast", 7.0, 40.0), ("lunch", 12.0, 60.0)]);
        let pristine = env.clone();
        let spec = InferredParamsSpec::new(["BW", "meal_1"]);
        let err = apply(&mut env, &[80.0, 50.0], &spec, PatchOptions::with_meals()).unwrap_err();
        assert_eq!(
            err,
            GlucoseError::from(DimensionError::MealCount {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(env, pristine);
    }

    #[test]
    fn vector_length_mismatch_is_dimension_error() {
        let mut env = env_with(&[]);
        let spec = InferredParamsSpec::new(["BW", "Gb"]);
        let err = apply(&mut env, &[80.0], &spec, PatchOptions::default()).unwrap_err();
        assert!(err.is_dimension());
    }

    #[test]
    fn meal_key_strips_marker_and_separators() {
        assert_eq!(meal_key("meal_lunch"), "lunch");
        assert_eq!(meal_key("dinner-meal"), "dinner");
        assert_eq!(meal_key("meal:Snack"), "snack");
        assert_eq!(meal_key("meal"), "");
    }
}
