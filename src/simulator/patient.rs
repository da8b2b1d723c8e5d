//! Virtual patient: named parameter record plus a minimal glucose/insulin/gut model.
//!
//! The model is a Bergman-style minimal model with a one-compartment gut:
//!
//! ```text
//! Q' = -kabs * Q + cho                      gut carbohydrate (mg)
//! Ra = f * kabs * Q / (Vg * BW)             rate of appearance (mg/dL/min)
//! G' = -(p1 + X) * G + p1 * Gb + Ra         plasma glucose (mg/dL)
//! X' = -p2 * X + p3 * (I - Ib)              remote insulin action (1/min)
//! S' = -kd * S + u                          subcutaneous insulin (U)
//! I' = -n * I + kd * S * 1e6 / (Vi * BW)    plasma insulin (uU/mL)
//! ```
//!
//! `Ib` is the steady-state insulin for the basal rate `u2ss * BW / 6000` U/min,
//! so an unperturbed patient stays at `Gb`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, SimulationFailure};

/// Names of all fields on [`PatientParams`], in declaration order.
pub const PARAM_NAMES: [&str; 12] = [
    "BW", "Gb", "u2ss", "p1", "p2", "p3", "Vg", "Vi", "n", "kd", "kabs", "f",
];

/// Physiological parameter record of a virtual patient.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientParams {
    /// Body weight (kg).
    pub BW: f64,
    /// Basal plasma glucose (mg/dL).
    pub Gb: f64,
    /// Steady-state basal insulin infusion (pmol/kg/min).
    pub u2ss: f64,
    /// Glucose effectiveness (1/min).
    pub p1: f64,
    /// Decay rate of remote insulin action (1/min).
    pub p2: f64,
    /// Insulin sensitivity gain (mL/uU/min^2).
    pub p3: f64,
    /// Glucose distribution volume (dL/kg).
    pub Vg: f64,
    /// Insulin distribution volume (mL/kg).
    pub Vi: f64,
    /// Plasma insulin clearance (1/min).
    pub n: f64,
    /// Subcutaneous insulin absorption rate (1/min).
    pub kd: f64,
    /// Gut absorption rate (1/min).
    pub kabs: f64,
    /// Fraction of ingested carbohydrate that appears in plasma.
    pub f: f64,
}

impl PatientParams {
    /// Reads a parameter by name.
    pub fn get(&self, name: &str) -> Result<f64, ConfigurationError> {
        let value = match name {
            "BW" => self.BW,
            "Gb" => self.Gb,
            "u2ss" => self.u2ss,
            "p1" => self.p1,
            "p2" => self.p2,
            "p3" => self.p3,
            "Vg" => self.Vg,
            "Vi" => self.Vi,
            "n" => self.n,
            "kd" => self.kd,
            "kabs" => self.kabs,
            "f" => self.f,
            _ => return Err(unknown(name)),
        };
        Ok(value)
    }

    /// Sets a parameter by name.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ConfigurationError> {
        let slot = match name {
            "BW" => &mut self.BW,
            "Gb" => &mut self.Gb,
            "u2ss" => &mut self.u2ss,
            "p1" => &mut self.p1,
            "p2" => &mut self.p2,
            "p3" => &mut self.p3,
            "Vg" => &mut self.Vg,
            "Vi" => &mut self.Vi,
            "n" => &mut self.n,
            "kd" => &mut self.kd,
            "kabs" => &mut self.kabs,
            "f" => &mut self.f,
            _ => return Err(unknown(name)),
        };
        *slot = value;
        Ok(())
    }

    /// Returns true if `name` is a field of this record.
    #[must_use]
    pub fn has(name: &str) -> bool {
        PARAM_NAMES.contains(&name)
    }

    /// Basal insulin rate (U/min).
    #[must_use]
    pub fn basal_rate(&self) -> f64 {
        self.u2ss * self.BW / 6000.0
    }

    /// Steady-state plasma insulin for the basal rate (uU/mL).
    #[must_use]
    pub fn basal_insulin(&self) -> f64 {
        self.basal_rate() * 1e6 / (self.Vi * self.BW * self.n)
    }

    /// Checks that the record can be integrated.
    pub fn validate(&self) -> Result<(), SimulationFailure> {
        for name in PARAM_NAMES {
            // Every name in PARAM_NAMES is readable.
            let value = self.get(name).unwrap_or(f64::NAN);
            if !value.is_finite() {
                return Err(invalid(name, value, "must be finite"));
            }
        }
        for (name, value) in [("BW", self.BW), ("Vg", self.Vg), ("Vi", self.Vi), ("n", self.n), ("kd", self.kd)] {
            if value <= 0.0 {
                return Err(invalid(name, value, "must be > 0"));
            }
        }
        for (name, value) in [("kabs", self.kabs), ("u2ss", self.u2ss), ("Gb", self.Gb)] {
            if value < 0.0 {
                return Err(invalid(name, value, "must be >= 0"));
            }
        }
        Ok(())
    }
}

fn unknown(name: &str) -> ConfigurationError {
    ConfigurationError::UnknownParameter {
        name: name.to_string(),
    }
}

fn invalid(name: &str, value: f64, reason: &str) -> SimulationFailure {
    SimulationFailure::InvalidParameter {
        name: name.to_string(),
        value,
        reason: reason.to_string(),
    }
}

/// Integrator state of the minimal model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientState {
    /// Carbohydrate in the gut (mg).
    pub gut: f64,
    /// Plasma glucose (mg/dL).
    pub glucose: f64,
    /// Remote insulin action (1/min).
    pub action: f64,
    /// Subcutaneous insulin depot (U).
    pub depot: f64,
    /// Plasma insulin (uU/mL).
    pub insulin: f64,
}

impl PatientState {
    /// Steady state for the given parameters.
    #[must_use]
    pub fn basal(params: &PatientParams) -> Self {
        Self {
            gut: 0.0,
            glucose: params.Gb,
            action: 0.0,
            depot: params.basal_rate() / params.kd,
            insulin: params.basal_insulin(),
        }
    }
}

/// A named virtual patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Catalog name.
    pub name: String,
    /// Parameter record; patched in place before a run.
    pub params: PatientParams,
    state: PatientState,
}

impl Patient {
    /// Creates a patient at its basal steady state.
    #[must_use]
    pub fn new(name: impl Into<String>, params: PatientParams) -> Self {
        Self {
            name: name.into(),
            state: PatientState::basal(&params),
            params,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &PatientState {
        &self.state
    }

    /// Current plasma glucose (mg/dL).
    #[must_use]
    pub const fn glucose(&self) -> f64 {
        self.state.glucose
    }

    /// Validates the parameters and resets to the basal steady state.
    ///
    /// Called at the start of every run so patched parameters take effect.
    pub fn reset(&mut self) -> Result<(), SimulationFailure> {
        self.params.validate()?;
        self.state = PatientState::basal(&self.params);
        Ok(())
    }

    /// Advances the model by one minute (explicit Euler).
    ///
    /// `cho` is carbohydrate ingested this minute (g), `insulin` is insulin
    /// delivered this minute (U).
    pub fn step(&mut self, minute: u32, cho: f64, insulin: f64) -> Result<(), SimulationFailure> {
        let p = &self.params;
        let s = self.state;
        let ib = p.basal_insulin();

        let ra = p.f * p.kabs * s.gut / (p.Vg * p.BW);
        let next = PatientState {
            gut: s.gut + (-p.kabs * s.gut) + cho * 1000.0,
            glucose: s.glucose + (-(p.p1 + s.action) * s.glucose + p.p1 * p.Gb + ra),
            action: s.action + (-p.p2 * s.action + p.p3 * (s.insulin - ib)),
            depot: s.depot + (-p.kd * s.depot) + insulin,
            insulin: s.insulin + (-p.n * s.insulin) + p.kd * s.depot * 1e6 / (p.Vi * p.BW),
        };

        // Checked before clamping: f64::max would swallow a NaN.
        if !(next.gut.is_finite()
            && next.glucose.is_finite()
            && next.action.is_finite()
            && next.depot.is_finite()
            && next.insulin.is_finite())
        {
            return Err(SimulationFailure::NonFiniteState { minute });
        }
        self.state = PatientState {
            glucose: next.glucose.max(0.0),
            depot: next.depot.max(0.0),
            insulin: next.insulin.max(0.0),
            ..next
        };
        Ok(())
    }
}
