//! Basal-bolus controller.

use serde::{Deserialize, Serialize};

use super::patient::PatientParams;

/// Glucose level above which a correction bolus is added (mg/dL).
pub const CORRECTION_THRESHOLD: f64 = 150.0;

/// Therapy settings a clinician would program for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TherapyProfile {
    /// Carbohydrate ratio (g/U).
    pub carb_ratio: f64,
    /// Correction factor (mg/dL/U).
    pub correction_factor: f64,
}

/// Insulin requested for one control step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlAction {
    /// Basal rate (U/min).
    pub basal: f64,
    /// One-shot bolus (U).
    pub bolus: f64,
}

/// Open-loop basal-bolus controller.
///
/// Delivers the patient's steady-state basal and a meal bolus sized by the
/// carbohydrate ratio, with a correction when the CGM reads above
/// [`CORRECTION_THRESHOLD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasalBolusController {
    /// Patient therapy settings.
    pub therapy: TherapyProfile,
    /// Correction target (mg/dL).
    pub target: f64,
}

impl BasalBolusController {
    /// Creates a controller with the default 140 mg/dL target.
    #[must_use]
    pub const fn new(therapy: TherapyProfile) -> Self {
        Self {
            therapy,
            target: 140.0,
        }
    }

    /// Computes the action for the current reading and announced carbs (g).
    #[must_use]
    pub fn policy(&self, params: &PatientParams, cgm: f64, carbs: f64) -> ControlAction {
        let basal = params.basal_rate();
        let mut bolus = 0.0;
        if carbs > 0.0 {
            bolus = carbs / self.therapy.carb_ratio;
            if cgm > CORRECTION_THRESHOLD {
                bolus += (cgm - self.target) / self.therapy.correction_factor;
            }
        }
        ControlAction { basal, bolus }
    }
}
