//! Insulin pump: clamps and quantizes controller requests.

use serde::{Deserialize, Serialize};

/// Catalog entry describing an insulin pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpSpec {
    /// Catalog name.
    pub name: String,
    /// Smallest deliverable bolus (U).
    pub min_bolus: f64,
    /// Largest deliverable bolus (U).
    pub max_bolus: f64,
    /// Bolus increment (U).
    pub inc_bolus: f64,
    /// Largest basal rate (U/h).
    pub max_basal: f64,
    /// Basal increment (U/h).
    pub inc_basal: f64,
}

/// Insulin pump instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsulinPump {
    /// Pump model.
    pub spec: PumpSpec,
}

impl InsulinPump {
    /// Creates a pump.
    #[must_use]
    pub const fn new(spec: PumpSpec) -> Self {
        Self { spec }
    }

    /// Deliverable bolus (U) for a requested amount.
    #[must_use]
    pub fn bolus(&self, requested: f64) -> f64 {
        if requested < self.spec.min_bolus {
            return 0.0;
        }
        quantize(requested.min(self.spec.max_bolus), self.spec.inc_bolus)
    }

    /// Deliverable basal rate (U/min) for a requested rate (U/min).
    #[must_use]
    pub fn basal(&self, requested_per_min: f64) -> f64 {
        let per_hour = (requested_per_min * 60.0).max(0.0).min(self.spec.max_basal);
        quantize(per_hour, self.spec.inc_basal) / 60.0
    }
}

fn quantize(value: f64, increment: f64) -> f64 {
    if increment > 0.0 {
        (value / increment).round() * increment
    } else {
        value
    }
}
