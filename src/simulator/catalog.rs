//! Named catalog of patients, sensors and pumps.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::error::ConfigurationError;

use super::controller::TherapyProfile;
use super::patient::PatientParams;
use super::pump::PumpSpec;
use super::sensor::SensorSpec;

/// A catalog patient: physiology plus therapy settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatientProfile {
    /// Physiological parameters.
    pub params: PatientParams,
    /// Therapy settings for the controller.
    pub therapy: TherapyProfile,
}

/// Lookup tables for the simulator's named models.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    patients: BTreeMap<String, PatientProfile>,
    sensors: BTreeMap<String, SensorSpec>,
    pumps: BTreeMap<String, PumpSpec>,
}

static BUILTIN: OnceLock<Arc<Catalog>> = OnceLock::new();

impl Catalog {
    /// An empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in reference catalog.
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(build_builtin())))
    }

    /// Registers (or replaces) a patient.
    #[must_use]
    pub fn with_patient(mut self, name: impl Into<String>, profile: PatientProfile) -> Self {
        self.patients.insert(name.into(), profile);
        self
    }

    /// Registers (or replaces) a sensor under its own name.
    ///
    /// Rejects specs that cannot produce readings (see [`SensorSpec::validate`]).
    pub fn with_sensor(mut self, spec: SensorSpec) -> Result<Self, ConfigurationError> {
        spec.validate()?;
        self.sensors.insert(spec.name.clone(), spec);
        Ok(self)
    }

    /// Registers (or replaces) a pump under its own name.
    #[must_use]
    pub fn with_pump(mut self, spec: PumpSpec) -> Self {
        self.pumps.insert(spec.name.clone(), spec);
        self
    }

    /// Looks up a patient by name.
    pub fn patient(&self, name: &str) -> Result<&PatientProfile, ConfigurationError> {
        self.patients
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownPatient {
                name: name.to_string(),
            })
    }

    /// Looks up a sensor by name.
    pub fn sensor(&self, name: &str) -> Result<&SensorSpec, ConfigurationError> {
        self.sensors
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownSensor {
                name: name.to_string(),
            })
    }

    /// Looks up a pump by name.
    pub fn pump(&self, name: &str) -> Result<&PumpSpec, ConfigurationError> {
        self.pumps
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownPump {
                name: name.to_string(),
            })
    }

    /// Patient names, sorted.
    pub fn patient_names(&self) -> impl Iterator<Item = &str> {
        self.patients.keys().map(String::as_str)
    }
}

// (name, BW, Gb, u2ss, p3, CR, CF)
const PATIENTS: [(&str, f64, f64, f64, f64, f64, f64); 9] = [
    ("adolescent#001", 68.7, 149.0, 1.22, 2.2e-6, 12.0, 15.0),
    ("adolescent#002", 51.0, 149.0, 1.35, 1.8e-6, 6.0, 36.0),
    ("adolescent#003", 44.8, 149.0, 1.42, 2.6e-6, 17.0, 39.0),
    ("adult#001", 102.3, 138.6, 1.21, 1.6e-6, 10.0, 8.8),
    ("adult#002", 111.1, 130.0, 1.58, 1.4e-6, 8.0, 9.2),
    ("adult#003", 81.6, 138.1, 1.67, 2.0e-6, 9.0, 17.9),
    ("child#001", 34.6, 149.0, 1.14, 3.2e-6, 28.6, 103.0),
    ("child#002", 28.5, 149.0, 1.08, 3.6e-6, 27.0, 116.0),
    ("child#003", 41.2, 149.0, 1.26, 3.0e-6, 22.0, 91.0),
];

fn build_builtin() -> Catalog {
    let mut catalog = Catalog::empty();
    for (name, bw, gb, u2ss, p3, cr, cf) in PATIENTS {
        catalog = catalog.with_patient(
            name,
            PatientProfile {
                params: PatientParams {
                    BW: bw,
                    Gb: gb,
                    u2ss,
                    p1: 0.028,
                    p2: 0.025,
                    p3,
                    Vg: 1.7,
                    Vi: 120.0,
                    n: 0.14,
                    kd: 0.02,
                    kabs: 0.05,
                    f: 0.9,
                },
                therapy: TherapyProfile {
                    carb_ratio: cr,
                    correction_factor: cf,
                },
            },
        );
    }

    // (name, sample_time, min, max, noise_sd, pacf)
    for (name, sample_time, min, max, noise_sd, pacf) in [
        ("Dexcom", 3, 39.0, 400.0, 5.0, 0.7),
        ("GuardianRT", 5, 40.0, 400.0, 6.0, 0.7),
        ("Navigator", 1, 20.0, 500.0, 4.0, 0.7),
    ] {
        catalog.sensors.insert(
            name.to_string(),
            SensorSpec {
                name: name.to_string(),
                sample_time,
                min,
                max,
                noise_sd,
                pacf,
            },
        );
    }

    // (name, min_bolus, max_bolus, inc_bolus, max_basal, inc_basal)
    for (name, min_bolus, max_bolus, inc_bolus, max_basal, inc_basal) in [
        ("Cozmo", 0.05, 75.0, 0.05, 35.0, 0.05),
        ("Insulet", 0.05, 30.0, 0.05, 30.0, 0.05),
    ] {
        catalog = catalog.with_pump(PumpSpec {
            name: name.to_string(),
            min_bolus,
            max_bolus,
            inc_bolus,
            max_basal,
            inc_basal,
        });
    }

    catalog
}
