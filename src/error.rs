//! Error types for glucose-sbi-sim.
//!
//! All errors are strongly typed using thiserror, split by concern:
//! configuration problems and dimension mismatches are detected while
//! environments are built, simulation failures while they run.

use thiserror::Error;

/// Errors caused by names that do not resolve or by invalid settings.
///
/// These are raised at build time, before any simulation runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Unknown patient: '{name}'")]
    UnknownPatient {
        name: String,
    },

    #[error("Unknown sensor: '{name}'")]
    UnknownSensor {
        name: String,
    },

    #[error("Unknown pump: '{name}'")]
    UnknownPump {
        name: String,
    },

    #[error("Unknown patient parameter: '{name}'")]
    UnknownParameter {
        name: String,
    },

    #[error("Meal parameter '{param}' does not name a scenario meal")]
    UnknownMeal {
        param: String,
    },

    #[error("Meal parameter '{param}' matches more than one scenario meal")]
    AmbiguousMeal {
        param: String,
    },

    #[error("Invalid runner configuration: {reason}")]
    InvalidRunnerConfig {
        reason: String,
    },

    #[error("Simulation horizon of {hours} hours is out of range (max {max})")]
    InvalidHorizon {
        hours: u32,
        max: u32,
    },

    #[error("Invalid sensor '{name}': {reason}")]
    InvalidSensor {
        name: String,
        reason: String,
    },
}

/// Shape mismatches between parameter vectors, names, scenarios and results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("Parameter vector has {actual} values, expected {expected} (one per inferred parameter)")]
    ParameterCount {
        expected: usize,
        actual: usize,
    },

    #[error("Got {actual} meal values for a scenario with {expected} meals")]
    MealCount {
        expected: usize,
        actual: usize,
    },

    #[error("Parameter matrix row {row} has {actual} columns, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Buffer of {actual} values does not fill a {rows} x {cols} shape")]
    BufferLength {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("Run {run} produced {actual} samples, expected {expected}")]
    RaggedSeries {
        run: usize,
        expected: usize,
        actual: usize,
    },
}

/// Failures raised while a simulation executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationFailure {
    #[error("Invalid patient parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("Patient state became non-finite at minute {minute}")]
    NonFiniteState {
        minute: u32,
    },

    #[error("Simulation run {index} failed: {source}")]
    Run {
        index: usize,
        #[source]
        source: Box<SimulationFailure>,
    },

    #[error("Simulation run {index} panicked: {message}")]
    Panicked {
        index: usize,
        message: String,
    },

    #[error("Worker pool disconnected with {pending} runs outstanding")]
    Disconnected {
        pending: usize,
    },

    #[error("Simulation run {index} produced no results")]
    MissingResults {
        index: usize,
    },
}

impl SimulationFailure {
    /// Attaches the batch index of the failing run.
    #[must_use]
    pub fn in_run(self, index: usize) -> Self {
        match self {
            // Already carries an index.
            Self::Run { .. } | Self::Panicked { .. } | Self::MissingResults { .. } => self,
            other => Self::Run {
                index,
                source: Box::new(other),
            },
        }
    }

    /// Returns the index of the failing run, if known.
    #[must_use]
    pub const fn run_index(&self) -> Option<usize> {
        match self {
            Self::Run { index, .. } | Self::Panicked { index, .. } | Self::MissingResults { index } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Top-level error type for glucose-sbi-sim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GlucoseError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Dimension error: {0}")]
    Dimension(#[from] DimensionError),

    #[error("Simulation failure: {0}")]
    Simulation(#[from] SimulationFailure),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl GlucoseError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a dimension error.
    #[must_use]
    pub const fn is_dimension(&self) -> bool {
        matches!(self, Self::Dimension(_))
    }

    /// Returns true if this is a simulation failure.
    #[must_use]
    pub const fn is_simulation(&self) -> bool {
        matches!(self, Self::Simulation(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for glucose-sbi-sim operations.
pub type GlucoseResult<T> = Result<T, GlucoseError>;
