//! Inferred parameter names and parameter matrices.
//!
//! A `ParameterMatrix` holds one candidate parameter set per row; its columns
//! are aligned by index with the names in `InferredParamsSpec`.

use serde::{Deserialize, Serialize};

use crate::error::DimensionError;

/// Marker that classifies a parameter as a meal parameter.
pub const MEAL_MARKER: &str = "meal";

/// Returns true if `name` denotes a meal (carbohydrate amount) parameter.
#[must_use]
pub fn is_meal_param(name: &str) -> bool {
    name.contains(MEAL_MARKER)
}

/// Checks that a flat row-major buffer of `len` values fills `rows x cols`.
pub(crate) fn check_buffer(rows: usize, cols: usize, len: usize) -> Result<(), DimensionError> {
    match rows.checked_mul(cols) {
        Some(expected) if expected == len => Ok(()),
        _ => Err(DimensionError::BufferLength {
            rows,
            cols,
            actual: len,
        }),
    }
}

/// Ordered names of the inferred parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredParamsSpec {
    /// Parameter names, index-aligned with every parameter vector.
    pub names: Vec<String>,
}

impl InferredParamsSpec {
    /// Creates a spec from parameter names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of inferred parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no parameters are inferred.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of meal parameters.
    #[must_use]
    pub fn meal_count(&self) -> usize {
        self.names.iter().filter(|n| is_meal_param(n)).count()
    }

    /// Checks that a vector is index-aligned with these names.
    pub fn check_vector(&self, vector: &[f64]) -> Result<(), DimensionError> {
        if vector.len() == self.names.len() {
            Ok(())
        } else {
            Err(DimensionError::ParameterCount {
                expected: self.names.len(),
                actual: vector.len(),
            })
        }
    }
}

/// Row-major matrix of candidate parameter sets (`rows x cols`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ParameterMatrix {
    /// Builds a matrix from rows. All rows must have the same length.
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Result<Self, DimensionError>
    where
        R: AsRef<[f64]>,
    {
        let mut data = Vec::new();
        let mut cols = None;
        let mut count = 0usize;
        for (row, values) in rows.into_iter().enumerate() {
            let values = values.as_ref();
            match cols {
                None => cols = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(DimensionError::RaggedMatrix {
                        row,
                        expected,
                        actual: values.len(),
                    });
                }
                Some(_) => {}
            }
            data.extend_from_slice(values);
            count += 1;
        }
        Ok(Self {
            rows: count,
            cols: cols.unwrap_or(0),
            data,
        })
    }

    /// Builds a matrix from a flat row-major buffer.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, DimensionError> {
        check_buffer(rows, cols, data.len())?;
        Ok(Self { rows, cols, data })
    }

    /// A matrix with `rows` rows and no columns (nothing inferred).
    #[must_use]
    pub fn without_params(rows: usize) -> Self {
        Self {
            rows,
            cols: 0,
            data: Vec::new(),
        }
    }

    /// Number of rows (parameter sets).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (parameters per set).
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns true if the matrix has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Returns row `index`, if in range.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        (index < self.rows).then(|| &self.data[index * self.cols..(index + 1) * self.cols])
    }

    /// Iterates rows in order.
    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }
}
