//! Final conversion of a result batch into the caller's numeric representation.

use serde::{Deserialize, Serialize};

use crate::error::DimensionError;
use crate::params::check_buffer;

/// Element type of the output tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit floats.
    #[default]
    F32,
    /// 64-bit floats.
    F64,
}

/// Memory placement of the output tensor.
///
/// Accelerator placement belongs to the downstream inference stack; this
/// crate hands over host memory.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Host memory.
    #[default]
    Cpu,
}

/// Requested output representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Element type.
    pub dtype: DType,
    /// Placement.
    pub device: Device,
}

impl OutputSpec {
    /// 64-bit output on the host.
    #[must_use]
    pub const fn f64() -> Self {
        Self {
            dtype: DType::F64,
            device: Device::Cpu,
        }
    }
}

/// Typed storage of a [`Tensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// 32-bit elements.
    F32(Vec<f32>),
    /// 64-bit elements.
    F64(Vec<f64>),
}

/// Row-major 2D tensor of simulation output (`runs x samples`).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: [usize; 2],
    data: TensorData,
    device: Device,
}

impl Tensor {
    /// Converts row-major `f64` data into the requested representation.
    ///
    /// `data` must hold exactly `shape[0] * shape[1]` values.
    pub fn from_f64(shape: [usize; 2], data: Vec<f64>, spec: OutputSpec) -> Result<Self, DimensionError> {
        check_buffer(shape[0], shape[1], data.len())?;
        let data = match spec.dtype {
            // Narrowing is the point of an f32 output.
            #[allow(clippy::cast_possible_truncation)]
            DType::F32 => TensorData::F32(data.into_iter().map(|v| v as f32).collect()),
            DType::F64 => TensorData::F64(data),
        };
        Ok(Self {
            shape,
            data,
            device: spec.device,
        })
    }

    /// Shape as `[runs, samples]`.
    #[must_use]
    pub const fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self.data {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
        }
    }

    /// Placement.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Typed storage.
    #[must_use]
    pub const fn data(&self) -> &TensorData {
        &self.data
    }

    /// Number of runs (rows).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Returns true if the tensor holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.shape[0] == 0 || self.shape[1] == 0
    }

    /// Row `index`, widened to `f64`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.shape[0] {
            return None;
        }
        let cols = self.shape[1];
        let range = index * cols..(index + 1) * cols;
        match &self.data {
            TensorData::F32(v) => Some(v.get(range)?.iter().copied().map(f64::from).collect()),
            TensorData::F64(v) => v.get(range).map(<[f64]>::to_vec),
        }
    }

    /// All elements widened to `f64`, row-major.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::F32(v) => v.iter().copied().map(f64::from).collect(),
            TensorData::F64(v) => v.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_is_f32_on_cpu() {
        let t = Tensor::from_f64([2, 2], vec![1.0, 2.0, 3.0, 4.0], OutputSpec::default()).unwrap();
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.device(), Device::Cpu);
        assert_eq!(t.data(), &TensorData::F32(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(t.row(1), Some(vec![3.0, 4.0]));
        assert_eq!(t.row(2), None);
    }

    #[test]
    fn f64_output_keeps_precision() {
        let v = 0.1 + 0.2;
        let t = Tensor::from_f64([1, 1], vec![v], OutputSpec::f64()).unwrap();
        assert_eq!(t.to_f64_vec(), vec![v]);
        assert_eq!(t.dtype(), DType::F64);
    }

    #[test]
    fn empty_tensor() {
        let t = Tensor::from_f64([0, 0], Vec::new(), OutputSpec::default()).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.rows(), 0);
        assert!(t.to_f64_vec().is_empty());
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = Tensor::from_f64([2, 3], vec![1.0], OutputSpec::default()).unwrap_err();
        assert_eq!(
            err,
            DimensionError::BufferLength {
                rows: 2,
                cols: 3,
                actual: 1
            }
        );
        assert!(Tensor::from_f64([usize::MAX, 2], Vec::new(), OutputSpec::f64()).is_err());
    }
}
