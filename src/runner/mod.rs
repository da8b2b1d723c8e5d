//! Batch execution of simulation environments.
//!
//! [`BatchRunner`] takes ownership of a batch of [`Runnable`] units, runs them
//! to completion and stacks their CGM series into a [`ResultBatch`] whose row
//! `i` belongs to input unit `i`. Parallel batches run on a scoped worker pool
//! that exists only for the duration of one call.

mod pool;
pub mod tensor;

pub use tensor::{DType, Device, OutputSpec, Tensor, TensorData};

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, DimensionError, GlucoseResult, SimulationFailure};
use crate::simulator::Runnable;

use pool::{execute, WorkerPool};

/// How a batch is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Worker pool sized to the host.
    #[default]
    Parallel,
    /// One run after another on the calling thread.
    Sequential,
}

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRunnerConfig {
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Worker threads; `0` uses the host's logical CPU count.
    pub workers: usize,
    /// Maximum queued jobs.
    pub queue_capacity: usize,
}

impl Default for BatchRunnerConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            workers: 0,
            queue_capacity: 64,
        }
    }
}

impl BatchRunnerConfig {
    /// Sequential configuration.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            ..Self::default()
        }
    }

    /// Parallel configuration with a fixed worker count.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.queue_capacity == 0 {
            return Err(ConfigurationError::InvalidRunnerConfig {
                reason: "queue_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Worker count for a batch of `batch` runs, never more than the batch.
    #[must_use]
    pub fn effective_workers(&self, batch: usize) -> usize {
        let requested = if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        };
        requested.min(batch).max(1)
    }
}

/// Stacked CGM series of one batch, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBatch {
    n_runs: usize,
    n_samples: usize,
    data: Vec<f64>,
    elapsed: Duration,
}

impl ResultBatch {
    /// A batch with no runs.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            n_runs: 0,
            n_samples: 0,
            data: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Stacks per-run series. Every series must have the same length.
    pub fn from_series(series: Vec<Vec<f64>>, elapsed: Duration) -> Result<Self, DimensionError> {
        let n_runs = series.len();
        let n_samples = series.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_runs * n_samples);
        for (run, row) in series.into_iter().enumerate() {
            if row.len() != n_samples {
                return Err(DimensionError::RaggedSeries {
                    run,
                    expected: n_samples,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            n_runs,
            n_samples,
            data,
            elapsed,
        })
    }

    /// `(runs, samples)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.n_runs, self.n_samples)
    }

    /// Returns true if the batch holds no runs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n_runs == 0
    }

    /// Series of run `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.n_runs {
            return None;
        }
        let start = index * self.n_samples;
        self.data.get(start..start + self.n_samples)
    }

    /// Iterates the series in input order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_runs).filter_map(move |i| self.row(i))
    }

    /// Wall-clock time spent running the batch.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Converts into the requested output representation.
    pub fn into_tensor(self, output: OutputSpec) -> Result<Tensor, DimensionError> {
        Tensor::from_f64([self.n_runs, self.n_samples], self.data, output)
    }
}

/// Runs batches of simulation units.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    config: BatchRunnerConfig,
}

impl BatchRunner {
    /// Creates a runner after validating `config`.
    pub fn new(config: BatchRunnerConfig) -> GlucoseResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The runner configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchRunnerConfig {
        &self.config
    }

    /// Runs every unit and converts the stacked series to `output`.
    pub fn run<S: Runnable>(&self, units: Vec<S>, output: OutputSpec) -> GlucoseResult<Tensor> {
        Ok(self.collect(units)?.into_tensor(output)?)
    }

    /// Runs every unit and stacks their CGM series in input order.
    ///
    /// The first failing run fails the whole batch; no partial output is
    /// returned.
    pub fn collect<S: Runnable>(&self, units: Vec<S>) -> GlucoseResult<ResultBatch> {
        if units.is_empty() {
            return Ok(ResultBatch::empty());
        }

        let started = Instant::now();
        let batch_id = Uuid::new_v4();
        let workers = self.config.effective_workers(units.len());

        let series = if self.config.mode == ExecutionMode::Sequential || workers == 1 {
            log::info!("batch {batch_id}: running {} simulations sequentially", units.len());
            run_sequential(batch_id, units)?
        } else {
            match WorkerPool::start(workers, self.config.queue_capacity) {
                Ok(pool) => {
                    log::info!(
                        "batch {batch_id}: running {} simulations on {} workers",
                        units.len(),
                        pool.size()
                    );
                    pool.map(units)?
                }
                Err(err) => {
                    log::warn!("batch {batch_id}: worker pool unavailable ({err}), running sequentially");
                    run_sequential(batch_id, units)?
                }
            }
        };

        let elapsed = started.elapsed();
        log::info!(
            "batch {batch_id}: simulation took {:.3} seconds",
            elapsed.as_secs_f64()
        );
        Ok(ResultBatch::from_series(series, elapsed)?)
    }
}

fn run_sequential<S: Runnable>(batch_id: Uuid, units: Vec<S>) -> Result<Vec<Vec<f64>>, SimulationFailure> {
    let total = units.len();
    let mut series = Vec::with_capacity(total);
    for (index, mut unit) in units.into_iter().enumerate() {
        series.push(execute(index, &mut unit)?);
        log::debug!("batch {batch_id}: run {}/{total} done", index + 1);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Produces `len` samples of `value`, counting calls to `simulate`.
    #[derive(Clone)]
    struct Fake {
        value: f64,
        len: usize,
        fail: bool,
        calls: Arc<AtomicUsize>,
        done: bool,
    }

    impl Fake {
        fn batch(n: usize, len: usize, calls: &Arc<AtomicUsize>) -> Vec<Self> {
            (0..n)
                .map(|i| Self {
                    value: i as f64,
                    len,
                    fail: false,
                    calls: Arc::clone(calls),
                    done: false,
                })
                .collect()
        }
    }

    impl Runnable for Fake {
        fn simulate(&mut self) -> Result<(), SimulationFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SimulationFailure::InvalidParameter {
                    name: "BW".to_string(),
                    value: 0.0,
                    reason: "must be positive".to_string(),
                });
            }
            self.done = true;
            Ok(())
        }

        fn cgm_series(&self) -> Option<Vec<f64>> {
            self.done.then(|| vec![self.value; self.len])
        }
    }

    #[test]
    fn config_default_is_valid() {
        let config = BatchRunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, ExecutionMode::Parallel);
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = BatchRunnerConfig {
            queue_capacity: 0,
            ..BatchRunnerConfig::default()
        };
        let err = BatchRunner::new(config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn effective_workers_is_capped_by_batch() {
        let config = BatchRunnerConfig::with_workers(8);
        assert_eq!(config.effective_workers(3), 3);
        assert_eq!(config.effective_workers(20), 8);
        assert_eq!(config.effective_workers(0), 1);
        assert!(BatchRunnerConfig::default().effective_workers(1000) >= 1);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BatchRunnerConfig = serde_json::from_str(r#"{"mode":"Sequential"}"#).unwrap();
        assert_eq!(config, BatchRunnerConfig::sequential());
    }

    #[test]
    fn empty_batch_runs_nothing() {
        let batch = BatchRunner::default().collect(Vec::<Fake>::new()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.shape(), (0, 0));
        assert_eq!(batch.into_tensor(OutputSpec::default()).unwrap().shape(), [0, 0]);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parallel = BatchRunner::new(BatchRunnerConfig::with_workers(4))
            .unwrap()
            .collect(Fake::batch(10, 5, &calls))
            .unwrap();
        let sequential = BatchRunner::new(BatchRunnerConfig::sequential())
            .unwrap()
            .collect(Fake::batch(10, 5, &calls))
            .unwrap();
        assert_eq!(parallel.shape(), (10, 5));
        let rows: Vec<Vec<f64>> = parallel.iter_rows().map(<[f64]>::to_vec).collect();
        let expected: Vec<Vec<f64>> = sequential.iter_rows().map(<[f64]>::to_vec).collect();
        assert_eq!(rows, expected);
        assert_eq!(parallel.row(7), Some(&[7.0; 5][..]));
        assert_eq!(calls.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn sequential_stops_at_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut units = Fake::batch(5, 3, &calls);
        units[1].fail = true;
        let err = BatchRunner::new(BatchRunnerConfig::sequential())
            .unwrap()
            .collect(units)
            .unwrap_err();
        assert!(err.is_simulation());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let crate::error::GlucoseError::Simulation(failure) = err else {
            panic!("expected simulation failure, got {err:?}");
        };
        assert_eq!(failure.run_index(), Some(1));
    }

    #[test]
    fn parallel_failure_fails_the_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut units = Fake::batch(6, 3, &calls);
        units[4].fail = true;
        let err = BatchRunner::new(BatchRunnerConfig::with_workers(3))
            .unwrap()
            .collect(units)
            .unwrap_err();
        assert!(err.is_simulation());
    }

    #[test]
    fn ragged_series_are_rejected() {
        let err = ResultBatch::from_series(vec![vec![1.0, 2.0], vec![3.0]], Duration::ZERO).unwrap_err();
        assert_eq!(
            err,
            DimensionError::RaggedSeries {
                run: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn run_converts_to_requested_dtype() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tensor = BatchRunner::default()
            .run(Fake::batch(2, 4, &calls), OutputSpec::f64())
            .unwrap();
        assert_eq!(tensor.shape(), [2, 4]);
        assert_eq!(tensor.dtype(), DType::F64);
        assert_eq!(tensor.row(1), Some(vec![1.0; 4]));
    }
}
