//! Scoped worker pool for one batch.
//!
//! A pool lives for exactly one `map` call. Jobs travel over a bounded channel
//! to named worker threads; outcomes come back tagged with their batch index.
//! Dropping the pool closes the job channel and joins every worker, on the
//! success path and on every error path alike.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::error::SimulationFailure;
use crate::simulator::Runnable;

type Outcome = (usize, Result<Vec<f64>, SimulationFailure>);

struct Job<S> {
    index: usize,
    unit: S,
}

pub(crate) struct WorkerPool<S: Runnable> {
    tx: Option<Sender<Job<S>>>,
    results: Receiver<Outcome>,
    abort: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl<S: Runnable> WorkerPool<S> {
    /// Spawns `workers` threads. If any spawn fails, the threads already
    /// started are joined before the error is returned.
    pub(crate) fn start(workers: usize, queue_capacity: usize) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<Job<S>>(queue_capacity.max(1));
        let (result_tx, results) = unbounded::<Outcome>();
        let abort = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for idx in 0..workers.max(1) {
            let rx = rx.clone();
            let result_tx = result_tx.clone();
            let abort_flag = Arc::clone(&abort);
            let spawned = thread::Builder::new()
                .name(format!("glucose-sim-{idx}"))
                .spawn(move || worker_loop(&rx, &result_tx, &abort_flag));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    drop(tx);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            tx: Some(tx),
            results,
            abort,
            workers: handles,
        })
    }

    /// Number of worker threads.
    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }

    /// Runs every unit and returns their series in input order.
    ///
    /// Stops at the first failure; queued units that have not started are
    /// skipped and no partial output is returned.
    pub(crate) fn map(mut self, units: Vec<S>) -> Result<Vec<Vec<f64>>, SimulationFailure> {
        let total = units.len();
        let mut slots: Vec<Option<Vec<f64>>> = vec![None; total];

        let Some(tx) = self.tx.take() else {
            return Err(SimulationFailure::Disconnected { pending: total });
        };
        let mut submitted = 0usize;
        for (index, unit) in units.into_iter().enumerate() {
            if self.abort.load(Ordering::Acquire) {
                break;
            }
            if tx.send(Job { index, unit }).is_err() {
                break;
            }
            submitted += 1;
        }
        // Workers drain what is queued, then exit.
        drop(tx);

        let mut received = 0usize;
        while received < submitted {
            match self.results.recv() {
                Ok((index, Ok(series))) => {
                    slots[index] = Some(series);
                    received += 1;
                }
                Ok((_, Err(failure))) => return Err(failure),
                Err(_) => {
                    return Err(SimulationFailure::Disconnected {
                        pending: total - received,
                    })
                }
            }
        }

        // Submission stopped early only after a failure, which was reported above.
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(SimulationFailure::MissingResults { index }))
            .collect()
    }
}

impl<S: Runnable> Drop for WorkerPool<S> {
    fn drop(&mut self) {
        // Skip whatever is still queued, close the channel and join.
        self.abort.store(true, Ordering::Release);
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<S: Runnable>(jobs: &Receiver<Job<S>>, results: &Sender<Outcome>, abort: &AtomicBool) {
    while let Ok(Job { index, mut unit }) = jobs.recv() {
        if abort.load(Ordering::Acquire) {
            continue;
        }
        let outcome = execute(index, &mut unit);
        if outcome.is_err() {
            abort.store(true, Ordering::Release);
        }
        if results.send((index, outcome)).is_err() {
            break;
        }
    }
}

/// Runs one unit, converting a panic into a [`SimulationFailure`].
pub(crate) fn execute<S: Runnable>(index: usize, unit: &mut S) -> Result<Vec<f64>, SimulationFailure> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<f64>, SimulationFailure> {
        unit.simulate()?;
        unit.cgm_series()
            .ok_or(SimulationFailure::MissingResults { index })
    }));
    match result {
        Ok(outcome) => outcome.map_err(|failure| failure.in_run(index)),
        Err(payload) => Err(SimulationFailure::Panicked {
            index,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Sleeps for `delay_ms`, then reports `[value]`.
    struct Delayed {
        value: f64,
        delay_ms: u64,
        fail: bool,
        done: bool,
    }

    impl Delayed {
        fn new(value: f64, delay_ms: u64) -> Self {
            Self {
                value,
                delay_ms,
                fail: false,
                done: false,
            }
        }
    }

    impl Runnable for Delayed {
        fn simulate(&mut self) -> Result<(), SimulationFailure> {
            thread::sleep(Duration::from_millis(self.delay_ms));
            if self.fail {
                return Err(SimulationFailure::NonFiniteState { minute: 0 });
            }
            self.done = true;
            Ok(())
        }

        fn cgm_series(&self) -> Option<Vec<f64>> {
            self.done.then(|| vec![self.value])
        }
    }

    #[test]
    fn results_come_back_in_input_order() {
        // Later units finish first.
        let units: Vec<Delayed> = (0..6u32)
            .map(|i| Delayed::new(f64::from(i), u64::from(60 - i * 10)))
            .collect();
        let pool = WorkerPool::start(6, 2).unwrap();
        assert_eq!(pool.size(), 6);
        let series = pool.map(units).unwrap();
        let values: Vec<f64> = series.into_iter().map(|s| s[0]).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn first_failure_fails_the_batch() {
        let mut units: Vec<Delayed> = (0..4).map(|i| Delayed::new(f64::from(i), 5)).collect();
        units[2].fail = true;
        let pool = WorkerPool::start(2, 4).unwrap();
        let err = pool.map(units).unwrap_err();
        assert_eq!(err.run_index(), Some(2));
    }

    #[test]
    fn execute_reports_missing_results() {
        struct Silent;
        impl Runnable for Silent {
            fn simulate(&mut self) -> Result<(), SimulationFailure> {
                Ok(())
            }
            fn cgm_series(&self) -> Option<Vec<f64>> {
                None
            }
        }
        let err = execute(7, &mut Silent).unwrap_err();
        assert_eq!(err, SimulationFailure::MissingResults { index: 7 });
    }

    #[test]
    fn execute_converts_panics() {
        struct Boom;
        impl Runnable for Boom {
            fn simulate(&mut self) -> Result<(), SimulationFailure> {
                panic!("integrator exploded");
            }
            fn cgm_series(&self) -> Option<Vec<f64>> {
                None
            }
        }
        let err = execute(3, &mut Boom).unwrap_err();
        let SimulationFailure::Panicked { index, message } = err else {
            panic!("expected Panicked, got {err:?}");
        };
        assert_eq!(index, 3);
        assert!(message.contains("integrator exploded"));
    }

    #[test]
    fn dropping_an_unused_pool_joins_workers() {
        let pool: WorkerPool<Delayed> = WorkerPool::start(3, 1).unwrap();
        drop(pool);
    }
}
