//! Bounded parallel execution of independent simulation runs
//!
//! Two layers are provided:
//! - [`BoundedMap::map`] runs a worker once per input, either serially (one
//!   worker) or on a fixed-size rayon pool, and returns results in input order.
//! - [`BoundedMap::generate_until`] keeps generating fresh inputs and mapping
//!   them until enough results pass a filter or a run budget is spent.
//!
//! Workers are expected to be total: a failed run should come back as a
//! rejection value (e.g. `None`), not a panic. A panicking worker aborts the
//! whole batch.

use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::progress::ProgressReporter;

/// Default number of completions between progress log lines
pub const DEFAULT_REPORT_EVERY: usize = 100;

/// Default run budget multiplier applied to the required result count
pub const DEFAULT_BUDGET_FACTOR: usize = 10;

#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Worker count must be 1 or more, got {0}")]
    InvalidWorkerCount(usize),
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Outcome of a generate-until-satisfied loop
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<R> {
    /// Accepted results, at most the required count
    pub results: Vec<R>,
    /// Total number of worker invocations
    pub attempted: usize,
    /// True when the run budget ran out before enough results were accepted
    pub budget_exhausted: bool,
}

/// Fixed-width executor for independent work items
pub struct BoundedMap {
    workers: usize,
    pool: Option<rayon::ThreadPool>,
    report_every: usize,
    progress_bar: Option<ProgressBar>,
}

impl BoundedMap {
    /// Create an executor with `workers` parallel workers
    ///
    /// One worker runs everything on the calling thread in input order.
    pub fn new(workers: usize) -> Result<Self, ParallelError> {
        let pool = match workers {
            0 => return Err(ParallelError::InvalidWorkerCount(0)),
            1 => None,
            n => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
        };

        Ok(Self {
            workers,
            pool,
            report_every: DEFAULT_REPORT_EVERY,
            progress_bar: None,
        })
    }

    /// Executor sized to the number of logical CPUs
    pub fn with_all_cores() -> Result<Self, ParallelError> {
        Self::new(num_cpus::get().max(1))
    }

    /// Change how often throughput lines are logged (0 disables them)
    pub fn report_every(mut self, report_every: usize) -> Self {
        self.report_every = report_every;
        self
    }

    /// Advance the given progress bar as work items complete
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `worker` once per input, returning results in input order
    pub fn map<A, T, F>(&self, inputs: Vec<A>, worker: F) -> Vec<T>
    where
        A: Send,
        T: Send,
        F: Fn(A) -> T + Sync,
    {
        let progress = self.reporter(inputs.len());
        self.map_reporting(inputs, &worker, &progress)
    }

    fn reporter(&self, total: usize) -> ProgressReporter {
        ProgressReporter::new(total, self.report_every, self.progress_bar.clone())
    }

    /// Map with completions counted on an existing reporter
    fn map_reporting<A, T, F>(
        &self,
        inputs: Vec<A>,
        worker: &F,
        progress: &ProgressReporter,
    ) -> Vec<T>
    where
        A: Send,
        T: Send,
        F: Fn(A) -> T + Sync,
    {
        let run_one = |input: A| {
            let result = worker(input);
            progress.record();
            result
        };

        match &self.pool {
            None => inputs.into_iter().map(run_one).collect(),
            Some(pool) => pool.install(|| inputs.into_par_iter().map(run_one).collect()),
        }
    }

    /// Generate and map inputs until `required` results pass `filter`
    ///
    /// The first round maps `required` inputs. If none of them pass, the loop
    /// stops right away since that points at a misconfiguration rather than
    /// bad luck. Later rounds map one input per worker until enough results
    /// are collected or `max_runs` invocations (default `10 * required`) have
    /// been attempted. Surplus results are dropped.
    pub fn generate_until<A, T, R, G, F, C>(
        &self,
        mut generator: G,
        worker: F,
        mut filter: C,
        required: usize,
        max_runs: Option<usize>,
    ) -> Generated<R>
    where
        A: Send,
        T: Send,
        G: FnMut() -> A,
        F: Fn(A) -> T + Sync,
        C: FnMut(Vec<T>) -> Vec<R>,
    {
        if required == 0 {
            return Generated {
                results: Vec::new(),
                attempted: 0,
                budget_exhausted: false,
            };
        }

        let max_runs = max_runs.unwrap_or(DEFAULT_BUDGET_FACTOR * required);
        if let Some(bar) = &self.progress_bar {
            bar.set_length(required as u64);
        }

        // One reporter for the whole loop so throughput and ETA span every round
        let progress = self.reporter(max_runs);

        let inputs: Vec<A> = (0..required).map(|_| generator()).collect();
        let mut attempted = inputs.len();
        let mut results = filter(self.map_reporting(inputs, &worker, &progress));

        if results.is_empty() {
            warn!("No successful results after the initial run of {attempted}!");
            return Generated {
                results,
                attempted,
                budget_exhausted: false,
            };
        }

        info!(
            "Initial round: {}/{} good results from {} runs",
            results.len(),
            required,
            attempted
        );

        let mut budget_exhausted = false;
        while results.len() < required {
            let inputs: Vec<A> = (0..self.workers).map(|_| generator()).collect();
            attempted += inputs.len();
            if let Some(bar) = &self.progress_bar {
                bar.inc_length(inputs.len() as u64);
            }

            results.extend(filter(self.map_reporting(inputs, &worker, &progress)));

            if attempted >= max_runs {
                budget_exhausted = results.len() < required;
                warn!(
                    "Total runs exceeded ({attempted} >= {max_runs})! Stopping with {}/{} results",
                    results.len().min(required),
                    required
                );
                break;
            }
        }

        results.truncate(required);

        Generated {
            results,
            attempted,
            budget_exhausted,
        }
    }
}
