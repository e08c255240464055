use clap::Parser;
use shared::algo::{BoundedMap, ParallelError};

use crate::camera::CameraKind;

/// Common arguments shared by the batch binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedBatchArgs {
    /// Number of parallel workers (defaults to the number of logical CPUs)
    #[arg(long)]
    pub cores: Option<usize>,

    /// Master random seed (random if not given)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Camera profile the simulations are checked against
    #[arg(long, value_enum, default_value_t = CameraKind::Base)]
    pub camera: CameraKind,

    /// Log a progress line every this many finished simulations (0 disables)
    #[arg(long, default_value_t = 100)]
    pub report_every: usize,
}

impl SharedBatchArgs {
    /// Executor with the requested number of workers
    pub fn executor(&self) -> Result<BoundedMap, ParallelError> {
        let executor = match self.cores {
            Some(cores) => BoundedMap::new(cores)?,
            None => BoundedMap::with_all_cores()?,
        };
        Ok(executor.report_every(self.report_every))
    }

    /// The given seed, or a fresh random one
    pub fn master_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}
