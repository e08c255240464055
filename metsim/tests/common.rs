//! Common utilities for metsim integration tests

#![allow(dead_code)]

use metsim::camera::InstrumentParams;
use metsim::sims::SimulationRun;
use metsim::{AblationModel, SimulationConstants};

/// Frame step of the synthetic light curve (s)
pub const SYNTHETIC_STEP: f64 = 0.01;

/// Two second meteor peaking at magnitude 1 after one second
///
/// Magnitude follows `9 - 8 (1 - (t - 1)^2)`, height drops linearly from
/// 120 km at 20 km/s and length grows at 30 km/s.
pub fn synthetic_run() -> SimulationRun {
    synthetic_run_with_peak(1.0)
}

/// Same shape as [`synthetic_run`] with a different peak magnitude
pub fn synthetic_run_with_peak(peak: f64) -> SimulationRun {
    let depth = 9.0 - peak;
    let mut run = SimulationRun::with_capacity(201);
    for i in 0..=200 {
        let t = i as f64 * SYNTHETIC_STEP;
        let dt = t - 1.0;
        run.push(
            t,
            9.0 - depth * (1.0 - dt * dt),
            120_000.0 - 20_000.0 * t,
            30_000.0 * t,
        );
    }
    run
}

pub fn instrument(starting_lim_mag: f64, ending_lim_mag: f64, len_delay: f64) -> InstrumentParams {
    InstrumentParams {
        starting_lim_mag,
        ending_lim_mag,
        len_delay,
    }
}

/// Ignores the constants and always returns the synthetic light curve
pub struct SyntheticModel;

impl AblationModel for SyntheticModel {
    fn simulate(&self, _constants: &SimulationConstants) -> SimulationRun {
        synthetic_run()
    }
}

/// A meteor that never gets brighter than magnitude 9
pub struct FaintModel;

impl AblationModel for FaintModel {
    fn simulate(&self, _constants: &SimulationConstants) -> SimulationRun {
        synthetic_run_with_peak(9.0)
    }
}
