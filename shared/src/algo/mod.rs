//! Numerical and execution algorithms shared by the simulation crates
//!
//! This module provides spline resampling, finite min/max scanning, and the
//! bounded parallel executor used to mass-produce simulations.

pub mod min_max_scan;
pub mod parallel;
pub mod progress;
pub mod spline;

pub use min_max_scan::{MinMaxError, MinMaxScan};
pub use parallel::{BoundedMap, Generated, ParallelError};
pub use progress::{format_duration, ProgressReporter};
pub use spline::{CubicSpline, SplineError};
