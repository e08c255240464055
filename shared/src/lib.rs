//! Shared components for the meteor simulation workspace.
//!
//! Domain-independent building blocks: spline resampling, NaN-tolerant
//! scans, and the bounded parallel executor with progress reporting.

pub mod algo;
