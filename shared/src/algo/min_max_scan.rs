//! MinMaxScan - minimum and maximum over the finite values of a float slice
//!
//! Simulated light curves can contain NaN or infinite samples where the
//! integrator went unstable or the luminosity dropped to zero. The scanner
//! skips those samples and remembers where the first one was.

use num_traits::float::Float;
use std::fmt;
use thiserror::Error;

/// Error types for MinMaxScan operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MinMaxError {
    #[error("No finite values in data ({0} samples)")]
    NoFiniteData(usize),
}

/// A scanner for minimum and maximum finite values in floating point data
#[derive(Debug, Clone)]
pub struct MinMaxScan<T: Float> {
    min_value: Option<T>,
    max_value: Option<T>,
    first_non_finite: Option<usize>,
    non_finite_count: usize,
    len: usize,
}

impl<T: Float + fmt::Debug> MinMaxScan<T> {
    /// Scan a slice, ignoring NaN and infinite values
    ///
    /// # Example
    /// ```
    /// use shared::algo::min_max_scan::MinMaxScan;
    ///
    /// let scanner = MinMaxScan::<f64>::new(&[1.0, f64::NAN, 5.0, f64::INFINITY, 2.0]);
    /// assert_eq!(scanner.min_max().unwrap(), (1.0, 5.0));
    /// assert_eq!(scanner.non_finite_count(), 2);
    /// ```
    pub fn new(data: &[T]) -> Self {
        let mut min_value: Option<T> = None;
        let mut max_value: Option<T> = None;
        let mut first_non_finite = None;
        let mut non_finite_count = 0;

        for (index, &value) in data.iter().enumerate() {
            if !value.is_finite() {
                first_non_finite.get_or_insert(index);
                non_finite_count += 1;
                continue;
            }

            min_value = Some(min_value.map_or(value, |m| m.min(value)));
            max_value = Some(max_value.map_or(value, |m| m.max(value)));
        }

        Self {
            min_value,
            max_value,
            first_non_finite,
            non_finite_count,
            len: data.len(),
        }
    }

    /// Smallest finite value
    pub fn min(&self) -> Result<T, MinMaxError> {
        self.min_value.ok_or(MinMaxError::NoFiniteData(self.len))
    }

    /// Largest finite value
    pub fn max(&self) -> Result<T, MinMaxError> {
        self.max_value.ok_or(MinMaxError::NoFiniteData(self.len))
    }

    /// Both extremes as `(min, max)`
    pub fn min_max(&self) -> Result<(T, T), MinMaxError> {
        Ok((self.min()?, self.max()?))
    }

    /// Index of the first NaN/infinite sample, if any
    pub fn first_non_finite(&self) -> Option<usize> {
        self.first_non_finite
    }

    /// Number of NaN/infinite samples skipped
    pub fn non_finite_count(&self) -> usize {
        self.non_finite_count
    }
}
