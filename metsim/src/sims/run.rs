//! Raw time series produced by one simulator invocation

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Column '{column}' has {actual} samples, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Time-indexed magnitude, height and path length of the brightest point
///
/// All four columns always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RunColumns")]
pub struct SimulationRun {
    time: Vec<f64>,
    abs_magnitude: Vec<f64>,
    brightest_height: Vec<f64>,
    brightest_length: Vec<f64>,
}

/// Wire form of a run; JSON writes non-finite floats as `null`, read back as NaN
#[derive(Deserialize)]
struct RunColumns {
    #[serde(deserialize_with = "nullable_floats")]
    time: Vec<f64>,
    #[serde(deserialize_with = "nullable_floats")]
    abs_magnitude: Vec<f64>,
    #[serde(deserialize_with = "nullable_floats")]
    brightest_height: Vec<f64>,
    #[serde(deserialize_with = "nullable_floats")]
    brightest_length: Vec<f64>,
}

fn nullable_floats<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

impl TryFrom<RunColumns> for SimulationRun {
    type Error = RunError;

    fn try_from(c: RunColumns) -> Result<Self, Self::Error> {
        SimulationRun::new(c.time, c.abs_magnitude, c.brightest_height, c.brightest_length)
    }
}

impl SimulationRun {
    pub fn new(
        time: Vec<f64>,
        abs_magnitude: Vec<f64>,
        brightest_height: Vec<f64>,
        brightest_length: Vec<f64>,
    ) -> Result<Self, RunError> {
        let expected = time.len();
        for (column, actual) in [
            ("abs_magnitude", abs_magnitude.len()),
            ("brightest_height", brightest_height.len()),
            ("brightest_length", brightest_length.len()),
        ] {
            if actual != expected {
                return Err(RunError::LengthMismatch {
                    column,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self {
            time,
            abs_magnitude,
            brightest_height,
            brightest_length,
        })
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            abs_magnitude: Vec::with_capacity(capacity),
            brightest_height: Vec::with_capacity(capacity),
            brightest_length: Vec::with_capacity(capacity),
        }
    }

    /// Append one sample to every column
    pub fn push(&mut self, time: f64, abs_magnitude: f64, height: f64, length: f64) {
        self.time.push(time);
        self.abs_magnitude.push(abs_magnitude);
        self.brightest_height.push(height);
        self.brightest_length.push(length);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn abs_magnitude(&self) -> &[f64] {
        &self.abs_magnitude
    }

    pub fn brightest_height(&self) -> &[f64] {
        &self.brightest_height
    }

    pub fn brightest_length(&self) -> &[f64] {
        &self.brightest_length
    }
}
