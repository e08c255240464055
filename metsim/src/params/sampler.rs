//! A single bounded, randomly drawn simulation parameter

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ParamError, PhysicalParam};

/// How values are spread over `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    /// Uniform in the value itself
    Uniform,
    /// Uniform in log10 of the value (both bounds must be positive)
    LogUniform,
}

/// Ordering constraint against another parameter's current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// Drawn value must not be below the referenced value
    Greater,
    /// Drawn value must not be above the referenced value
    Less,
}

/// Link from one parameter to another one drawn earlier in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub relation: Relation,
    pub target: PhysicalParam,
}

/// Range, distribution and current value of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSampler {
    min: f64,
    max: f64,
    value: Option<f64>,
    fixed: bool,
    distribution: Distribution,
    link: Option<Link>,
}

impl ParameterSampler {
    /// Free parameter drawn uniformly from `[min, max)`
    pub fn uniform(min: f64, max: f64) -> Self {
        Self::with_distribution(min, max, Distribution::Uniform)
    }

    /// Free parameter drawn log-uniformly from `[min, max)`
    pub fn log_uniform(min: f64, max: f64) -> Self {
        debug_assert!(min > 0.0 && max > 0.0, "log-uniform bounds must be positive");
        Self::with_distribution(min, max, Distribution::LogUniform)
    }

    fn with_distribution(min: f64, max: f64, distribution: Distribution) -> Self {
        Self {
            min,
            max,
            value: None,
            fixed: false,
            distribution,
            link: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Constrain draws against another parameter
    pub fn linked(mut self, relation: Relation, target: PhysicalParam) -> Self {
        self.link = Some(Link { relation, target });
        self
    }

    /// Mark the parameter fixed at its default
    ///
    /// # Errors
    /// [`ParamError::FixedWithoutDefault`] when no default was given.
    pub fn fixed(mut self) -> Result<Self, ParamError> {
        self.set_fixed(true)?;
        Ok(self)
    }

    /// Fix or free the parameter; fixing requires a value
    pub fn set_fixed(&mut self, fixed: bool) -> Result<(), ParamError> {
        if fixed && self.value.is_none() {
            return Err(ParamError::FixedWithoutDefault);
        }
        self.fixed = fixed;
        Ok(())
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn link(&self) -> Option<Link> {
        self.link
    }

    /// Assign a value directly, bypassing range checks (used when restoring state)
    pub fn set_value(&mut self, value: f64) {
        self.value = Some(value);
    }

    /// True if `value` lies in `[min, max]`
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Whether a bulk draw should replace the current value
    pub fn needs_redraw(&self, override_value: bool) -> bool {
        match self.value {
            None => true,
            Some(v) => override_value || !self.contains(v),
        }
    }

    /// Draw range after applying the link against `linked_value`
    ///
    /// Without a link, or without a value for the linked parameter, this is
    /// the plain `[min, max]` range.
    pub fn effective_bounds(&self, linked_value: Option<f64>) -> (f64, f64) {
        match (self.link, linked_value) {
            (Some(link), Some(other)) => match link.relation {
                Relation::Greater => (self.min.max(other), self.max),
                Relation::Less => (self.min, self.max.min(other)),
            },
            _ => (self.min, self.max),
        }
    }

    /// Draw a value without storing it; fixed parameters return their value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, linked_value: Option<f64>) -> f64 {
        if let (true, Some(value)) = (self.fixed, self.value) {
            return value;
        }

        let (lo, hi) = self.effective_bounds(linked_value);
        let u: f64 = rng.gen();

        match self.distribution {
            Distribution::Uniform => lo + (hi - lo) * u,
            Distribution::LogUniform => {
                let (log_lo, log_hi) = (lo.log10(), hi.log10());
                10f64.powf(log_lo + (log_hi - log_lo) * u)
            }
        }
    }

    /// Draw a new value, store it and return it (fixed parameters are left alone)
    pub fn generate_val<R: Rng + ?Sized>(&mut self, rng: &mut R, linked_value: Option<f64>) -> f64 {
        let value = self.sample(rng, linked_value);
        self.value = Some(value);
        value
    }

    /// Map a value onto `[0, 1]` across the parameter range
    pub fn normalize(&self, value: f64) -> f64 {
        match self.distribution {
            Distribution::Uniform => (value - self.min) / (self.max - self.min),
            Distribution::LogUniform => {
                (value.log10() - self.min.log10()) / (self.max.log10() - self.min.log10())
            }
        }
    }

    /// Inverse of [`ParameterSampler::normalize`]
    pub fn denormalize(&self, normalized: f64) -> f64 {
        match self.distribution {
            Distribution::Uniform => normalized * (self.max - self.min) + self.min,
            Distribution::LogUniform => {
                self.min * 10f64.powf(normalized * (self.max.log10() - self.min.log10()))
            }
        }
    }
}
