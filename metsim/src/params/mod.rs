//! Randomly drawn physical parameters of a simulated meteoroid

pub mod physical;
pub mod sampler;

use thiserror::Error;

use crate::atmosphere::AtmosphereError;

pub use physical::{fixed_mask_from_flags, FixedMask, ParamVector, PhysicalParam, PhysicalParameterSet};
pub use sampler::{Distribution, Link, ParameterSampler, Relation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Parameter cannot be fixed without a default value")]
    FixedWithoutDefault,
    #[error("Parameter '{0}' cannot be fixed without a default value")]
    FixedParamWithoutDefault(&'static str),
    #[error("Parameter '{0}' has no value yet")]
    Unset(&'static str),
    #[error("Fixed flags must be 0 or 1, got {0}")]
    InvalidFixedFlag(u8),
    #[error("Expected {expected} fixed flags, got {actual}")]
    FixedFlagCount { expected: usize, actual: usize },
    #[error("Atmosphere model: {0}")]
    Atmosphere(#[from] AtmosphereError),
}
