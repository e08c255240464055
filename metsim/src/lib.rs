//! Meteor ablation simulations turned into machine-learning training samples
//!
//! Random physical parameters are drawn for a meteoroid, an ablation model
//! is run on them, and the resulting light curve and trajectory are
//! "observed" with a camera profile to produce a fixed-length normalized
//! sample. Batches of such runs are driven in parallel until enough of them
//! pass the camera quality cuts.

pub mod ablation;
pub mod atmosphere;
pub mod camera;
pub mod params;
pub mod shared_args;
pub mod sims;

pub use ablation::{AblationModel, SimulationConstants, SingleBodyModel};
pub use camera::{CameraKind, CameraProfile, InstrumentParams};
pub use params::{PhysicalParam, PhysicalParameterSet};
