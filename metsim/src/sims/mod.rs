//! Simulation runs, their extraction into training samples and batch drivers

pub mod batch;
pub mod container;
pub mod extract;
pub mod manifest;
pub mod run;

pub use batch::{
    generate_simulations, load_training_sample, postprocess_directory, run_generation_job,
    AcceptedRun, GenerationJob, JobGenerator,
};
pub use container::{ContainerError, OutputBucket, SimulationContainer};
pub use extract::{
    Channel, ExtractOptions, Extraction, NoiseDraw, ParameterBundle, Rejection, SampleExtractor,
    Track, TrainingSample,
};
pub use manifest::{ManifestEntry, ManifestError};
pub use run::{RunError, SimulationRun};
