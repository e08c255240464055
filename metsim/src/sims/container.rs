//! One simulation: its drawn parameters, derived constants and results

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ablation::{AblationModel, SimulationConstants};
use crate::params::{FixedMask, ParamError, ParamVector, PhysicalParam, PhysicalParameterSet};
use crate::sims::extract::{ExtractOptions, Extraction, NoiseDraw, SampleExtractor};
use crate::sims::run::SimulationRun;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Simulation '{0}' has no simulation results")]
    NotRun(String),
}

/// Output sub-directory of a simulation, binned by velocity and density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputBucket {
    /// Initial velocity, whole km/s (truncated after rounding to 0.01 km/s)
    pub velocity_kms: u32,
    /// Bulk density, truncated to 100 kg/m^3 bins
    pub density: u32,
}

/// Initial velocity in km/s rounded to the two decimals shown in file names
fn velocity_kms(v_init: f64) -> f64 {
    (v_init / 10.0).round() / 100.0
}

impl OutputBucket {
    /// Bucket of a run, binned from the same rounded velocity as its file name
    pub fn from_values(v_init: f64, rho: f64) -> Self {
        Self {
            velocity_kms: velocity_kms(v_init).max(0.0) as u32,
            density: 100 * ((rho.max(0.0) as u32) / 100),
        }
    }

    /// `v{vv}/rho{dddd}`
    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&format!("v{:02}", self.velocity_kms)).join(format!("rho{:04}", self.density))
    }
}

/// Scientific notation with a sign and at least two exponent digits (`2.47e-03`)
fn format_sci(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

/// Descriptive base name (no extension) of a simulation with these parameters
pub fn simulation_file_name(params: &PhysicalParameterSet) -> Result<String, ParamError> {
    Ok(format!(
        "erosion_sim_v{:.2}_m{}g_rho{:04}_z{:04.1}_abl{:.3}_eh{:05.1}_er{:.3}_s{:.2}",
        velocity_kms(params.value(PhysicalParam::InitialVelocity)?),
        format_sci(params.value(PhysicalParam::InitialMass)? * 1000.0, 2),
        params.value(PhysicalParam::BulkDensity)? as u32,
        params.value(PhysicalParam::ZenithAngle)?.to_degrees(),
        params.value(PhysicalParam::AblationCoeff)? * 1e6,
        params.value(PhysicalParam::ErosionHeightStart)? / 1000.0,
        params.value(PhysicalParam::ErosionCoeff)? * 1e6,
        params.value(PhysicalParam::ErosionMassIndex)?,
    ))
}

/// Drawn parameters, derived constants and (once run) the results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationContainer {
    #[serde(skip)]
    output_dir: PathBuf,
    file_name: String,
    seed: u64,
    params: PhysicalParameterSet,
    constants: SimulationConstants,
    results: Option<SimulationRun>,
}

impl SimulationContainer {
    /// Draw a fresh parameter set from `seed`
    ///
    /// Parameters flagged in `fixed` keep their default values.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        seed: u64,
        fixed: Option<&FixedMask>,
    ) -> Result<Self, ContainerError> {
        let mut params = PhysicalParameterSet::new()?;
        if let Some(mask) = fixed {
            params.apply_fixed_mask(mask)?;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        params.draw_all(&mut rng, true);

        let constants = params.to_constants()?;
        let file_name = simulation_file_name(&params)?;
        debug!("Seed {seed}: {}", params.summary());

        Ok(Self {
            output_dir: output_dir.into(),
            file_name,
            seed,
            params,
            constants,
            results: None,
        })
    }

    /// Switch off erosion in the simulator constants (parameters are left as drawn)
    pub fn disable_erosion(&mut self) {
        self.constants.disable_erosion();
    }

    /// Run the simulator and keep its output
    pub fn run<M: AblationModel + ?Sized>(&mut self, model: &M) -> &SimulationRun {
        self.results.insert(model.simulate(&self.constants))
    }

    /// Hand the results to a sample extractor
    pub fn extract(
        &self,
        extractor: &SampleExtractor,
        noise: NoiseDraw<'_>,
        options: ExtractOptions,
    ) -> Result<Extraction, ContainerError> {
        let run = self
            .results
            .as_ref()
            .ok_or_else(|| ContainerError::NotRun(self.file_name.clone()))?;
        Ok(extractor.extract(run, &self.params, noise, options))
    }

    pub fn params(&self) -> &PhysicalParameterSet {
        &self.params
    }

    pub fn constants(&self) -> &SimulationConstants {
        &self.constants
    }

    pub fn results(&self) -> Option<&SimulationRun> {
        self.results.as_ref()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Normalized physical parameters
    pub fn normalized_inputs(&self) -> Result<ParamVector, ParamError> {
        self.params.normalized_vector()
    }

    /// Physical values for normalized inputs
    pub fn denormalize_inputs(&self, inputs: &ParamVector) -> ParamVector {
        self.params.denormalized_values(inputs)
    }

    pub fn bucket(&self) -> Result<OutputBucket, ParamError> {
        Ok(OutputBucket::from_values(
            self.params.value(PhysicalParam::InitialVelocity)?,
            self.params.value(PhysicalParam::BulkDensity)?,
        ))
    }

    /// `<output_dir>/v{vv}/rho{dddd}/<file_name>.json`
    pub fn output_path(&self) -> Result<PathBuf, ParamError> {
        Ok(self
            .output_dir
            .join(self.bucket()?.relative_dir())
            .join(format!("{}.json", self.file_name)))
    }

    /// Write the container as JSON into its bucket directory
    pub fn save(&self) -> Result<PathBuf, ContainerError> {
        if self.results.is_none() {
            return Err(ContainerError::NotRun(self.file_name.clone()));
        }

        let path = self.output_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ContainerError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(&path).map_err(|source| ContainerError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self)?;

        debug!("Saved simulation to {}", path.display());
        Ok(path)
    }

    /// Read a container written by [`SimulationContainer::save`]
    ///
    /// The output directory is taken to be the root above the bucket
    /// directories the file sits in.
    pub fn load(path: &Path) -> Result<Self, ContainerError> {
        let file = File::open(path).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut container: Self = serde_json::from_reader(BufReader::new(file))?;
        container.params.validate()?;
        container.output_dir = path
            .ancestors()
            .nth(3)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(container)
    }
}
