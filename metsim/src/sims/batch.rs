//! Batch generation and postprocessing of simulations
//!
//! Every work item carries its own seed drawn from one master generator, so
//! a batch is reproducible for a given master seed and worker count. Work
//! items never fail: any error is logged and the item counts as rejected.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::algo::{BoundedMap, Generated};
use walkdir::WalkDir;

use crate::ablation::AblationModel;
use crate::camera::InstrumentParams;
use crate::params::FixedMask;
use crate::sims::container::{ContainerError, SimulationContainer};
use crate::sims::extract::{ExtractOptions, Extraction, NoiseDraw, SampleExtractor};
use crate::sims::manifest::ManifestEntry;

/// Offset between a container's parameter seed and its instrument noise seed
const NOISE_SEED_OFFSET: u64 = 1;

/// Inputs of one generate-and-check work item
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub output_dir: PathBuf,
    pub seed: u64,
    pub erosion: bool,
    pub fixed: Option<FixedMask>,
}

/// Produces jobs with seeds drawn from a master generator
pub struct JobGenerator {
    master: StdRng,
    output_dir: PathBuf,
    erosion: bool,
    fixed: Option<FixedMask>,
}

impl JobGenerator {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        master_seed: u64,
        erosion: bool,
        fixed: Option<FixedMask>,
    ) -> Self {
        Self {
            master: StdRng::seed_from_u64(master_seed),
            output_dir: output_dir.into(),
            erosion,
            fixed,
        }
    }

    pub fn next_job(&mut self) -> GenerationJob {
        GenerationJob {
            output_dir: self.output_dir.clone(),
            seed: self.master.gen(),
            erosion: self.erosion,
            fixed: self.fixed,
        }
    }
}

fn manifest_entry(path: &Path, root: &Path, instrument: InstrumentParams) -> ManifestEntry {
    let relative = path.strip_prefix(root).unwrap_or(path);
    ManifestEntry {
        file: relative.to_string_lossy().into_owned(),
        instrument,
    }
}

/// A run that passed the quality cuts and has not been written yet
#[derive(Debug, Clone)]
pub struct AcceptedRun {
    pub container: SimulationContainer,
    pub instrument: InstrumentParams,
}

impl AcceptedRun {
    /// Write the container into its bucket directory
    pub fn save(&self) -> Result<ManifestEntry, ContainerError> {
        let path = self.container.save()?;
        Ok(manifest_entry(
            &path,
            self.container.output_dir(),
            self.instrument,
        ))
    }
}

fn try_generation_job<M: AblationModel + ?Sized>(
    job: &GenerationJob,
    model: &M,
    extractor: &SampleExtractor,
) -> Result<Option<AcceptedRun>, ContainerError> {
    let mut container = SimulationContainer::new(&job.output_dir, job.seed, job.fixed.as_ref())?;
    if !job.erosion {
        container.disable_erosion();
    }

    container.run(model);

    let mut noise_rng = StdRng::seed_from_u64(job.seed.wrapping_add(NOISE_SEED_OFFSET));
    let extraction = container.extract(
        extractor,
        NoiseDraw::Fresh(&mut noise_rng),
        ExtractOptions::check_only(),
    )?;

    Ok(extraction.bundle().map(|bundle| AcceptedRun {
        instrument: bundle.instrument,
        container,
    }))
}

/// Draw parameters, simulate, keep the run if the camera would have seen it
///
/// Nothing is written here; accepted runs are saved by the caller once it
/// knows the run is wanted.
pub fn run_generation_job<M: AblationModel + ?Sized>(
    job: GenerationJob,
    model: &M,
    extractor: &SampleExtractor,
) -> Option<AcceptedRun> {
    match try_generation_job(&job, model, extractor) {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("Simulation with seed {} failed: {}", job.seed, e);
            None
        }
    }
}

/// Run jobs until `required` simulations are accepted or the budget runs out
///
/// Accepted runs are saved in arrival order until `required` of them are on
/// disk; surplus runs from the last round are dropped unsaved.
pub fn generate_simulations<M: AblationModel + ?Sized>(
    executor: &BoundedMap,
    model: &M,
    extractor: &SampleExtractor,
    mut jobs: JobGenerator,
    required: usize,
    max_runs: Option<usize>,
) -> Generated<ManifestEntry> {
    let mut saved = 0;
    let generated = executor.generate_until(
        || jobs.next_job(),
        |job| run_generation_job(job, model, extractor),
        |results| {
            let mut entries = Vec::new();
            for accepted in results.into_iter().flatten() {
                if saved >= required {
                    break;
                }
                match accepted.save() {
                    Ok(entry) => {
                        saved += 1;
                        entries.push(entry);
                    }
                    Err(e) => warn!(
                        "Could not save {}: {}",
                        accepted.container.file_name(),
                        e
                    ),
                }
            }
            entries
        },
        required,
        max_runs,
    );

    info!(
        "Accepted {}/{} simulations after {} runs",
        generated.results.len(),
        required,
        generated.attempted
    );
    if generated.budget_exhausted {
        warn!("Run budget exhausted before reaching {required} simulations");
    }

    generated
}

/// All `.json` files below `dir`, sorted
///
/// Symbolic links are not followed.
pub fn find_simulation_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Re-run the quality cuts on a saved simulation with fresh instrument draws
pub fn validate_saved_simulation(
    path: &Path,
    root: &Path,
    seed: u64,
    extractor: &SampleExtractor,
) -> Option<ManifestEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let extraction = SimulationContainer::load(path).and_then(|container| {
        container.extract(extractor, NoiseDraw::Fresh(&mut rng), ExtractOptions::check_only())
    });

    let instrument = match extraction {
        Ok(extraction) => extraction.bundle()?.instrument,
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };

    debug!("Good: {}", path.display());
    Some(manifest_entry(path, root, instrument))
}

/// Validate every saved simulation below `dir` and shuffle the good ones
pub fn postprocess_directory(
    dir: &Path,
    extractor: &SampleExtractor,
    executor: &BoundedMap,
    master_seed: u64,
) -> io::Result<Vec<ManifestEntry>> {
    let files = find_simulation_files(dir)?;
    info!("Validating {} simulations in {}", files.len(), dir.display());

    let mut master = StdRng::seed_from_u64(master_seed);
    let inputs: Vec<(PathBuf, u64)> = files.into_iter().map(|f| (f, master.gen())).collect();

    let mut good: Vec<ManifestEntry> = executor
        .map(inputs, |(path, seed)| {
            validate_saved_simulation(&path, dir, seed, extractor)
        })
        .into_iter()
        .flatten()
        .collect();

    good.shuffle(&mut master);
    Ok(good)
}

/// Full extraction of a saved simulation with previously drawn instrument parameters
pub fn load_training_sample(
    path: &Path,
    extractor: &SampleExtractor,
    instrument: InstrumentParams,
) -> Result<Extraction, ContainerError> {
    SimulationContainer::load(path)?.extract(
        extractor,
        NoiseDraw::Reuse(instrument),
        ExtractOptions::default(),
    )
}
