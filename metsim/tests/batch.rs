//! Batch generation, manifests and postprocessing on a scratch directory

mod common;

use std::collections::BTreeSet;
use std::path::Path;

use approx::assert_relative_eq;
use common::{synthetic_run, synthetic_run_with_peak, FaintModel, SyntheticModel};
use metsim::camera::CameraKind;
use metsim::params::fixed_mask_from_flags;
use metsim::sims::batch::find_simulation_files;
use metsim::sims::manifest::{load_manifest, manifest_file_name, save_manifest};
use metsim::sims::{
    generate_simulations, load_training_sample, postprocess_directory, JobGenerator,
    ManifestEntry, SampleExtractor, SimulationContainer, SimulationRun,
};
use metsim::{AblationModel, SimulationConstants};
use shared::algo::BoundedMap;
use tempfile::TempDir;

fn generate(
    dir: &Path,
    seed: u64,
    count: usize,
    erosion: bool,
) -> shared::algo::Generated<ManifestEntry> {
    let executor = BoundedMap::new(2).unwrap().report_every(0);
    let extractor = SampleExtractor::new(CameraKind::Base);
    let jobs = JobGenerator::new(dir, seed, erosion, None);
    generate_simulations(&executor, &SyntheticModel, &extractor, jobs, count, None)
}

/// Visible only for the faster half of the velocity range
struct FastOnlyModel;

impl AblationModel for FastOnlyModel {
    fn simulate(&self, constants: &SimulationConstants) -> SimulationRun {
        if constants.v_init > 41_500.0 {
            synthetic_run()
        } else {
            synthetic_run_with_peak(9.0)
        }
    }
}

fn file_set(entries: &[ManifestEntry]) -> BTreeSet<String> {
    entries.iter().map(|e| e.file.clone()).collect()
}

#[test]
fn test_generate_saves_accepted_runs() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();

    let generated = generate(dir.path(), 42, 4, true);
    assert_eq!(generated.results.len(), 4);
    assert_eq!(generated.attempted, 4);
    assert!(!generated.budget_exhausted);

    for entry in &generated.results {
        let path = dir.path().join(&entry.file);
        assert!(path.is_file(), "{} missing", path.display());
        assert_eq!(Path::new(&entry.file).components().count(), 3);

        let container = SimulationContainer::load(&path).unwrap();
        assert!(container.constants().erosion_on);
        assert!(container.results().is_some());
    }

    assert_eq!(find_simulation_files(dir.path()).unwrap().len(), 4);
}

#[test]
fn test_same_master_seed_same_batch() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();

    let first = generate(a.path(), 7, 3, true);
    let second = generate(b.path(), 7, 3, true);
    assert_eq!(first.results, second.results);

    let other = generate(b.path(), 8, 3, true);
    assert_ne!(file_set(&first.results), file_set(&other.results));
}

#[test]
fn test_no_erosion_batch() {
    let dir = TempDir::new().unwrap();
    let generated = generate(dir.path(), 5, 2, false);

    for entry in &generated.results {
        let container = SimulationContainer::load(&dir.path().join(&entry.file)).unwrap();
        assert!(!container.constants().erosion_on);
        assert_eq!(container.constants().erosion_coeff, 0.0);
    }
}

#[test]
fn test_fixed_parameters_keep_defaults() {
    let dir = TempDir::new().unwrap();
    let fixed = fixed_mask_from_flags(&[1, 0, 0, 1, 0, 0, 0, 0, 0, 0]).unwrap();
    let executor = BoundedMap::new(1).unwrap();
    let extractor = SampleExtractor::new(CameraKind::Base);
    let jobs = JobGenerator::new(dir.path(), 99, true, Some(fixed));

    let generated = generate_simulations(&executor, &SyntheticModel, &extractor, jobs, 3, None);
    assert_eq!(generated.results.len(), 3);

    for entry in &generated.results {
        let container = SimulationContainer::load(&dir.path().join(&entry.file)).unwrap();
        assert_eq!(container.constants().m_init, 2.4671e-6);
        assert_eq!(container.constants().rho, 2000.0);
        assert!(entry.file.starts_with('v'));
    }
}

#[test]
fn test_nothing_visible_stops_after_first_round() {
    let dir = TempDir::new().unwrap();
    let executor = BoundedMap::new(2).unwrap();
    let extractor = SampleExtractor::new(CameraKind::Base);
    let jobs = JobGenerator::new(dir.path(), 1, true, None);

    let generated = generate_simulations(&executor, &FaintModel, &extractor, jobs, 5, None);
    assert!(generated.results.is_empty());
    assert_eq!(generated.attempted, 5);
    assert!(find_simulation_files(dir.path()).unwrap().is_empty());
}

#[test]
fn test_manifest_postprocess_and_training_samples() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let extractor = SampleExtractor::new(CameraKind::Base);

    let generated = generate(dir.path(), 314, 5, true);
    assert_eq!(generated.results.len(), 5);

    // Manifest keeps eight decimals of the instrument draws
    let manifest_path = dir.path().join(manifest_file_name(extractor.profile()));
    save_manifest(&manifest_path, &generated.results).unwrap();
    let loaded = load_manifest(&manifest_path).unwrap();
    assert_eq!(loaded.len(), generated.results.len());
    for (read, written) in loaded.iter().zip(&generated.results) {
        assert_eq!(read.file, written.file);
        assert_relative_eq!(
            read.instrument.starting_lim_mag,
            written.instrument.starting_lim_mag,
            epsilon = 1e-8
        );
        assert_relative_eq!(
            read.instrument.ending_lim_mag,
            written.instrument.ending_lim_mag,
            epsilon = 1e-8
        );
        assert_relative_eq!(read.instrument.len_delay, written.instrument.len_delay, epsilon = 1e-8);
    }

    // Re-validation finds every saved run; the manifest itself is not JSON
    let executor = BoundedMap::new(3).unwrap().report_every(0);
    let good = postprocess_directory(dir.path(), &extractor, &executor, 2718).unwrap();
    assert_eq!(file_set(&good), file_set(&generated.results));

    let again = postprocess_directory(dir.path(), &extractor, &executor, 2718).unwrap();
    assert_eq!(good, again);

    for entry in &loaded {
        let path = dir.path().join(&entry.file);
        let sample = load_training_sample(&path, &extractor, entry.instrument)
            .unwrap()
            .into_sample()
            .expect("accepted run should give a training sample");

        let container = SimulationContainer::load(&path).unwrap();
        assert_eq!(sample.inputs, container.normalized_inputs().unwrap());
        assert_eq!(sample.params.instrument, entry.instrument);
        assert_eq!(sample.data.dim(), (extractor.profile().data_length, 4));
    }
}

#[test]
fn test_surplus_accepted_runs_are_not_saved() {
    let _ = env_logger::builder().is_test(true).try_init();
    let extractor = SampleExtractor::new(CameraKind::Base);
    let executor = BoundedMap::new(8).unwrap().report_every(0);

    let mut full_batches = 0;
    for seed in 0..20 {
        let dir = TempDir::new().unwrap();
        let jobs = JobGenerator::new(dir.path(), seed, true, None);
        let generated =
            generate_simulations(&executor, &FastOnlyModel, &extractor, jobs, 3, None);

        let on_disk = find_simulation_files(dir.path()).unwrap();
        assert_eq!(
            on_disk.len(),
            generated.results.len(),
            "seed {seed}: files on disk differ from accepted runs"
        );
        let on_disk: BTreeSet<String> = on_disk
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(on_disk, file_set(&generated.results));

        if generated.results.len() == 3 {
            full_batches += 1;
        }
    }
    assert!(full_batches >= 8, "only {full_batches} batches reached 3 runs");
}

#[cfg(unix)]
#[test]
fn test_symlinked_directories_are_not_followed() {
    let dir = TempDir::new().unwrap();
    let bucket = dir.path().join("v30");
    std::fs::create_dir_all(&bucket).unwrap();
    std::fs::write(bucket.join("a.json"), "{}").unwrap();
    std::fs::write(bucket.join("notes.txt"), "").unwrap();
    std::os::unix::fs::symlink(dir.path(), bucket.join("loop")).unwrap();

    let files = find_simulation_files(dir.path()).unwrap();
    assert_eq!(files, vec![bucket.join("a.json")]);
}
