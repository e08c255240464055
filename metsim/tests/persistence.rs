//! Saving and loading simulation containers

mod common;

use common::{instrument, SyntheticModel};
use metsim::camera::CameraKind;
use metsim::sims::{
    ContainerError, ExtractOptions, Extraction, NoiseDraw, SampleExtractor, SimulationContainer,
    SimulationRun,
};
use metsim::{AblationModel, PhysicalParam, SimulationConstants};
use tempfile::TempDir;

/// Synthetic run preceded by one sample with no light at all
struct DarkStartModel;

impl AblationModel for DarkStartModel {
    fn simulate(&self, _constants: &SimulationConstants) -> SimulationRun {
        let run = common::synthetic_run();
        let mut dark = SimulationRun::with_capacity(run.len() + 1);
        dark.push(-0.01, f64::INFINITY, 120_200.0, -300.0);
        for i in 0..run.len() {
            dark.push(
                run.time()[i],
                run.abs_magnitude()[i],
                run.brightest_height()[i],
                run.brightest_length()[i],
            );
        }
        dark
    }
}

#[test]
fn test_save_and_load_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();

    let mut container = SimulationContainer::new(dir.path(), 2024, None).unwrap();
    container.run(&SyntheticModel);
    let path = container.save().unwrap();

    assert!(path.starts_with(dir.path()));
    assert_eq!(path, container.output_path().unwrap());
    assert_eq!(
        path.file_name().unwrap().to_string_lossy(),
        format!("{}.json", container.file_name())
    );

    let loaded = SimulationContainer::load(&path).unwrap();
    assert_eq!(loaded.output_dir(), dir.path());
    assert_eq!(loaded.seed(), 2024);
    assert_eq!(loaded.file_name(), container.file_name());
    assert_eq!(loaded.params(), container.params());
    assert_eq!(loaded.constants(), container.constants());
    assert_eq!(loaded.results(), container.results());
    assert_eq!(
        loaded.normalized_inputs().unwrap(),
        container.normalized_inputs().unwrap()
    );
}

#[test]
fn test_bucket_directory_matches_parameters() {
    let dir = TempDir::new().unwrap();
    let mut container = SimulationContainer::new(dir.path(), 3, None).unwrap();
    container.run(&SyntheticModel);
    let path = container.save().unwrap();

    let v = container.params().value(PhysicalParam::InitialVelocity).unwrap();
    let rho = container.params().value(PhysicalParam::BulkDensity).unwrap();
    let bucket = path.parent().unwrap();
    assert_eq!(
        bucket.file_name().unwrap().to_string_lossy(),
        format!("rho{:04}", 100 * (rho as u32 / 100))
    );
    assert_eq!(
        bucket.parent().unwrap().file_name().unwrap().to_string_lossy(),
        format!("v{:02}", ((v / 10.0).round() / 100.0) as u32)
    );
}

#[test]
fn test_infinite_magnitudes_survive_json() {
    let dir = TempDir::new().unwrap();
    let mut container = SimulationContainer::new(dir.path(), 11, None).unwrap();
    container.run(&DarkStartModel);
    let path = container.save().unwrap();

    let loaded = SimulationContainer::load(&path).unwrap();
    let run = loaded.results().unwrap();
    assert!(!run.abs_magnitude()[0].is_finite());
    assert_eq!(run.len(), 202);

    // Non-finite samples take the faintest finite magnitude and stay invisible
    let extraction = loaded
        .extract(
            &SampleExtractor::new(CameraKind::Base),
            NoiseDraw::Reuse(instrument(8.0, 8.0, 0.1)),
            ExtractOptions::default(),
        )
        .unwrap();
    assert!(matches!(extraction, Extraction::Sample(_)));
}

#[test]
fn test_extract_before_run_is_an_error() {
    let container = SimulationContainer::new("unused", 1, None).unwrap();
    let result = container.extract(
        &SampleExtractor::new(CameraKind::Base),
        NoiseDraw::Reuse(instrument(8.0, 8.0, 0.1)),
        ExtractOptions::default(),
    );
    assert!(matches!(result, Err(ContainerError::NotRun(_))));
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = SimulationContainer::load(&dir.path().join("v30/rho2000/missing.json"));
    assert!(matches!(result, Err(ContainerError::Io { .. })));
}
