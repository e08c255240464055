//! Randomly draw erosion model parameters, run the model, and keep the runs
//! that a camera would have observed.
//!
//! Accepted runs are saved as JSON under `<output>/v{vv}/rho{dddd}/` and
//! listed in a manifest in the output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use metsim::params::fixed_mask_from_flags;
use metsim::shared_args::SharedBatchArgs;
use metsim::sims::manifest::{manifest_file_name, save_manifest};
use metsim::sims::{generate_simulations, JobGenerator, SampleExtractor};
use metsim::SingleBodyModel;

#[derive(Parser, Debug)]
#[command(
    name = "generate_simulations",
    about = "Randomly generate parameters for the erosion model, run it, and store the results"
)]
struct Args {
    /// Path to the output directory
    output_dir: PathBuf,

    /// Number of accepted simulations to produce
    nsims: usize,

    /// Simulate without erosion
    #[arg(long, default_value_t = false)]
    noerosion: bool,

    /// Ten 0/1 flags, in parameter order, marking parameters fixed at their defaults
    #[arg(long, num_args = 10, value_parser = clap::value_parser!(u8).range(0..=1))]
    fixed: Option<Vec<u8>>,

    /// Maximum number of simulations to run (default: 10 x nsims)
    #[arg(long)]
    max_runs: Option<usize>,

    #[command(flatten)]
    shared: SharedBatchArgs,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let fixed = args
        .fixed
        .as_deref()
        .map(fixed_mask_from_flags)
        .transpose()?;

    let seed = args.shared.master_seed();
    info!("Using random seed: {seed}");

    let progress_style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
        .progress_chars("█▉▊▋▌▍▎▏ ");
    let pb = ProgressBar::new(args.nsims as u64);
    pb.set_style(progress_style);
    pb.set_message("Simulating");

    let executor = args.shared.executor()?.with_progress_bar(pb.clone());
    let extractor = SampleExtractor::new(args.shared.camera);
    let jobs = JobGenerator::new(&args.output_dir, seed, !args.noerosion, fixed);

    info!(
        "Generating {} simulations for the {} camera on {} workers",
        args.nsims,
        args.shared.camera,
        executor.workers()
    );

    let generated = generate_simulations(
        &executor,
        &SingleBodyModel,
        &extractor,
        jobs,
        args.nsims,
        args.max_runs,
    );
    pb.finish_with_message("Simulations complete!");

    let manifest_path = args.output_dir.join(manifest_file_name(extractor.profile()));
    save_manifest(&manifest_path, &generated.results)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    println!(
        "{} of {} requested simulations accepted after {} runs{}",
        generated.results.len(),
        args.nsims,
        generated.attempted,
        if generated.budget_exhausted {
            " (run budget exhausted)"
        } else {
            ""
        }
    );
    println!("Manifest written to {}", manifest_path.display());

    Ok(())
}
