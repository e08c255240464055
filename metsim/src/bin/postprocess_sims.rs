//! Check that the saved simulations in a directory pass the camera quality
//! cuts and write the list of usable ones for training.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use metsim::shared_args::SharedBatchArgs;
use metsim::sims::batch::find_simulation_files;
use metsim::sims::manifest::{manifest_file_name, save_manifest};
use metsim::sims::{postprocess_directory, SampleExtractor};

#[derive(Parser, Debug)]
#[command(
    name = "postprocess_sims",
    about = "Validate saved simulations and write a manifest of the ones to use for training"
)]
struct Args {
    /// Directory with the saved simulations (searched recursively)
    dir_path: PathBuf,

    #[command(flatten)]
    shared: SharedBatchArgs,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let seed = args.shared.master_seed();
    info!("Using random seed: {seed}");

    let total = find_simulation_files(&args.dir_path)
        .with_context(|| format!("listing {}", args.dir_path.display()))?
        .len();

    let progress_style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
        .progress_chars("█▉▊▋▌▍▎▏ ");
    let pb = ProgressBar::new(total as u64);
    pb.set_style(progress_style);
    pb.set_message("Validating");

    let executor = args.shared.executor()?.with_progress_bar(pb.clone());
    let extractor = SampleExtractor::new(args.shared.camera);

    let good = postprocess_directory(&args.dir_path, &extractor, &executor, seed)
        .with_context(|| format!("postprocessing {}", args.dir_path.display()))?;
    pb.finish_with_message("Validation complete!");

    let manifest_name = manifest_file_name(extractor.profile());
    let manifest_path = args.dir_path.join(&manifest_name);
    save_manifest(&manifest_path, &good)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    println!("{} of {} entries saved to {}", good.len(), total, manifest_name);

    Ok(())
}
