//! ExPLOI Decontamination Tool
//!
//! Subtracts negative-control ASVs from the denoised feature table, or
//! carries the table forward unchanged when the control kept no reads.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::decontam::{self, DecontamOutcome};
use exploi_16s_tools::denoise::DenoiseOutputs;
use exploi_16s_tools::tools;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-decontam")
        .version("0.1.0")
        .about("Remove negative-control ASVs from the feature table")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let config = RunConfig::load_or_default(config_path.as_deref())?;

    println!("🧫 ExPLOI Decontamination Tool");

    tools::check_requirements(decontam::REQUIRED_TOOLS)?;

    let denoised = DenoiseOutputs::in_dir(&config.denoise_dir());
    if !denoised.table.is_file() {
        bail!(
            "denoised feature table not found (run exploi-denoise first): {}",
            denoised.table.display()
        );
    }
    let metadata = config.metadata_path();
    if !metadata.is_file() {
        bail!(
            "metadata not found (run exploi-manifest first): {}",
            metadata.display()
        );
    }

    let report = decontam::run_decontam(
        &denoised.table,
        &denoised.rep_seqs,
        &metadata,
        &config.decontam_dir(),
    )?;
    exploi_16s_tools::write_stats_json(
        &report,
        config.decontam_dir().join("decontam_report.json"),
    )?;

    println!("✅ Decontamination complete!");
    match report.outcome {
        DecontamOutcome::Subtracted => {
            println!("🧹 Contaminant ASVs removed: {}", report.contaminants_removed)
        }
        DecontamOutcome::ControlEmpty => {
            println!("ℹ️  Negative control kept no reads; table carried forward unchanged")
        }
        DecontamOutcome::ControlClean => {
            println!("ℹ️  Negative control contained no ASVs; nothing to subtract")
        }
    }
    println!("💾 Outputs: {}", config.decontam_dir().display());

    Ok(())
}
