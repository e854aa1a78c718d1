//! ExPLOI QC Tool
//!
//! FastQC per file plus a MultiQC roll-up, run once over the raw reads and
//! once over the Trimmomatic output.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::{manifest, qc, tools};
use std::path::PathBuf;

/// Collect the trimmed paired FASTQs left by the trim stage
fn trimmed_files(trimmed_dir: &PathBuf) -> Result<Vec<PathBuf>> {
    if !trimmed_dir.is_dir() {
        bail!(
            "trimmed read directory does not exist (run exploi-trim first): {}",
            trimmed_dir.display()
        );
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(trimmed_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".trimmed.fastq.gz"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-qc")
        .version("0.1.0")
        .about("FastQC + MultiQC quality reports for raw or trimmed reads")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("stage")
                .short('s')
                .long("stage")
                .value_name("STAGE")
                .help("Which read set to report on: raw or trimmed")
                .default_value("raw"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Thread count for FastQC (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }
    let stage = matches.get_one::<String>("stage").unwrap().as_str();

    println!("📊 ExPLOI QC Tool");
    println!("Stage: {}", stage);

    tools::check_requirements(qc::REQUIRED_TOOLS)?;

    let files = match stage {
        "raw" => {
            let pairs = manifest::scan_raw_dir(&config.raw_dir)?;
            pairs
                .iter()
                .flat_map(|p| [p.forward.clone(), p.reverse.clone()])
                .collect()
        }
        "trimmed" => trimmed_files(&config.trimmed_dir())?,
        other => bail!("unknown QC stage '{}', expected raw or trimmed", other),
    };

    let report_dir = config.qc_dir(stage);
    let stats = qc::qc_stage(&files, &report_dir, stage, config.threads)?;
    exploi_16s_tools::write_stats_json(&stats, report_dir.join("qc_stats.json"))?;

    println!("✅ QC pass complete!");
    println!("📚 Files analyzed: {}", stats.files_analyzed);
    println!("💾 Reports: {}", stats.report_dir.display());

    Ok(())
}
