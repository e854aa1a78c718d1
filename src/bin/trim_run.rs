//! ExPLOI Trimming Tool
//!
//! Trimmomatic PE over every sample pair in the manifest, then a second
//! manifest pointing at the trimmed pairs for the import stage.

use anyhow::Result;
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::manifest::{self, ReadPair};
use exploi_16s_tools::tools;
use exploi_16s_tools::trim::{self, TrimParams, TrimStats};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-trim")
        .version("0.1.0")
        .about("Adapter and quality trimming via Trimmomatic PE")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("adapters")
                .short('a')
                .long("adapters")
                .value_name("FASTA")
                .help("Adapter FASTA for ILLUMINACLIP (overrides config)"),
        )
        .arg(
            Arg::new("min_len")
                .short('m')
                .long("min-len")
                .value_name("BP")
                .help("Minimum read length kept after trimming")
                .default_value("150"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Thread count for Trimmomatic (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(adapters) = matches.get_one::<String>("adapters") {
        config.adapters = PathBuf::from(adapters);
    }
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }

    let params = TrimParams {
        min_len: matches.get_one::<String>("min_len").unwrap().parse()?,
        ..TrimParams::default()
    };

    println!("✂️  ExPLOI Trimming Tool");
    println!("Adapters: {}", config.adapters.display());
    println!("Min length: {}", params.min_len);

    tools::check_requirements(trim::REQUIRED_TOOLS)?;

    let pairs = manifest::scan_raw_dir(&config.raw_dir)?;
    let trimmed = trim::trim_all(
        &pairs,
        &config.trimmed_dir(),
        &config.adapters,
        &params,
        config.threads,
    )?;

    // re-manifest the trimmed pairs for the import stage
    let trimmed_pairs: Vec<ReadPair> = trimmed
        .iter()
        .map(|t| {
            Ok(ReadPair {
                sample_id: t.sample_id.clone(),
                forward: std::fs::canonicalize(&t.forward)?,
                reverse: std::fs::canonicalize(&t.reverse)?,
            })
        })
        .collect::<Result<_>>()?;
    manifest::write_manifest(&trimmed_pairs, config.trimmed_manifest_path())?;

    let stats = TrimStats {
        samples_trimmed: trimmed.len(),
        min_len: params.min_len,
        output_dir: config.trimmed_dir(),
    };
    exploi_16s_tools::write_stats_json(&stats, config.trimmed_dir().join("trim_stats.json"))?;

    println!("✅ Trimming complete!");
    println!("📚 Samples trimmed: {}", stats.samples_trimmed);
    println!("💾 Trimmed reads: {}", stats.output_dir.display());
    println!("💾 Trimmed manifest: {}", config.trimmed_manifest_path().display());

    Ok(())
}
