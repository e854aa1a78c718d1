//! ExPLOI Manifest Tool
//!
//! Writes the study sample metadata and the paired-end read manifest that
//! the import stage feeds to QIIME2.

use anyhow::Result;
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::{manifest, metadata};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct ManifestStats {
    samples: usize,
    metadata_path: PathBuf,
    manifest_path: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-manifest")
        .version("0.1.0")
        .about("Generate study metadata and the paired-end FASTQ manifest")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("raw_dir")
                .short('r')
                .long("raw-dir")
                .value_name("DIRECTORY")
                .help("Raw FASTQ directory (overrides config)"),
        )
        .arg(
            Arg::new("work_dir")
                .short('w')
                .long("work-dir")
                .value_name("DIRECTORY")
                .help("Pipeline output directory (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(dir) = matches.get_one::<String>("raw_dir") {
        config.raw_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.get_one::<String>("work_dir") {
        config.work_dir = PathBuf::from(dir);
    }

    println!("🧬 ExPLOI Manifest Tool");
    println!("Raw reads: {}", config.raw_dir.display());
    println!("Work dir: {}", config.work_dir.display());

    exploi_16s_tools::ensure_dir(&config.work_dir)?;

    let written = metadata::write_metadata(config.metadata_path())?;
    let pairs = manifest::scan_raw_dir(&config.raw_dir)?;
    manifest::write_manifest(&pairs, config.manifest_path())?;

    let stats = ManifestStats {
        samples: pairs.len(),
        metadata_path: config.metadata_path(),
        manifest_path: config.manifest_path(),
    };
    exploi_16s_tools::write_stats_json(&stats, config.work_dir.join("manifest_stats.json"))?;

    println!("✅ Manifest generation complete!");
    println!("📋 Samples in metadata: {}", written);
    println!("📚 Read pairs resolved: {}", pairs.len());
    println!("💾 Metadata: {}", stats.metadata_path.display());
    println!("💾 Manifest: {}", stats.manifest_path.display());

    Ok(())
}
