//! ExPLOI Denoise Tool
//!
//! Imports the trimmed read manifest and runs DADA2 denoise-paired with a
//! named truncation preset or explicit truncation lengths.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::denoise::{self, DenoiseOutputs, DenoiseParams, DenoiseReport};
use exploi_16s_tools::tools;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-denoise")
        .version("0.1.0")
        .about("Import trimmed reads and denoise with DADA2")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("preset")
                .short('p')
                .long("preset")
                .value_name("NAME")
                .help("Truncation preset (default, gentle, strict, no-trunc)"),
        )
        .arg(
            Arg::new("trunc_len_f")
                .long("trunc-len-f")
                .value_name("BP")
                .help("Forward truncation length (overrides preset)"),
        )
        .arg(
            Arg::new("trunc_len_r")
                .long("trunc-len-r")
                .value_name("BP")
                .help("Reverse truncation length (overrides preset)"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Thread count for DADA2 (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }

    let preset_name = matches
        .get_one::<String>("preset")
        .cloned()
        .unwrap_or_else(|| config.denoise_preset.clone());
    let mut params = match denoise::preset(&preset_name) {
        Some(params) => params,
        None => bail!(
            "unknown preset '{}', expected one of: {}",
            preset_name,
            denoise::preset_names().join(", ")
        ),
    };
    if let Some(trunc) = matches.get_one::<String>("trunc_len_f") {
        params.trunc_len_f = trunc.parse()?;
    }
    if let Some(trunc) = matches.get_one::<String>("trunc_len_r") {
        params.trunc_len_r = trunc.parse()?;
    }

    println!("🧬 ExPLOI Denoise Tool");
    println!("Preset: {}", preset_name);
    println!(
        "Truncation: {}F/{}R, trim-left {}F/{}R",
        params.trunc_len_f, params.trunc_len_r, params.trim_left_f, params.trim_left_r
    );
    println!("Expected merge overlap: {} bp", params.expected_overlap());

    tools::check_requirements(denoise::REQUIRED_TOOLS)?;

    let manifest = config.trimmed_manifest_path();
    if !manifest.is_file() {
        bail!(
            "trimmed manifest not found (run exploi-trim first): {}",
            manifest.display()
        );
    }

    let denoise_dir = config.denoise_dir();
    exploi_16s_tools::ensure_dir(&denoise_dir)?;
    let outputs = DenoiseOutputs::in_dir(&denoise_dir);

    denoise::import_reads(&manifest, &outputs.demux)?;
    denoise::summarize_demux(&outputs.demux, &denoise_dir.join("demux.qzv"))?;
    denoise::denoise(&outputs, &params, config.threads, &config.tmp_dir())?;
    denoise::tabulate_stats(&outputs.stats, &denoise_dir.join("denoising-stats.qzv"))?;

    let report = DenoiseReport {
        preset: preset_name,
        params,
        expected_overlap: params.expected_overlap(),
    };
    exploi_16s_tools::write_stats_json(&report, denoise_dir.join("denoise_report.json"))?;

    println!("✅ Denoising complete!");
    println!("💾 Feature table: {}", outputs.table.display());
    println!("💾 Representative sequences: {}", outputs.rep_seqs.display());

    Ok(())
}
