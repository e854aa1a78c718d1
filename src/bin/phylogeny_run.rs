//! ExPLOI Phylogeny Tool
//!
//! Builds the rooted tree the phylogenetic diversity metrics need.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::decontam::DecontamOutputs;
use exploi_16s_tools::tools;
use exploi_16s_tools::phylogeny;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-phylogeny")
        .version("0.1.0")
        .about("Align representative sequences and build a rooted tree")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Thread count for MAFFT/FastTree (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }

    println!("🌳 ExPLOI Phylogeny Tool");

    tools::check_requirements(phylogeny::REQUIRED_TOOLS)?;

    let decontaminated = DecontamOutputs::in_dir(&config.decontam_dir());
    if !decontaminated.rep_seqs.is_file() {
        bail!(
            "filtered representative sequences not found (run exploi-decontam first): {}",
            decontaminated.rep_seqs.display()
        );
    }

    let report = phylogeny::build_tree(
        &decontaminated.rep_seqs,
        &config.phylogeny_dir(),
        config.threads,
    )?;
    exploi_16s_tools::write_stats_json(
        &report,
        config.phylogeny_dir().join("phylogeny_report.json"),
    )?;

    println!("✅ Tree construction complete!");
    if report.used_parttree_fallback {
        println!("⚠️  Default alignment failed; tree built with MAFFT parttree");
    }
    println!("💾 Outputs: {}", config.phylogeny_dir().display());

    Ok(())
}
