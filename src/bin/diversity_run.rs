//! ExPLOI Diversity Tool
//!
//! Chooses the rarefaction depth from the decontaminated table and runs the
//! core diversity metrics, preferring the phylogenetic set.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::decontam::DecontamOutputs;
use exploi_16s_tools::phylogeny::PhylogenyOutputs;
use exploi_16s_tools::{diversity, tools};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-diversity")
        .version("0.1.0")
        .about("Rarefaction depth selection and core diversity metrics")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("sampling_depth")
                .short('d')
                .long("sampling-depth")
                .value_name("READS")
                .help("Rarefaction depth (overrides the automatic choice)"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Thread count for the metric computations (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }

    println!("🌈 ExPLOI Diversity Tool");

    tools::check_requirements(diversity::REQUIRED_TOOLS)?;

    let decontaminated = DecontamOutputs::in_dir(&config.decontam_dir());
    if !decontaminated.table.is_file() {
        bail!(
            "filtered feature table not found (run exploi-decontam first): {}",
            decontaminated.table.display()
        );
    }

    let diversity_dir = config.diversity_dir();
    exploi_16s_tools::ensure_dir(&diversity_dir)?;

    let depth = match matches.get_one::<String>("sampling_depth") {
        Some(depth) => depth.parse()?,
        None => {
            let table_tsv = tools::export_table_to_tsv(
                &decontaminated.table,
                &diversity_dir.join("table-export"),
            )?;
            diversity::sampling_depth_from_table(&table_tsv, config.depth_floor)?
        }
    };
    println!("🎯 Sampling depth: {}", depth);

    let rooted_tree = PhylogenyOutputs::in_dir(&config.phylogeny_dir()).rooted_tree;
    let core_dir = diversity_dir.join("core-metrics");
    let report = diversity::run_core_metrics(
        &decontaminated.table,
        &rooted_tree,
        &config.metadata_path(),
        &core_dir,
        depth,
        config.threads,
    )?;

    let alpha_dir = diversity_dir.join("alpha");
    let exported = diversity::export_alpha_vectors(&core_dir, &alpha_dir)?;
    exploi_16s_tools::write_stats_json(&report, diversity_dir.join("diversity_report.json"))?;

    println!("✅ Diversity metrics complete!");
    if !report.phylogenetic {
        println!("⚠️  Phylogenetic metrics failed; phylogeny-free set computed instead");
    }
    println!("📊 Alpha metrics exported: {}", exported.len());
    println!("💾 Outputs: {}", diversity_dir.display());

    Ok(())
}
