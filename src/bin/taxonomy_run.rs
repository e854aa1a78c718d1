//! ExPLOI Taxonomy Tool
//!
//! Classifies the decontaminated representative sequences against the
//! study's pre-trained SILVA classifier.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::decontam::DecontamOutputs;
use exploi_16s_tools::{taxonomy, tools};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-taxonomy")
        .version("0.1.0")
        .about("Taxonomic classification of representative sequences")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Run configuration file"),
        )
        .arg(
            Arg::new("classifier")
                .short('C')
                .long("classifier")
                .value_name("QZA")
                .help("Pre-trained classifier artifact (overrides config)"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Worker count for the classifier (overrides config)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = RunConfig::load_or_default(config_path.as_deref())?;
    if let Some(classifier) = matches.get_one::<String>("classifier") {
        config.classifier = PathBuf::from(classifier);
    }
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }

    println!("🔬 ExPLOI Taxonomy Tool");
    println!("Classifier: {}", config.classifier.display());

    tools::check_requirements(taxonomy::REQUIRED_TOOLS)?;

    let decontaminated = DecontamOutputs::in_dir(&config.decontam_dir());
    if !decontaminated.rep_seqs.is_file() {
        bail!(
            "filtered representative sequences not found (run exploi-decontam first): {}",
            decontaminated.rep_seqs.display()
        );
    }

    let taxonomy_dir = config.taxonomy_dir();
    exploi_16s_tools::ensure_dir(&taxonomy_dir)?;
    let taxonomy_qza = taxonomy_dir.join("taxonomy.qza");

    taxonomy::classify(
        &decontaminated.rep_seqs,
        &config.classifier,
        &taxonomy_qza,
        config.threads,
    )?;
    let taxonomy_tsv = taxonomy::export_taxonomy(&taxonomy_qza, &taxonomy_dir)?;

    let report = taxonomy::TaxonomyReport {
        classifier: config.classifier.clone(),
        taxonomy_tsv: taxonomy_tsv.clone(),
    };
    exploi_16s_tools::write_stats_json(&report, taxonomy_dir.join("taxonomy_report.json"))?;

    println!("✅ Classification complete!");
    println!("💾 Taxonomy table: {}", taxonomy_tsv.display());

    Ok(())
}
