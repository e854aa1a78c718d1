//! ExPLOI Export Tool
//!
//! Flattens the final artifacts into the two TSVs the downstream
//! statistical analysis consumes: ASV counts merged with taxonomy, and the
//! alpha-diversity summary with the study group column.

use anyhow::{bail, Result};
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::decontam::DecontamOutputs;
use exploi_16s_tools::{diversity, export, tools};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct ExportStats {
    features_exported: usize,
    samples_summarized: usize,
    feature_taxonomy_tsv: PathBuf,
    alpha_summary_tsv: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-export")
        .version("0.1.0")
        .about("Export merged feature/taxonomy and alpha-diversity TSVs")
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

    println!("📦 ExPLOI Export Tool");

    tools::check_requirements(&["qiime", "biom"])?;

    let decontaminated = DecontamOutputs::in_dir(&config.decontam_dir());
    if !decontaminated.table.is_file() {
        bail!(
            "filtered feature table not found (run exploi-decontam first): {}",
            decontaminated.table.display()
        );
    }
    let taxonomy_tsv = config.taxonomy_dir().join("taxonomy.tsv");
    if !taxonomy_tsv.is_file() {
        bail!(
            "taxonomy table not found (run exploi-taxonomy first): {}",
            taxonomy_tsv.display()
        );
    }

    let export_dir = config.export_dir();
    exploi_16s_tools::ensure_dir(&export_dir)?;

    let feature_tsv =
        tools::export_table_to_tsv(&decontaminated.table, &export_dir.join("table-export"))?;
    let merged_tsv = export_dir.join("feature-taxonomy.tsv");
    let features = export::merge_taxonomy(&feature_tsv, &taxonomy_tsv, &merged_tsv)?;

    // collect whichever alpha metrics the diversity stage managed to export
    let alpha_dir = config.diversity_dir().join("alpha");
    let metrics: Vec<(String, PathBuf)> = diversity::ALPHA_METRICS_PHYLO
        .iter()
        .map(|metric| (metric.to_string(), alpha_dir.join(format!("{}.tsv", metric))))
        .filter(|(_, path)| path.is_file())
        .collect();
    if metrics.is_empty() {
        bail!(
            "no alpha-diversity tables found under {} (run exploi-diversity first)",
            alpha_dir.display()
        );
    }
    let alpha_tsv = export_dir.join("alpha-diversity-summary.tsv");
    let samples = export::alpha_summary(&metrics, &alpha_tsv)?;

    let stats = ExportStats {
        features_exported: features,
        samples_summarized: samples,
        feature_taxonomy_tsv: merged_tsv,
        alpha_summary_tsv: alpha_tsv,
    };
    exploi_16s_tools::write_stats_json(&stats, export_dir.join("export_stats.json"))?;

    println!("✅ Export complete!");
    println!("🧬 ASVs exported: {}", stats.features_exported);
    println!("📊 Samples summarized: {}", stats.samples_summarized);
    println!("💾 Feature/taxonomy table: {}", stats.feature_taxonomy_tsv.display());
    println!("💾 Alpha summary: {}", stats.alpha_summary_tsv.display());

    Ok(())
}
