//! ExPLOI Pipeline Runner
//!
//! The whole analysis in one command: manifest, QC, trimming, denoising,
//! decontamination, phylogeny, diversity, taxonomy and the final exports,
//! in the order the per-stage tools would run them.

use anyhow::Result;
use clap::{Arg, Command};
use exploi_16s_tools::config::RunConfig;
use exploi_16s_tools::decontam::{self, DecontamReport};
use exploi_16s_tools::denoise::{self, DenoiseOutputs, DenoiseReport};
use exploi_16s_tools::diversity::{self, DiversityReport};
use exploi_16s_tools::manifest::{self, ReadPair};
use exploi_16s_tools::phylogeny::{self, PhylogenyReport};
use exploi_16s_tools::trim::{self, TrimParams};
use exploi_16s_tools::{export, metadata, qc, taxonomy, tools};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct PipelineReport {
    samples: usize,
    denoise: DenoiseReport,
    decontam: DecontamReport,
    phylogeny: PhylogenyReport,
    diversity: DiversityReport,
    features_exported: usize,
}

fn all_required_tools() -> Vec<&'static str> {
    let mut tools: Vec<&str> = Vec::new();
    for set in [
        qc::REQUIRED_TOOLS,
        trim::REQUIRED_TOOLS,
        denoise::REQUIRED_TOOLS,
        decontam::REQUIRED_TOOLS,
        phylogeny::REQUIRED_TOOLS,
        diversity::REQUIRED_TOOLS,
        taxonomy::REQUIRED_TOOLS,
    ] {
        for tool in set {
            if !tools.contains(tool) {
                tools.push(tool);
            }
        }
    }
    tools
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("exploi-pipeline")
        .version("0.1.0")
        .about("Run the full ExPLOI 16S analysis end to end")
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
        .arg(
            Arg::new("preset")
                .short('p')
                .long("preset")
                .value_name("NAME")
                .help("DADA2 truncation preset (overrides config)"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Thread count for all external tools (overrides config)"),
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
    if let Some(preset) = matches.get_one::<String>("preset") {
        config.denoise_preset = preset.clone();
    }
    if let Some(threads) = matches.get_one::<String>("threads") {
        config.threads = threads.parse()?;
    }

    println!("🧬 ExPLOI 16S Pipeline");
    println!("Raw reads: {}", config.raw_dir.display());
    println!("Work dir: {}", config.work_dir.display());
    println!("Threads: {}", config.threads);

    tools::check_requirements(&all_required_tools())?;
    exploi_16s_tools::ensure_dir(&config.work_dir)?;

    // 1. metadata + manifest
    println!("📋 [1/9] Metadata and manifest");
    metadata::write_metadata(config.metadata_path())?;
    let pairs = manifest::scan_raw_dir(&config.raw_dir)?;
    manifest::write_manifest(&pairs, config.manifest_path())?;

    // 2. QC on the raw reads
    println!("📊 [2/9] Raw read QC");
    let raw_files: Vec<PathBuf> = pairs
        .iter()
        .flat_map(|p| [p.forward.clone(), p.reverse.clone()])
        .collect();
    qc::qc_stage(&raw_files, &config.qc_dir("raw"), "raw", config.threads)?;

    // 3. trimming, then QC on the survivors
    println!("✂️  [3/9] Trimming");
    let trim_params = TrimParams::default();
    let trimmed = trim::trim_all(
        &pairs,
        &config.trimmed_dir(),
        &config.adapters,
        &trim_params,
        config.threads,
    )?;
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

    println!("📊 [4/9] Trimmed read QC");
    let trimmed_files: Vec<PathBuf> = trimmed_pairs
        .iter()
        .flat_map(|p| [p.forward.clone(), p.reverse.clone()])
        .collect();
    qc::qc_stage(&trimmed_files, &config.qc_dir("trimmed"), "trimmed", config.threads)?;

    // 4. import + DADA2
    println!("🧬 [5/9] Import and DADA2 denoising");
    let denoise_params = match denoise::preset(&config.denoise_preset) {
        Some(params) => params,
        None => anyhow::bail!(
            "unknown preset '{}', expected one of: {}",
            config.denoise_preset,
            denoise::preset_names().join(", ")
        ),
    };
    let denoise_dir = config.denoise_dir();
    exploi_16s_tools::ensure_dir(&denoise_dir)?;
    let denoised = DenoiseOutputs::in_dir(&denoise_dir);
    denoise::import_reads(&config.trimmed_manifest_path(), &denoised.demux)?;
    denoise::summarize_demux(&denoised.demux, &denoise_dir.join("demux.qzv"))?;
    denoise::denoise(&denoised, &denoise_params, config.threads, &config.tmp_dir())?;
    denoise::tabulate_stats(&denoised.stats, &denoise_dir.join("denoising-stats.qzv"))?;
    let denoise_report = DenoiseReport {
        preset: config.denoise_preset.clone(),
        params: denoise_params,
        expected_overlap: denoise_params.expected_overlap(),
    };

    // 5. decontamination
    println!("🧫 [6/9] Decontamination");
    let decontam_report = decontam::run_decontam(
        &denoised.table,
        &denoised.rep_seqs,
        &config.metadata_path(),
        &config.decontam_dir(),
    )?;
    let decontaminated = decontam::DecontamOutputs::in_dir(&config.decontam_dir());

    // 6. phylogeny
    println!("🌳 [7/9] Phylogeny");
    let phylogeny_report = phylogeny::build_tree(
        &decontaminated.rep_seqs,
        &config.phylogeny_dir(),
        config.threads,
    )?;

    // 7. diversity
    println!("🌈 [8/9] Diversity metrics");
    let diversity_dir = config.diversity_dir();
    exploi_16s_tools::ensure_dir(&diversity_dir)?;
    let table_tsv =
        tools::export_table_to_tsv(&decontaminated.table, &diversity_dir.join("table-export"))?;
    let depth = diversity::sampling_depth_from_table(&table_tsv, config.depth_floor)?;
    let rooted_tree = phylogeny::PhylogenyOutputs::in_dir(&config.phylogeny_dir()).rooted_tree;
    let core_dir = diversity_dir.join("core-metrics");
    let diversity_report = diversity::run_core_metrics(
        &decontaminated.table,
        &rooted_tree,
        &config.metadata_path(),
        &core_dir,
        depth,
        config.threads,
    )?;
    let alpha_dir = diversity_dir.join("alpha");
    let alpha_metrics = diversity::export_alpha_vectors(&core_dir, &alpha_dir)?;

    // 8. taxonomy
    println!("🔬 [9/9] Taxonomy and export");
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

    // 9. final exports
    let export_dir = config.export_dir();
    exploi_16s_tools::ensure_dir(&export_dir)?;
    let feature_tsv =
        tools::export_table_to_tsv(&decontaminated.table, &export_dir.join("table-export"))?;
    let features_exported = export::merge_taxonomy(
        &feature_tsv,
        &taxonomy_tsv,
        &export_dir.join("feature-taxonomy.tsv"),
    )?;
    export::alpha_summary(&alpha_metrics, &export_dir.join("alpha-diversity-summary.tsv"))?;

    let report = PipelineReport {
        samples: pairs.len(),
        denoise: denoise_report,
        decontam: decontam_report,
        phylogeny: phylogeny_report,
        diversity: diversity_report,
        features_exported,
    };
    exploi_16s_tools::write_stats_json(&report, config.work_dir.join("pipeline_report.json"))?;

    println!("✅ Pipeline complete!");
    println!("📚 Samples processed: {}", report.samples);
    println!("🎯 Sampling depth: {}", report.diversity.sampling_depth);
    println!("🧬 ASVs exported: {}", report.features_exported);
    println!("💾 Results: {}", config.export_dir().display());

    Ok(())
}
