//! Rarefaction depth selection and core diversity metrics
//!
//! Depth selection is the one computation this pipeline owns outright:
//! rarefy to the 10th percentile (nearest rank) of the per-sample read
//! totals that clear a fixed floor, so one shallow library cannot drag
//! every other sample down to its depth. When nothing clears the floor the
//! run is already compromised and the median of all totals is used instead
//! so the metrics still come out for inspection.
//!
//! The metric computation itself is QIIME2's; when the phylogenetic run
//! fails (a degenerate tree will do it) the stage falls back to the
//! phylogeny-free metric set.

use crate::feature_table::FeatureTable;
use crate::tools::{export_artifact, ExternalCommand};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REQUIRED_TOOLS: &[&str] = &["qiime", "biom"];

/// Alpha metrics emitted by the phylogenetic core-metrics pipeline
pub const ALPHA_METRICS_PHYLO: &[&str] =
    &["faith_pd", "shannon", "observed_features", "evenness"];
/// Alpha metrics available without a tree
pub const ALPHA_METRICS_NONPHYLO: &[&str] = &["shannon", "observed_features", "evenness"];

/// Nearest-rank percentile of a sorted slice
fn nearest_rank(sorted: &[u64], percentile: f64) -> u64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.max(1) - 1]
}

fn median(sorted: &[u64]) -> u64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    }
}

/// Pick the rarefaction depth from per-sample read totals.
///
/// Totals at or above `floor` vote via their 10th percentile; if no sample
/// clears the floor the median of all totals is used.
pub fn select_sampling_depth(totals: &[u64], floor: u64) -> Result<u64> {
    if totals.is_empty() {
        bail!("cannot select a sampling depth from an empty feature table");
    }

    let mut eligible: Vec<u64> = totals.iter().copied().filter(|&t| t >= floor).collect();
    if eligible.is_empty() {
        let mut all: Vec<u64> = totals.to_vec();
        all.sort_unstable();
        let depth = median(&all);
        warn!(
            "no sample reached the {} read floor; falling back to the median depth {}",
            floor, depth
        );
        return Ok(depth);
    }

    eligible.sort_unstable();
    let depth = nearest_rank(&eligible, 10.0);
    info!(
        "sampling depth {} chosen from {} of {} samples above the {} read floor",
        depth,
        eligible.len(),
        totals.len(),
        floor
    );
    Ok(depth)
}

/// Depth selection straight from an exported feature-table TSV
pub fn sampling_depth_from_table(table_tsv: &Path, floor: u64) -> Result<u64> {
    let table = FeatureTable::from_tsv(table_tsv)?;
    let totals: Vec<u64> = table.sample_totals().into_iter().map(|(_, t)| t).collect();
    select_sampling_depth(&totals, floor)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityReport {
    pub sampling_depth: u64,
    pub phylogenetic: bool,
    pub alpha_metrics: Vec<String>,
}

fn core_metrics_phylogenetic(
    table_qza: &Path,
    rooted_tree: &Path,
    metadata_tsv: &Path,
    core_dir: &Path,
    depth: u64,
    threads: usize,
) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["diversity", "core-metrics-phylogenetic"])
        .arg("--i-table")
        .arg_path(table_qza)
        .arg("--i-phylogeny")
        .arg_path(rooted_tree)
        .arg("--p-sampling-depth")
        .arg(depth.to_string())
        .arg("--m-metadata-file")
        .arg_path(metadata_tsv)
        .arg("--p-n-jobs-or-threads")
        .arg(threads.to_string())
        .arg("--output-dir")
        .arg_path(core_dir)
        .run()
}

fn core_metrics_nonphylogenetic(
    table_qza: &Path,
    metadata_tsv: &Path,
    core_dir: &Path,
    depth: u64,
    threads: usize,
) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["diversity", "core-metrics"])
        .arg("--i-table")
        .arg_path(table_qza)
        .arg("--p-sampling-depth")
        .arg(depth.to_string())
        .arg("--m-metadata-file")
        .arg_path(metadata_tsv)
        .arg("--p-n-jobs")
        .arg(threads.to_string())
        .arg("--output-dir")
        .arg_path(core_dir)
        .run()
}

/// QIIME2 refuses a pre-existing --output-dir, so stale results are cleared
fn clear_output_dir(core_dir: &Path) -> Result<()> {
    if core_dir.exists() {
        std::fs::remove_dir_all(core_dir)
            .with_context(|| format!("failed to clear {}", core_dir.display()))?;
    }
    Ok(())
}

/// Run core diversity metrics at the given depth, preferring the
/// phylogenetic set and falling back to the phylogeny-free one.
pub fn run_core_metrics(
    table_qza: &Path,
    rooted_tree: &Path,
    metadata_tsv: &Path,
    core_dir: &Path,
    depth: u64,
    threads: usize,
) -> Result<DiversityReport> {
    clear_output_dir(core_dir)?;
    match core_metrics_phylogenetic(table_qza, rooted_tree, metadata_tsv, core_dir, depth, threads)
    {
        Ok(()) => Ok(DiversityReport {
            sampling_depth: depth,
            phylogenetic: true,
            alpha_metrics: ALPHA_METRICS_PHYLO.iter().map(|m| m.to_string()).collect(),
        }),
        Err(err) => {
            warn!(
                "phylogenetic core metrics failed ({}); rerunning without the tree",
                err
            );
            clear_output_dir(core_dir)?;
            core_metrics_nonphylogenetic(table_qza, metadata_tsv, core_dir, depth, threads)?;
            Ok(DiversityReport {
                sampling_depth: depth,
                phylogenetic: false,
                alpha_metrics: ALPHA_METRICS_NONPHYLO
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
            })
        }
    }
}

/// Export each alpha-diversity vector present in `core_dir` to a TSV named
/// after its metric, returning (metric, tsv path) pairs.
pub fn export_alpha_vectors(core_dir: &Path, export_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    crate::ensure_dir(export_dir)?;
    let mut exported = Vec::new();

    for metric in ALPHA_METRICS_PHYLO {
        let vector = core_dir.join(format!("{}_vector.qza", metric));
        if !vector.is_file() {
            continue;
        }
        let scratch = export_dir.join(format!("{}-export", metric));
        export_artifact(&vector, &scratch)?;
        let source = scratch.join("alpha-diversity.tsv");
        if !source.is_file() {
            bail!(
                "export of {} produced no alpha-diversity.tsv",
                vector.display()
            );
        }
        let dest = export_dir.join(format!("{}.tsv", metric));
        std::fs::rename(&source, &dest)
            .with_context(|| format!("failed to move {} into place", source.display()))?;
        exported.push((metric.to_string(), dest));
    }

    if exported.is_empty() {
        bail!("no alpha-diversity vectors found under {}", core_dir.display());
    }
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_tenth_percentile() {
        // 20 eligible samples: nearest-rank 10th percentile is the 2nd smallest
        let totals: Vec<u64> = (1..=20).map(|i| 1000 * i).collect();
        assert_eq!(select_sampling_depth(&totals, 1000).unwrap(), 2000);
    }

    #[test]
    fn test_depth_ignores_sub_floor_samples() {
        // the 120-read negative control must not drag the depth down
        let totals = vec![120, 15_000, 18_000, 22_000, 25_000, 30_000];
        let depth = select_sampling_depth(&totals, 1000).unwrap();
        assert_eq!(depth, 15_000);
    }

    #[test]
    fn test_depth_single_eligible_sample() {
        let totals = vec![500, 800, 12_000];
        assert_eq!(select_sampling_depth(&totals, 1000).unwrap(), 12_000);
    }

    #[test]
    fn test_depth_median_fallback() {
        // nothing clears the floor: median of all totals
        let totals = vec![100, 300, 200];
        assert_eq!(select_sampling_depth(&totals, 1000).unwrap(), 200);
        let totals = vec![100, 400, 200, 300];
        assert_eq!(select_sampling_depth(&totals, 1000).unwrap(), 250);
    }

    #[test]
    fn test_depth_empty_input() {
        assert!(select_sampling_depth(&[], 1000).is_err());
    }

    #[test]
    fn test_metric_sets() {
        assert!(ALPHA_METRICS_PHYLO.contains(&"faith_pd"));
        assert!(!ALPHA_METRICS_NONPHYLO.contains(&"faith_pd"));
        for metric in ALPHA_METRICS_NONPHYLO {
            assert!(ALPHA_METRICS_PHYLO.contains(metric));
        }
    }
}
