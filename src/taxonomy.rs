//! Taxonomic classification of representative sequences
//!
//! Classification runs inside QIIME2's sklearn-based classifier against a
//! pre-trained reference artifact (SILVA for this study). The artifact is
//! multi-gigabyte, so its presence is checked before the run starts.

use crate::tools::{export_artifact, ExternalCommand};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REQUIRED_TOOLS: &[&str] = &["qiime"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyReport {
    pub classifier: PathBuf,
    pub taxonomy_tsv: PathBuf,
}

/// Run `classify-sklearn` over the representative sequences
pub fn classify(
    rep_seqs: &Path,
    classifier: &Path,
    taxonomy_qza: &Path,
    threads: usize,
) -> Result<()> {
    if !classifier.is_file() {
        bail!(
            "classifier artifact not found: {} (download the study's SILVA classifier first)",
            classifier.display()
        );
    }
    ExternalCommand::new("qiime")
        .args(["feature-classifier", "classify-sklearn"])
        .arg("--i-classifier")
        .arg_path(classifier)
        .arg("--i-reads")
        .arg_path(rep_seqs)
        .arg("--p-n-jobs")
        .arg(threads.to_string())
        .arg("--o-classification")
        .arg_path(taxonomy_qza)
        .run()
        .context("taxonomic classification failed")
}

/// Export the classification artifact to its flat `taxonomy.tsv`
pub fn export_taxonomy(taxonomy_qza: &Path, out_dir: &Path) -> Result<PathBuf> {
    crate::ensure_dir(out_dir)?;
    export_artifact(taxonomy_qza, out_dir)?;
    let tsv = out_dir.join("taxonomy.tsv");
    if !tsv.is_file() {
        bail!(
            "export of {} produced no taxonomy.tsv",
            taxonomy_qza.display()
        );
    }
    Ok(tsv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_missing_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify(
            &dir.path().join("rep-seqs.qza"),
            &dir.path().join("no-classifier.qza"),
            &dir.path().join("taxonomy.qza"),
            4,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("classifier artifact not found"), "unexpected error: {}", err);
    }
}
