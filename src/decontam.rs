//! Negative-control based decontamination
//!
//! Every ASV that shows up in the library negative control is treated as a
//! contaminant and subtracted from the feature table and representative
//! sequences. A well-behaved control often loses every read to the DADA2
//! filters, in which case the sample-filter step exits non-zero; the stage
//! then carries the table forward unmodified rather than failing the run.

use crate::feature_table::FeatureTable;
use crate::tools::{export_table_to_tsv, ExternalCommand};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const REQUIRED_TOOLS: &[&str] = &["qiime", "biom"];

/// How the stage resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecontamOutcome {
    /// Contaminant ASVs were identified and subtracted
    Subtracted,
    /// The control retained no reads; table carried forward unmodified
    ControlEmpty,
    /// The control survived filtering but contained no ASVs
    ControlClean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecontamReport {
    pub outcome: DecontamOutcome,
    pub contaminants_removed: usize,
}

/// Artifact paths produced by this stage
#[derive(Debug, Clone)]
pub struct DecontamOutputs {
    pub control_table: PathBuf,
    pub exclusion_list: PathBuf,
    pub table: PathBuf,
    pub rep_seqs: PathBuf,
}

impl DecontamOutputs {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            control_table: dir.join("control-table.qza"),
            exclusion_list: dir.join("contaminants.tsv"),
            table: dir.join("filtered-table.qza"),
            rep_seqs: dir.join("filtered-rep-seqs.qza"),
        }
    }
}

/// Write the contaminant ids as a QIIME2 feature metadata file
pub fn write_exclusion_list(ids: &[String], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "feature-id")?;
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}

fn passthrough(source: &Path, dest: &Path) -> Result<()> {
    std::fs::copy(source, dest).with_context(|| {
        format!(
            "failed to carry {} forward to {}",
            source.display(),
            dest.display()
        )
    })?;
    Ok(())
}

/// Run the decontamination stage.
///
/// `metadata_tsv` must contain the `group` column written by the metadata
/// stage; the control is selected with a `[group]='Negative_Control'` query.
pub fn run_decontam(
    table_qza: &Path,
    rep_seqs_qza: &Path,
    metadata_tsv: &Path,
    out_dir: &Path,
) -> Result<DecontamReport> {
    crate::ensure_dir(out_dir)?;
    let outputs = DecontamOutputs::in_dir(out_dir);

    let control_filter = ExternalCommand::new("qiime")
        .args(["feature-table", "filter-samples"])
        .arg("--i-table")
        .arg_path(table_qza)
        .arg("--m-metadata-file")
        .arg_path(metadata_tsv)
        .arg("--p-where")
        .arg("[group]='Negative_Control'")
        .arg("--o-filtered-table")
        .arg_path(&outputs.control_table)
        .run();

    if let Err(err) = control_filter {
        warn!(
            "negative control kept no reads ({}); carrying the table forward undecontaminated",
            err
        );
        passthrough(table_qza, &outputs.table)?;
        passthrough(rep_seqs_qza, &outputs.rep_seqs)?;
        return Ok(DecontamReport {
            outcome: DecontamOutcome::ControlEmpty,
            contaminants_removed: 0,
        });
    }

    let control_export = out_dir.join("control-export");
    let control_tsv = export_table_to_tsv(&outputs.control_table, &control_export)?;
    let contaminants = FeatureTable::from_tsv(&control_tsv)?.nonzero_features();

    if contaminants.is_empty() {
        info!("negative control contains no ASVs, nothing to subtract");
        passthrough(table_qza, &outputs.table)?;
        passthrough(rep_seqs_qza, &outputs.rep_seqs)?;
        return Ok(DecontamReport {
            outcome: DecontamOutcome::ControlClean,
            contaminants_removed: 0,
        });
    }

    info!(
        "subtracting {} contaminant ASV(s) found in the negative control",
        contaminants.len()
    );
    write_exclusion_list(&contaminants, &outputs.exclusion_list)?;

    ExternalCommand::new("qiime")
        .args(["feature-table", "filter-features"])
        .arg("--i-table")
        .arg_path(table_qza)
        .arg("--m-metadata-file")
        .arg_path(&outputs.exclusion_list)
        .arg("--p-exclude-ids")
        .arg("--o-filtered-table")
        .arg_path(&outputs.table)
        .run()
        .context("contaminant subtraction from the feature table failed")?;

    ExternalCommand::new("qiime")
        .args(["feature-table", "filter-seqs"])
        .arg("--i-data")
        .arg_path(rep_seqs_qza)
        .arg("--m-metadata-file")
        .arg_path(&outputs.exclusion_list)
        .arg("--p-exclude-ids")
        .arg("--o-filtered-data")
        .arg_path(&outputs.rep_seqs)
        .run()
        .context("contaminant subtraction from the representative sequences failed")?;

    Ok(DecontamReport {
        outcome: DecontamOutcome::Subtracted,
        contaminants_removed: contaminants.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_list_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contaminants.tsv");
        let ids = vec!["asv0001".to_string(), "asv0042".to_string()];
        write_exclusion_list(&ids, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "feature-id\nasv0001\nasv0042\n");
    }

    #[test]
    fn test_passthrough_copies_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("table.qza");
        let dest = dir.path().join("filtered-table.qza");
        std::fs::write(&source, b"artifact-bytes").unwrap();

        passthrough(&source, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"artifact-bytes");
    }

    #[test]
    fn test_outcome_serialization() {
        let report = DecontamReport {
            outcome: DecontamOutcome::ControlEmpty,
            contaminants_removed: 0,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"control_empty\""), "unexpected json: {}", json);
    }
}
