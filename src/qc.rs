//! Read quality-control reporting via FastQC and MultiQC
//!
//! The pipeline runs this twice: once over the raw FASTQs and once over the
//! Trimmomatic output, each into its own report directory, so trimming can
//! be judged against the raw baseline.

use crate::tools::ExternalCommand;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tools this stage shells out to
pub const REQUIRED_TOOLS: &[&str] = &["fastqc", "multiqc"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcStats {
    pub stage: String,
    pub files_analyzed: usize,
    pub report_dir: PathBuf,
}

/// Run FastQC over a set of FASTQ files into `out_dir`
pub fn run_fastqc(files: &[PathBuf], out_dir: &Path, threads: usize) -> Result<usize> {
    if files.is_empty() {
        bail!("no FASTQ files given to FastQC");
    }
    crate::ensure_dir(out_dir)?;

    let mut command = ExternalCommand::new("fastqc")
        .arg("--threads")
        .arg(threads.to_string())
        .arg("--outdir")
        .arg_path(out_dir);
    for file in files {
        command = command.arg_path(file);
    }
    command.run()?;
    Ok(files.len())
}

/// Aggregate FastQC outputs under `scan_dir` into one MultiQC report
pub fn run_multiqc(scan_dir: &Path, out_dir: &Path, report_name: &str) -> Result<()> {
    crate::ensure_dir(out_dir)?;
    ExternalCommand::new("multiqc")
        .arg("--force")
        .arg("--filename")
        .arg(report_name)
        .arg("--outdir")
        .arg_path(out_dir)
        .arg_path(scan_dir)
        .run()
}

/// One full QC pass: FastQC per file, then the MultiQC roll-up
pub fn qc_stage(files: &[PathBuf], report_dir: &Path, stage: &str, threads: usize) -> Result<QcStats> {
    let analyzed = run_fastqc(files, report_dir, threads)?;
    run_multiqc(report_dir, report_dir, &format!("multiqc_{}", stage))?;
    Ok(QcStats {
        stage: stage.to_string(),
        files_analyzed: analyzed,
        report_dir: report_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fastqc_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_fastqc(&[], dir.path(), 4).is_err());
    }
}
