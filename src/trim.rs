//! Adapter and quality trimming via Trimmomatic PE
//!
//! One Trimmomatic invocation per sample pair, with the step list the study
//! settled on: adapter clipping, end trimming at Q3, a 4-base sliding
//! window at Q20, and a length floor that keeps enough of both mates for
//! the downstream merge.

use crate::manifest::ReadPair;
use crate::tools::ExternalCommand;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REQUIRED_TOOLS: &[&str] = &["trimmomatic"];

/// Trimmomatic step parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimParams {
    pub seed_mismatches: u32,
    pub palindrome_clip_threshold: u32,
    pub simple_clip_threshold: u32,
    pub leading: u32,
    pub trailing: u32,
    pub window_size: u32,
    pub window_quality: u32,
    pub min_len: u32,
}

impl Default for TrimParams {
    fn default() -> Self {
        Self {
            seed_mismatches: 2,
            palindrome_clip_threshold: 30,
            simple_clip_threshold: 10,
            leading: 3,
            trailing: 3,
            window_size: 4,
            window_quality: 20,
            min_len: 150,
        }
    }
}

impl TrimParams {
    /// The trailing step arguments of the Trimmomatic command line
    pub fn step_args(&self, adapters: &Path) -> Vec<String> {
        vec![
            format!(
                "ILLUMINACLIP:{}:{}:{}:{}",
                adapters.display(),
                self.seed_mismatches,
                self.palindrome_clip_threshold,
                self.simple_clip_threshold
            ),
            format!("LEADING:{}", self.leading),
            format!("TRAILING:{}", self.trailing),
            format!("SLIDINGWINDOW:{}:{}", self.window_size, self.window_quality),
            format!("MINLEN:{}", self.min_len),
        ]
    }
}

/// Trimmed output pair for one sample; unpaired survivors are kept on disk
/// next to these but play no further part in the pipeline.
#[derive(Debug, Clone)]
pub struct TrimmedPair {
    pub sample_id: String,
    pub forward: PathBuf,
    pub reverse: PathBuf,
}

/// Output file names for one sample, paired and unpaired
pub fn output_paths(out_dir: &Path, sample_id: &str) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    (
        out_dir.join(format!("{}_R1.trimmed.fastq.gz", sample_id)),
        out_dir.join(format!("{}_R1.unpaired.fastq.gz", sample_id)),
        out_dir.join(format!("{}_R2.trimmed.fastq.gz", sample_id)),
        out_dir.join(format!("{}_R2.unpaired.fastq.gz", sample_id)),
    )
}

/// Trim one sample pair
pub fn trim_pair(
    pair: &ReadPair,
    out_dir: &Path,
    adapters: &Path,
    params: &TrimParams,
    threads: usize,
) -> Result<TrimmedPair> {
    let (forward_paired, forward_unpaired, reverse_paired, reverse_unpaired) =
        output_paths(out_dir, &pair.sample_id);

    ExternalCommand::new("trimmomatic")
        .arg("PE")
        .arg("-threads")
        .arg(threads.to_string())
        .arg("-phred33")
        .arg_path(&pair.forward)
        .arg_path(&pair.reverse)
        .arg_path(&forward_paired)
        .arg_path(&forward_unpaired)
        .arg_path(&reverse_paired)
        .arg_path(&reverse_unpaired)
        .args(params.step_args(adapters))
        .run()
        .with_context(|| format!("trimming failed for sample {}", pair.sample_id))?;

    Ok(TrimmedPair {
        sample_id: pair.sample_id.clone(),
        forward: forward_paired,
        reverse: reverse_paired,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimStats {
    pub samples_trimmed: usize,
    pub min_len: u32,
    pub output_dir: PathBuf,
}

/// Trim every sample pair in manifest order
pub fn trim_all(
    pairs: &[ReadPair],
    out_dir: &Path,
    adapters: &Path,
    params: &TrimParams,
    threads: usize,
) -> Result<Vec<TrimmedPair>> {
    crate::ensure_dir(out_dir)?;
    let mut trimmed = Vec::with_capacity(pairs.len());
    for pair in pairs {
        info!("trimming sample {}", pair.sample_id);
        trimmed.push(trim_pair(pair, out_dir, adapters, params, threads)?);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_args() {
        let params = TrimParams::default();
        let steps = params.step_args(Path::new("ref/NexteraPE-PE.fa"));
        assert_eq!(
            steps,
            vec![
                "ILLUMINACLIP:ref/NexteraPE-PE.fa:2:30:10",
                "LEADING:3",
                "TRAILING:3",
                "SLIDINGWINDOW:4:20",
                "MINLEN:150",
            ]
        );
    }

    #[test]
    fn test_output_paths() {
        let (fp, fu, rp, ru) = output_paths(Path::new("analysis/trimmed"), "EXP-05");
        assert_eq!(fp, Path::new("analysis/trimmed/EXP-05_R1.trimmed.fastq.gz"));
        assert_eq!(fu, Path::new("analysis/trimmed/EXP-05_R1.unpaired.fastq.gz"));
        assert_eq!(rp, Path::new("analysis/trimmed/EXP-05_R2.trimmed.fastq.gz"));
        assert_eq!(ru, Path::new("analysis/trimmed/EXP-05_R2.unpaired.fastq.gz"));
    }
}
