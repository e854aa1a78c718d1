//! Import and DADA2 denoising
//!
//! The V3-V4 amplicon leaves little room between read truncation and pair
//! merging: the 341F/805R product is ~465 bp, so on a 2x300 run every base
//! truncated from either mate comes straight out of the merge overlap.
//! Earlier rounds of the study trialled several truncation settings before
//! converging; those live on here as named presets, and the expected
//! overlap for whatever setting is chosen is computed up front so an
//! infeasible combination is flagged before DADA2 spends hours on it.

use crate::tools::ExternalCommand;
use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REQUIRED_TOOLS: &[&str] = &["qiime"];

/// Read length of the sequencing run (2x300 MiSeq)
pub const READ_LEN: u32 = 300;
/// 341F-805R amplicon length including primers
pub const AMPLICON_LEN: u32 = 465;
/// 341F primer length, removed via --p-trim-left-f
pub const PRIMER_F_LEN: u32 = 17;
/// 805R primer length, removed via --p-trim-left-r
pub const PRIMER_R_LEN: u32 = 21;

/// DADA2 needs at least this much overlap to merge a pair at all
pub const MIN_MERGE_OVERLAP: i64 = 12;
/// Below this the merge survives but mismatch rejection gets aggressive
pub const RECOMMENDED_OVERLAP: i64 = 20;

/// Trim/truncation settings for one `dada2 denoise-paired` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenoiseParams {
    pub trim_left_f: u32,
    pub trim_left_r: u32,
    /// 0 disables truncation (full read length)
    pub trunc_len_f: u32,
    pub trunc_len_r: u32,
}

/// The truncation settings trialled over the course of the study
pub const PRESETS: &[(&str, DenoiseParams)] = &[
    (
        "default",
        DenoiseParams { trim_left_f: PRIMER_F_LEN, trim_left_r: PRIMER_R_LEN, trunc_len_f: 280, trunc_len_r: 220 },
    ),
    (
        "gentle",
        DenoiseParams { trim_left_f: PRIMER_F_LEN, trim_left_r: PRIMER_R_LEN, trunc_len_f: 290, trunc_len_r: 240 },
    ),
    (
        "strict",
        DenoiseParams { trim_left_f: PRIMER_F_LEN, trim_left_r: PRIMER_R_LEN, trunc_len_f: 260, trunc_len_r: 200 },
    ),
    (
        "no-trunc",
        DenoiseParams { trim_left_f: PRIMER_F_LEN, trim_left_r: PRIMER_R_LEN, trunc_len_f: 0, trunc_len_r: 0 },
    ),
];

pub fn preset(name: &str) -> Option<DenoiseParams> {
    PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, params)| *params)
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(n, _)| *n).collect()
}

impl DenoiseParams {
    fn effective_len(trunc: u32, trim_left: u32) -> u32 {
        let kept = if trunc == 0 { READ_LEN } else { trunc };
        kept.saturating_sub(trim_left)
    }

    /// Bases of read-pair overlap DADA2 will have available when merging,
    /// negative when the truncated mates cannot span the amplicon.
    pub fn expected_overlap(&self) -> i64 {
        let forward = Self::effective_len(self.trunc_len_f, self.trim_left_f) as i64;
        let reverse = Self::effective_len(self.trunc_len_r, self.trim_left_r) as i64;
        let insert = (AMPLICON_LEN - self.trim_left_f - self.trim_left_r) as i64;
        forward + reverse - insert
    }

    /// Reject settings that cannot merge; warn on settings that barely can
    pub fn validate(&self) -> Result<()> {
        let overlap = self.expected_overlap();
        if overlap < MIN_MERGE_OVERLAP {
            bail!(
                "truncation {}F/{}R leaves {} bp of overlap for a {} bp amplicon; \
                 DADA2 needs at least {} bp to merge pairs",
                self.trunc_len_f,
                self.trunc_len_r,
                overlap,
                AMPLICON_LEN,
                MIN_MERGE_OVERLAP
            );
        }
        if overlap < RECOMMENDED_OVERLAP {
            warn!(
                "truncation {}F/{}R leaves only {} bp of merge overlap; \
                 expect elevated pair-merge losses",
                self.trunc_len_f, self.trunc_len_r, overlap
            );
        }
        Ok(())
    }
}

/// Artifact paths produced by the denoise stage
#[derive(Debug, Clone)]
pub struct DenoiseOutputs {
    pub demux: PathBuf,
    pub table: PathBuf,
    pub rep_seqs: PathBuf,
    pub stats: PathBuf,
}

impl DenoiseOutputs {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            demux: dir.join("demux.qza"),
            table: dir.join("table.qza"),
            rep_seqs: dir.join("rep-seqs.qza"),
            stats: dir.join("denoising-stats.qza"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseReport {
    pub preset: String,
    pub params: DenoiseParams,
    pub expected_overlap: i64,
}

/// Import the paired-end manifest into a demultiplexed artifact
pub fn import_reads(manifest: &Path, demux_qza: &Path) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["tools", "import"])
        .arg("--type")
        .arg("SampleData[PairedEndSequencesWithQuality]")
        .arg("--input-path")
        .arg_path(manifest)
        .arg("--output-path")
        .arg_path(demux_qza)
        .arg("--input-format")
        .arg("PairedEndFastqManifestPhred33V2")
        .run()
        .context("import of the read manifest failed")
}

/// Per-sample read-quality visualization of the imported reads
pub fn summarize_demux(demux_qza: &Path, out_qzv: &Path) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["demux", "summarize"])
        .arg("--i-data")
        .arg_path(demux_qza)
        .arg("--o-visualization")
        .arg_path(out_qzv)
        .run()
}

/// Run `dada2 denoise-paired` with the given truncation settings.
///
/// DADA2 spills large intermediates to TMPDIR, which on the study cluster
/// must live on scratch rather than the default /tmp.
pub fn denoise(
    outputs: &DenoiseOutputs,
    params: &DenoiseParams,
    threads: usize,
    tmp_dir: &Path,
) -> Result<()> {
    params.validate()?;
    crate::ensure_dir(tmp_dir)?;
    ExternalCommand::new("qiime")
        .env("TMPDIR", &tmp_dir.to_string_lossy())
        .args(["dada2", "denoise-paired"])
        .arg("--i-demultiplexed-seqs")
        .arg_path(&outputs.demux)
        .arg("--p-trim-left-f")
        .arg(params.trim_left_f.to_string())
        .arg("--p-trim-left-r")
        .arg(params.trim_left_r.to_string())
        .arg("--p-trunc-len-f")
        .arg(params.trunc_len_f.to_string())
        .arg("--p-trunc-len-r")
        .arg(params.trunc_len_r.to_string())
        .arg("--p-n-threads")
        .arg(threads.to_string())
        .arg("--o-table")
        .arg_path(&outputs.table)
        .arg("--o-representative-sequences")
        .arg_path(&outputs.rep_seqs)
        .arg("--o-denoising-stats")
        .arg_path(&outputs.stats)
        .run()
        .context("DADA2 denoising failed")
}

/// Tabulate the per-sample denoising statistics into a visualization
pub fn tabulate_stats(stats_qza: &Path, out_qzv: &Path) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["metadata", "tabulate"])
        .arg("--m-input-file")
        .arg_path(stats_qza)
        .arg("--o-visualization")
        .arg_path(out_qzv)
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_lookup() {
        let params = preset("default").unwrap();
        assert_eq!(params.trunc_len_f, 280);
        assert_eq!(params.trunc_len_r, 220);
        assert!(preset("nonsense").is_none());
        assert_eq!(preset_names().len(), PRESETS.len());
    }

    #[test]
    fn test_expected_overlap_default() {
        // (280-17) + (220-21) - (465-17-21) = 35
        let params = preset("default").unwrap();
        assert_eq!(params.expected_overlap(), 35);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_expected_overlap_no_trunc() {
        // full reads: (300-17) + (300-21) - 427 = 135
        let params = preset("no-trunc").unwrap();
        assert_eq!(params.expected_overlap(), 135);
    }

    #[test]
    fn test_strict_preset_cannot_merge() {
        // (260-17) + (200-21) - 427 = -5, the failure mode the study hit
        let params = preset("strict").unwrap();
        assert_eq!(params.expected_overlap(), -5);
        let err = params.validate().unwrap_err().to_string();
        assert!(err.contains("overlap"), "unexpected error: {}", err);
    }

    #[test]
    fn test_marginal_overlap_passes() {
        let params = DenoiseParams {
            trim_left_f: PRIMER_F_LEN,
            trim_left_r: PRIMER_R_LEN,
            trunc_len_f: 270,
            trunc_len_r: 210,
        };
        // (270-17) + (210-21) - 427 = 15: mergeable but under the comfort margin
        assert_eq!(params.expected_overlap(), 15);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_output_paths() {
        let outputs = DenoiseOutputs::in_dir(Path::new("analysis/denoise"));
        assert_eq!(outputs.table, Path::new("analysis/denoise/table.qza"));
        assert_eq!(outputs.rep_seqs, Path::new("analysis/denoise/rep-seqs.qza"));
    }
}
