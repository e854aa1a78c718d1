//! ExPLOI 16S Tools
//!
//! Orchestration for the ExPLOI study's 16S rRNA amplicon analysis. The
//! scientific computation lives in external tools (FastQC, MultiQC,
//! Trimmomatic, QIIME2/DADA2, MAFFT, FastTree, biom); this library provides
//! the glue around them:
//! - Study metadata and read-manifest generation
//! - Per-stage tool invocation with the study's parameters and fallbacks
//! - Rarefaction-depth selection from per-sample read totals
//! - Reshaping/merging of the flat tables the tools export

pub mod config;
pub mod decontam;
pub mod denoise;
pub mod diversity;
pub mod export;
pub mod feature_table;
pub mod manifest;
pub mod metadata;
pub mod phylogeny;
pub mod qc;
pub mod taxonomy;
pub mod tools;
pub mod trim;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Create a directory and its parents if missing
pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    std::fs::create_dir_all(dir.as_ref())
        .with_context(|| format!("failed to create directory {}", dir.as_ref().display()))
}

/// Write a stage's stats/report struct as pretty JSON next to its outputs
pub fn write_stats_json<T: Serialize, P: AsRef<Path>>(stats: &T, path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path.as_ref(), json)
        .with_context(|| format!("failed to write {}", path.as_ref().display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // idempotent
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_write_stats_json() {
        #[derive(Serialize)]
        struct Stats {
            samples: usize,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        write_stats_json(&Stats { samples: 17 }, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"samples\": 17"));
    }
}
