//! Run configuration shared by all pipeline stage tools
//!
//! The study layout, thread count and reference artifact locations live in
//! one `RunConfig` that every stage binary loads the same way: built-in
//! study defaults, optionally replaced by a JSON config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the raw demultiplexed FASTQ files from the sequencer
    pub raw_dir: PathBuf,
    /// Root directory for all pipeline outputs
    pub work_dir: PathBuf,
    /// Thread count passed to every external tool that accepts one
    pub threads: usize,
    /// Adapter FASTA handed to Trimmomatic ILLUMINACLIP
    pub adapters: PathBuf,
    /// Pre-trained sklearn taxonomy classifier artifact
    pub classifier: PathBuf,
    /// Minimum per-sample read total considered usable for rarefaction
    pub depth_floor: u64,
    /// Named DADA2 truncation parameter set
    pub denoise_preset: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("raw_data"),
            work_dir: PathBuf::from("analysis"),
            threads: 4,
            adapters: PathBuf::from("ref/NexteraPE-PE.fa"),
            classifier: PathBuf::from("ref/silva-138-99-nb-classifier.qza"),
            depth_floor: 1000,
            denoise_preset: "default".to_string(),
        }
    }
}

impl RunConfig {
    /// Load a config from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to read config file {}", path.as_ref().display())
        })?;
        let config: RunConfig = serde_json::from_str(&text).with_context(|| {
            format!("failed to parse config file {}", path.as_ref().display())
        })?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the study defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.work_dir.join("metadata.tsv")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir.join("manifest.tsv")
    }

    pub fn qc_dir(&self, stage: &str) -> PathBuf {
        self.work_dir.join("qc").join(stage)
    }

    pub fn trimmed_dir(&self) -> PathBuf {
        self.work_dir.join("trimmed")
    }

    pub fn trimmed_manifest_path(&self) -> PathBuf {
        self.work_dir.join("manifest-trimmed.tsv")
    }

    pub fn denoise_dir(&self) -> PathBuf {
        self.work_dir.join("denoise")
    }

    pub fn decontam_dir(&self) -> PathBuf {
        self.work_dir.join("decontam")
    }

    pub fn phylogeny_dir(&self) -> PathBuf {
        self.work_dir.join("phylogeny")
    }

    pub fn diversity_dir(&self) -> PathBuf {
        self.work_dir.join("diversity")
    }

    pub fn taxonomy_dir(&self) -> PathBuf {
        self.work_dir.join("taxonomy")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.work_dir.join("export")
    }

    /// Scratch space handed to external tools through TMPDIR
    pub fn tmp_dir(&self) -> PathBuf {
        self.work_dir.join("tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.threads, 4);
        assert_eq!(config.depth_floor, 1000);
        assert_eq!(config.denoise_preset, "default");
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"threads": 16, "work_dir": "run2"}}"#).unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.threads, 16);
        assert_eq!(config.work_dir, PathBuf::from("run2"));
        // untouched fields keep the study defaults
        assert_eq!(config.depth_floor, 1000);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(RunConfig::load("no/such/config.json").is_err());
    }
}
