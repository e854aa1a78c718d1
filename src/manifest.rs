//! Raw FASTQ discovery and QIIME2 manifest generation
//!
//! The sequencing center names files `<token>_S<n>_L001_R<1|2>_001.fastq.gz`;
//! samples are recovered by matching the leading token against the study
//! table. The manifest is written in `PairedEndFastqManifestPhred33V2`
//! layout with absolute paths, which is what `qiime tools import` expects.

use crate::metadata::{StudySample, STUDY_SAMPLES};
use anyhow::{bail, Context, Result};
use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Resolved forward/reverse FASTQ pair for one sample
#[derive(Debug, Clone)]
pub struct ReadPair {
    pub sample_id: String,
    pub forward: PathBuf,
    pub reverse: PathBuf,
}

fn is_fastq(name: &str) -> bool {
    name.ends_with(".fastq.gz") || name.ends_with(".fq.gz") || name.ends_with(".fastq")
}

/// Match a raw filename against the study table, returning the row index
/// and the read direction (true for R1).
fn match_filename(name: &str, samples: &[StudySample]) -> Option<(usize, bool)> {
    let index = samples
        .iter()
        .position(|s| name.starts_with(&format!("{}_", s.file_token)))?;
    if name.contains("_R1") {
        Some((index, true))
    } else if name.contains("_R2") {
        Some((index, false))
    } else {
        None
    }
}

/// Scan the raw directory and resolve one forward/reverse pair per study
/// sample. Stray FASTQs matching no sample are logged and skipped; a sample
/// with no files, or with only one mate, fails the whole run.
pub fn scan_raw_dir<P: AsRef<Path>>(raw_dir: P) -> Result<Vec<ReadPair>> {
    let raw_dir = raw_dir.as_ref();
    if !raw_dir.is_dir() {
        bail!("raw read directory does not exist: {}", raw_dir.display());
    }

    let mut forward: Vec<Option<PathBuf>> = vec![None; STUDY_SAMPLES.len()];
    let mut reverse: Vec<Option<PathBuf>> = vec![None; STUDY_SAMPLES.len()];

    for entry in std::fs::read_dir(raw_dir)
        .with_context(|| format!("failed to read {}", raw_dir.display()))?
    {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !is_fastq(&name) {
            continue;
        }

        match match_filename(&name, STUDY_SAMPLES) {
            Some((index, is_forward)) => {
                let sample = &STUDY_SAMPLES[index];
                let slot = if is_forward {
                    &mut forward[index]
                } else {
                    &mut reverse[index]
                };
                if let Some(previous) = slot {
                    bail!(
                        "sample {} matches more than one {} file: {} and {}",
                        sample.sample_id,
                        if is_forward { "R1" } else { "R2" },
                        previous.display(),
                        path.display()
                    );
                }
                *slot = Some(path);
            }
            None => warn!("{} matches no study sample, skipping", name),
        }
    }

    let mut pairs = Vec::with_capacity(STUDY_SAMPLES.len());
    for (index, sample) in STUDY_SAMPLES.iter().enumerate() {
        match (&forward[index], &reverse[index]) {
            (Some(f), Some(r)) => pairs.push(ReadPair {
                sample_id: sample.sample_id.to_string(),
                forward: absolute(f)?,
                reverse: absolute(r)?,
            }),
            (None, None) => bail!(
                "no FASTQ files found for sample {} (token {}) in {}",
                sample.sample_id,
                sample.file_token,
                raw_dir.display()
            ),
            (Some(_), None) => bail!("sample {} is missing its R2 file", sample.sample_id),
            (None, Some(_)) => bail!("sample {} is missing its R1 file", sample.sample_id),
        }
    }

    Ok(pairs)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path)
        .with_context(|| format!("failed to resolve {}", path.display()))
}

/// Write the paired-end manifest in QIIME2 V2 format
pub fn write_manifest<P: AsRef<Path>>(pairs: &[ReadPair], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "sample-id\tforward-absolute-filepath\treverse-absolute-filepath"
    )?;
    for pair in pairs {
        writeln!(
            writer,
            "{}\t{}\t{}",
            pair.sample_id,
            pair.forward.display(),
            pair.reverse.display()
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::STUDY_SAMPLES;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"@r\nACGT\n+\nIIII\n").unwrap();
    }

    fn populate_full_run(dir: &Path) {
        for (i, sample) in STUDY_SAMPLES.iter().enumerate() {
            touch(dir, &format!("{}_S{}_L001_R1_001.fastq.gz", sample.file_token, i + 1));
            touch(dir, &format!("{}_S{}_L001_R2_001.fastq.gz", sample.file_token, i + 1));
        }
    }

    #[test]
    fn test_match_filename() {
        let (index, is_forward) =
            match_filename("ExPLOI-03_S3_L001_R1_001.fastq.gz", STUDY_SAMPLES).unwrap();
        assert_eq!(STUDY_SAMPLES[index].sample_id, "EXP-03");
        assert!(is_forward);

        let (index, is_forward) =
            match_filename("ExPLOI-NC_S17_L001_R2_001.fastq.gz", STUDY_SAMPLES).unwrap();
        assert_eq!(STUDY_SAMPLES[index].sample_id, "EXP-NC");
        assert!(!is_forward);

        assert!(match_filename("Undetermined_S0_L001_R1_001.fastq.gz", STUDY_SAMPLES).is_none());
        // unpadded near-miss of the ExPLOI-01 token
        assert!(match_filename("ExPLOI-1_S1_L001_R1_001.fastq.gz", STUDY_SAMPLES).is_none());
    }

    #[test]
    fn test_scan_full_run() {
        let dir = tempfile::tempdir().unwrap();
        populate_full_run(dir.path());
        // a stray undetermined file only warns
        touch(dir.path(), "Undetermined_S0_L001_R1_001.fastq.gz");

        let pairs = scan_raw_dir(dir.path()).unwrap();
        assert_eq!(pairs.len(), STUDY_SAMPLES.len());
        assert_eq!(pairs[0].sample_id, "EXP-01");
        assert!(pairs[0].forward.is_absolute());
        assert!(pairs[0].forward.to_string_lossy().contains("_R1_"));
        assert!(pairs[0].reverse.to_string_lossy().contains("_R2_"));
    }

    #[test]
    fn test_scan_missing_mate() {
        let dir = tempfile::tempdir().unwrap();
        populate_full_run(dir.path());
        std::fs::remove_file(dir.path().join("ExPLOI-07_S7_L001_R2_001.fastq.gz")).unwrap();

        let err = scan_raw_dir(dir.path()).unwrap_err().to_string();
        assert!(err.contains("EXP-07"), "unexpected error: {}", err);
        assert!(err.contains("R2"), "unexpected error: {}", err);
    }

    #[test]
    fn test_scan_missing_sample() {
        let dir = tempfile::tempdir().unwrap();
        populate_full_run(dir.path());
        std::fs::remove_file(dir.path().join("ExPLOI-12_S12_L001_R1_001.fastq.gz")).unwrap();
        std::fs::remove_file(dir.path().join("ExPLOI-12_S12_L001_R2_001.fastq.gz")).unwrap();

        let err = scan_raw_dir(dir.path()).unwrap_err().to_string();
        assert!(err.contains("EXP-12"), "unexpected error: {}", err);
    }

    #[test]
    fn test_scan_duplicate_file() {
        let dir = tempfile::tempdir().unwrap();
        populate_full_run(dir.path());
        // rerun of the same library under a different sample sheet index
        touch(dir.path(), "ExPLOI-02_S99_L001_R1_001.fastq.gz");

        let err = scan_raw_dir(dir.path()).unwrap_err().to_string();
        assert!(err.contains("EXP-02"), "unexpected error: {}", err);
        assert!(err.contains("more than one"), "unexpected error: {}", err);
    }

    #[test]
    fn test_write_manifest_format() {
        let dir = tempfile::tempdir().unwrap();
        populate_full_run(dir.path());
        let pairs = scan_raw_dir(dir.path()).unwrap();

        let manifest = dir.path().join("manifest.tsv");
        write_manifest(&pairs, &manifest).unwrap();

        let text = std::fs::read_to_string(&manifest).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("sample-id\tforward-absolute-filepath\treverse-absolute-filepath")
        );
        assert_eq!(text.lines().count(), STUDY_SAMPLES.len() + 1);
        for line in text.lines().skip(1) {
            assert_eq!(line.split('\t').count(), 3);
        }
    }
}
