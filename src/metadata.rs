//! Study sample table and QIIME2 metadata writer
//!
//! The ExPLOI sample set is fixed for the life of the study, so the table
//! lives here as a constant rather than being computed. One library
//! negative control (no biological template) is sequenced alongside the
//! biological samples and drives the decontamination stage.

use anyhow::{bail, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Sample category in the study design
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleGroup {
    Sample,
    NegativeControl,
}

impl SampleGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleGroup::Sample => "Sample",
            SampleGroup::NegativeControl => "Negative_Control",
        }
    }
}

impl fmt::Display for SampleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Sample" => Ok(SampleGroup::Sample),
            "Negative_Control" => Ok(SampleGroup::NegativeControl),
            other => bail!("unknown sample group: {}", other),
        }
    }
}

/// One row of the study design
#[derive(Debug, Clone, Copy)]
pub struct StudySample {
    /// Sample identifier used in metadata, manifests and all result tables
    pub sample_id: &'static str,
    pub group: SampleGroup,
    /// Filename prefix the sequencing center used for this sample's FASTQs
    pub file_token: &'static str,
}

/// The fixed ExPLOI sample set, one library negative control last
pub const STUDY_SAMPLES: &[StudySample] = &[
    StudySample { sample_id: "EXP-01", group: SampleGroup::Sample, file_token: "ExPLOI-01" },
    StudySample { sample_id: "EXP-02", group: SampleGroup::Sample, file_token: "ExPLOI-02" },
    StudySample { sample_id: "EXP-03", group: SampleGroup::Sample, file_token: "ExPLOI-03" },
    StudySample { sample_id: "EXP-04", group: SampleGroup::Sample, file_token: "ExPLOI-04" },
    StudySample { sample_id: "EXP-05", group: SampleGroup::Sample, file_token: "ExPLOI-05" },
    StudySample { sample_id: "EXP-06", group: SampleGroup::Sample, file_token: "ExPLOI-06" },
    StudySample { sample_id: "EXP-07", group: SampleGroup::Sample, file_token: "ExPLOI-07" },
    StudySample { sample_id: "EXP-08", group: SampleGroup::Sample, file_token: "ExPLOI-08" },
    StudySample { sample_id: "EXP-09", group: SampleGroup::Sample, file_token: "ExPLOI-09" },
    StudySample { sample_id: "EXP-10", group: SampleGroup::Sample, file_token: "ExPLOI-10" },
    StudySample { sample_id: "EXP-11", group: SampleGroup::Sample, file_token: "ExPLOI-11" },
    StudySample { sample_id: "EXP-12", group: SampleGroup::Sample, file_token: "ExPLOI-12" },
    StudySample { sample_id: "EXP-13", group: SampleGroup::Sample, file_token: "ExPLOI-13" },
    StudySample { sample_id: "EXP-14", group: SampleGroup::Sample, file_token: "ExPLOI-14" },
    StudySample { sample_id: "EXP-15", group: SampleGroup::Sample, file_token: "ExPLOI-15" },
    StudySample { sample_id: "EXP-16", group: SampleGroup::Sample, file_token: "ExPLOI-16" },
    StudySample { sample_id: "EXP-NC", group: SampleGroup::NegativeControl, file_token: "ExPLOI-NC" },
];

/// Write the sample metadata in QIIME2 TSV format.
///
/// QIIME2 wants a `#q2:types` directive row after the header so the group
/// column is read as categorical.
pub fn write_metadata<P: AsRef<Path>>(path: P) -> Result<usize> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "sample-id\tgroup")?;
    writeln!(writer, "#q2:types\tcategorical")?;
    for sample in STUDY_SAMPLES {
        writeln!(writer, "{}\t{}", sample.sample_id, sample.group)?;
    }
    writer.flush()?;

    Ok(STUDY_SAMPLES.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_round_trip() {
        for group in [SampleGroup::Sample, SampleGroup::NegativeControl] {
            let parsed: SampleGroup = group.as_str().parse().unwrap();
            assert_eq!(parsed, group);
        }
        assert!("Blank".parse::<SampleGroup>().is_err());
    }

    #[test]
    fn test_single_negative_control() {
        let controls: Vec<_> = STUDY_SAMPLES
            .iter()
            .filter(|s| s.group == SampleGroup::NegativeControl)
            .collect();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].sample_id, "EXP-NC");
    }

    #[test]
    fn test_unique_ids_and_tokens() {
        let mut ids: Vec<_> = STUDY_SAMPLES.iter().map(|s| s.sample_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), STUDY_SAMPLES.len());

        let mut tokens: Vec<_> = STUDY_SAMPLES.iter().map(|s| s.file_token).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), STUDY_SAMPLES.len());
    }

    #[test]
    fn test_write_metadata_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.tsv");
        let written = write_metadata(&path).unwrap();
        assert_eq!(written, STUDY_SAMPLES.len());

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("sample-id\tgroup"));
        assert_eq!(lines.next(), Some("#q2:types\tcategorical"));
        assert_eq!(lines.next(), Some("EXP-01\tSample"));
        assert_eq!(text.lines().last(), Some("EXP-NC\tNegative_Control"));
        assert_eq!(text.lines().count(), STUDY_SAMPLES.len() + 2);
    }
}
