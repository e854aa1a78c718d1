//! Flat ASV count table as exported by `biom convert --to-tsv`
//!
//! The exported TSV carries a `# Constructed from biom file` comment line,
//! then a `#OTU ID` header naming the samples, then one row per ASV with
//! float-formatted counts. The table is produced and consumed by external
//! tools; this parser only exists so the pipeline can read totals back out
//! of it for rarefaction-depth selection and contaminant identification.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub feature_ids: Vec<String>,
    pub sample_ids: Vec<String>,
    /// Row-major counts, one row per feature
    pub counts: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open feature table {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut sample_ids: Option<Vec<String>> = None;
        let mut feature_ids = Vec::new();
        let mut counts = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix("#OTU ID") {
                sample_ids = Some(
                    header
                        .split('\t')
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect(),
                );
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let samples = match &sample_ids {
                Some(s) => s,
                None => bail!(
                    "{}:{}: data row before #OTU ID header",
                    path.display(),
                    line_no + 1
                ),
            };

            let mut fields = line.split('\t');
            let feature_id = fields
                .next()
                .with_context(|| format!("{}:{}: empty row", path.display(), line_no + 1))?;
            let row: Vec<f64> = fields
                .map(|v| {
                    v.parse::<f64>().with_context(|| {
                        format!("{}:{}: bad count '{}'", path.display(), line_no + 1, v)
                    })
                })
                .collect::<Result<_>>()?;
            if row.len() != samples.len() {
                bail!(
                    "{}:{}: {} counts for {} samples",
                    path.display(),
                    line_no + 1,
                    row.len(),
                    samples.len()
                );
            }
            feature_ids.push(feature_id.to_string());
            counts.push(row);
        }

        let sample_ids = match sample_ids {
            Some(s) => s,
            None => bail!("{} has no #OTU ID header", path.display()),
        };

        Ok(Self {
            feature_ids,
            sample_ids,
            counts,
        })
    }

    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Total read count per sample, in table column order
    pub fn sample_totals(&self) -> Vec<(String, u64)> {
        let mut totals = vec![0f64; self.sample_ids.len()];
        for row in &self.counts {
            for (total, count) in totals.iter_mut().zip(row) {
                *total += count;
            }
        }
        self.sample_ids
            .iter()
            .cloned()
            .zip(totals.into_iter().map(|t| t.round() as u64))
            .collect()
    }

    /// Feature ids carrying at least one read in any sample
    pub fn nonzero_features(&self) -> Vec<String> {
        self.feature_ids
            .iter()
            .zip(&self.counts)
            .filter(|(_, row)| row.iter().any(|&c| c > 0.0))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const SMALL_TABLE: &str = "\
# Constructed from biom file
#OTU ID\tEXP-01\tEXP-02\tEXP-NC
asv0001\t10.0\t0.0\t2.0
asv0002\t0.0\t5.0\t0.0
asv0003\t0.0\t0.0\t0.0
";

    #[test]
    fn test_parse_exported_table() {
        let file = write_table(SMALL_TABLE);
        let table = FeatureTable::from_tsv(file.path()).unwrap();
        assert_eq!(table.n_features(), 3);
        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.sample_ids, vec!["EXP-01", "EXP-02", "EXP-NC"]);
        assert_eq!(table.counts[0], vec![10.0, 0.0, 2.0]);
    }

    #[test]
    fn test_sample_totals() {
        let file = write_table(SMALL_TABLE);
        let table = FeatureTable::from_tsv(file.path()).unwrap();
        let totals = table.sample_totals();
        assert_eq!(totals[0], ("EXP-01".to_string(), 10));
        assert_eq!(totals[1], ("EXP-02".to_string(), 5));
        assert_eq!(totals[2], ("EXP-NC".to_string(), 2));
    }

    #[test]
    fn test_nonzero_features() {
        let file = write_table(SMALL_TABLE);
        let table = FeatureTable::from_tsv(file.path()).unwrap();
        assert_eq!(table.nonzero_features(), vec!["asv0001", "asv0002"]);
    }

    #[test]
    fn test_missing_header() {
        let file = write_table("asv0001\t1.0\n");
        assert!(FeatureTable::from_tsv(file.path()).is_err());
    }

    #[test]
    fn test_ragged_row() {
        let file = write_table("#OTU ID\tEXP-01\tEXP-02\nasv0001\t1.0\n");
        let err = FeatureTable::from_tsv(file.path()).unwrap_err().to_string();
        assert!(err.contains("1 counts for 2 samples"), "unexpected error: {}", err);
    }

    #[test]
    fn test_bad_count() {
        let file = write_table("#OTU ID\tEXP-01\nasv0001\tmany\n");
        assert!(FeatureTable::from_tsv(file.path()).is_err());
    }
}
