//! Flat-table export for downstream statistics
//!
//! The statistical analysis for the study happens outside this pipeline, in
//! notebooks that want plain TSV: one wide table of ASV counts annotated
//! with taxonomy, and one wide table of alpha-diversity values per sample
//! with the study group alongside. This module does those reshapes with
//! polars, keyed on the ids the external tools emit.

use crate::metadata::STUDY_SAMPLES;
use anyhow::{bail, Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

fn read_tsv(path: &Path, skip_rows: usize) -> Result<DataFrame> {
    let mut parse_options = CsvParseOptions::default();
    parse_options.separator = b'\t';

    CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(skip_rows)
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn write_tsv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .finish(&mut df.clone())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Join per-sample ASV counts with their taxonomic assignments.
///
/// `feature_tsv` is the `biom convert --to-tsv` output (leading comment
/// line, `#OTU ID` header); `taxonomy_tsv` is the exported classification
/// (`Feature ID`, `Taxon`, `Confidence`). Every ASV is kept whether or not
/// the classifier had anything to say about it.
pub fn merge_taxonomy(feature_tsv: &Path, taxonomy_tsv: &Path, out_tsv: &Path) -> Result<usize> {
    let features = read_tsv(feature_tsv, 1)?
        .lazy()
        .rename(["#OTU ID"], ["feature-id"], false)
        .collect()?;

    let taxonomy = read_tsv(taxonomy_tsv, 0)?
        .lazy()
        .rename(["Feature ID"], ["feature-id"], false)
        .select([col("feature-id"), col("Taxon"), col("Confidence")])
        .collect()?;

    let merged = features.join(
        &taxonomy,
        ["feature-id"],
        ["feature-id"],
        JoinArgs::new(JoinType::Left),
    )?;

    write_tsv(&merged, out_tsv)?;
    Ok(merged.height())
}

/// Collect the per-metric alpha-diversity TSVs into one wide table with the
/// study group column, one row per study sample.
///
/// Each input TSV is the QIIME2 alpha-vector export: an unnamed sample-id
/// column followed by one value column whose header varies by metric; both
/// are renamed positionally. Samples dropped during rarefaction keep their
/// row with empty metric cells.
pub fn alpha_summary(metrics: &[(String, std::path::PathBuf)], out_tsv: &Path) -> Result<usize> {
    if metrics.is_empty() {
        bail!("no alpha-diversity tables to summarize");
    }

    let sample_ids: Vec<String> = STUDY_SAMPLES
        .iter()
        .map(|s| s.sample_id.to_string())
        .collect();
    let groups: Vec<String> = STUDY_SAMPLES
        .iter()
        .map(|s| s.group.as_str().to_string())
        .collect();

    let mut summary = DataFrame::new(vec![
        Series::new("sample-id".into(), sample_ids).into(),
        Series::new("group".into(), groups).into(),
    ])?;

    for (metric, path) in metrics {
        let table = read_tsv(path, 0)?;
        if table.width() != 2 {
            bail!(
                "{} has {} columns, expected sample-id plus one metric",
                path.display(),
                table.width()
            );
        }
        let names = table.get_column_names_owned();
        let table = table
            .clone()
            .lazy()
            .rename(
                [names[0].as_str(), names[1].as_str()],
                ["sample-id", metric.as_str()],
                false,
            )
            .collect()?;

        summary = summary.join(
            &table,
            ["sample-id"],
            ["sample-id"],
            JoinArgs::new(JoinType::Left),
        )?;
    }

    write_tsv(&summary, out_tsv)?;
    Ok(summary.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_file(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_merge_taxonomy() {
        let dir = tempfile::tempdir().unwrap();
        let features = write_file(
            dir.path(),
            "feature-table.tsv",
            "# Constructed from biom file\n\
             #OTU ID\tEXP-01\tEXP-02\n\
             asv0001\t10.0\t0.0\n\
             asv0002\t3.0\t7.0\n\
             asv0003\t1.0\t1.0\n",
        );
        let taxonomy = write_file(
            dir.path(),
            "taxonomy.tsv",
            "Feature ID\tTaxon\tConfidence\n\
             asv0001\td__Bacteria; p__Firmicutes\t0.99\n\
             asv0002\td__Bacteria; p__Bacteroidota\t0.87\n",
        );
        let out = dir.path().join("merged.tsv");

        let rows = merge_taxonomy(&features, &taxonomy, &out).unwrap();
        assert_eq!(rows, 3);

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("feature-id\tEXP-01\tEXP-02\tTaxon\tConfidence")
        );
        assert!(text.contains("asv0001\t10.0\t0.0\td__Bacteria; p__Firmicutes\t0.99"));
        // unclassified ASV survives the join with empty annotation cells
        let unclassified = text.lines().find(|l| l.starts_with("asv0003")).unwrap();
        assert!(unclassified.starts_with("asv0003\t1.0\t1.0\t"));
    }

    #[test]
    fn test_alpha_summary() {
        let dir = tempfile::tempdir().unwrap();
        let shannon = write_file(
            dir.path(),
            "shannon.tsv",
            "\tshannon_entropy\nEXP-01\t5.1\nEXP-02\t4.2\n",
        );
        let evenness = write_file(
            dir.path(),
            "evenness.tsv",
            "\tpielou_evenness\nEXP-01\t0.91\nEXP-02\t0.76\n",
        );
        let out = dir.path().join("alpha-summary.tsv");

        let metrics = vec![
            ("shannon".to_string(), shannon),
            ("evenness".to_string(), evenness),
        ];
        let rows = alpha_summary(&metrics, &out).unwrap();
        assert_eq!(rows, STUDY_SAMPLES.len());

        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("sample-id\tgroup\tshannon\tevenness")
        );
        assert!(text.contains("EXP-01\tSample\t5.1\t0.91"));
        // samples rarefied out keep their row with empty metric cells
        let control = text.lines().find(|l| l.starts_with("EXP-NC")).unwrap();
        assert!(control.starts_with("EXP-NC\tNegative_Control\t"));
    }

    #[test]
    fn test_alpha_summary_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(alpha_summary(&[], &dir.path().join("out.tsv")).is_err());
    }

    #[test]
    fn test_alpha_summary_rejects_wide_table() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_file(
            dir.path(),
            "bad.tsv",
            "\ta\tb\nEXP-01\t1.0\t2.0\n",
        );
        let metrics = vec![("bad".to_string(), bad)];
        assert!(alpha_summary(&metrics, &dir.path().join("out.tsv")).is_err());
    }
}
