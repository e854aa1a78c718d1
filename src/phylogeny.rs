//! Alignment and phylogenetic tree construction
//!
//! The stock `align-to-tree-mafft-fasttree` pipeline handles the usual case.
//! MAFFT's default algorithm occasionally refuses the input (it is memory
//! hungry at high ASV counts), so on failure the stage reruns the chain
//! stepwise with MAFFT's parttree mode before giving up.

use crate::tools::ExternalCommand;
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REQUIRED_TOOLS: &[&str] = &["qiime"];

#[derive(Debug, Clone)]
pub struct PhylogenyOutputs {
    pub alignment: PathBuf,
    pub masked_alignment: PathBuf,
    pub tree: PathBuf,
    pub rooted_tree: PathBuf,
}

impl PhylogenyOutputs {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            alignment: dir.join("aligned-rep-seqs.qza"),
            masked_alignment: dir.join("masked-aligned-rep-seqs.qza"),
            tree: dir.join("unrooted-tree.qza"),
            rooted_tree: dir.join("rooted-tree.qza"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhylogenyReport {
    pub used_parttree_fallback: bool,
}

fn align_to_tree_pipeline(
    rep_seqs: &Path,
    outputs: &PhylogenyOutputs,
    threads: usize,
) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["phylogeny", "align-to-tree-mafft-fasttree"])
        .arg("--i-sequences")
        .arg_path(rep_seqs)
        .arg("--p-n-threads")
        .arg(threads.to_string())
        .arg("--o-alignment")
        .arg_path(&outputs.alignment)
        .arg("--o-masked-alignment")
        .arg_path(&outputs.masked_alignment)
        .arg("--o-tree")
        .arg_path(&outputs.tree)
        .arg("--o-rooted-tree")
        .arg_path(&outputs.rooted_tree)
        .run()
}

fn stepwise_parttree(rep_seqs: &Path, outputs: &PhylogenyOutputs, threads: usize) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["alignment", "mafft"])
        .arg("--i-sequences")
        .arg_path(rep_seqs)
        .arg("--p-n-threads")
        .arg(threads.to_string())
        .arg("--p-parttree")
        .arg("--o-alignment")
        .arg_path(&outputs.alignment)
        .run()
        .context("MAFFT parttree alignment failed")?;

    ExternalCommand::new("qiime")
        .args(["alignment", "mask"])
        .arg("--i-alignment")
        .arg_path(&outputs.alignment)
        .arg("--o-masked-alignment")
        .arg_path(&outputs.masked_alignment)
        .run()
        .context("alignment masking failed")?;

    ExternalCommand::new("qiime")
        .args(["phylogeny", "fasttree"])
        .arg("--i-alignment")
        .arg_path(&outputs.masked_alignment)
        .arg("--p-n-threads")
        .arg(threads.to_string())
        .arg("--o-tree")
        .arg_path(&outputs.tree)
        .run()
        .context("FastTree construction failed")?;

    ExternalCommand::new("qiime")
        .args(["phylogeny", "midpoint-root"])
        .arg("--i-tree")
        .arg_path(&outputs.tree)
        .arg("--o-rooted-tree")
        .arg_path(&outputs.rooted_tree)
        .run()
        .context("midpoint rooting failed")
}

/// Align the representative sequences and build a rooted tree, retrying
/// once in parttree mode when the default aligner invocation fails.
pub fn build_tree(rep_seqs: &Path, out_dir: &Path, threads: usize) -> Result<PhylogenyReport> {
    crate::ensure_dir(out_dir)?;
    let outputs = PhylogenyOutputs::in_dir(out_dir);

    match align_to_tree_pipeline(rep_seqs, &outputs, threads) {
        Ok(()) => Ok(PhylogenyReport {
            used_parttree_fallback: false,
        }),
        Err(err) => {
            warn!(
                "default alignment pipeline failed ({}); retrying with MAFFT parttree",
                err
            );
            stepwise_parttree(rep_seqs, &outputs, threads)?;
            Ok(PhylogenyReport {
                used_parttree_fallback: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths() {
        let outputs = PhylogenyOutputs::in_dir(Path::new("analysis/phylogeny"));
        assert_eq!(
            outputs.rooted_tree,
            Path::new("analysis/phylogeny/rooted-tree.qza")
        );
        assert_eq!(
            outputs.masked_alignment,
            Path::new("analysis/phylogeny/masked-aligned-rep-seqs.qza")
        );
    }
}
