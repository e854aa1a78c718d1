//! External tool invocation layer
//!
//! Every piece of scientific computation in this pipeline happens inside a
//! third-party tool (FastQC, MultiQC, Trimmomatic, QIIME2, biom). This
//! module owns finding those tools on PATH, rendering their command lines
//! for the log, and turning exit status into errors the stages can branch
//! on.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;
use which::which;

/// One pending external tool invocation
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl ExternalCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    pub fn arg_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.args.push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// The invocation as one loggable line
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args_ref(&self) -> &[String] {
        &self.args
    }

    /// Run the tool, inheriting stdout/stderr, and fail on non-zero exit
    pub fn run(&self) -> Result<()> {
        info!("running: {}", self.command_line());
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        let status = command
            .status()
            .with_context(|| format!("failed to launch {}", self.program))?;
        if !status.success() {
            bail!(
                "{} exited with status {}",
                self.program,
                status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
            );
        }
        debug!("{} finished", self.program);
        Ok(())
    }
}

/// Fail fast when a required tool is not on PATH
pub fn check_requirements(programs: &[&str]) -> Result<()> {
    let missing: Vec<&str> = programs
        .iter()
        .copied()
        .filter(|p| which(p).is_err())
        .collect();
    if !missing.is_empty() {
        bail!("required programs not found in PATH: {}", missing.join(", "));
    }
    Ok(())
}

/// Unpack a QIIME2 artifact's payload into `out_dir`
pub fn export_artifact<P: AsRef<Path>, Q: AsRef<Path>>(artifact: P, out_dir: Q) -> Result<()> {
    ExternalCommand::new("qiime")
        .args(["tools", "export"])
        .arg("--input-path")
        .arg_path(&artifact)
        .arg("--output-path")
        .arg_path(&out_dir)
        .run()
        .with_context(|| format!("failed to export {}", artifact.as_ref().display()))
}

/// Convert a BIOM feature table to its flat TSV form
pub fn biom_to_tsv<P: AsRef<Path>, Q: AsRef<Path>>(biom: P, tsv: Q) -> Result<()> {
    ExternalCommand::new("biom")
        .arg("convert")
        .arg("-i")
        .arg_path(&biom)
        .arg("-o")
        .arg_path(&tsv)
        .arg("--to-tsv")
        .run()
        .with_context(|| format!("failed to convert {}", biom.as_ref().display()))
}

/// Export a feature-table artifact all the way to TSV, returning the TSV path
pub fn export_table_to_tsv<P: AsRef<Path>, Q: AsRef<Path>>(
    table_qza: P,
    out_dir: Q,
) -> Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    crate::ensure_dir(out_dir)?;
    export_artifact(&table_qza, out_dir)?;
    let biom = out_dir.join("feature-table.biom");
    if !biom.is_file() {
        bail!(
            "export of {} produced no feature-table.biom",
            table_qza.as_ref().display()
        );
    }
    let tsv = out_dir.join("feature-table.tsv");
    biom_to_tsv(&biom, &tsv)?;
    Ok(tsv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_rendering() {
        let command = ExternalCommand::new("fastqc")
            .arg("--threads")
            .arg("8")
            .arg("-o")
            .arg_path("qc/raw")
            .arg("reads_R1.fastq.gz");
        assert_eq!(
            command.command_line(),
            "fastqc --threads 8 -o qc/raw reads_R1.fastq.gz"
        );
    }

    #[test]
    fn test_run_missing_program() {
        let err = ExternalCommand::new("definitely-not-a-real-tool-xyz")
            .arg("--version")
            .run()
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to launch"), "unexpected error: {}", err);
    }

    #[test]
    fn test_run_nonzero_exit() {
        // `false` is POSIX and always exits 1
        let err = ExternalCommand::new("false").run().unwrap_err().to_string();
        assert!(err.contains("exited with status 1"), "unexpected error: {}", err);
    }

    #[test]
    fn test_check_requirements_missing() {
        let err = check_requirements(&["sh", "definitely-not-a-real-tool-xyz"])
            .unwrap_err()
            .to_string();
        assert!(err.contains("definitely-not-a-real-tool-xyz"));
        assert!(!err.contains("sh,"));
    }
}
