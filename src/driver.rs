//! Multi-file driver: generate every input, compare with what is on disk, and
//! rewrite only what changed.
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use rayon::prelude::*;

use crate::Config;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Directory artifacts are written to; next to each input when `None`.
    pub out_dir: Option<PathBuf>,
    /// Appended to the input's file stem to name its artifact.
    pub suffix: String,
    /// Report would-be rewrites instead of performing them.
    pub check: bool,
    pub config: Config,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { out_dir: None, suffix: "_codegen.cpp".to_string(), check: false, config: Config::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No `[[codegen::` marker in the input.
    Skipped,
    Unchanged,
    Written,
    /// Check mode only: the artifact is missing or out of date.
    Stale,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub artifact: Option<PathBuf>,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub reports: Vec<FileReport>,
    /// Inputs that failed, with the rendered error chain.
    pub failures: Vec<(PathBuf, String)>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Process every input independently on the current rayon pool. A failing
/// input is recorded and does not stop the others.
pub fn run(inputs: &[PathBuf], options: &DriverOptions) -> Summary {
    let results: Vec<(PathBuf, anyhow::Result<FileReport>)> = inputs
        .par_iter()
        .map(|input| (input.clone(), process_file(input, options)))
        .collect();

    let mut summary = Summary::default();
    for (input, result) in results {
        match result {
            Ok(report) => summary.reports.push(report),
            Err(error) => {
                log::error!("{}: {error:#}", input.display());
                summary.failures.push((input, format!("{error:#}")));
            }
        }
    }
    summary
}

pub fn process_file(input: &Path, options: &DriverOptions) -> anyhow::Result<FileReport> {
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read input file {}", input.display()))?;
    if !crate::has_markers(&source) {
        log::debug!("{}: no markers, skipped", input.display());
        return Ok(FileReport { input: input.to_path_buf(), artifact: None, outcome: Outcome::Skipped });
    }

    let file = input.to_string_lossy();
    let generated = crate::generate(&source, Some(file.as_ref()), &options.config)
        .with_context(|| format!("failed to generate code for {}", input.display()))?;

    let artifact = artifact_path(input, options);
    let existing = match std::fs::read_to_string(&artifact) {
        Ok(text) => Some(text),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read artifact {}", artifact.display()));
        }
    };

    let outcome = if existing.as_deref() == Some(generated.as_str()) {
        log::debug!("{}: up to date", artifact.display());
        Outcome::Unchanged
    } else if options.check {
        log::warn!("{}: stale", artifact.display());
        Outcome::Stale
    } else {
        if let Some(parent) = artifact.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        std::fs::write(&artifact, &generated)
            .with_context(|| format!("failed to write artifact {}", artifact.display()))?;
        log::info!("wrote {}", artifact.display());
        Outcome::Written
    };
    Ok(FileReport { input: input.to_path_buf(), artifact: Some(artifact), outcome })
}

/// `dir/renderable.h` → `<out_dir or dir>/renderable<suffix>`
pub fn artifact_path(input: &Path, options: &DriverOptions) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = format!("{stem}{}", options.suffix);
    match &options.out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

impl Summary {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn stale(&self) -> impl Iterator<Item = &FileReport> {
        self.reports.iter().filter(|r| r.outcome == Outcome::Stale)
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.count(Outcome::Stale) == 0
    }

    pub fn print(&self) {
        for (input, error) in &self.failures {
            eprintln!("{} {}: {error}", "error".red().bold(), input.display());
        }
        for report in self.stale() {
            if let Some(artifact) = &report.artifact {
                eprintln!("{} {} is out of date", "stale".yellow().bold(), artifact.display());
            }
        }
        let line = format!(
            "{} written, {} unchanged, {} skipped, {} stale, {} failed",
            self.count(Outcome::Written),
            self.count(Outcome::Unchanged),
            self.count(Outcome::Skipped),
            self.count(Outcome::Stale),
            self.failures.len(),
        );
        if self.is_success() {
            eprintln!("{} {line}", "done".green().bold());
        } else {
            eprintln!("{} {line}", "failed".red().bold());
        }
    }
}
