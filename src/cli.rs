//! CLI: generate companion units, or dump the parsed model.
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use dictgen::driver::{self, DriverOptions};
use dictgen::Config;

use crate::logging::{init_logging, LoggingConfig};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate validation, conversion and scripting glue for annotated C++ declarations
#[derive(Parser, Debug)]
#[command(name = "dictgen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// log filter, e.g. `debug` or `dictgen::parser=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// only log warnings and errors
    #[arg(long, short, global = true, default_value_t = false)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate one companion unit per annotated input
    Generate(GenerateOut),
    /// parse a single input and print its declaration model as JSON
    Model(ModelOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths, quoted glob patterns or
    /// directories (searched recursively for .h, .hpp, .cpp and .inl files)
    #[arg(num_args = 1.., required = true)]
    input: Vec<String>,

    /// deepest struct and generic type nesting accepted
    #[arg(long, default_value_t = Config::default().max_depth)]
    max_depth: usize,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// directory for generated units (next to each input if omitted)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// appended to the input's file stem to name its unit
    #[arg(long, default_value = "_codegen.cpp")]
    suffix: String,

    /// fail instead of rewriting units that are missing or out of date
    #[arg(long, default_value_t = false)]
    check: bool,

    /// worker threads (rayon default if omitted)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// leave out the "do not edit" banner
    #[arg(long, default_value_t = false)]
    no_banner: bool,
}

#[derive(clap::Parser, Debug)]
struct ModelOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn config(&self) -> Config {
        Config { max_depth: self.max_depth, ..Config::default() }
    }

    fn source_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        init_logging(LoggingConfig { filter: self.log_level.clone(), quiet: self.quiet });
        match &self.cmd {
            Command::Generate(target) => target.run(),
            Command::Model(target) => target.run(),
        }
    }
}

impl GenerateOut {
    fn run(&self) -> anyhow::Result<()> {
        let inputs = self.input_settings.source_paths()?;
        log::debug!("{} input file(s)", inputs.len());
        let options = DriverOptions {
            out_dir: self.out_dir.clone(),
            suffix: self.suffix.clone(),
            check: self.check,
            config: Config { emit_banner: !self.no_banner, ..self.input_settings.config() },
        };

        let summary = match self.jobs {
            Some(jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .context("failed to build worker pool")?
                .install(|| driver::run(&inputs, &options)),
            None => driver::run(&inputs, &options),
        };
        summary.print();

        if !summary.failures.is_empty() {
            bail!("{} input(s) failed", summary.failures.len());
        }
        let stale = summary.stale().count();
        if stale > 0 {
            bail!("{stale} generated unit(s) are out of date; rerun without --check");
        }
        Ok(())
    }
}

impl ModelOut {
    fn run(&self) -> anyhow::Result<()> {
        let config = self.input_settings.config();
        let mut models = Vec::new();
        for source_path in self.input_settings.source_paths()? {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {}", source_path.display()))?;
            let file = source_path.to_string_lossy();
            let code = dictgen::parser::parse(&source, Some(file.as_ref()), &config)
                .with_context(|| format!("failed to parse {}", source_path.display()))?;
            models.push(code);
        }

        let model_src = match models.as_slice() {
            [single] => serde_json::to_string_pretty(single)?,
            all => serde_json::to_string_pretty(all)?,
        };
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
            std::fs::write(out, &model_src).with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            println!("{model_src}");
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

const SOURCE_EXTENSIONS: &[&str] = &["h", "hpp", "cpp", "inl"];

/// Expand literal paths, glob patterns and directories into a sorted,
/// deduplicated list of files.
fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                let path = entry?;
                if path.is_file() {
                    matched_any = true;
                    out.push(path);
                }
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else if PathBuf::from(pattern).is_dir() {
            let root = glob::Pattern::escape(pattern.trim_end_matches('/'));
            for ext in SOURCE_EXTENSIONS {
                for entry in glob::glob(&format!("{root}/**/*.{ext}"))? {
                    out.push(entry?);
                }
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_walked_for_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        for name in ["a.h", "nested/b.hpp", "nested/c.inl", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let found = resolve_file_path_patterns([dir.path().to_string_lossy()]).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.h", "nested/b.hpp", "nested/c.inl"]);
    }

    #[test]
    fn empty_globs_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.h", dir.path().display());
        assert!(resolve_file_path_patterns([pattern]).is_err());
    }

    #[test]
    fn literal_paths_pass_through() {
        let found = resolve_file_path_patterns(["does/not/exist.h", "does/not/exist.h"]).unwrap();
        assert_eq!(found, vec![PathBuf::from("does/not/exist.h")]);
    }

    #[test]
    fn generate_arguments_parse() {
        let cli = CommandLineInterface::try_parse_from([
            "dictgen", "generate", "include/", "--out-dir", "gen", "--check", "-j", "4",
        ])
        .unwrap();
        let Command::Generate(target) = cli.cmd else { panic!("expected generate") };
        assert_eq!(target.input_settings.input, vec!["include/"]);
        assert_eq!(target.suffix, "_codegen.cpp");
        assert!(target.check);
        assert_eq!(target.jobs, Some(4));
        assert_eq!(target.input_settings.max_depth, 32);
    }
}
