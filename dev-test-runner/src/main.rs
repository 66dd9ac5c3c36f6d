//! Replays the fixture corpus in `fixtures/manifest.json` against the
//! generator: every case either generates (twice, byte-identical) and
//! contains the listed patterns, or fails with the listed message.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use regex::Regex;
use serde::Deserialize;

use dictgen::{generate, Config};

// ————————————————————————————————————————————————————————————————————————————
// MANIFEST
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    file: String,
    expect: Expect,
    /// Regular expressions the generated unit must match.
    #[serde(default)]
    matches: Vec<String>,
    /// Substring the error message must contain.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Expect {
    Ok,
    Error,
}

// ————————————————————————————————————————————————————————————————————————————
// RUNNER
// ————————————————————————————————————————————————————————————————————————————

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn load_manifest(path: &Path) -> Result<Manifest, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(de).map_err(|e| format!("{}: at '{}': {}", path.display(), e.path(), e.inner()))
}

fn run_case(dir: &Path, case: &Case) -> Result<(), String> {
    let path = dir.join(&case.file);
    let source = std::fs::read_to_string(&path).map_err(|e| format!("failed to read fixture: {e}"))?;
    let config = Config::default();
    let result = generate(&source, Some(case.file.as_str()), &config);

    match (&case.expect, result) {
        (Expect::Ok, Ok(unit)) => {
            let again = generate(&source, Some(case.file.as_str()), &config).map_err(|e| e.to_string())?;
            if again != unit {
                return Err("second run produced different output".to_string());
            }
            for pattern in &case.matches {
                let re = Regex::new(pattern).map_err(|e| format!("bad pattern '{pattern}': {e}"))?;
                if !re.is_match(&unit) {
                    return Err(format!("output does not match '{pattern}'"));
                }
            }
            Ok(())
        }
        (Expect::Ok, Err(error)) => Err(format!("unexpected error: {error}")),
        (Expect::Error, Ok(_)) => Err("expected an error, generation succeeded".to_string()),
        (Expect::Error, Err(error)) => match &case.error {
            Some(needle) if !error.to_string().contains(needle.as_str()) => {
                Err(format!("error does not mention '{needle}': {error}"))
            }
            _ => Ok(()),
        },
    }
}

fn main() -> ExitCode {
    let dir = fixtures_dir();
    let manifest = match load_manifest(&dir.join("manifest.json")) {
        Ok(manifest) => manifest,
        Err(error) => {
            eprintln!("{} {error}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0;
    for case in &manifest.cases {
        match run_case(&dir, case) {
            Ok(()) => eprintln!("{} {}", "ok".green(), case.file),
            Err(reason) => {
                failed += 1;
                eprintln!("{} {}: {reason}", "FAILED".red().bold(), case.file);
            }
        }
    }

    eprintln!("{} case(s), {failed} failed", manifest.cases.len());
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
