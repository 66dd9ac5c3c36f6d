//! The single failure kind of the generator.
use thiserror::Error;

/// Longest snippet of offending input carried by an error.
const SNIPPET_MAX_CHARS: usize = 120;

/// A parse or generation failure.
///
/// Carries a human-readable message and, where useful, a short excerpt of the
/// input that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", .message, render_snippet(.snippet))]
pub struct Error {
    pub message: String,
    pub snippet: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), snippet: None }
    }

    /// Attach an excerpt of the offending input. Long excerpts are truncated on
    /// a char boundary.
    pub fn with_snippet(mut self, snippet: &str) -> Self {
        let trimmed = snippet.trim();
        let short: String = trimmed.chars().take(SNIPPET_MAX_CHARS).collect();
        self.snippet = if short.len() < trimmed.len() {
            Some(format!("{short}..."))
        } else {
            Some(short)
        };
        self
    }

    /// Name the input line a failing declaration starts on.
    pub fn in_declaration_at(mut self, line: usize) -> Self {
        self.message = format!("{} (in declaration starting at line {line})", self.message);
        self
    }
}

fn render_snippet(snippet: &Option<String>) -> String {
    match snippet {
        Some(s) => format!("\n  in: {s}"),
        None => String::new(),
    }
}

/// Shorthand used throughout the parser: `bail!(snippet, "fmt", args..)`.
macro_rules! bail {
    ($snippet:expr, $($arg:tt)+) => {
        return Err($crate::error::Error::new(format!($($arg)+)).with_snippet($snippet))
    };
}
pub(crate) use bail;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_snippet() {
        let err = Error::new("bad thing").with_snippet("  int x = 5;  ");
        assert_eq!(err.to_string(), "bad thing\n  in: int x = 5;");
    }

    #[test]
    fn long_snippets_are_truncated_on_char_boundary() {
        let text = "αβγ".repeat(100);
        let err = Error::new("x").with_snippet(&text);
        let snippet = err.snippet.unwrap();
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS + 3);
    }
}
