//! Companion-code generator for annotated C++ declarations.
//!
//! Parses `[[codegen::...]]`-annotated structs, enums and free functions out of
//! header text and emits the validation, conversion, enum string conversion
//! and scripting wrapper code that goes with them.
//!
//! ```text
//! raw text → parser::parse → Code → codegen::generate → emitted text
//! ```
pub mod attribute;
pub mod code;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod parser;
pub mod resolve;
pub mod types;

pub use code::Code;
pub use error::{Error, Result};

/// Knobs of the core pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deepest struct nesting and generic type nesting accepted before the
    /// input is rejected.
    pub max_depth: usize,
    /// Start the emitted unit with a "do not edit" banner.
    pub emit_banner: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_depth: 32, emit_banner: true }
    }
}

/// Parse `source` and emit its companion unit.
///
/// Pure function of its arguments: the same input always produces the same
/// text. `file` names the input in diagnostics and in the source locations of
/// wrapped functions.
pub fn generate(source: &str, file: Option<&str>, config: &Config) -> Result<String> {
    let code = parser::parse(source, file, config)?;
    codegen::generate(&code, config)
}

/// True when `source` carries at least one annotation this crate reacts to.
pub fn has_markers(source: &str) -> bool {
    source.contains("[[codegen::")
}
