//! Code generator: [`Code`] → companion unit.
//!
//! Every section is rendered into its own buffer first. While rendering, a
//! section records in [`Requirements`] which fallback declarations it relies
//! on; the unit is then assembled in a fixed order:
//!
//! 1. banner
//! 2. fallback declarations, only those some section asked for
//! 3. enum conversions
//! 4. struct documentation, validation and conversion
//! 5. scripting wrappers
mod convert;
mod enums;
mod luawrap;
mod snippets;
mod verifier;

use crate::code::{Code, ScopeId};
use crate::error::Result;
use crate::Config;

use convert::Inventory;

/// Shapes and families of declarations referenced somewhere in the unit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    /// `doc<T>` / `bake<T>` primary templates.
    pub documentation: bool,
    /// `toString<T>` / `fromString<T>` primary templates.
    pub enum_strings: bool,
    pub enum_map: bool,
    pub enum_arrayify: bool,
    pub optional: bool,
    pub sequence: bool,
    pub array: bool,
    pub map_string: bool,
    pub map_enum: bool,
    pub tuple: bool,
}

pub fn generate(code: &Code, config: &Config) -> Result<String> {
    if code.is_empty() {
        log::debug!("no annotated declarations");
    }
    let inventory = Inventory::collect(code);
    let mut req = Requirements::default();

    let enum_section = enums::emit(code, &inventory, &mut req)?;
    let struct_section = emit_structs(code, &inventory, &mut req)?;
    let lua_section = luawrap::emit(code, &mut req)?;
    log::debug!("generation requirements: {req:?}");

    let mut unit = String::new();
    if config.emit_banner {
        unit.push_str(snippets::BANNER);
    }
    let fallbacks = snippets::fallbacks(&req);
    for section in [fallbacks, enum_section, struct_section, lua_section] {
        if section.is_empty() {
            continue;
        }
        if !unit.is_empty() {
            unit.push('\n');
        }
        unit.push_str(&section);
    }
    Ok(unit)
}

fn emit_structs(code: &Code, inventory: &Inventory, req: &mut Requirements) -> Result<String> {
    let structs = code.all_structs();
    if structs.is_empty() {
        return Ok(String::new());
    }
    inventory.record_requirements(req);
    req.documentation = true;

    let mut out = Out::default();
    out.line("namespace codegen::internal {");
    out.blank();
    convert::emit_declarations(&mut out, code, &structs, inventory);
    verifier::emit_enum_verifiers(&mut out, code, inventory);
    for id in &structs {
        verifier::emit_entries(&mut out, code, *id)?;
    }
    convert::emit_converters(&mut out, code, &structs, inventory);
    out.line("} // namespace codegen::internal");
    out.blank();

    out.line("namespace codegen {");
    out.blank();
    for id in &code.structs {
        verifier::emit_root(&mut out, code, *id);
    }
    out.line("} // namespace codegen");
    log::debug!("emitted {} struct(s)", structs.len());
    Ok(out.into_string())
}

/// Qualified and mangled name of a scope.
fn names(code: &Code, id: ScopeId) -> (String, String) {
    (code.scopes.qualified_name(id), code.scopes.mangled_name(id))
}

// ————————————————————————————————————————————————————————————————————————————
// OUTPUT BUFFER
// ————————————————————————————————————————————————————————————————————————————

/// Line-oriented text buffer with four-space indentation.
#[derive(Debug, Default)]
struct Out {
    text: String,
    indent: usize,
}

impl Out {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.text.push_str("    ");
            }
            self.text.push_str(text);
        }
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    /// `head`, then the lines written by `body` one level deeper, then `tail`.
    fn block(&mut self, head: impl AsRef<str>, tail: &str, body: impl FnOnce(&mut Self)) {
        self.line(head);
        self.indent += 1;
        body(self);
        self.indent -= 1;
        self.line(tail);
    }

    fn into_string(self) -> String {
        self.text
    }
}

/// `"text"` with backslashes and quotes escaped.
fn quoted(text: &str) -> String {
    format!("\"{}\"", crate::parser::blocks::escape(text))
}

/// `"text"` for text taken from a string literal in the input, which is
/// already escaped.
fn literal(text: &str) -> String {
    format!("\"{text}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_indent_their_body() {
        let mut out = Out::default();
        out.block("void f() {", "}", |out| {
            out.line("int a;");
            out.blank();
            out.block("if (a) {", "}", |out| out.line("a = 1;"));
        });
        assert_eq!(out.into_string(), "void f() {\n    int a;\n\n    if (a) {\n        a = 1;\n    }\n}\n");
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(quoted(r#"a "b" \c"#), r#""a \"b\" \\c""#);
    }

    #[test]
    fn empty_input_yields_only_the_banner() {
        let unit = generate(&Code::default(), &Config::default()).unwrap();
        assert_eq!(unit, snippets::BANNER);
        let bare = generate(&Code::default(), &Config { emit_banner: false, ..Config::default() }).unwrap();
        assert!(bare.is_empty());
    }
}
