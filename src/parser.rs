//! Declaration parser: raw header text → [`Code`].
//!
//! Runs in three steps:
//! - cut the annotated struct / enum / function blocks out of the text
//!   ([`blocks`]),
//! - build a scope tree for every struct and enum block ([`structs`]),
//! - parse wrapped function signatures once every file-level declaration is
//!   known ([`function`]).
pub mod blocks;
mod function;
mod structs;

use crate::attribute::{find_block, parse_attributes, scan_top_level, unquote, Attribute};
use crate::code::{Code, Function, Variable};
use crate::error::{bail, Error, Result};
use crate::resolve::Resolver;
use crate::types::BasicType;
use crate::Config;

use blocks::BlockKind;

/// Parse one input. `file` is only used for diagnostics and source locations.
pub fn parse(source: &str, file: Option<&str>, config: &Config) -> Result<Code> {
    let blocks = blocks::extract_blocks(source)?;
    let mut code = Code { file: file.map(str::to_string), ..Code::default() };

    let mut functions = Vec::new();
    for block in &blocks {
        match block.kind {
            BlockKind::Struct => {
                let id = structs::parse_struct_block(&mut code, block.text, config.max_depth)
                    .map_err(|e| e.in_declaration_at(block.line))?;
                code.structs.push(id);
            }
            BlockKind::Enum => {
                let id = structs::parse_enum_block(&mut code, block.text, config.max_depth)
                    .map_err(|e| e.in_declaration_at(block.line))?;
                code.enums.push(id);
            }
            BlockKind::Function => functions.push(block),
        }
    }

    let globals = code.roots();
    let resolver = Resolver::new(&code.scopes, &globals, config.max_depth);
    let parsed = functions
        .into_iter()
        .map(|block| {
            function::parse_function(block, &resolver, file).map_err(|e| e.in_declaration_at(block.line))
        })
        .collect::<Result<Vec<_>>>()?;
    check_wrapper_names(&code, &parsed)?;
    code.functions = parsed;

    log::debug!(
        "parsed {} root struct(s), {} root enum(s), {} function(s)",
        code.structs.len(),
        code.enums.len(),
        code.functions.len()
    );
    Ok(code)
}

/// Every wrapper becomes a variable named after its capitalized function and
/// registers under its script name; both must be unique in the unit.
fn check_wrapper_names(code: &Code, functions: &[Function]) -> Result<()> {
    for (i, function) in functions.iter().enumerate() {
        let line = function.location.line;
        let variable = capitalize(&function.name);
        if let Some(id) = code.roots().into_iter().find(|id| code.scopes.get(*id).name == variable) {
            let kind = if code.scopes.get(id).as_enum().is_some() { "enum" } else { "struct" };
            return Err(Error::new(format!(
                "wrapper '{variable}' for function '{}' collides with the {kind} of the same name",
                function.name
            ))
            .in_declaration_at(line));
        }
        for earlier in &functions[..i] {
            if earlier.name == function.name {
                return Err(Error::new(format!("function '{}' is wrapped more than once", function.name))
                    .in_declaration_at(line));
            }
            if earlier.lua_name == function.lua_name {
                return Err(Error::new(format!(
                    "functions '{}' and '{}' are both exposed as '{}'",
                    earlier.name, function.name, function.lua_name
                ))
                .in_declaration_at(line));
            }
        }
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// SHARED HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Cut the attribute list out of a declaration: `(tags, remaining text)`.
fn split_attribute_block(text: &str) -> Result<(Vec<Attribute>, String)> {
    let Some((start, end)) = find_block(text)? else {
        return Ok((Vec::new(), text.trim().to_string()));
    };
    let attrs = parse_attributes(&text[start..end])?;
    let rest = format!("{} {}", &text[..start], &text[end..]);
    if rest.contains("[[") {
        bail!(text, "only one attribute list is allowed per declaration");
    }
    Ok((attrs, rest.trim().to_string()))
}

/// Byte offset of the first `needle` outside of brackets and string literals.
fn find_top_level(text: &str, needle: char) -> Option<usize> {
    scan_top_level(text, |_, c| c == needle)
}

/// `std::map<std::string, int> values` → `("std::map<std::string, int>", "values")`.
fn split_type_and_name(decl: &str) -> Result<(String, String)> {
    let decl = decl.trim();
    let mut depth = 0i32;
    let mut split = None;
    for (i, c) in decl.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => split = Some(i),
            _ => {}
        }
    }
    let Some(at) = split else {
        bail!(decl, "expected a type followed by a name");
    };
    let (ty, name) = (decl[..at].trim(), decl[at..].trim());
    if !is_identifier(name) {
        bail!(decl, "'{name}' is not a valid name");
    }
    Ok((ty.to_string(), name.to_string()))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `inRangeValue` → `InRangeValue`
pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Apply variable-level tags. At most one range/comparison/list constraint
/// may be given.
fn apply_variable_attributes(var: &mut Variable, attrs: &[Attribute], snippet: &str) -> Result<()> {
    for attr in attrs {
        let args = attr.args_or_empty();
        let required = || -> Result<String> {
            if args.is_empty() {
                bail!(snippet, "attribute '{}' requires an argument", attr.name);
            }
            Ok(args.to_string())
        };
        let a = &mut var.attributes;
        match attr.name.as_str() {
            "key" => var.key = unquote(args)?,
            "reference" => a.reference = unquote(args).or_else(|_| required())?,
            "annotation" => a.annotation = unquote(args)?,
            "inrange" => a.inrange = required()?,
            "notinrange" => a.notinrange = required()?,
            "less" => a.less = required()?,
            "lessequal" => a.lessequal = required()?,
            "greater" => a.greater = required()?,
            "greaterequal" => a.greaterequal = required()?,
            "unequal" => a.unequal = required()?,
            "inlist" => a.inlist = required()?,
            "notinlist" => a.notinlist = required()?,
            "directory" => a.directory = true,
            "datetime" => a.datetime = true,
            "color" => a.color = true,
            "identifier" => a.identifier = true,
            "mustnotbeempty" => a.must_not_be_empty = true,
            "private" => a.private = true,
            other => bail!(snippet, "unknown variable attribute '{other}'"),
        }
    }
    if var.attributes.constraint_count() > 1 {
        bail!(snippet, "variable '{}' has more than one range, comparison or list constraint", var.name);
    }
    Ok(())
}

/// Type-specific tags select the verifier of the innermost value type, so at
/// most one may be given and it has to fit that type.
fn check_attribute_targets(var: &Variable, snippet: &str) -> Result<()> {
    let a = &var.attributes;
    if !a.has_type_specific() {
        return Ok(());
    }
    let selected = [
        a.constraint_count() > 0,
        !a.annotation.is_empty(),
        !a.reference.is_empty(),
        a.directory,
        a.datetime,
        a.color,
        a.identifier,
        a.must_not_be_empty,
    ];
    if selected.iter().filter(|s| **s).count() > 1 {
        bail!(snippet, "variable '{}' combines attributes that select different verifiers", var.name);
    }
    let leaf = var.ty.value_leaf();
    let Some(basic) = leaf.as_basic() else {
        bail!(
            snippet,
            "attributes of '{}' need a basic value type, found '{}'",
            var.name,
            var.ty.canonical()
        );
    };
    let fits = if !a.reference.is_empty() {
        basic == BasicType::Dictionary
    } else if a.color {
        basic.is_vec3() || basic.is_vec4()
    } else if a.directory {
        basic == BasicType::Path
    } else if a.datetime || a.identifier || a.must_not_be_empty {
        basic == BasicType::String
    } else if !a.annotation.is_empty() {
        basic != BasicType::Dictionary
    } else {
        !matches!(basic, BasicType::Dictionary | BasicType::Bool)
    };
    if !fits {
        bail!(snippet, "attribute of '{}' does not apply to type '{}'", var.name, leaf.canonical());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_and_name_split_respects_generics() {
        let (ty, name) = split_type_and_name("std::map<std::string, int> values").unwrap();
        assert_eq!(ty, "std::map<std::string, int>");
        assert_eq!(name, "values");
        assert!(split_type_and_name("int").is_err());
        assert!(split_type_and_name("int 3x").is_err());
    }

    #[test]
    fn top_level_search_skips_nesting() {
        assert_eq!(find_top_level("f(a = 1) = 2", '='), Some(9));
        assert_eq!(find_top_level(r#"x = "a=b""#, '='), Some(2));
        assert_eq!(find_top_level("map<a, b>", ','), None);
    }

    #[test]
    fn wrapper_names_must_be_unique() {
        let config = Config::default();
        let twice = "[[codegen::luawrap]] void f() {}\n[[codegen::luawrap]] void f(int a) {}";
        let err = parse(twice, None, &config).unwrap_err();
        assert!(err.message.contains("wrapped more than once"), "{}", err.message);
        assert!(err.message.contains("line 2"), "{}", err.message);

        let same_script_name = "[[codegen::luawrap(\"go\")]] void f() {}\n[[codegen::luawrap(\"go\")]] void g() {}";
        assert!(parse(same_script_name, None, &config).unwrap_err().message.contains("both exposed as 'go'"));

        let shadowing = "struct [[codegen::Dictionary(P)]] Pose { int a; };\n[[codegen::luawrap]] Pose pose() {}";
        assert!(parse(shadowing, None, &config).unwrap_err().message.contains("collides with the struct"));

        let distinct = "[[codegen::luawrap]] void f() {}\n[[codegen::luawrap(\"g\")]] void other() {}";
        assert_eq!(parse(distinct, None, &config).unwrap().functions.len(), 2);
    }

    #[test]
    fn capitalization() {
        assert_eq!(capitalize("inRangeValueFloat"), "InRangeValueFloat");
        assert_eq!(capitalize("_x"), "_x");
    }

    #[test]
    fn attribute_block_is_cut_out() {
        let (attrs, rest) = split_attribute_block("float v [[codegen::less(5)]]").unwrap();
        assert_eq!(rest, "float v");
        assert_eq!(attrs[0].name, "less");
        assert!(split_attribute_block("a [[codegen::x]] b [[codegen::y]]").is_err());
    }
}
