//! Wrapped free-function signatures.
use crate::attribute::{find_block, parse_attributes, split_arguments, unquote};
use crate::code::{Function, SourceLocation, Variable, VariableAttributes};
use crate::error::{bail, Result};
use crate::resolve::Resolver;
use crate::types::TypeNode;

use super::blocks::Block;
use super::{apply_variable_attributes, check_attribute_targets, find_top_level, split_attribute_block, split_type_and_name};

const SPECIFIERS: &[&str] = &["static", "inline", "constexpr"];

pub(super) fn parse_function(block: &Block<'_>, resolver: &Resolver<'_>, file: Option<&str>) -> Result<Function> {
    let text = block.text;
    let Some((start, end)) = find_block(text)? else {
        bail!(text, "malformed function marker");
    };
    let mut lua_name = None;
    for attr in parse_attributes(&text[start..end])? {
        match (attr.name.as_str(), attr.args.as_deref()) {
            ("luawrap", None) => {}
            ("luawrap", Some(arg)) => lua_name = Some(unquote(arg)?),
            (other, _) => bail!(text, "unknown function attribute '{other}'"),
        }
    }

    let signature = text[end..].trim();
    let (Some(open), Some(close)) = (signature.find('('), signature.rfind(')')) else {
        bail!(signature, "expected a parameter list");
    };
    let trailing = signature[close + 1..].trim();
    if !trailing.is_empty() && trailing != "noexcept" {
        bail!(signature, "unsupported trailing '{trailing}' after the parameter list");
    }

    let mut head = signature[..open].trim();
    while let Some(rest) = SPECIFIERS.iter().find_map(|s| head.strip_prefix(*s).filter(|r| r.starts_with(' '))) {
        head = rest.trim_start();
    }
    let (return_text, name) = split_type_and_name(head)?;
    if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        bail!(signature, "wrapped function names must start with a lowercase letter, found '{name}'");
    }
    let return_text = return_text.strip_prefix("const ").unwrap_or(&return_text).trim();
    if return_text.contains('&') {
        bail!(signature, "functions returning references cannot be wrapped");
    }
    let return_type = resolver.parse(return_text, None)?;

    let arguments = split_arguments(&signature[open + 1..close])
        .into_iter()
        .filter(|p| p != "void")
        .map(|p| parse_parameter(&p, resolver))
        .collect::<Result<Vec<_>>>()?;
    validate_parameter_order(&arguments, signature)?;

    log::debug!("parsed wrapped function '{name}' with {} parameter(s)", arguments.len());
    Ok(Function {
        lua_name: lua_name.unwrap_or_else(|| name.clone()),
        name,
        documentation: block.doc.clone(),
        return_type,
        arguments,
        location: SourceLocation { path: file.map(str::to_string), line: block.line },
    })
}

fn parse_parameter(text: &str, resolver: &Resolver<'_>) -> Result<Variable> {
    if text.is_empty() {
        bail!(text, "empty parameter");
    }
    let (attrs, rest) = split_attribute_block(text)?;
    let (decl, default) = match find_top_level(&rest, '=') {
        Some(at) => (rest[..at].trim(), Some(rest[at + 1..].trim().to_string())),
        None => (rest.as_str(), None),
    };
    if default.as_deref().is_some_and(|d| d.starts_with('{')) {
        bail!(text, "brace-initialized default values are not supported");
    }
    if default.as_deref() == Some("") {
        bail!(text, "missing default value after '='");
    }

    let decl = decl.strip_prefix("const ").unwrap_or(decl);
    let (ty_text, name) = split_type_and_name(decl)?;
    if ty_text.contains('&') || ty_text.ends_with('*') {
        bail!(text, "pointer and reference parameters are not supported");
    }
    let Some(ty) = resolver.parse(&ty_text, None)? else {
        bail!(text, "parameter '{name}' cannot have type 'void'");
    };
    let ty = match (ty, default) {
        (TypeNode::Optional { inner, .. }, Some(default)) => TypeNode::Optional { inner, default: Some(default) },
        (ty, Some(default)) => TypeNode::optional(ty, Some(default)),
        (ty, None) => ty,
    };

    let mut var = Variable {
        key: name.clone(),
        name,
        ty,
        comment: String::new(),
        attributes: VariableAttributes::default(),
    };
    apply_variable_attributes(&mut var, &attrs, text)?;
    check_attribute_targets(&var, text)?;
    Ok(var)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Initial,
    FirstOptional,
    Required,
    SecondOptional,
}

/// Optional parameters may lead or trail the required ones, never both sides
/// of a required one twice. The last leading optional must differ in type from
/// the first required parameter, otherwise the two cannot be told apart when
/// the optional one is left out.
fn validate_parameter_order(arguments: &[Variable], signature: &str) -> Result<()> {
    let mut state = Order::Initial;
    let mut previous: Option<&Variable> = None;
    for arg in arguments {
        let optional = arg.ty.is_optional();
        state = match (state, optional) {
            (Order::Initial, true) | (Order::FirstOptional, true) => Order::FirstOptional,
            (Order::Initial, false) | (Order::Required, false) => Order::Required,
            (Order::FirstOptional, false) => {
                if let Some(prev) = previous {
                    if *prev.ty.strip_optional() == arg.ty {
                        bail!(
                            signature,
                            "optional parameter '{}' directly precedes required parameter '{}' of the same type '{}'",
                            prev.name,
                            arg.name,
                            arg.ty.canonical()
                        );
                    }
                }
                Order::Required
            }
            (Order::Required, true) | (Order::SecondOptional, true) => Order::SecondOptional,
            (Order::SecondOptional, false) => {
                bail!(signature, "required parameter '{}' follows trailing optional parameters", arg.name)
            }
        };
        previous = Some(arg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Scopes;
    use crate::parser::blocks::extract_blocks;

    fn parse(source: &str) -> Result<Function> {
        let scopes = Scopes::default();
        let resolver = Resolver::new(&scopes, &[], 32);
        let blocks = extract_blocks(source)?;
        parse_function(&blocks[0], &resolver, Some("scripts.h"))
    }

    #[test]
    fn signature_and_defaults() {
        let f = parse("// Sums.\n[[codegen::luawrap(\"sum\")]] static double add(int a, std::optional<float> b, glm::vec3 c = glm::vec3(1, 2, 3)) {}")
            .unwrap();
        assert_eq!(f.name, "add");
        assert_eq!(f.lua_name, "sum");
        assert_eq!(f.documentation, "Sums.");
        assert_eq!(f.location, SourceLocation { path: Some("scripts.h".into()), line: 2 });
        assert_eq!(f.return_type.as_ref().map(TypeNode::canonical).as_deref(), Some("double"));
        let types: Vec<_> = f.arguments.iter().map(|a| a.ty.canonical()).collect();
        assert_eq!(types, ["int", "optional<float>", "optional<vec3>"]);
        let TypeNode::Optional { default, .. } = &f.arguments[2].ty else { panic!("expected optional") };
        assert_eq!(default.as_deref(), Some("glm::vec3(1, 2, 3)"));
    }

    #[test]
    fn void_and_empty() {
        let f = parse("[[codegen::luawrap]] void reset() {}").unwrap();
        assert!(f.return_type.is_none());
        assert!(f.arguments.is_empty());
        assert_eq!(f.lua_name, "reset");
    }

    #[test]
    fn leading_and_trailing_optionals() {
        let ok = "[[codegen::luawrap]] void f(std::optional<int> a, std::optional<std::string> b, float c, bool d = true) {}";
        assert!(parse(ok).is_ok());
        let ambiguous = "[[codegen::luawrap]] void f(std::optional<int> a, std::optional<float> b, float c) {}";
        assert!(parse(ambiguous).unwrap_err().message.contains("same type"));
        let misordered = "[[codegen::luawrap]] void f(int a, std::optional<int> b, int c) {}";
        assert!(parse(misordered).unwrap_err().message.contains("follows trailing optional"));
    }

    #[test]
    fn unsupported_signatures() {
        assert!(parse("[[codegen::luawrap]] void Reset() {}").is_err());
        assert!(parse("[[codegen::luawrap]] void f(const std::string& s) {}").is_err());
        assert!(parse("[[codegen::luawrap]] void f(int* s) {}").is_err());
        assert!(parse("[[codegen::luawrap]] void f(std::vector<int> v = {}) {}").is_err());
        assert!(parse("[[codegen::luawrap]] void f(std::list<int> v) {}").is_err());
        assert!(parse("[[codegen::luawrap]] void f() const {}").is_err());
        assert!(parse("[[codegen::luawrap]] void f() noexcept {}").is_ok());
    }

    #[test]
    fn defaults_with_shifts_and_comparisons() {
        let f = parse("[[codegen::luawrap]] void f(int a = 1 << 2, int b = 3, bool c = 2 > 1, int d = 8 >> 1) {}").unwrap();
        let defaults: Vec<_> = f
            .arguments
            .iter()
            .map(|a| match &a.ty {
                TypeNode::Optional { default, .. } => default.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(defaults, [Some("1 << 2".into()), Some("3".into()), Some("2 > 1".into()), Some("8 >> 1".into())]);

        let f = parse("[[codegen::luawrap]] void g(std::map<std::string, int> m, std::optional<int> n) {}").unwrap();
        let types: Vec<_> = f.arguments.iter().map(|a| a.ty.canonical()).collect();
        assert_eq!(types, ["map<string, int>", "optional<int>"]);
    }
}
