//! Type spelling → [`TypeNode`], with custom names resolved against the
//! lexical scope chain.
use crate::attribute::split_arguments;
use crate::code::{ScopeId, ScopeKind, Scopes};
use crate::error::{bail, Result};
use crate::types::{BasicType, CustomKind, CustomRef, TypeNode};

/// Namespace prefixes dropped before a spelling is matched. Longest first.
const STRIPPED_PREFIXES: &[&str] = &["std::filesystem::", "std::", "glm::", "ghoul::"];

pub struct Resolver<'a> {
    pub scopes: &'a Scopes,
    /// File-level declarations visible from everywhere (previously parsed root
    /// structs and root enums).
    pub globals: &'a [ScopeId],
    pub max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(scopes: &'a Scopes, globals: &'a [ScopeId], max_depth: usize) -> Self {
        Self { scopes, globals, max_depth }
    }

    /// Parse `spelling` as seen from `scope`. `void` yields `None`.
    pub fn parse(&self, spelling: &str, scope: Option<ScopeId>) -> Result<Option<TypeNode>> {
        if spelling.trim() == "void" {
            return Ok(None);
        }
        self.parse_at(spelling, scope, 0).map(Some)
    }

    fn parse_at(&self, spelling: &str, scope: Option<ScopeId>, depth: usize) -> Result<TypeNode> {
        if depth > self.max_depth {
            bail!(spelling, "type nesting exceeds the maximum depth of {}", self.max_depth);
        }
        let original = spelling.trim();
        let text = strip_prefixes(original);

        if let Some(basic) = BasicType::from_short(text) {
            return Ok(TypeNode::basic(basic));
        }
        if let Some(pointee) = original.strip_suffix('*') {
            return Ok(TypeNode::Pointer { name: pointee.trim().to_string() });
        }
        if text == "void" {
            bail!(original, "'void' is only valid as a function return type");
        }

        if let Some((head, args)) = split_generic(text) {
            let head = head.trim();
            let args = split_arguments(args);
            let parse_arg = |arg: &str| self.parse_at(arg, scope, depth + 1);
            return match (head, args.len()) {
                ("optional", 1) => Ok(TypeNode::optional(parse_arg(&args[0])?, None)),
                ("vector", 1) => Ok(TypeNode::sequence(parse_arg(&args[0])?)),
                ("array", 2) => {
                    let inner = parse_arg(&args[0])?;
                    let Ok(size) = args[1].trim().parse::<usize>() else {
                        bail!(original, "array size '{}' is not a non-negative integer literal", args[1]);
                    };
                    Ok(TypeNode::Array { inner: Box::new(inner), size })
                }
                ("map", 2) => {
                    let key = parse_arg(&args[0])?;
                    let value = parse_arg(&args[1])?;
                    make_map(original, key, value)
                }
                ("variant", n) if n > 0 => {
                    let alternatives = args.iter().map(|a| parse_arg(a)).collect::<Result<Vec<_>>>()?;
                    make_variant(original, alternatives)
                }
                ("tuple", n) if n > 0 => {
                    let elements = args.iter().map(|a| parse_arg(a)).collect::<Result<Vec<_>>>()?;
                    Ok(TypeNode::Tuple { elements })
                }
                ("optional" | "vector" | "array" | "map" | "variant" | "tuple", n) => {
                    bail!(original, "'{head}' does not take {n} type argument(s)")
                }
                _ => bail!(original, "dictgen doesn't know how to handle type '{original}'"),
            };
        }

        if !is_qualified_identifier(text) {
            bail!(original, "dictgen doesn't know how to handle type '{original}'");
        }
        match self.lookup(original, scope) {
            Some(target) => {
                let node = self.scopes.get(target);
                let kind = match node.kind {
                    ScopeKind::Struct(_) => CustomKind::Struct,
                    ScopeKind::Enum(_) => CustomKind::Enum,
                };
                Ok(TypeNode::Custom {
                    custom: CustomRef {
                        name: original.to_string(),
                        qualified: self.scopes.qualified_name(target),
                        kind,
                        target,
                    },
                })
            }
            None => bail!(
                original,
                "dictgen doesn't know how to handle type '{original}': no struct or enum of that name is in scope"
            ),
        }
    }

    /// Resolve a possibly qualified name (`Outer::Inner`). The first component
    /// is searched in `scope`'s children, then `scope` itself, then each
    /// ancestor in turn, then the file-level declarations; later components
    /// descend into children.
    pub fn lookup(&self, name: &str, scope: Option<ScopeId>) -> Option<ScopeId> {
        let mut parts = name.split("::").map(str::trim);
        let first = parts.next()?;
        let mut found = self.lookup_first(first, scope)?;
        for part in parts {
            found = self.scopes.child_named(found, part)?;
        }
        Some(found)
    }

    fn lookup_first(&self, name: &str, scope: Option<ScopeId>) -> Option<ScopeId> {
        if let Some(scope) = scope {
            for level in self.scopes.ancestry(scope) {
                if let Some(child) = self.scopes.child_named(level, name) {
                    return Some(child);
                }
                if self.scopes.get(level).name == name {
                    return Some(level);
                }
            }
        }
        self.globals.iter().copied().find(|g| self.scopes.get(*g).name == name)
    }
}

fn strip_prefixes(text: &str) -> &str {
    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    text
}

/// `head<args>` → `(head, args)` when the spelling ends in the `>` matching
/// its first `<`.
fn split_generic(text: &str) -> Option<(&str, &str)> {
    let open = text.find('<')?;
    let inner = text.strip_suffix('>')?;
    let mut depth = 0i32;
    for (i, c) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 && i != text.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then(|| (&text[..open], &inner[open + 1..]))
}

fn is_qualified_identifier(text: &str) -> bool {
    !text.is_empty()
        && text.split("::").all(|part| {
            let mut chars = part.trim().chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn make_map(spelling: &str, key: TypeNode, value: TypeNode) -> Result<TypeNode> {
    let key_ok = key.as_basic() == Some(BasicType::String) || key.is_enum();
    if !key_ok {
        bail!(spelling, "map keys must be 'string' or an enum, found '{}'", key.canonical());
    }
    Ok(TypeNode::Map { key: Box::new(key), value: Box::new(value) })
}

fn make_variant(spelling: &str, alternatives: Vec<TypeNode>) -> Result<TypeNode> {
    if alternatives.iter().filter(|a| a.is_sequence()).count() > 1 {
        bail!(spelling, "a variant may contain at most one vector alternative");
    }
    for alt in &alternatives {
        let testable = alt.as_basic().is_some() || alt.is_sequence() || alt.is_enum();
        if !testable {
            bail!(
                spelling,
                "variant alternative '{}' must be a basic type, a vector, or an enum",
                alt.canonical()
            );
        }
    }
    Ok(TypeNode::Variant { alternatives })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{EnumScope, ScopeNode, StructScope};

    fn parse(spelling: &str) -> Result<TypeNode> {
        let scopes = Scopes::default();
        let resolver = Resolver::new(&scopes, &[], 32);
        resolver.parse(spelling, None).map(|t| t.unwrap())
    }

    #[test]
    fn canonical_round_trip() {
        for spelling in [
            "vector<optional<float>>",
            "map<string, vec3>",
            "array<dvec2, 4>",
            "variant<double, float, string>",
            "tuple<int, optional<string>, mat3x3>",
            "optional<vector<path>>",
            "Dictionary",
            "Thing*",
        ] {
            assert_eq!(parse(spelling).unwrap().canonical(), spelling);
        }
    }

    #[test]
    fn qualified_spellings_normalize() {
        let ty = parse("std::optional<std::vector<glm::vec3>>").unwrap();
        assert_eq!(ty.canonical(), "optional<vector<vec3>>");
        assert_eq!(ty.native(), "std::optional<std::vector<glm::vec3>>");
        assert_eq!(parse("std::filesystem::path").unwrap().as_basic(), Some(BasicType::Path));
    }

    #[test]
    fn structural_equality() {
        let a = parse("map<string, vec3>").unwrap();
        let b = parse("std::map<std::string,glm::vec3>").unwrap();
        let c = parse("map<string, vec2>").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_eq!(a, a.clone());
        assert_ne!(a, c);
    }

    #[test]
    fn descriptive_rendering() {
        assert_eq!(parse("optional<float>").unwrap().descriptive(), "Number?");
        assert_eq!(parse("vector<bool>").unwrap().descriptive(), "[Boolean]");
        assert_eq!(parse("variant<double,float,string>").unwrap().descriptive(), "Number | Number | String");
        assert_eq!(parse("map<string,int>").unwrap().descriptive(), "String -> Integer");
        assert_eq!(parse("tuple<int, bool>").unwrap().descriptive(), "(Integer, Boolean)");
    }

    #[test]
    fn illegal_spellings() {
        let err = parse("std::list<int>").unwrap_err();
        assert!(err.message.contains("doesn't know how to handle"), "{err}");
        assert!(parse("map<int, float>").unwrap_err().message.contains("map keys"));
        assert!(parse("variant<vector<int>, vector<float>>").is_err());
        assert!(parse("variant<int, map<string, int>>").is_err());
        assert!(parse("array<float, -1>").is_err());
        assert!(parse("optional<float, int>").is_err());
        assert!(parse("Unknown").is_err());
        assert!(parse("void").is_ok());
        assert!(parse("vector<void>").is_err());
    }

    #[test]
    fn depth_is_bounded() {
        let scopes = Scopes::default();
        let resolver = Resolver::new(&scopes, &[], 3);
        let deep = "vector<vector<vector<vector<vector<int>>>>>";
        let err = resolver.parse(deep, None).unwrap_err();
        assert!(err.message.contains("maximum depth"));
        assert!(resolver.parse("vector<vector<int>>", None).is_ok());
    }

    #[test]
    fn custom_names_walk_outward() {
        let mut scopes = Scopes::default();
        let struct_node = |name: &str, parent| ScopeNode {
            name: name.into(),
            comment: String::new(),
            parent,
            kind: ScopeKind::Struct(StructScope::default()),
        };
        let root = scopes.alloc(struct_node("P", None));
        let mode = scopes.alloc(ScopeNode {
            name: "Mode".into(),
            comment: String::new(),
            parent: Some(root),
            kind: ScopeKind::Enum(EnumScope::default()),
        });
        let inner = scopes.alloc(struct_node("Inner", Some(root)));

        let resolver = Resolver::new(&scopes, &[], 32);
        let ty = resolver.parse("map<Mode, float>", Some(inner)).unwrap().unwrap();
        let TypeNode::Map { key, .. } = &ty else { panic!("expected map") };
        assert!(key.is_enum());
        assert_eq!(key.native(), "P::Mode");

        let qualified = resolver.parse("P::Inner", Some(mode)).unwrap().unwrap();
        assert!(qualified.is_struct());
        assert!(resolver.parse("Mode", None).is_err());
        assert_eq!(resolver.lookup("P", Some(inner)), Some(root));
    }
}
