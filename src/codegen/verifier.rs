//! Documentation entries and the verifier trees inside them.
use crate::code::{Code, ScopeId, VariableAttributes};
use crate::error::{Error, Result};
use crate::types::{BasicType, CustomKind, TypeNode};

use super::convert::Inventory;
use super::{literal, names, quoted, Out};

pub fn emit_enum_verifiers(out: &mut Out, code: &Code, inventory: &Inventory) {
    for id in &inventory.enums {
        let Some(e) = code.scopes.get(*id).as_enum() else { continue };
        let (_, mangled) = names(code, *id);
        let keys = e.elements.iter().map(|el| literal(&el.key)).collect::<Vec<_>>().join(", ");
        out.block(format!("openspace::documentation::Verifier* verifier_{mangled}() {{"), "}", |out| {
            out.line(format!("return new openspace::documentation::StringInListVerifier({{ {keys} }});"));
        });
        out.blank();
    }
}

pub fn emit_entries(out: &mut Out, code: &Code, id: ScopeId) -> Result<()> {
    let Some(s) = code.scopes.get(id).as_struct() else { return Ok(()) };
    let (_, mangled) = names(code, id);
    let mut entries = Vec::with_capacity(s.variables.len());
    for var in &s.variables {
        let optional = if var.ty.is_optional() { "Optional::Yes" } else { "Optional::No" };
        let private = if var.attributes.private { "Private::Yes" } else { "Private::No" };
        entries.push(format!(
            "result.emplace_back({}, {}, {optional}, {private}, {});",
            literal(&var.key),
            verifier(code, &var.ty, &var.attributes)?,
            quoted(&var.comment)
        ));
    }
    out.block(
        format!("std::vector<openspace::documentation::DocumentationEntry> entries_{mangled}() {{"),
        "}",
        |out| {
            out.line("using namespace openspace::documentation;");
            out.line("std::vector<DocumentationEntry> result;");
            for entry in entries {
                out.line(entry);
            }
            out.line("return result;");
        },
    );
    out.blank();
    Ok(())
}

/// `doc<T>` and `bake<T>` for a root struct.
pub fn emit_root(out: &mut Out, code: &Code, id: ScopeId) {
    let node = code.scopes.get(id);
    let Some(dictionary) = node.as_struct().and_then(|s| s.dictionary_name.as_deref()) else { return };
    let (qualified, mangled) = names(code, id);
    out.block(
        format!("template <> openspace::documentation::Documentation doc<{qualified}>(std::string id) {{"),
        "}",
        |out| {
            out.line(format!(
                "return openspace::documentation::Documentation{{ {}, std::move(id), internal::entries_{mangled}() }};",
                literal(dictionary)
            ));
        },
    );
    out.blank();
    out.block(format!("template <> {qualified} bake<{qualified}>(const ghoul::Dictionary& dict) {{"), "}", |out| {
        out.line(format!(
            "openspace::documentation::testSpecificationAndThrow(doc<{qualified}>(\"dictgen::bake\"), dict, {});",
            literal(dictionary)
        ));
        out.line(format!("{qualified} res;"));
        out.line("internal::bakeTo(dict, &res);");
        out.line("return res;");
    });
    out.blank();
}

/// Verifier expression for a value of type `ty`. Tags in `attrs` refine the
/// innermost value verifier.
fn verifier(code: &Code, ty: &TypeNode, attrs: &VariableAttributes) -> Result<String> {
    let plain = VariableAttributes::default();
    let expression = match ty {
        TypeNode::Basic { basic } => basic_verifier(*basic, attrs),
        TypeNode::Optional { inner, .. } => verifier(code, inner, attrs)?,
        TypeNode::Sequence { inner } => format!("new SequenceVerifier({})", verifier(code, inner, attrs)?),
        TypeNode::Array { inner, size } => {
            format!("new SequenceVerifier({}, {size})", verifier(code, inner, attrs)?)
        }
        TypeNode::Variant { alternatives } => {
            let alternatives = alternatives
                .iter()
                .map(|alt| verifier(code, alt, &plain))
                .collect::<Result<Vec<_>>>()?;
            format!("new OrVerifier({{ {} }})", alternatives.join(", "))
        }
        TypeNode::Map { key, value } => {
            let value = verifier(code, value, attrs)?;
            let entry = |key: &str| format!("{{ {}, {value}, Optional::Yes }}", literal(key));
            let entries: Vec<String> = match key.as_ref() {
                TypeNode::Custom { custom } if custom.kind == CustomKind::Enum => code
                    .scopes
                    .get(custom.target)
                    .as_enum()
                    .map(|e| e.elements.iter().map(|el| entry(&el.key)).collect())
                    .unwrap_or_default(),
                _ => vec![entry("*")],
            };
            format!("new TableVerifier({{ {} }})", entries.join(", "))
        }
        TypeNode::Tuple { elements } => {
            let entries = elements
                .iter()
                .enumerate()
                .map(|(i, element)| {
                    let optional = if element.is_optional() { "Optional::Yes" } else { "Optional::No" };
                    Ok(format!("{{ \"{}\", {}, {optional} }}", i + 1, verifier(code, element, &plain)?))
                })
                .collect::<Result<Vec<_>>>()?;
            format!("new TableVerifier({{ {} }})", entries.join(", "))
        }
        TypeNode::Custom { custom } => {
            let mangled = code.scopes.mangled_name(custom.target);
            match custom.kind {
                CustomKind::Enum => format!("verifier_{mangled}()"),
                CustomKind::Struct => format!("new TableVerifier(entries_{mangled}())"),
            }
        }
        TypeNode::Pointer { name } => {
            return Err(Error::new(format!("no verifier exists for pointer type '{name}*'")));
        }
    };
    Ok(expression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::Config;

    fn entries(source: &str) -> String {
        let code = parse(source, None, &Config::default()).unwrap();
        let mut out = Out::default();
        for id in code.all_structs() {
            emit_entries(&mut out, &code, id).unwrap();
        }
        out.into_string()
    }

    #[test]
    fn constraints_parameterize_the_basic_verifier() {
        let text = entries(
            r#"struct [[codegen::Dictionary(T)]] P {
                // Ranged
                float inRangeValueFloat [[codegen::inrange(-0.5, 0.75)]];
                std::optional<std::string> name [[codegen::inlist("a", "b"), codegen::private]];
                std::vector<glm::vec4> colors [[codegen::color]];
                std::string id [[codegen::annotation("an \"id\"")]];
            };"#,
        );
        assert!(text.contains(
            r#"result.emplace_back("InRangeValueFloat", new InRangeVerifier<DoubleVerifier>(-0.5, 0.75), Optional::No, Private::No, "Ranged");"#
        ));
        assert!(text.contains(
            r#"result.emplace_back("Name", new InListVerifier<StringVerifier>({ "a", "b" }), Optional::Yes, Private::Yes, "");"#
        ));
        assert!(text.contains("new SequenceVerifier(new Color4Verifier)"));
        assert!(text.contains(r#"new AnnotationVerifier<StringVerifier>("an \"id\"")"#));
    }

    #[test]
    fn containers_wrap_their_element_verifiers() {
        let text = entries(
            r#"struct [[codegen::Dictionary(T)]] P {
                enum class Mode { A [[codegen::key("a")]], B };
                struct Inner { int x; };
                std::map<std::string, Inner> inners;
                std::map<Mode, int> perMode;
                std::tuple<int, std::optional<bool>> pair;
                std::array<float, 3> fixed;
                std::variant<int, Mode> either;
            };"#,
        );
        assert!(text.contains(r#"new TableVerifier({ { "*", new TableVerifier(entries_P_Inner()), Optional::Yes } })"#));
        assert!(text.contains(r#"{ "a", new IntVerifier, Optional::Yes }, { "B", new IntVerifier, Optional::Yes }"#));
        assert!(text.contains(r#"{ "1", new IntVerifier, Optional::No }, { "2", new BoolVerifier, Optional::Yes }"#));
        assert!(text.contains("new SequenceVerifier(new DoubleVerifier, 3)"));
        assert!(text.contains("new OrVerifier({ new IntVerifier, verifier_P_Mode() })"));
        assert!(text.contains("std::vector<openspace::documentation::DocumentationEntry> entries_P_Inner() {"));
    }

    #[test]
    fn pointers_have_no_verifier() {
        let code = Code::default();
        let pointer = TypeNode::Pointer { name: "Node".into() };
        let err = verifier(&code, &pointer, &VariableAttributes::default()).unwrap_err();
        assert!(err.message.contains("pointer type 'Node*'"), "{}", err.message);
        let nested = TypeNode::sequence(pointer);
        assert!(verifier(&code, &nested, &VariableAttributes::default()).is_err());
    }
}
