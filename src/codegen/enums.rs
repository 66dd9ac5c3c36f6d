//! Enum string conversions, `map` and `arrayify`.
use crate::code::{Code, EnumScope, ScopeId};
use crate::error::{Error, Result};
use crate::resolve::Resolver;

use super::convert::Inventory;
use super::{literal, names, Out, Requirements};

pub fn emit(code: &Code, inventory: &Inventory, req: &mut Requirements) -> Result<String> {
    let all = code.all_enums();
    if all.is_empty() {
        return Ok(String::new());
    }
    req.enum_strings = true;

    let globals = code.roots();
    let resolver = Resolver::new(&code.scopes, &globals, usize::MAX);

    let mut out = Out::default();
    out.line("namespace codegen {");
    out.blank();
    for id in &all {
        let Some(e) = code.scopes.get(*id).as_enum() else { continue };
        let (qualified, _) = names(code, *id);
        emit_to_string(&mut out, &qualified, e);
        emit_from_string(&mut out, &qualified, e);
        if let Some(target) = &e.attributes.mapped_to {
            let target = mapping_target(code, &resolver, *id, target)?;
            req.enum_map = true;
            emit_map(&mut out, &qualified, &target, e);
        }
        if e.attributes.arrayify {
            req.enum_arrayify = true;
            emit_arrayify(&mut out, &qualified, e);
        }
    }

    if !inventory.enums.is_empty() {
        out.line("namespace internal {");
        out.blank();
        for id in &inventory.enums {
            let (qualified, _) = names(code, *id);
            out.block(
                format!("void bakeTo(const ghoul::Dictionary& d, std::string_view key, {qualified}* val) {{"),
                "}",
                |out| out.line(format!("*val = fromString<{qualified}>(d.value<std::string>(key));")),
            );
            out.blank();
        }
        out.line("} // namespace internal");
        out.blank();
    }
    out.line("} // namespace codegen");
    log::debug!("emitted {} enum(s)", all.len());
    Ok(out.into_string())
}

fn emit_to_string(out: &mut Out, qualified: &str, e: &EnumScope) {
    out.block(format!("template <> std::string_view toString<{qualified}>({qualified} value) {{"), "}", |out| {
        out.block("switch (value) {", "}", |out| {
            for el in &e.elements {
                out.line(format!("case {qualified}::{}: return {};", el.name, literal(&el.key)));
            }
            out.line("default: throw ghoul::MissingCaseException();");
        });
    });
    out.blank();
}

fn emit_from_string(out: &mut Out, qualified: &str, e: &EnumScope) {
    out.block(format!("template <> {qualified} fromString<{qualified}>(std::string_view value) {{"), "}", |out| {
        for el in &e.elements {
            out.line(format!("if (value == {}) {{ return {qualified}::{}; }}", literal(&el.key), el.name));
        }
        out.line(format!(
            "throw ghoul::RuntimeError(fmt::format(\"Could not find value '{{}}' in enum '{qualified}'\", value));"
        ));
    });
    out.blank();
}

fn emit_map(out: &mut Out, qualified: &str, target: &str, e: &EnumScope) {
    out.block(format!("template <> {target} map<{qualified}, {target}>({qualified} value) {{"), "}", |out| {
        out.block("switch (value) {", "}", |out| {
            for el in &e.elements {
                out.line(format!("case {qualified}::{0}: return {target}::{0};", el.name));
            }
            out.line("default: throw ghoul::MissingCaseException();");
        });
    });
    out.blank();
}

fn emit_arrayify(out: &mut Out, qualified: &str, e: &EnumScope) {
    let elements: Vec<String> = e.elements.iter().map(|el| format!("{qualified}::{}", el.name)).collect();
    out.block(format!("template <> std::vector<{qualified}> arrayify<{qualified}>() {{"), "}", |out| {
        out.line(format!("return {{ {} }};", elements.join(", ")));
    });
    out.blank();
}

/// Spelling of the enum `source` maps into. A target declared in this input
/// must be an enum with an element of the same name for every source element;
/// a target declared elsewhere is taken as written.
fn mapping_target(code: &Code, resolver: &Resolver<'_>, source: ScopeId, target: &str) -> Result<String> {
    let (qualified, _) = names(code, source);
    let Some(found) = resolver.lookup(target, code.scopes.get(source).parent.or(Some(source))) else {
        log::debug!("enum '{qualified}' maps to '{target}', which is not declared here; emitted unchecked");
        return Ok(target.to_string());
    };
    let Some(target_enum) = code.scopes.get(found).as_enum() else {
        return Err(Error::new(format!("enum '{qualified}' maps to '{target}', which is not an enum")));
    };
    let source_enum = code.scopes.get(source).as_enum().map(|e| e.elements.as_slice()).unwrap_or_default();
    for el in source_enum {
        if !target_enum.elements.iter().any(|t| t.name == el.name) {
            return Err(Error::new(format!(
                "enum '{qualified}' maps to '{target}', which has no element named '{}'",
                el.name
            )));
        }
    }
    Ok(code.scopes.qualified_name(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::Config;

    fn emitted(source: &str) -> Result<(String, Requirements)> {
        let code = parse(source, None, &Config::default())?;
        let inventory = Inventory::collect(&code);
        let mut req = Requirements::default();
        let text = emit(&code, &inventory, &mut req)?;
        Ok((text, req))
    }

    #[test]
    fn string_conversions_cover_every_element() {
        let (text, req) = emitted(
            r#"enum class [[codegen::stringify]] Color { Red [[codegen::key("red")]], Green };"#,
        )
        .unwrap();
        assert!(req.enum_strings && !req.enum_map && !req.enum_arrayify);
        assert!(text.contains(r#"case Color::Red: return "red";"#));
        assert!(text.contains(r#"case Color::Green: return "Green";"#));
        assert!(text.contains(r#"if (value == "red") { return Color::Red; }"#));
        assert!(text.contains(r#"if (value == "Green") { return Color::Green; }"#));
        assert!(text.contains("Could not find value '{}' in enum 'Color'"));
        assert!(!text.contains("namespace internal"));
    }

    #[test]
    fn map_and_arrayify() {
        let (text, req) = emitted(
            "enum class [[codegen::stringify]] Target { A, B, C };\n\
             enum class [[codegen::map(Target), codegen::arrayify]] Source { A, B };",
        )
        .unwrap();
        assert!(req.enum_map && req.enum_arrayify);
        assert!(text.contains("template <> Target map<Source, Target>(Source value) {"));
        assert!(text.contains("case Source::B: return Target::B;"));
        assert!(text.contains("return { Source::A, Source::B };"));
    }

    #[test]
    fn map_targets_are_checked_when_known() {
        let err = emitted(
            "enum class [[codegen::stringify]] Target { A };\n\
             enum class [[codegen::map(Target)]] Source { A, B };",
        )
        .unwrap_err();
        assert!(err.message.contains("no element named 'B'"));

        let (text, _) = emitted("enum class [[codegen::map(other::Mode)]] Source { A };").unwrap();
        assert!(text.contains("template <> other::Mode map<Source, other::Mode>(Source value) {"));
    }

    #[test]
    fn member_enums_get_dictionary_converters() {
        let (text, _) = emitted(
            "struct [[codegen::Dictionary(X)]] P { enum class Mode { A }; Mode mode; };",
        )
        .unwrap();
        assert!(text.contains("void bakeTo(const ghoul::Dictionary& d, std::string_view key, P::Mode* val) {"));
        assert!(text.contains("*val = fromString<P::Mode>(d.value<std::string>(key));"));
    }
}
