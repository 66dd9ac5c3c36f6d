//! Scripting-runtime wrappers for `[[codegen::luawrap]]` functions.
//!
//! Arguments are pulled off the script stack in their marshalled shape
//! (enums as strings, structs as dictionaries) and converted to the declared
//! type at the call. Return values travel the other way.
use crate::code::{Code, Function, Variable};
use crate::error::{Error, Result};
use crate::parser::capitalize;
use crate::types::{BasicType, CustomKind, CustomRef, TypeNode};

use super::{literal, quoted, Out, Requirements};

pub fn emit(code: &Code, req: &mut Requirements) -> Result<String> {
    if code.functions.is_empty() {
        return Ok(String::new());
    }
    let mut out = Out::default();
    out.line("namespace codegen::lua {");
    out.blank();
    for function in &code.functions {
        record_requirements(function, req);
        emit_function(&mut out, code, function)?;
        out.blank();
    }
    out.line("} // namespace codegen::lua");
    log::debug!("emitted {} wrapper(s)", code.functions.len());
    Ok(out.into_string())
}

fn record_requirements(function: &Function, req: &mut Requirements) {
    let types = function.arguments.iter().map(|a| &a.ty).chain(function.return_type.as_ref());
    for ty in types {
        ty.walk(&mut |t| match t {
            TypeNode::Custom { custom } if custom.kind == CustomKind::Enum => req.enum_strings = true,
            TypeNode::Custom { .. } => req.documentation = true,
            _ => {}
        });
    }
}

fn emit_function(out: &mut Out, code: &Code, function: &Function) -> Result<()> {
    let mut body = Out::default();
    emit_body(&mut body, code, function)?;
    let body = body.into_string();

    out.line(format!(
        "static const openspace::scripting::LuaLibrary::Function {} = {{",
        capitalize(&function.name)
    ));
    out.indent += 1;
    out.line(format!("{},", literal(&function.lua_name)));
    out.block("[](lua_State* L) -> int {", "},", |out| {
        for line in body.lines() {
            out.line(line);
        }
    });

    let arguments: Vec<String> = function.arguments.iter().map(argument_info).collect();
    if arguments.is_empty() {
        out.line("{},");
    } else {
        out.block("{", "},", |out| {
            let last = arguments.len() - 1;
            for (i, argument) in arguments.iter().enumerate() {
                out.line(if i == last { argument.clone() } else { format!("{argument},") });
            }
        });
    }
    let returns = function.return_type.as_ref().map(TypeNode::descriptive).unwrap_or_default();
    out.line(format!("{},", quoted(&returns)));
    out.line(format!("\"{}\",", function.documentation));
    match &function.location.path {
        Some(path) => out.line(format!("{{ {}, {} }}", quoted(path), function.location.line)),
        None => out.line("{ \"<unknown>\", 0 }"),
    }
    out.indent -= 1;
    out.line("};");
    Ok(())
}

/// `{ "name", "Type" }`, with the default's text appended when there is one.
fn argument_info(arg: &Variable) -> String {
    match &arg.ty {
        TypeNode::Optional { default: Some(default), .. } => format!(
            "{{ {}, {}, {} }}",
            literal(&arg.name),
            quoted(&arg.ty.descriptive()),
            quoted(default)
        ),
        ty => format!("{{ {}, {} }}", literal(&arg.name), quoted(&ty.descriptive())),
    }
}

fn emit_body(out: &mut Out, code: &Code, function: &Function) -> Result<()> {
    let args = &function.arguments;
    let total = args.len();
    let required = args.iter().filter(|a| !a.ty.is_optional()).count();

    // 1) arity
    if required == total {
        out.line(format!("ghoul::lua::checkArgumentsAndThrow(L, {total}, \"lua::{}\");", function.lua_name));
    } else {
        out.line(format!(
            "ghoul::lua::checkArgumentsAndThrow(L, {{ {required}, {total} }}, \"lua::{}\");",
            function.lua_name
        ));
    }

    // 2) extraction: leading optionals one by one, unless all are optional
    let leading = if required == 0 { 0 } else { args.iter().take_while(|a| a.ty.is_optional()).count() };
    for arg in &args[..leading] {
        let shape = arg.ty.strip_optional().marshal();
        out.line(format!("std::optional<{shape}> {};", arg.name));
        out.block(format!("if (ghoul::lua::hasValue<{shape}>(L, 1)) {{"), "}", |out| {
            out.line(format!("{} = ghoul::lua::value<{shape}>(L, 1, ghoul::lua::PopValue::Yes);", arg.name));
        });
    }
    let rest = &args[leading..];
    if !rest.is_empty() {
        let names: Vec<&str> = rest.iter().map(|a| a.name.as_str()).collect();
        let shapes: Vec<String> = rest.iter().map(|a| a.ty.marshal()).collect();
        out.line(format!("auto [{}] = ghoul::lua::values<{}>(L);", names.join(", "), shapes.join(", ")));
    }

    // 3) call
    let call_args = args.iter().map(|a| call_argument(code, a)).collect::<Result<Vec<_>>>()?;
    let call = format!("{}({})", function.name, call_args.join(", "));

    // 4) results
    match &function.return_type {
        None => {
            out.line(format!("{call};"));
            out.line("return 0;");
        }
        Some(TypeNode::Tuple { elements }) => {
            out.line(format!("auto res = {call};"));
            out.line("int nResults = 0;");
            for (i, element) in elements.iter().enumerate() {
                let item = format!("std::get<{i}>(res)");
                match element {
                    TypeNode::Optional { inner, .. } => {
                        out.line(format!("if ({item}.has_value()) {{"));
                        out.indent += 1;
                        push_value(out, code, inner, &format!("{item}.value()"))?;
                        out.line("nResults++;");
                        out.indent -= 1;
                        out.line("}");
                    }
                    other => {
                        push_value(out, code, other, &item)?;
                        out.line("nResults++;");
                    }
                }
            }
            out.line("return nResults;");
        }
        Some(TypeNode::Optional { inner, .. }) => {
            out.line(format!("auto res = {call};"));
            out.line("if (res.has_value()) {");
            out.indent += 1;
            push_value(out, code, inner, "res.value()")?;
            out.line("return 1;");
            out.indent -= 1;
            out.line("}");
            out.line("return 0;");
        }
        Some(TypeNode::Variant { .. }) => {
            out.line(format!("auto res = {call};"));
            out.line("std::visit([L](auto&& v) { ghoul::lua::push(L, v); }, res);");
            out.line("return 1;");
        }
        Some(other) => {
            push_value(out, code, other, &call)?;
            out.line("return 1;");
        }
    }
    Ok(())
}

fn call_argument(code: &Code, arg: &Variable) -> Result<String> {
    let name = arg.name.as_str();
    match &arg.ty {
        TypeNode::Optional { inner, default: Some(default) } if inner.needs_conversion() => Ok(format!(
            "{name}.has_value() ? {} : {default}",
            conversion(code, inner, &format!("{name}.value()"), 0)?
        )),
        TypeNode::Optional { default: Some(default), .. } => Ok(format!("{name}.value_or({default})")),
        ty => conversion(code, ty, name, 0),
    }
}

/// Expression turning `expr`, held in the marshalled shape of `ty`, into the
/// declared type.
fn conversion(code: &Code, ty: &TypeNode, expr: &str, depth: usize) -> Result<String> {
    if !ty.needs_conversion() {
        return Ok(expr.to_string());
    }
    let native = ty.native();
    let next = depth + 1;
    let converted = match ty {
        TypeNode::Custom { custom } => match custom.kind {
            CustomKind::Enum => format!("codegen::fromString<{}>({expr})", custom.qualified),
            CustomKind::Struct => {
                let is_root = code.scopes.get(custom.target).as_struct().is_some_and(|s| s.dictionary_name.is_some());
                if is_root {
                    format!("codegen::bake<{}>({expr})", custom.qualified)
                } else {
                    format!(
                        "[&] {{ {0} v; codegen::internal::bakeTo({expr}, &v); return v; }}()",
                        custom.qualified
                    )
                }
            }
        },
        TypeNode::Optional { inner, .. } => format!(
            "({expr}.has_value() ? {native}({}) : std::nullopt)",
            conversion(code, inner, &format!("{expr}.value()"), next)?
        ),
        TypeNode::Sequence { inner } => format!(
            "[&] {{ {native} out{depth}; for (const auto& v{depth} : {expr}) {{ out{depth}.push_back({}); }} return out{depth}; }}()",
            conversion(code, inner, &format!("v{depth}"), next)?
        ),
        TypeNode::Array { inner, size } => format!(
            "[&] {{ {native} out{depth}; for (size_t i{depth} = 0; i{depth} < {size}; ++i{depth}) {{ out{depth}[i{depth}] = {}; }} return out{depth}; }}()",
            conversion(code, inner, &format!("{expr}[i{depth}]"), next)?
        ),
        TypeNode::Map { key, value } => format!(
            "[&] {{ {native} out{depth}; for (const auto& [k{depth}, v{depth}] : {expr}) {{ out{depth}.emplace({}, {}); }} return out{depth}; }}()",
            conversion(code, key, &format!("k{depth}"), next)?,
            conversion(code, value, &format!("v{depth}"), next)?
        ),
        TypeNode::Tuple { elements } => {
            let parts = elements
                .iter()
                .enumerate()
                .map(|(i, element)| conversion(code, element, &format!("std::get<{i}>({expr})"), next))
                .collect::<Result<Vec<_>>>()?;
            format!("{native}({})", parts.join(", "))
        }
        TypeNode::Variant { .. } => {
            return Err(Error::new(format!(
                "variant '{}' with enum or struct alternatives cannot be passed to a wrapped function",
                ty.canonical()
            )));
        }
        TypeNode::Basic { .. } | TypeNode::Pointer { .. } => expr.to_string(),
    };
    Ok(converted)
}

/// Push one non-optional value of type `ty` onto the script stack. Structs
/// and containers that hold enums, paths or structs go as dictionaries.
fn push_value(out: &mut Out, code: &Code, ty: &TypeNode, expr: &str) -> Result<()> {
    match ty {
        TypeNode::Custom { custom } if custom.kind == CustomKind::Enum => {
            out.line(format!("ghoul::lua::push(L, codegen::toString({expr}));"));
        }
        TypeNode::Custom { custom } => {
            let statements = member_statements(code, custom, "value", "d", 0)?;
            out.block("{", "}", |out| {
                out.line(format!("const auto& value = {expr};"));
                out.line("ghoul::Dictionary d;");
                for statement in statements {
                    out.line(statement);
                }
                out.line("ghoul::lua::push(L, d);");
            });
        }
        TypeNode::Sequence { .. } | TypeNode::Array { .. } | TypeNode::Map { .. } => {
            out.line(format!("ghoul::lua::push(L, {});", stored_value(code, ty, expr, 0)?));
        }
        _ => out.line(format!("ghoul::lua::push(L, {expr});")),
    }
    Ok(())
}

/// One `setValue` statement per member of the struct held in `value`.
/// Absent optional members are left out of `dict`.
fn member_statements(code: &Code, custom: &CustomRef, value: &str, dict: &str, depth: usize) -> Result<Vec<String>> {
    let Some(s) = code.scopes.get(custom.target).as_struct() else {
        return Err(Error::new(format!("'{}' is not a struct", custom.qualified)));
    };
    let mut statements = Vec::with_capacity(s.variables.len());
    for member in &s.variables {
        let access = format!("{value}.{}", member.name);
        let key = literal(&member.key);
        statements.push(match &member.ty {
            TypeNode::Optional { inner, .. } => format!(
                "if ({access}.has_value()) {{ {dict}.setValue({key}, {}); }}",
                stored_value(code, inner, &format!("{access}.value()"), depth)?
            ),
            other => format!("{dict}.setValue({key}, {});", stored_value(code, other, &access, depth)?),
        });
    }
    Ok(statements)
}

/// `expr` in the shape a dictionary stores it as. Sequences and arrays become
/// dictionaries keyed `"1"`, `"2"`, ... unless their elements are stored as is.
fn stored_value(code: &Code, ty: &TypeNode, expr: &str, depth: usize) -> Result<String> {
    let next = depth + 1;
    let stored = match ty {
        TypeNode::Basic { basic: BasicType::Path } => format!("{expr}.string()"),
        TypeNode::Basic { basic } if basic.info().storage != basic.info().native => {
            format!("static_cast<{}>({expr})", basic.info().storage)
        }
        TypeNode::Basic { .. } => expr.to_string(),
        TypeNode::Custom { custom } if custom.kind == CustomKind::Enum => {
            format!("std::string(codegen::toString({expr}))")
        }
        TypeNode::Custom { custom } => {
            let (value, dict) = (format!("value{next}"), format!("d{next}"));
            let statements = member_statements(code, custom, &value, &dict, next)?;
            format!(
                "[&] {{ const auto& {value} = {expr}; ghoul::Dictionary {dict}; {} return {dict}; }}()",
                statements.join(" ")
            )
        }
        TypeNode::Sequence { inner } | TypeNode::Array { inner, .. } => {
            let item = format!("value{next}[i{next}]");
            let element = stored_value(code, inner, &item, next)?;
            if element == item && ty.is_sequence() {
                return Ok(expr.to_string());
            }
            format!(
                "[&] {{ const auto& value{next} = {expr}; ghoul::Dictionary d{next}; \
                 for (size_t i{next} = 0; i{next} < value{next}.size(); ++i{next}) {{ \
                 d{next}.setValue(std::to_string(i{next} + 1), {element}); }} return d{next}; }}()"
            )
        }
        TypeNode::Map { key, value } => format!(
            "[&] {{ ghoul::Dictionary d{next}; for (const auto& [k{next}, v{next}] : {expr}) {{ d{next}.setValue({}, {}); }} return d{next}; }}()",
            stored_value(code, key, &format!("k{next}"), next)?,
            stored_value(code, value, &format!("v{next}"), next)?
        ),
        TypeNode::Optional { .. } | TypeNode::Tuple { .. } | TypeNode::Variant { .. } | TypeNode::Pointer { .. } => {
            return Err(Error::new(format!(
                "'{}' cannot be stored in a dictionary returned from a wrapped function",
                ty.canonical()
            )));
        }
    };
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::Config;

    fn wrappers(source: &str) -> Result<String> {
        let code = parse(source, Some("modules/base/scripts.h"), &Config::default())?;
        let mut req = Requirements::default();
        emit(&code, &mut req)
    }

    #[test]
    fn arity_is_exact_without_optionals() {
        let text = wrappers("[[codegen::luawrap]] int add(int a, int b) { return a + b; }").unwrap();
        assert!(text.contains("ghoul::lua::checkArgumentsAndThrow(L, 2, \"lua::add\");"));
        assert!(text.contains("auto [a, b] = ghoul::lua::values<int, int>(L);"));
        assert!(text.contains("ghoul::lua::push(L, add(a, b));"));
        assert!(text.contains("static const openspace::scripting::LuaLibrary::Function Add = {"));
        assert!(text.contains("{ \"modules/base/scripts.h\", 1 }"));
    }

    #[test]
    fn arity_is_a_range_with_trailing_optionals() {
        let text = wrappers("[[codegen::luawrap(\"scale\")]] void scale(double f, int times = 2) {}").unwrap();
        assert!(text.contains("ghoul::lua::checkArgumentsAndThrow(L, { 1, 2 }, \"lua::scale\");"));
        assert!(text.contains("auto [f, times] = ghoul::lua::values<double, std::optional<int>>(L);"));
        assert!(text.contains("scale(f, times.value_or(2));"));
        assert!(text.contains("{ \"times\", \"Integer?\", \"2\" }"));
        assert!(text.contains("return 0;"));
    }

    #[test]
    fn leading_optionals_are_peeled() {
        let text = wrappers(
            "[[codegen::luawrap]] void f(std::optional<std::string> a, int b, std::optional<bool> c) {}",
        )
        .unwrap();
        assert!(text.contains("std::optional<std::string> a;"));
        assert!(text.contains("if (ghoul::lua::hasValue<std::string>(L, 1)) {"));
        assert!(text.contains("a = ghoul::lua::value<std::string>(L, 1, ghoul::lua::PopValue::Yes);"));
        assert!(text.contains("auto [b, c] = ghoul::lua::values<int, std::optional<bool>>(L);"));
    }

    #[test]
    fn all_optional_parameters_are_extracted_together() {
        let text = wrappers("[[codegen::luawrap]] void f(int a = 1, bool b = false) {}").unwrap();
        assert!(text.contains("checkArgumentsAndThrow(L, { 0, 2 }"));
        assert!(text.contains("auto [a, b] = ghoul::lua::values<std::optional<int>, std::optional<bool>>(L);"));
        assert!(!text.contains("PopValue"));
    }

    #[test]
    fn enums_and_structs_are_converted() {
        let text = wrappers(
            r#"enum class [[codegen::stringify]] Mode { A, B };
               struct [[codegen::Dictionary(Settings)]] Settings { int a; std::optional<Mode> m; };
               [[codegen::luawrap]] Mode apply(Settings s, std::vector<Mode> modes, Mode fallback = Mode::A) {}
               [[codegen::luawrap]] Settings current() {}
               [[codegen::luawrap]] std::tuple<int, std::optional<Mode>> both() {}"#,
        )
        .unwrap();
        assert!(text.contains("auto [s, modes, fallback] = ghoul::lua::values<ghoul::Dictionary, std::vector<std::string>, std::optional<std::string>>(L);"));
        assert!(text.contains("codegen::bake<Settings>(s)"));
        assert!(text.contains("out0.push_back(codegen::fromString<Mode>(v0))"));
        assert!(text.contains("fallback.has_value() ? codegen::fromString<Mode>(fallback.value()) : Mode::A"));
        assert!(text.contains("ghoul::lua::push(L, codegen::toString(apply("));
        assert!(text.contains("d.setValue(\"M\", std::string(codegen::toString(value.m.value())));"));
        assert!(text.contains("if (std::get<1>(res).has_value()) {"));
        assert!(text.contains("return nResults;"));
    }

    #[test]
    fn struct_results_convert_nested_members() {
        let text = wrappers(
            r#"enum class [[codegen::stringify]] Mode { A, B };
               struct [[codegen::Dictionary(Layer)]] Layer {
                   struct Texture { std::filesystem::path file; float scale; };
                   Texture texture;
                   std::optional<Texture> overlay;
                   std::vector<Mode> modes;
                   std::vector<int> ids;
                   std::map<std::string, Texture> named;
               };
               [[codegen::luawrap]] Layer layer() {}"#,
        )
        .unwrap();
        let texture = "ghoul::Dictionary d1; d1.setValue(\"File\", value1.file.string()); \
                       d1.setValue(\"Scale\", static_cast<double>(value1.scale)); return d1; }()";
        assert!(text.contains(&format!(
            "d.setValue(\"Texture\", [&] {{ const auto& value1 = value.texture; {texture});"
        )));
        assert!(text.contains(&format!(
            "if (value.overlay.has_value()) {{ d.setValue(\"Overlay\", [&] {{ const auto& value1 = value.overlay.value(); {texture}); }}"
        )));
        assert!(text.contains(
            "d.setValue(\"Modes\", [&] { const auto& value1 = value.modes; ghoul::Dictionary d1; \
             for (size_t i1 = 0; i1 < value1.size(); ++i1) { \
             d1.setValue(std::to_string(i1 + 1), std::string(codegen::toString(value1[i1]))); } return d1; }());"
        ));
        assert!(text.contains("d.setValue(\"Ids\", value.ids);"));
        assert!(text.contains(
            "d.setValue(\"Named\", [&] { ghoul::Dictionary d1; for (const auto& [k1, v1] : value.named) { \
             d1.setValue(k1, [&] { const auto& value2 = v1; ghoul::Dictionary d2; d2.setValue(\"File\", value2.file.string());"
        ));
        assert!(text.contains("ghoul::lua::push(L, d);"));
    }

    #[test]
    fn container_results_with_enums_become_tables() {
        let text = wrappers(
            r#"enum class [[codegen::stringify]] Mode { A, B };
               [[codegen::luawrap]] std::vector<Mode> modes() {}
               [[codegen::luawrap]] std::map<Mode, int> counts() {}
               [[codegen::luawrap]] std::vector<double> values() {}"#,
        )
        .unwrap();
        assert!(text.contains(
            "ghoul::lua::push(L, [&] { const auto& value1 = modes(); ghoul::Dictionary d1; \
             for (size_t i1 = 0; i1 < value1.size(); ++i1) {"
        ));
        assert!(text.contains("d1.setValue(std::string(codegen::toString(k1)), v1);"));
        assert!(text.contains("ghoul::lua::push(L, values());"));
    }

    #[test]
    fn unstorable_struct_members_are_rejected() {
        let err = wrappers(
            r#"struct [[codegen::Dictionary(P)]] P { std::variant<int, std::string> v; };
               [[codegen::luawrap]] P current() {}"#,
        )
        .unwrap_err();
        assert!(err.message.contains("cannot be stored"), "{}", err.message);
    }

    #[test]
    fn optional_results_push_only_when_present() {
        let text = wrappers("[[codegen::luawrap]] std::optional<int> find(std::string name) {}").unwrap();
        let call = text.find("auto res = find(name);").unwrap();
        let check = text[call..].find("if (res.has_value()) {").unwrap() + call;
        let push = text[check..].find("ghoul::lua::push(L, res.value());").unwrap() + check;
        let present = text[push..].find("return 1;").unwrap() + push;
        assert!(text[present..].contains("return 0;"));
        assert!(text.contains("\"Integer?\","));
    }

    #[test]
    fn variant_results_are_visited() {
        let text = wrappers("[[codegen::luawrap]] std::variant<int, std::string> either() {}").unwrap();
        assert!(text.contains("auto res = either();"));
        assert!(text.contains("std::visit([L](auto&& v) { ghoul::lua::push(L, v); }, res);"));
        assert!(text.contains("return 1;"));
    }

    #[test]
    fn enum_array_parameters_are_converted_element_wise() {
        let text = wrappers(
            r#"enum class [[codegen::stringify]] Mode { A, B };
               [[codegen::luawrap]] void setModes(std::array<Mode, 3> modes) {}"#,
        )
        .unwrap();
        assert!(text.contains("auto [modes] = ghoul::lua::values<std::array<std::string, 3>>(L);"));
        assert!(text.contains(
            "setModes([&] { std::array<Mode, 3> out0; for (size_t i0 = 0; i0 < 3; ++i0) { \
             out0[i0] = codegen::fromString<Mode>(modes[i0]); } return out0; }());"
        ));
    }

    #[test]
    fn documentation_and_unknown_location() {
        let code = parse("// Does \"it\".\n[[codegen::luawrap]] void f() {}", None, &Config::default()).unwrap();
        let text = emit(&code, &mut Requirements::default()).unwrap();
        assert!(text.contains("\"Does \\\"it\\\".\","));
        assert!(text.contains("{ \"<unknown>\", 0 }"));
        assert!(text.contains("checkArgumentsAndThrow(L, 0, \"lua::f\");"));
    }
}
