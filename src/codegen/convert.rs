//! `bakeTo` converters: dictionary value → declared type.
//!
//! The set of shapes reachable from struct members is collected once and
//! deduplicated structurally, so each primitive kind, generic shape and
//! variant gets exactly one converter however often it is used.
use indexmap::IndexSet;

use crate::code::{Code, ScopeId};
use crate::types::{BasicType, CustomKind, TypeNode};

use super::{names, Out, Requirements};

const DICT: &str = "const ghoul::Dictionary& d";

// ————————————————————————————————————————————————————————————————————————————
// INVENTORY
// ————————————————————————————————————————————————————————————————————————————

/// Every distinct shape used by a struct member anywhere in the input.
#[derive(Debug, Default)]
pub struct Inventory {
    pub basics: IndexSet<BasicType>,
    pub variants: IndexSet<TypeNode>,
    /// Enums used as (part of) a member type, in first-use order.
    pub enums: IndexSet<ScopeId>,
    optional: bool,
    sequence: bool,
    array: bool,
    map_string: bool,
    map_enum: bool,
    tuple: bool,
}

impl Inventory {
    pub fn collect(code: &Code) -> Self {
        let mut inventory = Self::default();
        for id in code.all_structs() {
            let Some(s) = code.scopes.get(id).as_struct() else { continue };
            for var in &s.variables {
                var.ty.walk(&mut |ty| inventory.record(ty));
            }
        }
        inventory
    }

    fn record(&mut self, ty: &TypeNode) {
        match ty {
            TypeNode::Basic { basic } => {
                self.basics.insert(*basic);
            }
            TypeNode::Optional { .. } => self.optional = true,
            TypeNode::Sequence { .. } => self.sequence = true,
            TypeNode::Array { .. } => self.array = true,
            TypeNode::Map { key, .. } if key.is_enum() => self.map_enum = true,
            TypeNode::Map { .. } => self.map_string = true,
            TypeNode::Tuple { .. } => self.tuple = true,
            TypeNode::Variant { .. } => {
                self.variants.insert(ty.clone());
            }
            TypeNode::Custom { custom } if custom.kind == CustomKind::Enum => {
                self.enums.insert(custom.target);
            }
            TypeNode::Custom { .. } | TypeNode::Pointer { .. } => {}
        }
    }

    pub fn record_requirements(&self, req: &mut Requirements) {
        req.optional |= self.optional;
        req.sequence |= self.sequence;
        req.array |= self.array;
        req.map_string |= self.map_string;
        req.map_enum |= self.map_enum;
        req.tuple |= self.tuple;
    }
}

// ————————————————————————————————————————————————————————————————————————————
// EMISSION
// ————————————————————————————————————————————————————————————————————————————

/// Forward declarations of every concrete overload, so generic converters
/// can reach them whatever order the definitions come in.
pub fn emit_declarations(out: &mut Out, code: &Code, structs: &[ScopeId], inventory: &Inventory) {
    for id in structs {
        let (_, mangled) = names(code, *id);
        out.line(format!("std::vector<openspace::documentation::DocumentationEntry> entries_{mangled}();"));
    }
    for id in structs {
        let (qualified, _) = names(code, *id);
        out.line(format!("void bakeTo({DICT}, {qualified}* val);"));
        out.line(format!("void bakeTo({DICT}, std::string_view key, {qualified}* val);"));
    }
    for variant in &inventory.variants {
        out.line(format!("void bakeTo({DICT}, std::string_view key, {}* val);", variant.native()));
    }
    out.blank();
}

pub fn emit_converters(out: &mut Out, code: &Code, structs: &[ScopeId], inventory: &Inventory) {
    // 1) primitives
    for basic in &inventory.basics {
        let info = basic.info();
        out.block(format!("void bakeTo({DICT}, std::string_view key, {}* val) {{", info.native), "}", |out| {
            if info.storage == info.native {
                out.line(format!("*val = d.value<{}>(key);", info.storage));
            } else {
                out.line(format!("*val = static_cast<{}>(d.value<{}>(key));", info.native, info.storage));
            }
        });
        out.blank();
    }

    // 2) one generic converter per shape
    let generic = [
        (inventory.optional, OPTIONAL),
        (inventory.sequence, SEQUENCE),
        (inventory.array, ARRAY),
        (inventory.map_string, MAP_STRING),
        (inventory.map_enum, MAP_ENUM),
        (inventory.tuple, TUPLE),
    ];
    for (_, text) in generic.iter().filter(|(used, _)| *used) {
        for line in text.lines() {
            out.line(line);
        }
        out.blank();
    }

    // 3) variants
    for variant in &inventory.variants {
        emit_variant(out, variant);
        out.blank();
    }

    // 4) structs
    for id in structs {
        let (qualified, _) = names(code, *id);
        let Some(s) = code.scopes.get(*id).as_struct() else { continue };
        out.block(format!("void bakeTo({DICT}, {qualified}* val) {{"), "}", |out| {
            for var in &s.variables {
                out.line(format!("bakeTo(d, {}, &val->{});", super::literal(&var.key), var.name));
            }
        });
        out.blank();
        out.block(format!("void bakeTo({DICT}, std::string_view key, {qualified}* val) {{"), "}", |out| {
            out.line("bakeTo(d.value<ghoul::Dictionary>(key), val);");
        });
        out.blank();
    }
}

/// Alternatives are tried in order: bool, int, the other basic kinds, a
/// sequence, an enum. The first one the dictionary holds is converted.
fn emit_variant(out: &mut Out, variant: &TypeNode) {
    let TypeNode::Variant { alternatives } = variant else { return };
    let rank = |alt: &TypeNode| match alt {
        TypeNode::Basic { basic: BasicType::Bool } => 0,
        TypeNode::Basic { basic: BasicType::Int } => 1,
        TypeNode::Basic { .. } => 2,
        TypeNode::Sequence { .. } => 3,
        _ => 4,
    };
    let mut ordered: Vec<&TypeNode> = alternatives.iter().collect();
    ordered.sort_by_key(|alt| rank(alt));

    out.block(format!("void bakeTo({DICT}, std::string_view key, {}* val) {{", variant.native()), "}", |out| {
        for (i, alt) in ordered.iter().enumerate() {
            let held = match alt {
                TypeNode::Basic { basic } => basic.info().storage,
                TypeNode::Custom { .. } => "std::string",
                _ => "ghoul::Dictionary",
            };
            let keyword = if i == 0 { "if" } else { "else if" };
            out.line(format!("{keyword} (d.hasValue<{held}>(key)) {{"));
            out.indent += 1;
            out.line(format!("{} v;", alt.native()));
            out.line("bakeTo(d, key, &v);");
            out.line("*val = std::move(v);");
            out.indent -= 1;
            out.line("}");
        }
        out.block("else {", "}", |out| out.line("throw ghoul::MissingCaseException();"));
    });
}

const OPTIONAL: &str = "\
template <typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::optional<T>* val) {
    if (d.hasKey(key)) {
        T v;
        bakeTo(d, key, &v);
        *val = std::move(v);
    }
    else {
        *val = std::nullopt;
    }
}";

const SEQUENCE: &str = "\
template <typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::vector<T>* val) {
    ghoul::Dictionary dict = d.value<ghoul::Dictionary>(key);
    val->reserve(dict.size());
    for (size_t i = 1; i <= dict.size(); ++i) {
        T v;
        bakeTo(dict, std::to_string(i), &v);
        val->push_back(std::move(v));
    }
}";

const ARRAY: &str = "\
template <typename T, size_t N>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::array<T, N>* val) {
    ghoul::Dictionary dict = d.value<ghoul::Dictionary>(key);
    for (size_t i = 0; i < N; ++i) {
        bakeTo(dict, std::to_string(i + 1), &(*val)[i]);
    }
}";

const MAP_STRING: &str = "\
template <typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::map<std::string, T>* val) {
    ghoul::Dictionary dict = d.value<ghoul::Dictionary>(key);
    for (std::string_view k : dict.keys()) {
        T v;
        bakeTo(dict, k, &v);
        (*val)[std::string(k)] = std::move(v);
    }
}";

const MAP_ENUM: &str = "\
template <typename K, typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::map<K, T>* val) {
    ghoul::Dictionary dict = d.value<ghoul::Dictionary>(key);
    for (std::string_view k : dict.keys()) {
        T v;
        bakeTo(dict, k, &v);
        (*val)[codegen::fromString<K>(k)] = std::move(v);
    }
}";

const TUPLE: &str = "\
template <typename... Ts, size_t... Is>
void bakeTupleTo(const ghoul::Dictionary& d, std::tuple<Ts...>* val, std::index_sequence<Is...>) {
    (bakeTo(d, std::to_string(Is + 1), &std::get<Is>(*val)), ...);
}

template <typename... Ts>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::tuple<Ts...>* val) {
    ghoul::Dictionary dict = d.value<ghoul::Dictionary>(key);
    bakeTupleTo(dict, val, std::index_sequence_for<Ts...>{});
}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::Config;

    const SOURCE: &str = r#"
struct [[codegen::Dictionary(A)]] P {
    enum class Mode { Fast, Slow };
    std::optional<float> a;
    std::vector<std::optional<float>> b;
    std::variant<std::string, bool, std::vector<int>, Mode> c;
    std::variant<bool, std::string, std::vector<int>, Mode> d;
    std::map<Mode, float> e;
};
"#;

    fn emitted() -> (Inventory, String) {
        let code = parse(SOURCE, None, &Config::default()).unwrap();
        let inventory = Inventory::collect(&code);
        let structs = code.all_structs();
        let mut out = Out::default();
        emit_converters(&mut out, &code, &structs, &inventory);
        (inventory, out.into_string())
    }

    #[test]
    fn shapes_are_deduplicated() {
        let (inventory, text) = emitted();
        assert_eq!(inventory.variants.len(), 2);
        assert!(inventory.optional && inventory.sequence && inventory.map_enum);
        assert!(!inventory.map_string && !inventory.tuple && !inventory.array);
        assert_eq!(text.matches("std::optional<T>* val) {").count(), 1);
        assert_eq!(text.matches("float* val) {").count(), 1);
        assert_eq!(inventory.enums.len(), 1);
    }

    #[test]
    fn primitive_converters_cast_from_storage() {
        let (_, text) = emitted();
        assert!(text.contains("*val = static_cast<float>(d.value<double>(key));"));
        assert!(text.contains("*val = d.value<bool>(key);"));
    }

    #[test]
    fn variants_are_tried_in_fixed_order() {
        let (_, text) = emitted();
        let start = text.find("std::variant<std::string, bool, std::vector<int>, P::Mode>* val) {").unwrap();
        let body = &text[start..];
        let bool_at = body.find("hasValue<bool>").unwrap();
        let string_at = body.find("hasValue<std::string>").unwrap();
        let seq_at = body.find("hasValue<ghoul::Dictionary>").unwrap();
        assert!(bool_at < string_at && string_at < seq_at);
        assert!(body.contains("throw ghoul::MissingCaseException();"));
    }

    #[test]
    fn struct_members_are_baked_by_key() {
        let (_, text) = emitted();
        assert!(text.contains("void bakeTo(const ghoul::Dictionary& d, P* val) {"));
        assert!(text.contains("    bakeTo(d, \"A\", &val->a);"));
        assert!(text.contains("    bakeTo(d, \"E\", &val->e);"));
    }
}
