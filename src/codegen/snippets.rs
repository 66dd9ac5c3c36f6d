//! Fixed text of the emitted unit.
use super::Requirements;

pub const BANNER: &str = "\
// This file was generated by dictgen from the annotated declarations it is included
// after. Do not edit it by hand; change the declarations and regenerate instead.
";

const DOCUMENTATION: &str = "\
template <typename T> openspace::documentation::Documentation doc(std::string id);
template <typename T> T bake(const ghoul::Dictionary& dict);
";

const ENUM_STRINGS: &str = "\
template <typename T> std::string_view toString(T value);
template <typename T> T fromString(std::string_view value);
";

const ENUM_MAP: &str = "template <typename T, typename U> U map(T value);\n";

const ENUM_ARRAYIFY: &str = "template <typename T> std::vector<T> arrayify();\n";

const OPTIONAL: &str = "\
template <typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::optional<T>* val);
";

const SEQUENCE: &str = "\
template <typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::vector<T>* val);
";

const ARRAY: &str = "\
template <typename T, size_t N>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::array<T, N>* val);
";

const MAP_STRING: &str = "\
template <typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::map<std::string, T>* val);
";

const MAP_ENUM: &str = "\
template <typename K, typename T>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::map<K, T>* val);
";

const TUPLE: &str = "\
template <typename... Ts>
void bakeTo(const ghoul::Dictionary& d, std::string_view key, std::tuple<Ts...>* val);
";

/// Primary templates and generic converter declarations the rest of the unit
/// specializes or calls. Empty when nothing is required.
pub fn fallbacks(req: &Requirements) -> String {
    let public = [
        (req.documentation, DOCUMENTATION),
        (req.enum_strings, ENUM_STRINGS),
        (req.enum_map, ENUM_MAP),
        (req.enum_arrayify, ENUM_ARRAYIFY),
    ];
    let internal = [
        (req.optional, OPTIONAL),
        (req.sequence, SEQUENCE),
        (req.array, ARRAY),
        (req.map_string, MAP_STRING),
        (req.map_enum, MAP_ENUM),
        (req.tuple, TUPLE),
    ];
    let pick = |items: &[(bool, &str)]| items.iter().filter(|(on, _)| *on).map(|(_, text)| *text).collect::<String>();
    let public = pick(&public);
    let internal = pick(&internal);
    if public.is_empty() && internal.is_empty() {
        return String::new();
    }

    let mut out = String::from("namespace codegen {\n\n");
    out.push_str(&public);
    if !internal.is_empty() {
        out.push_str("\nnamespace internal {\n\n");
        out.push_str(&internal);
        out.push_str("\n} // namespace internal\n");
    }
    out.push_str("\n} // namespace codegen\n");
    out
}
