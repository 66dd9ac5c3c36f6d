//! Recursive type model and its three renderings.
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::code::ScopeId;

// ————————————————————————————————————————————————————————————————————————————
// BASIC TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicType {
    Bool,
    Int,
    Double,
    Float,
    String,
    Path,
    Ivec2, Ivec3, Ivec4,
    Dvec2, Dvec3, Dvec4,
    Vec2, Vec3, Vec4,
    Mat2x2, Mat2x3, Mat2x4, Mat3x2, Mat3x3, Mat3x4, Mat4x2, Mat4x3, Mat4x4,
    Dmat2x2, Dmat2x3, Dmat2x4, Dmat3x2, Dmat3x3, Dmat3x4, Dmat4x2, Dmat4x3, Dmat4x4,
    Dictionary,
}

/// One row of the primitive table.
pub struct BasicInfo {
    pub kind: BasicType,
    /// Spelling accepted by the resolver and produced by the canonical rendering.
    pub short: &'static str,
    /// Fully qualified spelling used in emitted code.
    pub native: &'static str,
    /// Spelling shown to script authors.
    pub descriptive: &'static str,
    /// Type the dynamic value store holds this value as.
    pub storage: &'static str,
    /// Verifier class checking a value of this type.
    pub verifier: &'static str,
}

macro_rules! basic {
    ($kind:ident, $short:literal, $native:literal, $desc:literal, $storage:literal, $verifier:literal) => {
        BasicInfo {
            kind: BasicType::$kind,
            short: $short,
            native: $native,
            descriptive: $desc,
            storage: $storage,
            verifier: $verifier,
        }
    };
}

pub static BASIC_TYPES: &[BasicInfo] = &[
    basic!(Bool, "bool", "bool", "Boolean", "bool", "BoolVerifier"),
    basic!(Int, "int", "int", "Integer", "int", "IntVerifier"),
    basic!(Double, "double", "double", "Number", "double", "DoubleVerifier"),
    basic!(Float, "float", "float", "Number", "double", "DoubleVerifier"),
    basic!(String, "string", "std::string", "String", "std::string", "StringVerifier"),
    basic!(Path, "path", "std::filesystem::path", "Path", "std::string", "FileVerifier"),
    basic!(Ivec2, "ivec2", "glm::ivec2", "ivec2", "glm::ivec2", "IntVector2Verifier"),
    basic!(Ivec3, "ivec3", "glm::ivec3", "ivec3", "glm::ivec3", "IntVector3Verifier"),
    basic!(Ivec4, "ivec4", "glm::ivec4", "ivec4", "glm::ivec4", "IntVector4Verifier"),
    basic!(Dvec2, "dvec2", "glm::dvec2", "vec2", "glm::dvec2", "DoubleVector2Verifier"),
    basic!(Dvec3, "dvec3", "glm::dvec3", "vec3", "glm::dvec3", "DoubleVector3Verifier"),
    basic!(Dvec4, "dvec4", "glm::dvec4", "vec4", "glm::dvec4", "DoubleVector4Verifier"),
    basic!(Vec2, "vec2", "glm::vec2", "vec2", "glm::dvec2", "DoubleVector2Verifier"),
    basic!(Vec3, "vec3", "glm::vec3", "vec3", "glm::dvec3", "DoubleVector3Verifier"),
    basic!(Vec4, "vec4", "glm::vec4", "vec4", "glm::dvec4", "DoubleVector4Verifier"),
    basic!(Mat2x2, "mat2x2", "glm::mat2x2", "mat2x2", "glm::dmat2x2", "DoubleMatrix2x2Verifier"),
    basic!(Mat2x3, "mat2x3", "glm::mat2x3", "mat2x3", "glm::dmat2x3", "DoubleMatrix2x3Verifier"),
    basic!(Mat2x4, "mat2x4", "glm::mat2x4", "mat2x4", "glm::dmat2x4", "DoubleMatrix2x4Verifier"),
    basic!(Mat3x2, "mat3x2", "glm::mat3x2", "mat3x2", "glm::dmat3x2", "DoubleMatrix3x2Verifier"),
    basic!(Mat3x3, "mat3x3", "glm::mat3x3", "mat3x3", "glm::dmat3x3", "DoubleMatrix3x3Verifier"),
    basic!(Mat3x4, "mat3x4", "glm::mat3x4", "mat3x4", "glm::dmat3x4", "DoubleMatrix3x4Verifier"),
    basic!(Mat4x2, "mat4x2", "glm::mat4x2", "mat4x2", "glm::dmat4x2", "DoubleMatrix4x2Verifier"),
    basic!(Mat4x3, "mat4x3", "glm::mat4x3", "mat4x3", "glm::dmat4x3", "DoubleMatrix4x3Verifier"),
    basic!(Mat4x4, "mat4x4", "glm::mat4x4", "mat4x4", "glm::dmat4x4", "DoubleMatrix4x4Verifier"),
    basic!(Dmat2x2, "dmat2x2", "glm::dmat2x2", "mat2x2", "glm::dmat2x2", "DoubleMatrix2x2Verifier"),
    basic!(Dmat2x3, "dmat2x3", "glm::dmat2x3", "mat2x3", "glm::dmat2x3", "DoubleMatrix2x3Verifier"),
    basic!(Dmat2x4, "dmat2x4", "glm::dmat2x4", "mat2x4", "glm::dmat2x4", "DoubleMatrix2x4Verifier"),
    basic!(Dmat3x2, "dmat3x2", "glm::dmat3x2", "mat3x2", "glm::dmat3x2", "DoubleMatrix3x2Verifier"),
    basic!(Dmat3x3, "dmat3x3", "glm::dmat3x3", "mat3x3", "glm::dmat3x3", "DoubleMatrix3x3Verifier"),
    basic!(Dmat3x4, "dmat3x4", "glm::dmat3x4", "mat3x4", "glm::dmat3x4", "DoubleMatrix3x4Verifier"),
    basic!(Dmat4x2, "dmat4x2", "glm::dmat4x2", "mat4x2", "glm::dmat4x2", "DoubleMatrix4x2Verifier"),
    basic!(Dmat4x3, "dmat4x3", "glm::dmat4x3", "mat4x3", "glm::dmat4x3", "DoubleMatrix4x3Verifier"),
    basic!(Dmat4x4, "dmat4x4", "glm::dmat4x4", "mat4x4", "glm::dmat4x4", "DoubleMatrix4x4Verifier"),
    basic!(Dictionary, "Dictionary", "ghoul::Dictionary", "Table", "ghoul::Dictionary", "TableVerifier"),
];

static BY_SHORT: Lazy<HashMap<&'static str, &'static BasicInfo>> =
    Lazy::new(|| BASIC_TYPES.iter().map(|info| (info.short, info)).collect());

static BY_KIND: Lazy<HashMap<BasicType, &'static BasicInfo>> =
    Lazy::new(|| BASIC_TYPES.iter().map(|info| (info.kind, info)).collect());

impl BasicType {
    pub fn from_short(name: &str) -> Option<Self> {
        BY_SHORT.get(name).map(|info| info.kind)
    }

    pub fn info(self) -> &'static BasicInfo {
        // every variant has a row in BASIC_TYPES
        BY_KIND[&self]
    }

    pub fn is_vec3(self) -> bool {
        matches!(self, Self::Vec3 | Self::Dvec3)
    }

    pub fn is_vec4(self) -> bool {
        matches!(self, Self::Vec4 | Self::Dvec4)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE TREE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomKind {
    Struct,
    Enum,
}

/// A resolved reference to a struct or enum declared in the same input.
///
/// Two references are equal when they point at the same declaration, however
/// the name was spelled at the use site.
#[derive(Debug, Clone, Serialize)]
pub struct CustomRef {
    /// Spelling at the use site.
    pub name: String,
    /// Fully qualified name, e.g. `Parameters::Mode`.
    pub qualified: String,
    pub kind: CustomKind,
    pub target: ScopeId,
}

impl PartialEq for CustomRef {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for CustomRef {}

impl Hash for CustomRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeNode {
    Basic { basic: BasicType },
    Pointer { name: String },
    Map { key: Box<TypeNode>, value: Box<TypeNode> },
    Optional { inner: Box<TypeNode>, default: Option<String> },
    Variant { alternatives: Vec<TypeNode> },
    Tuple { elements: Vec<TypeNode> },
    Array { inner: Box<TypeNode>, size: usize },
    Sequence { inner: Box<TypeNode> },
    Custom { custom: CustomRef },
}

impl TypeNode {
    pub fn basic(basic: BasicType) -> Self {
        Self::Basic { basic }
    }

    pub fn optional(inner: TypeNode, default: Option<String>) -> Self {
        Self::Optional { inner: Box::new(inner), default }
    }

    pub fn sequence(inner: TypeNode) -> Self {
        Self::Sequence { inner: Box::new(inner) }
    }

    pub fn as_basic(&self) -> Option<BasicType> {
        match self {
            Self::Basic { basic } => Some(*basic),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional { .. })
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Self::Custom { custom } if custom.kind == CustomKind::Enum)
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Self::Custom { custom } if custom.kind == CustomKind::Struct)
    }

    /// The type with one level of `Optional` removed, if present.
    pub fn strip_optional(&self) -> &TypeNode {
        match self {
            Self::Optional { inner, .. } => inner,
            other => other,
        }
    }

    /// Innermost value type, looking through optionals, sequences, arrays and
    /// map values. Constraint tags on a variable apply to this node.
    pub fn value_leaf(&self) -> &TypeNode {
        match self {
            Self::Optional { inner, .. } | Self::Sequence { inner } | Self::Array { inner, .. } => {
                inner.value_leaf()
            }
            Self::Map { value, .. } => value.value_leaf(),
            other => other,
        }
    }

    /// Spelling that round-trips through the resolver.
    pub fn canonical(&self) -> String {
        self.render(Rendering::Canonical)
    }

    /// Spelling used for the declaration in emitted code.
    pub fn native(&self) -> String {
        self.render(Rendering::Native)
    }

    /// Native shape a dynamic script value is pulled out as before conversion:
    /// enums travel as strings, structs as dictionaries.
    pub fn marshal(&self) -> String {
        self.render(Rendering::Marshal)
    }

    /// True when the value needs an explicit conversion between its marshalled
    /// shape and its native shape.
    pub fn needs_conversion(&self) -> bool {
        self.marshal() != self.native()
    }

    /// Human-readable spelling for documentation.
    pub fn descriptive(&self) -> String {
        match self {
            Self::Basic { basic } => basic.info().descriptive.to_string(),
            Self::Pointer { name } => format!("{name}*"),
            Self::Map { key, value } => format!("{} -> {}", key.descriptive(), value.descriptive()),
            Self::Optional { inner, .. } => format!("{}?", inner.descriptive()),
            Self::Variant { alternatives } => alternatives
                .iter()
                .map(TypeNode::descriptive)
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Tuple { elements } => format!(
                "({})",
                elements.iter().map(TypeNode::descriptive).collect::<Vec<_>>().join(", ")
            ),
            Self::Array { inner, size } => format!("{}[{size}]", inner.descriptive()),
            Self::Sequence { inner } => format!("[{}]", inner.descriptive()),
            Self::Custom { custom } => match custom.kind {
                CustomKind::Enum => "String".to_string(),
                CustomKind::Struct => "Table".to_string(),
            },
        }
    }

    fn render(&self, mode: Rendering) -> String {
        let ns = |name: &str| match mode {
            Rendering::Canonical => name.to_string(),
            Rendering::Native | Rendering::Marshal => format!("std::{name}"),
        };
        let list = |items: &[TypeNode]| {
            items.iter().map(|t| t.render(mode)).collect::<Vec<_>>().join(", ")
        };
        match self {
            Self::Basic { basic } => match mode {
                Rendering::Canonical => basic.info().short.to_string(),
                Rendering::Native | Rendering::Marshal => basic.info().native.to_string(),
            },
            Self::Pointer { name } => format!("{name}*"),
            Self::Map { key, value } => {
                format!("{}<{}, {}>", ns("map"), key.render(mode), value.render(mode))
            }
            Self::Optional { inner, .. } => format!("{}<{}>", ns("optional"), inner.render(mode)),
            Self::Variant { alternatives } => format!("{}<{}>", ns("variant"), list(alternatives)),
            Self::Tuple { elements } => format!("{}<{}>", ns("tuple"), list(elements)),
            Self::Array { inner, size } => format!("{}<{}, {size}>", ns("array"), inner.render(mode)),
            Self::Sequence { inner } => format!("{}<{}>", ns("vector"), inner.render(mode)),
            Self::Custom { custom } => match (mode, custom.kind) {
                (Rendering::Canonical, _) => custom.name.clone(),
                (Rendering::Native, _) => custom.qualified.clone(),
                (Rendering::Marshal, CustomKind::Enum) => "std::string".to_string(),
                (Rendering::Marshal, CustomKind::Struct) => "ghoul::Dictionary".to_string(),
            },
        }
    }

    /// Visit this node and every node below it, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TypeNode)) {
        visit(self);
        match self {
            Self::Basic { .. } | Self::Pointer { .. } | Self::Custom { .. } => {}
            Self::Map { key, value } => {
                key.walk(visit);
                value.walk(visit);
            }
            Self::Optional { inner, .. } | Self::Array { inner, .. } | Self::Sequence { inner } => {
                inner.walk(visit)
            }
            Self::Variant { alternatives: items } | Self::Tuple { elements: items } => {
                for item in items {
                    item.walk(visit);
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Rendering {
    Canonical,
    Native,
    Marshal,
}
