//! Declaration model produced by the parser and consumed by the generator.
//!
//! Structs and enums live in a [`Scopes`] arena and refer to each other
//! through [`ScopeId`] handles; parents are handles too, so the tree can be
//! walked in both directions without shared ownership.
use serde::Serialize;

use crate::types::TypeNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scopes {
    nodes: Vec<ScopeNode>,
}

impl Scopes {
    pub fn alloc(&mut self, node: ScopeNode) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        if let Some(parent) = node.parent {
            if let ScopeKind::Struct(s) = &mut self.nodes[parent.0].kind {
                s.children.push(id);
            }
        }
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: ScopeId) -> &ScopeNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut ScopeNode {
        &mut self.nodes[id.0]
    }

    /// `id`, then its parent, and so on up to the root.
    pub fn ancestry(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), |cur| self.get(*cur).parent)
    }

    /// `Outer::Inner::Leaf`
    pub fn qualified_name(&self, id: ScopeId) -> String {
        let mut parts: Vec<&str> = self.ancestry(id).map(|s| self.get(s).name.as_str()).collect();
        parts.reverse();
        parts.join("::")
    }

    /// Identifier-safe form of the qualified name: `Outer_Inner_Leaf`.
    pub fn mangled_name(&self, id: ScopeId) -> String {
        self.qualified_name(id).replace("::", "_")
    }

    pub fn child_named(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        match &self.get(id).kind {
            ScopeKind::Struct(s) => s.children.iter().copied().find(|c| self.get(*c).name == name),
            ScopeKind::Enum(_) => None,
        }
    }

    /// Every struct at or below `root`, parents before children, in
    /// declaration order.
    pub fn structs_under(&self, root: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        self.collect_under(root, &mut |id, node| {
            if matches!(node.kind, ScopeKind::Struct(_)) {
                out.push(id);
            }
        });
        out
    }

    /// Every enum at or below `root`, in declaration order.
    pub fn enums_under(&self, root: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        self.collect_under(root, &mut |id, node| {
            if matches!(node.kind, ScopeKind::Enum(_)) {
                out.push(id);
            }
        });
        out
    }

    fn collect_under(&self, id: ScopeId, visit: &mut impl FnMut(ScopeId, &ScopeNode)) {
        let node = self.get(id);
        visit(id, node);
        if let ScopeKind::Struct(s) = &node.kind {
            for child in &s.children {
                self.collect_under(*child, visit);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeNode {
    pub name: String,
    pub comment: String,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
}

impl ScopeNode {
    pub fn as_struct(&self) -> Option<&StructScope> {
        match &self.kind {
            ScopeKind::Struct(s) => Some(s),
            ScopeKind::Enum(_) => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumScope> {
        match &self.kind {
            ScopeKind::Enum(e) => Some(e),
            ScopeKind::Struct(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScopeKind {
    Struct(StructScope),
    Enum(EnumScope),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StructScope {
    /// Externally visible name of a root struct; `None` for nested structs.
    pub dictionary_name: Option<String>,
    pub children: Vec<ScopeId>,
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnumScope {
    pub elements: Vec<EnumElement>,
    pub attributes: EnumAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnumAttributes {
    pub stringify: bool,
    pub arrayify: bool,
    pub mapped_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumElement {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    /// Key the value is looked up under; stored without quotes.
    pub key: String,
    #[serde(rename = "type")]
    pub ty: TypeNode,
    pub comment: String,
    pub attributes: VariableAttributes,
}

/// Constraint and flag tags of a variable. Empty strings mean "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableAttributes {
    pub annotation: String,
    pub reference: String,
    pub inrange: String,
    pub notinrange: String,
    pub less: String,
    pub lessequal: String,
    pub greater: String,
    pub greaterequal: String,
    pub unequal: String,
    pub inlist: String,
    pub notinlist: String,
    pub directory: bool,
    pub datetime: bool,
    pub color: bool,
    pub identifier: bool,
    pub must_not_be_empty: bool,
    pub private: bool,
}

impl VariableAttributes {
    /// The single range/comparison/list constraint, as `(verifier, args)`.
    pub fn constraint(&self) -> Option<(&'static str, &str)> {
        self.constraints().into_iter().find(|(_, args)| !args.is_empty())
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints().iter().filter(|(_, args)| !args.is_empty()).count()
    }

    fn constraints(&self) -> [(&'static str, &str); 9] {
        [
            ("InRangeVerifier", self.inrange.as_str()),
            ("NotInRangeVerifier", self.notinrange.as_str()),
            ("LessVerifier", self.less.as_str()),
            ("LessEqualVerifier", self.lessequal.as_str()),
            ("GreaterVerifier", self.greater.as_str()),
            ("GreaterEqualVerifier", self.greaterequal.as_str()),
            ("UnequalVerifier", self.unequal.as_str()),
            ("InListVerifier", self.inlist.as_str()),
            ("NotInListVerifier", self.notinlist.as_str()),
        ]
    }

    pub fn has_type_specific(&self) -> bool {
        self.constraint_count() > 0
            || !self.annotation.is_empty()
            || !self.reference.is_empty()
            || self.directory
            || self.datetime
            || self.color
            || self.identifier
            || self.must_not_be_empty
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub path: Option<String>,
    /// 1-based.
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub name: String,
    /// Name the scripting runtime exposes the function under.
    pub lua_name: String,
    /// Already escaped for embedding in a string literal.
    pub documentation: String,
    pub return_type: Option<TypeNode>,
    pub arguments: Vec<Variable>,
    pub location: SourceLocation,
}

/// Everything parsed out of one input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Code {
    pub file: Option<String>,
    pub scopes: Scopes,
    pub structs: Vec<ScopeId>,
    pub enums: Vec<ScopeId>,
    pub functions: Vec<Function>,
}

impl Code {
    pub fn is_empty(&self) -> bool {
        self.structs.is_empty() && self.enums.is_empty() && self.functions.is_empty()
    }

    /// Root structs and root enums, the scopes visible at file level.
    pub fn roots(&self) -> Vec<ScopeId> {
        self.structs.iter().chain(&self.enums).copied().collect()
    }

    /// Every enum in the input: root enums first, then those nested in root
    /// structs, in declaration order.
    pub fn all_enums(&self) -> Vec<ScopeId> {
        let mut out = self.enums.clone();
        for s in &self.structs {
            out.extend(self.scopes.enums_under(*s));
        }
        out
    }

    pub fn all_structs(&self) -> Vec<ScopeId> {
        self.structs.iter().flat_map(|s| self.scopes.structs_under(*s)).collect()
    }
}
