//! Scope-tree builder for struct and enum blocks.
//!
//! The block text is first cut into logical lines (a `{` ends a line, a `}`
//! is a line of its own, whole-line `//` comments are kept and trailing ones
//! dropped). [`ScopeBuilder`] then walks those lines with a stack of open
//! scopes and a pending-text buffer that collects declarations spanning
//! several lines.
use crate::attribute::{split_arguments, unquote};
use crate::code::{
    Code, EnumAttributes, EnumElement, EnumScope, ScopeId, ScopeKind, ScopeNode, StructScope, Variable,
    VariableAttributes,
};
use crate::error::{bail, Result};
use crate::resolve::Resolver;
use crate::types::TypeNode;

use super::{
    apply_variable_attributes, capitalize, check_attribute_targets, find_top_level, is_identifier,
    split_attribute_block, split_type_and_name,
};

pub(super) fn parse_struct_block(code: &mut Code, text: &str, max_depth: usize) -> Result<ScopeId> {
    let root = ScopeBuilder::new(code, max_depth, RootKind::Struct).run(text)?;
    check_unique_root(code, root, text)?;
    Ok(root)
}

pub(super) fn parse_enum_block(code: &mut Code, text: &str, max_depth: usize) -> Result<ScopeId> {
    let root = ScopeBuilder::new(code, max_depth, RootKind::Enum).run(text)?;
    check_unique_root(code, root, text)?;
    Ok(root)
}

fn check_unique_root(code: &Code, root: ScopeId, text: &str) -> Result<()> {
    let name = &code.scopes.get(root).name;
    if code.roots().iter().any(|r| code.scopes.get(*r).name == *name) {
        bail!(text, "'{name}' is declared more than once");
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// LOGICAL LINES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Comment(String),
    Text(String),
    /// Text preceding a `{` on the same line.
    Open(String),
    Close,
}

fn logical_lines(text: &str) -> Vec<Line> {
    fn flush(current: &mut String, out: &mut Vec<Line>) {
        let line = current.trim();
        if !line.is_empty() {
            out.push(Line::Text(line.to_string()));
        }
        current.clear();
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut parens = 0i32;
    let mut in_str = false;
    let mut escaped = false;
    // nothing but whitespace seen on the current physical line
    let mut line_start = true;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_whitespace() && c != '/' {
            line_start = false;
        }
        if in_str {
            current.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                current.push(c);
            }
            '(' => {
                parens += 1;
                current.push(c);
            }
            ')' => {
                parens -= 1;
                current.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                let comment: String = chars.by_ref().take_while(|c| *c != '\n').collect();
                if line_start {
                    out.push(Line::Comment(comment.trim_start_matches('/').trim().to_string()));
                }
                flush(&mut current, &mut out);
                line_start = true;
            }
            '\n' => {
                flush(&mut current, &mut out);
                line_start = true;
            }
            '{' if parens == 0 => {
                out.push(Line::Open(current.trim().to_string()));
                current.clear();
            }
            '}' if parens == 0 => {
                flush(&mut current, &mut out);
                out.push(Line::Close);
                while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                    chars.next();
                }
                if chars.peek() == Some(&';') {
                    chars.next();
                }
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut out);
    out
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Struct,
    Enum,
}

struct ScopeBuilder<'c> {
    code: &'c mut Code,
    max_depth: usize,
    root_kind: RootKind,
    root: Option<ScopeId>,
    stack: Vec<ScopeId>,
    /// Header, variable or enum element text not yet terminated.
    pending: String,
    comment: Vec<String>,
}

impl<'c> ScopeBuilder<'c> {
    fn new(code: &'c mut Code, max_depth: usize, root_kind: RootKind) -> Self {
        Self {
            code,
            max_depth,
            root_kind,
            root: None,
            stack: Vec::new(),
            pending: String::new(),
            comment: Vec::new(),
        }
    }

    fn run(mut self, text: &str) -> Result<ScopeId> {
        for line in logical_lines(text) {
            match line {
                Line::Comment(c) => {
                    if self.pending.trim().is_empty() {
                        self.comment.push(c);
                    }
                }
                Line::Text(t) => self.push_text(&t)?,
                Line::Open(header) => {
                    let header = self.take_pending(&header);
                    self.open(&header)?;
                }
                Line::Close => self.close()?,
            }
        }
        match self.root {
            Some(root) if self.stack.is_empty() => Ok(root),
            _ => bail!(text, "annotated declaration is missing its closing '}}'"),
        }
    }

    fn take_pending(&mut self, tail: &str) -> String {
        let joined = format!("{} {}", self.pending, tail);
        self.pending.clear();
        joined.trim().to_string()
    }

    fn take_comment(&mut self) -> String {
        let comment = self.comment.join(" ");
        self.comment.clear();
        comment
    }

    fn innermost(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    fn innermost_is_enum(&self) -> bool {
        self.innermost().is_some_and(|id| self.code.scopes.get(id).as_enum().is_some())
    }

    fn push_text(&mut self, text: &str) -> Result<()> {
        if self.stack.is_empty() {
            if self.root.is_some() {
                bail!(text, "unexpected text after the annotated declaration");
            }
            if !self.pending.is_empty() {
                self.pending.push(' ');
            }
            self.pending.push_str(text);
            return Ok(());
        }
        if self.innermost_is_enum() {
            self.push_element_text(text)
        } else {
            self.push_variable_text(text)
        }
    }

    fn open(&mut self, header: &str) -> Result<()> {
        if self.stack.is_empty() && self.root.is_some() {
            bail!(header, "unexpected text after the annotated declaration");
        }
        if self.innermost_is_enum() {
            bail!(header, "unexpected '{{' inside an enum");
        }
        if self.stack.len() >= self.max_depth {
            bail!(header, "declarations are nested deeper than the maximum depth of {}", self.max_depth);
        }
        let parent = self.innermost();
        let id = if let Some(rest) = strip_word(header, "struct") {
            if parent.is_none() && self.root_kind == RootKind::Enum {
                bail!(header, "expected an enum declaration");
            }
            self.open_struct(header, rest, parent)?
        } else if let Some(rest) = strip_word(header, "enum") {
            if parent.is_none() && self.root_kind == RootKind::Struct {
                bail!(header, "expected a struct declaration");
            }
            self.open_enum(header, rest, parent)?
        } else if header.contains('=') || parent.is_some() {
            bail!(header, "field initializers are not permitted; '{{' may only open a struct or an enum");
        } else {
            bail!(header, "expected a struct or enum declaration");
        };
        if self.root.is_none() {
            self.root = Some(id);
        }
        self.stack.push(id);
        Ok(())
    }

    fn open_struct(&mut self, header: &str, rest: &str, parent: Option<ScopeId>) -> Result<ScopeId> {
        let (attrs, name) = split_attribute_block(rest)?;
        let mut dictionary_name = None;
        for attr in &attrs {
            match attr.name.as_str() {
                "Dictionary" => {
                    let arg = attr.args_or_empty();
                    if arg.starts_with('"') {
                        bail!(header, "the argument of 'codegen::Dictionary' must not be quoted");
                    }
                    if !is_identifier(arg) {
                        bail!(header, "'{arg}' is not a valid dictionary name");
                    }
                    dictionary_name = Some(arg.to_string());
                }
                other => bail!(header, "unknown struct attribute '{other}'"),
            }
        }
        if !is_identifier(&name) {
            bail!(header, "expected a plain struct name, found '{name}'");
        }
        match (parent, &dictionary_name) {
            (Some(_), Some(_)) => {
                bail!(header, "nested structs cannot carry 'codegen::Dictionary'; only the root struct is named")
            }
            (None, None) => bail!(header, "the root struct is missing 'codegen::Dictionary'"),
            _ => {}
        }
        self.check_sibling_name(parent, &name, header)?;
        let comment = self.take_comment();
        Ok(self.code.scopes.alloc(ScopeNode {
            name,
            comment,
            parent,
            kind: ScopeKind::Struct(StructScope { dictionary_name, ..StructScope::default() }),
        }))
    }

    fn open_enum(&mut self, header: &str, rest: &str, parent: Option<ScopeId>) -> Result<ScopeId> {
        let Some(rest) = strip_word(rest, "class").or_else(|| strip_word(rest, "struct")) else {
            bail!(header, "old-style enums are not supported; use 'enum class' instead");
        };
        let (attrs, rest) = split_attribute_block(rest)?;
        let mut attributes = EnumAttributes::default();
        for attr in &attrs {
            match attr.name.as_str() {
                "stringify" => attributes.stringify = true,
                "arrayify" => attributes.arrayify = true,
                "map" => {
                    let target = attr.args_or_empty();
                    let valid = !target.is_empty() && target.split("::").all(|p| is_identifier(p.trim()));
                    if !valid {
                        bail!(header, "'codegen::map' requires the name of the target enum");
                    }
                    attributes.mapped_to = Some(target.to_string());
                }
                other => bail!(header, "unknown enum attribute '{other}'"),
            }
        }
        // `Name : underlying`
        let name = rest.split(':').next().unwrap_or_default().trim().to_string();
        if !is_identifier(&name) {
            bail!(header, "expected a plain enum name, found '{rest}'");
        }
        self.check_sibling_name(parent, &name, header)?;
        let comment = self.take_comment();
        Ok(self.code.scopes.alloc(ScopeNode {
            name,
            comment,
            parent,
            kind: ScopeKind::Enum(EnumScope { elements: Vec::new(), attributes }),
        }))
    }

    fn check_sibling_name(&self, parent: Option<ScopeId>, name: &str, header: &str) -> Result<()> {
        if let Some(parent) = parent {
            if self.code.scopes.child_named(parent, name).is_some() {
                bail!(header, "'{name}' is declared more than once in the same struct");
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(id) = self.innermost() else {
            bail!("}", "unmatched '}}'");
        };
        if self.innermost_is_enum() {
            let rest = std::mem::take(&mut self.pending);
            if !rest.trim().is_empty() {
                self.add_element(rest.trim())?;
            }
        } else if !self.pending.trim().is_empty() {
            bail!(self.pending.as_str(), "declaration is missing its terminating ';'");
        }
        self.comment.clear();
        self.stack.pop();
        log::trace!("closed scope '{}'", self.code.scopes.qualified_name(id));
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————————
    // VARIABLES
    // ————————————————————————————————————————————————————————————————————————

    fn push_variable_text(&mut self, text: &str) -> Result<()> {
        if !self.pending.is_empty() {
            self.pending.push(' ');
        }
        self.pending.push_str(text);
        while let Some(end) = find_top_level(&self.pending, ';') {
            let decl = self.pending[..end].trim().to_string();
            self.pending = self.pending[end + 1..].trim_start().to_string();
            if !decl.is_empty() {
                self.add_variable(&decl)?;
            }
        }
        Ok(())
    }

    fn add_variable(&mut self, decl: &str) -> Result<()> {
        let (attrs, rest) = split_attribute_block(decl)?;
        if find_top_level(&rest, '=').is_some() {
            bail!(decl, "field initializers are not permitted");
        }
        let (ty_text, name) = split_type_and_name(&rest)?;
        let Some(scope) = self.innermost() else {
            bail!(decl, "variable declared outside of a struct");
        };

        let globals = self.code.roots();
        let resolver = Resolver::new(&self.code.scopes, &globals, self.max_depth);
        let Some(ty) = resolver.parse(&ty_text, Some(scope))? else {
            bail!(decl, "variable '{name}' cannot have type 'void'");
        };
        let mut has_pointer = false;
        ty.walk(&mut |t| has_pointer |= matches!(t, TypeNode::Pointer { .. }));
        if has_pointer {
            bail!(decl, "pointer members are not supported");
        }

        let mut var = Variable {
            key: capitalize(&name),
            name,
            ty,
            comment: self.take_comment(),
            attributes: VariableAttributes::default(),
        };
        apply_variable_attributes(&mut var, &attrs, decl)?;
        check_attribute_targets(&var, decl)?;

        let ScopeKind::Struct(s) = &mut self.code.scopes.get_mut(scope).kind else {
            bail!(decl, "variable declared outside of a struct");
        };
        if s.variables.iter().any(|v| v.name == var.name) {
            bail!(decl, "variable '{}' is declared more than once", var.name);
        }
        s.variables.push(var);
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————————
    // ENUM ELEMENTS
    // ————————————————————————————————————————————————————————————————————————

    fn push_element_text(&mut self, text: &str) -> Result<()> {
        if !self.pending.is_empty() {
            self.pending.push(' ');
        }
        self.pending.push_str(text);
        let complete = self.pending.trim_end().ends_with(',');
        let mut parts = split_arguments(&self.pending);
        let remainder = parts.pop().unwrap_or_default();
        for part in parts {
            if part.is_empty() {
                bail!(text, "empty enum element");
            }
            self.add_element(&part)?;
        }
        self.pending = if complete { String::new() } else { remainder };
        Ok(())
    }

    fn add_element(&mut self, text: &str) -> Result<()> {
        let (attrs, rest) = split_attribute_block(text)?;
        let name = match find_top_level(&rest, '=') {
            Some(at) => rest[..at].trim(),
            None => rest.trim(),
        };
        if !is_identifier(name) {
            bail!(text, "'{name}' is not a valid enum element name");
        }
        let mut key = name.to_string();
        for attr in &attrs {
            match attr.name.as_str() {
                "key" => key = unquote(attr.args_or_empty())?,
                other => bail!(text, "unknown enum element attribute '{other}'"),
            }
        }
        self.comment.clear();

        let Some(scope) = self.innermost() else {
            bail!(text, "enum element outside of an enum");
        };
        let ScopeKind::Enum(e) = &mut self.code.scopes.get_mut(scope).kind else {
            bail!(text, "enum element outside of an enum");
        };
        if e.elements.iter().any(|el| el.name == name || el.key == key) {
            bail!(text, "enum element '{name}' (key '{key}') is declared more than once");
        }
        e.elements.push(EnumElement { name: name.to_string(), key });
        Ok(())
    }
}

/// `struct Foo` → `Some("Foo")` for word `struct`.
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.trim_start().strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '[' => Some(rest.trim_start()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicType;

    fn parse_struct(text: &str) -> Result<(Code, ScopeId)> {
        let mut code = Code::default();
        let id = parse_struct_block(&mut code, text, 32)?;
        code.structs.push(id);
        Ok((code, id))
    }

    #[test]
    fn logical_lines_split_braces_and_comments() {
        let lines = logical_lines("struct A { // trailing\n  // doc\n  int a; };");
        assert_eq!(lines, vec![
            Line::Open("struct A".into()),
            Line::Comment("doc".into()),
            Line::Text("int a;".into()),
            Line::Close,
        ]);
    }

    #[test]
    fn in_range_variable() {
        let (code, root) = parse_struct(
            "struct [[codegen::Dictionary(Test)]] Parameters {\n\
                 // A ranged value\n\
                 float inRangeValueFloat [[codegen::inrange(-0.5, 0.75)]];\n\
             };",
        )
        .unwrap();
        let s = code.scopes.get(root).as_struct().unwrap();
        assert_eq!(s.dictionary_name.as_deref(), Some("Test"));
        let var = &s.variables[0];
        assert_eq!(var.name, "inRangeValueFloat");
        assert_eq!(var.key, "InRangeValueFloat");
        assert_eq!(var.comment, "A ranged value");
        assert_eq!(var.ty.as_basic(), Some(BasicType::Float));
        let expected = VariableAttributes { inrange: "-0.5, 0.75".into(), ..Default::default() };
        assert_eq!(var.attributes, expected);
    }

    #[test]
    fn nested_scopes_and_multiline_declarations() {
        let (code, root) = parse_struct(
            r#"struct [[codegen::Dictionary(Test)]] Parameters {
                enum class Mode {
                    Fast [[codegen::key("fast")]],
                    Slow
                };
                struct Inner
                {
                    std::map<
                        std::string, Mode
                    > modes [[codegen::key("Modes")]];
                };
                std::optional<std::vector<Inner>> inners;
                Mode mode;
            };"#,
        )
        .unwrap();
        let s = code.scopes.get(root).as_struct().unwrap();
        assert_eq!(s.children.len(), 2);
        let mode = code.scopes.get(s.children[0]).as_enum().unwrap();
        assert_eq!(mode.elements, vec![
            EnumElement { name: "Fast".into(), key: "fast".into() },
            EnumElement { name: "Slow".into(), key: "Slow".into() },
        ]);
        let inner = code.scopes.get(s.children[1]).as_struct().unwrap();
        assert_eq!(inner.variables[0].key, "Modes");
        assert_eq!(inner.variables[0].ty.canonical(), "map<string, Mode>");
        assert_eq!(s.variables[0].ty.native(), "std::optional<std::vector<Parameters::Inner>>");
        assert!(s.variables[1].ty.is_enum());
    }

    #[test]
    fn quoted_dictionary_name_is_rejected() {
        let err = parse_struct(r#"struct [[codegen::Dictionary("Test")]] P { int a; };"#).unwrap_err();
        assert!(err.message.contains("must not be quoted"));
    }

    #[test]
    fn nested_dictionary_is_rejected() {
        let err = parse_struct(
            "struct [[codegen::Dictionary(A)]] P {\n\
                 struct [[codegen::Dictionary(B)]] Q { int a; };\n\
                 struct [[codegen::Dictionary(C)]] R { int a; };\n\
             };",
        )
        .unwrap_err();
        assert!(err.message.contains("nested structs"));
    }

    #[test]
    fn initializers_and_old_enums_are_rejected() {
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int a = 5; };").is_err());
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int a{5}; };").is_err());
        let err = parse_struct("struct [[codegen::Dictionary(A)]] P { enum E { X }; };").unwrap_err();
        assert!(err.message.contains("enum class"));
    }

    #[test]
    fn attribute_misuse_is_rejected() {
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int a [[codegen::bogus]]; };").is_err());
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int a [[codegen::less(1), codegen::greater(0)]]; };").is_err());
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int a [[codegen::color]]; };").is_err());
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { std::vector<glm::vec3> a [[codegen::color]]; };").is_ok());
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int* a; };").is_err());
        assert!(parse_struct("struct [[codegen::Dictionary(A)]] P { int a };").is_err());
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut code = Code::default();
        let text = "struct [[codegen::Dictionary(A)]] P { struct Q { struct R { int a; }; }; };";
        let err = parse_struct_block(&mut code, text, 2).unwrap_err();
        assert!(err.message.contains("maximum depth"));
    }

    #[test]
    fn root_enum_block() {
        let mut code = Code::default();
        let id = parse_enum_block(
            &mut code,
            "enum class [[codegen::stringify, codegen::map(Other)]] Color : int {\n Red = 1, Green,\n Blue\n};",
            32,
        )
        .unwrap();
        let e = code.scopes.get(id).as_enum().unwrap();
        assert!(e.attributes.stringify);
        assert_eq!(e.attributes.mapped_to.as_deref(), Some("Other"));
        let names: Vec<_> = e.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Red", "Green", "Blue"]);
    }

    #[test]
    fn shift_valued_elements() {
        let sources = [
            "enum class [[codegen::stringify]] Flags { A = 1 << 0, B = 1 << 1, C = 1 << 2 };",
            "enum class [[codegen::stringify]] Flags {\n A = 1 << 0,\n B = 1 << 1,\n C = 1 << 2\n};",
            "enum class [[codegen::stringify]] Flags {\n A = 0x10 >> 4, B = (1 < 2),\n C = 4 > 3\n};",
        ];
        for source in sources {
            let mut code = Code::default();
            let id = parse_enum_block(&mut code, source, 32).unwrap();
            let e = code.scopes.get(id).as_enum().unwrap();
            let names: Vec<_> = e.elements.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, ["A", "B", "C"], "{source}");
        }
    }
}
