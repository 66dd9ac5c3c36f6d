//! `[[codegen::tag(args), codegen::other]]` marker grammar.
use crate::error::{bail, Error, Result};

/// Namespace every recognized tag lives in.
pub const NAMESPACE: &str = "codegen";
const PREFIX: &str = "codegen::";

/// One tag out of a bracketed attribute list. `args` is the raw text between
/// the outermost parentheses, so it may itself contain parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub args: Option<String>,
}

impl Attribute {
    pub fn args_or_empty(&self) -> &str {
        self.args.as_deref().unwrap_or("")
    }
}

/// Byte range of the first `[[` ... `]]` block in `text`, `]]` included.
///
/// Brackets inside string literals and nested parentheses are skipped, so
/// `[[codegen::key("]]")]]` is a single block.
pub fn find_block(text: &str) -> Result<Option<(usize, usize)>> {
    let Some(start) = text.find("[[") else {
        return Ok(None);
    };
    let bytes = text.as_bytes();
    let mut i = start + 2;
    let mut depth = 0usize;
    let mut in_str = false;
    while i < bytes.len() {
        let c = bytes[i];
        if in_str {
            if c == b'\\' {
                i += 1;
            } else if c == b'"' {
                in_str = false;
            }
        } else {
            match c {
                b'"' => in_str = true,
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b']' if depth == 0 && bytes.get(i + 1) == Some(&b']') => {
                    return Ok(Some((start, i + 2)));
                }
                _ => {}
            }
        }
        i += 1;
    }
    bail!(&text[start..], "attribute list is missing its closing ']]'")
}

/// Parse every tag of the first attribute block in `text`.
pub fn parse_attributes(text: &str) -> Result<Vec<Attribute>> {
    let Some(open) = text.find("[[") else {
        return Ok(Vec::new());
    };
    let body = &text[open + 2..];
    let Some(first) = body.find(PREFIX) else {
        bail!(text, "attribute list does not use the '{NAMESPACE}' namespace")
    };
    if !body[..first].trim().is_empty() {
        bail!(text, "unexpected text before '{PREFIX}' in attribute list");
    }
    let mut out = Vec::new();
    parse_tags(text, &body[first + PREFIX.len()..], &mut out)?;
    Ok(out)
}

fn parse_tags(full: &str, rest: &str, out: &mut Vec<Attribute>) -> Result<()> {
    let rest = rest.trim_start();
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        bail!(full, "expected an attribute name");
    }
    let name = rest[..name_len].to_string();
    let mut rest = rest[name_len..].trim_start();

    let mut args = None;
    if let Some(after_paren) = rest.strip_prefix('(') {
        let close = matching_paren(after_paren)
            .ok_or_else(|| Error::new(format!("unterminated argument list for '{name}'")).with_snippet(full))?;
        args = Some(after_paren[..close].trim().to_string());
        rest = after_paren[close + 1..].trim_start();
    } else if rest.starts_with(')') {
        bail!(full, "unmatched ')' after attribute '{name}'");
    }
    out.push(Attribute { name, args });

    if let Some(next) = rest.strip_prefix(',') {
        let next = next.trim_start();
        let next = next.strip_prefix(PREFIX).unwrap_or(next);
        return parse_tags(full, next, out);
    }
    if rest.starts_with("]]") {
        return Ok(());
    }
    match rest.chars().next() {
        None => bail!(full, "attribute list is missing its closing ']]'"),
        Some(')') => bail!(full, "unmatched ')' in attribute list"),
        Some(c) => bail!(full, "unexpected '{c}' after attribute argument list"),
    }
}

/// Index of the `)` closing an already-opened paren, honoring nesting and
/// string literals.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Walk `text` and call `stop` for every character outside of nesting and
/// literals, returning the offset of the first one it accepts.
///
/// Parentheses, braces and square brackets always nest. Angle brackets nest
/// only while they can open template arguments: outside of any bracket and
/// before the top-level `=` that starts an initializer. `<<`, `>>` (unless it
/// closes two template lists) and the comparison operators are skipped as
/// operators. A top-level `,` or `;` starts a new declarator.
pub fn scan_top_level(text: &str, mut stop: impl FnMut(usize, char) -> bool) -> Option<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let (mut brackets, mut angles) = (0i32, 0i32);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut expression = false;
    let mut previous = ' ';
    let mut i = 0;
    while let Some(&(at, c)) = chars.get(i) {
        let next = chars.get(i + 1).map(|&(_, n)| n);
        i += 1;
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if c == q => quote = None,
                _ => {}
            }
            previous = c;
            continue;
        }

        let templates = brackets == 0 && !expression;
        let operator = match (c, next) {
            ('<', Some('<')) => true,
            ('>', Some('>')) => !(templates && angles > 0),
            ('>', Some('=')) => !(templates && angles > 0),
            ('<' | '=' | '!', Some('=')) => true,
            _ => false,
        };
        if operator {
            i += 1;
            previous = '=';
            continue;
        }

        let top = brackets == 0 && angles == 0;
        if top && stop(at, c) {
            return Some(at);
        }
        match c {
            '"' => quote = Some(c),
            // `1'000` is a digit separator, not a character literal
            '\'' if !previous.is_alphanumeric() => quote = Some(c),
            '(' | '{' | '[' => brackets += 1,
            ')' | '}' | ']' => brackets -= 1,
            '<' if templates => angles += 1,
            '>' if templates && angles > 0 => angles -= 1,
            '=' if top => expression = true,
            ',' | ';' if top => expression = false,
            _ => {}
        }
        previous = c;
    }
    None
}

/// Split a raw argument list on top-level commas (see [`scan_top_level`]).
pub fn split_arguments(args: &str) -> Vec<String> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    let mut cuts = Vec::new();
    scan_top_level(args, |at, c| {
        if c == ',' {
            cuts.push(at);
        }
        false
    });
    let mut out = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        out.push(args[start..cut].trim().to_string());
        start = cut + 1;
    }
    out.push(args[start..].trim().to_string());
    out
}

/// Strip the surrounding double quotes of a string-literal argument.
pub fn unquote(arg: &str) -> Result<String> {
    let arg = arg.trim();
    match arg.strip_prefix('"').and_then(|a| a.strip_suffix('"')) {
        Some(inner) if arg.len() >= 2 => Ok(inner.to_string()),
        _ => bail!(arg, "expected a quoted string argument"),
    }
}
