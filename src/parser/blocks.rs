//! Locating annotated blocks in raw header text.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{bail, Error, Result};

static STRUCT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[\s*codegen::Dictionary\b").expect("valid struct marker regex"));
static ENUM_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[\s*codegen::(stringify|map|arrayify)\b").expect("valid enum marker regex")
});
static FUNCTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[\s*codegen::luawrap\b").expect("valid function marker regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Struct,
    Enum,
    Function,
}

/// One annotated declaration cut out of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    /// For structs and enums: keyword through closing brace (and `;`).
    /// For functions: marker through the end of the signature.
    pub text: &'a str,
    /// 1-based line of the block start in the whole input.
    pub line: usize,
    /// Doc comment preceding a function marker, escaped for embedding.
    pub doc: String,
}

/// Cut every annotated block out of `source`, in order of appearance.
pub fn extract_blocks(source: &str) -> Result<Vec<Block<'_>>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(block_end) = next_block(source, cursor, &mut blocks)? {
        cursor = block_end;
    }
    Ok(blocks)
}

/// Find the earliest marker at or after `cursor`, push its block and return
/// the offset just past it.
fn next_block<'a>(source: &'a str, cursor: usize, out: &mut Vec<Block<'a>>) -> Result<Option<usize>> {
    let rest = &source[cursor..];
    let candidates = [
        (BlockKind::Struct, STRUCT_MARKER.find(rest)),
        (BlockKind::Enum, ENUM_MARKER.find(rest)),
        (BlockKind::Function, FUNCTION_MARKER.find(rest)),
    ];
    let Some((kind, marker)) = candidates
        .into_iter()
        .filter_map(|(kind, m)| m.map(|m| (kind, m)))
        .min_by_key(|(_, m)| m.start())
    else {
        return Ok(None);
    };
    let marker_at = cursor + marker.start();

    let (start, end, doc) = match kind {
        BlockKind::Struct | BlockKind::Enum => {
            let start = keyword_before(source, marker_at, kind)?;
            let end = braced_end(source, marker_at)?;
            (start, end, String::new())
        }
        BlockKind::Function => {
            let end = signature_end(source, marker_at)?;
            (marker_at, end, doc_comment_before(&source[..marker_at]))
        }
    };
    let text = &source[start..end];
    if text.contains("/*") {
        bail!(text, "block comments are not allowed inside annotated declarations; use '//' comments");
    }
    log::debug!("extracted {kind:?} block at line {}", line_of(source, start));
    out.push(Block { kind, text, line: line_of(source, start), doc });
    Ok(Some(end))
}

pub fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Offset of the `struct` / `enum class` keyword directly preceding a marker.
fn keyword_before(source: &str, marker_at: usize, kind: BlockKind) -> Result<usize> {
    let before = source[..marker_at].trim_end();
    let snippet = line_around(source, marker_at);
    match kind {
        BlockKind::Struct => {
            if !ends_with_word(before, "struct") {
                bail!(snippet, "'[[codegen::Dictionary]]' must directly follow the 'struct' keyword");
            }
            Ok(before.len() - "struct".len())
        }
        _ => {
            if ends_with_word(before, "enum") {
                bail!(snippet, "old-style enums are not supported; use 'enum class' instead");
            }
            let head = if ends_with_word(before, "class") {
                &before[..before.len() - "class".len()]
            } else if ends_with_word(before, "struct") {
                &before[..before.len() - "struct".len()]
            } else {
                bail!(snippet, "enum attributes must directly follow 'enum class'");
            };
            let head = head.trim_end();
            if !ends_with_word(head, "enum") {
                bail!(snippet, "enum attributes must directly follow 'enum class'");
            }
            Ok(head.len() - "enum".len())
        }
    }
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.strip_suffix(word).is_some_and(|head| {
        head.chars().next_back().is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

/// Offset just past the brace block opened after `from`, including a
/// trailing `;`. Braces inside line comments and string literals are ignored.
fn braced_end(source: &str, from: usize) -> Result<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = from;
    let mut in_str = false;
    while i < bytes.len() {
        let c = bytes[i];
        if in_str {
            match c {
                b'\\' => i += 1,
                b'"' => in_str = false,
                _ => {}
            }
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            i = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
            continue;
        } else {
            match c {
                b'"' => in_str = true,
                b'{' => depth += 1,
                b'}' => {
                    if depth == 0 {
                        bail!(line_around(source, i), "unmatched '}}'");
                    }
                    depth -= 1;
                    if depth == 0 {
                        let after = &source[i + 1..];
                        let trimmed = after.trim_start();
                        let end = if trimmed.starts_with(';') {
                            i + 1 + (after.len() - trimmed.len()) + 1
                        } else {
                            i + 1
                        };
                        return Ok(end);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    Err(Error::new("annotated declaration is missing its closing '}'").with_snippet(line_around(source, from)))
}

/// Offset of the first un-nested `{` (or `;`) after the parameter list that
/// follows the marker at `from`.
fn signature_end(source: &str, from: usize) -> Result<usize> {
    let Some((_, marker_end)) = crate::attribute::find_block(&source[from..])? else {
        bail!(line_around(source, from), "malformed function marker");
    };
    let sig_start = from + marker_end;
    let Some(open) = source[sig_start..].find('(') else {
        bail!(line_around(source, from), "expected a parameter list after '[[codegen::luawrap]]'");
    };
    let list = sig_start + open + 1;
    let closed = crate::attribute::scan_top_level(&source[list..], |_, c| c == ')').map(|n| list + n + 1);
    let Some(closed) = closed else {
        bail!(line_around(source, from), "function parameter list is missing its closing ')'");
    };
    match source[closed..].find(['{', ';']) {
        Some(n) => Ok(closed + n),
        None => bail!(line_around(source, from), "expected a function body after the signature"),
    }
}

/// Documentation immediately above a function marker: either one block
/// comment or a contiguous run of line comments, with no blank line between
/// it and the marker. Backslashes and quotes are escaped and lines are joined
/// with a literal `\n`.
fn doc_comment_before(before: &str) -> String {
    let before = before.trim_end_matches([' ', '\t']);
    let above = match before.strip_suffix('\n') {
        Some(above) => above.trim_end_matches([' ', '\t', '\r']),
        None => before,
    };
    let lines: Vec<String> = if let Some(head) = above.strip_suffix("*/") {
        match head.rfind("/*") {
            Some(open) => head[open + 2..]
                .lines()
                .map(|l| l.trim().trim_start_matches('*').trim().to_string())
                .collect(),
            None => Vec::new(),
        }
    } else {
        let mut run: Vec<String> = above
            .lines()
            .rev()
            .map(str::trim)
            .take_while(|l| l.starts_with("//"))
            .map(|l| l.trim_start_matches('/').trim().to_string())
            .collect();
        run.reverse();
        run
    };
    let lines: Vec<String> = lines
        .into_iter()
        .skip_while(|l| l.is_empty())
        .collect();
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(0, |p| p + 1);
    lines[..end]
        .iter()
        .map(|l| escape(l))
        .collect::<Vec<_>>()
        .join("\\n")
}

pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn line_around(source: &str, at: usize) -> &str {
    let start = source[..at].rfind('\n').map_or(0, |n| n + 1);
    let end = source[at..].find('\n').map_or(source.len(), |n| at + n);
    &source[start..end]
}
