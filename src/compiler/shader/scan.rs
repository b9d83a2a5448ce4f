//! Narrow text scanners used by the transpiler passes.
//!
//! Nothing here parses GLSL properly; each helper recognises exactly the
//! shapes produced by the legacy shader dialect and leaves everything else
//! untouched.

/// Identifiers that are keywords or builtins in GLSL 450 but legal names in
/// the legacy dialect.
pub const RESERVED_RENAMES: &[&str] = &["sample", "input", "output", "filter"];

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Append `_` to every identifier listed in `reserved`, skipping comments.
pub fn rename_reserved_identifiers(source: &str, reserved: &[&str]) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() + 16);
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
            }
            b if is_ident_start(b) => {
                let start = i;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                let ident = &source[start..i];
                if reserved.contains(&ident) {
                    out.push_str(&source[copied..i]);
                    out.push('_');
                    copied = i;
                }
            }
            b if b.is_ascii_digit() => {
                // numeric literals such as 1e5 must not start an identifier
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    out.push_str(&source[copied..]);
    out
}

/// Drop `#require ...` lines.
pub fn strip_require_directives(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        if line.trim_start().starts_with("#require") {
            continue;
        }
        out.push_str(line);
    }
    out
}

/// `uniform highp float x;` -> `uniform float x;`
pub fn strip_uniform_precision(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("uniform") else {
            out.push_str(line);
            continue;
        };
        let after = rest.trim_start();
        let qualifier = ["lowp", "mediump", "highp"].into_iter().find(|q| {
            after
                .strip_prefix(q)
                .is_some_and(|tail| tail.starts_with(|c: char| c.is_whitespace()))
        });
        match qualifier {
            Some(q) => {
                let indent = &line[..line.len() - trimmed.len()];
                out.push_str(indent);
                out.push_str("uniform ");
                out.push_str(after[q.len()..].trim_start());
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Index of the `)` closing the `(` at `open`, if balanced.
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
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

/// First top-level `,` after `start`, stopping at an unbalanced `)`.
fn top_level_comma(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            b',' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn is_wrapped_in_abs(expr: &str) -> bool {
    let trimmed = expr.trim();
    if !trimmed.starts_with("abs(") {
        return false;
    }
    let bytes = trimmed.as_bytes();
    matching_paren(bytes, 3) == Some(bytes.len() - 1)
}

/// Wrap the base of every `pow(base, exp)` call in `abs(...)`.
///
/// Negative bases are undefined for GLSL `pow` but common in the legacy
/// dialect. Nested calls inside the base are rewritten too, and a base already
/// wrapped in `abs` is left alone, so running this twice changes nothing.
pub fn wrap_pow_base_in_abs(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() + 32);
    let mut copied = 0;
    let mut i = 0;

    while let Some(found) = source[i..].find("pow(") {
        let start = i + found;
        let args = start + "pow(".len();
        let at_boundary = start == 0 || !is_ident_byte(bytes[start - 1]);
        if !at_boundary {
            i = args;
            continue;
        }
        let Some(comma) = top_level_comma(bytes, args) else {
            i = args;
            continue;
        };

        let base = wrap_pow_base_in_abs(&source[args..comma]);
        out.push_str(&source[copied..args]);
        if is_wrapped_in_abs(&base) {
            out.push_str(&base);
        } else {
            out.push_str("abs(");
            out.push_str(&base);
            out.push(')');
        }
        copied = comma;
        i = comma;
    }
    out.push_str(&source[copied..]);
    out
}

/// Collapse runs of three or more newlines down to two.
pub fn collapse_blank_lines(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut run = 0;
    for c in source.chars() {
        if c == '\n' {
            run += 1;
            if run >= 3 {
                continue;
            }
        } else {
            run = 0;
        }
        out.push(c);
    }
    out
}

/// A one-line declaration `<keyword> <type> <name>[N]; // comment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration<'a> {
    pub glsl_type: &'a str,
    pub name: &'a str,
    pub array_size: Option<u32>,
    /// Text after `//`, trimmed.
    pub comment: Option<&'a str>,
}

/// Parse `line` as a declaration introduced by `keyword`; `None` for any other shape.
pub fn parse_declaration<'a>(line: &'a str, keyword: &str) -> Option<Declaration<'a>> {
    let (code, comment) = match line.find("//") {
        Some(pos) => (&line[..pos], Some(line[pos + 2..].trim())),
        None => (line, None),
    };
    let code = code.trim();
    let rest = code.strip_prefix(keyword)?;
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let body = rest.trim_start().strip_suffix(';')?.trim_end();

    let mut parts = body.split_whitespace();
    let glsl_type = parts.next()?;
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() || rest.get(1).is_some_and(|t| !t.starts_with('[')) {
        return None;
    }
    let mut name_part = rest.concat();

    let mut array_size = None;
    if let Some(open) = name_part.find('[') {
        let inner = name_part[open + 1..].strip_suffix(']')?;
        array_size = Some(inner.trim().parse::<u32>().ok()?);
        name_part.truncate(open);
    }
    // the name must be a borrowed slice of `line`
    let name_start = line.find(name_part.as_str())?;
    let name = &line[name_start..name_start + name_part.len()];
    if !name.bytes().all(is_ident_byte) || !name.bytes().next().is_some_and(is_ident_start) {
        return None;
    }
    if !glsl_type.bytes().all(is_ident_byte) {
        return None;
    }

    Some(Declaration {
        glsl_type,
        name,
        array_size,
        comment: comment.filter(|c| !c.is_empty()),
    })
}

/// Byte offset just past the leading directive run: `#version`, `#extension`,
/// `#line` and `#define` lines, with blank lines and line comments between them.
pub fn prologue_end(source: &str) -> usize {
    let mut end = 0;
    let mut offset = 0;
    let mut continued = false;
    for line in source.split_inclusive('\n') {
        offset += line.len();
        let t = line.trim();
        if continued {
            continued = t.ends_with('\\');
            end = offset;
            continue;
        }
        if ["#version", "#extension", "#line", "#define"]
            .iter()
            .any(|d| t.starts_with(d))
        {
            continued = t.ends_with('\\');
            end = offset;
        } else if !(t.is_empty() || t.starts_with("//")) {
            break;
        }
    }
    end
}

/// Insert `block` on its own lines right after the prologue, so it sees every
/// macro the header defines.
pub fn insert_after_prologue(source: &str, block: &str) -> String {
    if block.is_empty() {
        return source.to_string();
    }
    let at = prologue_end(source);
    let mut out = String::with_capacity(source.len() + block.len() + 4);
    out.push_str(&source[..at]);
    if at > 0 && !source[..at].ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(block);
    if !block.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&source[at..]);
    out
}

/// Replace whole-identifier occurrences of `from` with `to`, outside comments.
pub fn replace_identifier(source: &str, from: &str, to: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    let mut i = 0;
    while let Some(found) = source[i..].find(from) {
        let start = i + found;
        let end = start + from.len();
        let before_ok = start == 0 || !is_ident_byte(bytes[start - 1]);
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            out.push_str(&source[copied..start]);
            out.push_str(to);
            copied = end;
        }
        i = end;
    }
    out.push_str(&source[copied..]);
    out
}
