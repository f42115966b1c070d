//! Variable substitution in literal text.
//!
//! | Sequence      | Meaning                                            |
//! |---------------|----------------------------------------------------|
//! | `_name`       | innermost binding of `name`, else the setting      |
//! | `_row.field`  | dotted name, as bound by `LOOP row …`              |
//! | `\_name`      | literal `_name`                                    |
//!
//! `_` stands for the configured meta indicator.  A reference only starts at
//! a word boundary (`snake_case` is left alone) and the name must begin with
//! a letter.  Undefined names expand to nothing, or fail in strict mode.

use super::expr::VarLookup;
use crate::error::ErrorKind;

/// Expand every variable reference in `src`.
pub fn expand(
    src: &str,
    meta: &str,
    vars: &dyn VarLookup,
    strict: bool,
) -> Result<String, ErrorKind> {
    if meta.is_empty() || !src.contains(meta) {
        return Ok(src.to_owned());
    }

    let mut out = String::with_capacity(src.len());
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < src.len() {
        let rest = &src[i..];

        if rest.starts_with('\\') && rest[1..].starts_with(meta) {
            out.push_str(meta);
            i += 1 + meta.len();
            prev = meta.chars().last();
            continue;
        }

        if rest.starts_with(meta) && !prev.is_some_and(is_ident_continue) {
            if let Some(name) = read_name(&rest[meta.len()..]) {
                match vars.get_var(name) {
                    Some(value) => out.push_str(&value),
                    None if strict => return Err(ErrorKind::UndefinedVariable(name.to_owned())),
                    None => {}
                }
                i += meta.len() + name.len();
                prev = name.chars().last();
                continue;
            }
        }

        let Some(ch) = rest.chars().next() else { break };
        out.push(ch);
        prev = Some(ch);
        i += ch.len_utf8();
    }
    Ok(out)
}

/// Read `ident(.ident)*` from the start of `s`.
fn read_name(s: &str) -> Option<&str> {
    let mut chars = s.char_indices().peekable();
    match chars.next() {
        Some((_, c)) if c.is_alphabetic() => {}
        _ => return None,
    }
    let mut end = s.len();
    while let Some((idx, c)) = chars.next() {
        if is_ident_continue(c) {
            continue;
        }
        if c == '.' && matches!(chars.peek(), Some((_, n)) if n.is_alphabetic()) {
            continue;
        }
        end = idx;
        break;
    }
    Some(&s[..end])
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ── Tests ─────────────────────────────────────────────────────────────────────
