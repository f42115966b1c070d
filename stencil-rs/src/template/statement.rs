//! Statement classification.
//!
//! Turns one raw template line into a [`ClassifiedStatement`]: literal text,
//! a catalog directive (long form `_#KEYWORD`, short form `_KEYWORD`), a call
//! of a registered macro, or a cursor operation (`_{name`, `_}`, `_?name`,
//! `_:name`).

use tracing::trace;

use super::directive::{self, CursorOp, DirectiveKind};
use crate::config::Indicators;
use crate::error::ErrorKind;

/// What a line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Literal,
    Directive(DirectiveKind),
    Cursor(CursorOp),
}

/// One classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatement {
    pub raw: String,
    /// Number of leading whitespace characters.
    pub indent: usize,
    pub first_word: Option<String>,
    pub kind: StatementKind,
    /// Everything after the first word, trimmed.
    pub argument: Option<String>,
    /// Variable, macro, path or cursor name the directive acts on.
    pub object: Option<String>,
    /// Argument text with the object removed.
    pub expression: Option<String>,
}

impl ClassifiedStatement {
    pub fn is_directive(&self) -> bool {
        matches!(self.kind, StatementKind::Directive(_))
    }

    pub fn directive(&self) -> Option<DirectiveKind> {
        match self.kind {
            StatementKind::Directive(k) => Some(k),
            _ => None,
        }
    }

    /// Leading whitespace of the raw line.
    pub fn indentation(&self) -> &str {
        let end = self
            .raw
            .char_indices()
            .nth(self.indent)
            .map_or(self.raw.len(), |(i, _)| i);
        &self.raw[..end]
    }

    fn literal(raw: &str, indent: usize, first_word: Option<String>, argument: Option<String>) -> Self {
        let trimmed = raw.trim();
        Self {
            raw: raw.to_owned(),
            indent,
            first_word,
            kind: StatementKind::Literal,
            argument,
            object: None,
            expression: (!trimmed.is_empty()).then(|| trimmed.to_owned()),
        }
    }
}

/// Classify `raw`.
///
/// `is_macro` reports whether a keyword names a registered macro; such a
/// keyword becomes a [`DirectiveKind::Call`].
pub fn classify(
    raw: &str,
    ind: &Indicators,
    is_macro: impl Fn(&str) -> bool,
) -> Result<ClassifiedStatement, ErrorKind> {
    let indent = raw.chars().take_while(|c| c.is_whitespace()).count();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(ClassifiedStatement::literal(raw, indent, None, None));
    }

    let (first, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (trimmed, ""),
    };
    let first_word = Some(first.to_owned());
    let argument = (!rest.is_empty()).then(|| rest.to_owned());

    if let Some((op, name)) = cursor_prefix(first, ind) {
        let stmt = classify_cursor(raw, indent, first, op, name, rest)?;
        trace!(line = raw, op = ?op, "cursor statement");
        return Ok(stmt);
    }

    let (keyword, long_form) = if let Some(k) = first.strip_prefix(ind.meta_command.as_str()) {
        (k, true)
    } else if let Some(k) = first.strip_prefix(ind.meta.as_str()) {
        (k, false)
    } else {
        return Ok(ClassifiedStatement::literal(raw, indent, first_word, argument));
    };

    let kind = if let Some(desc) = directive::lookup(keyword) {
        desc.kind
    } else if !keyword.is_empty() && is_macro(keyword) {
        let stmt = ClassifiedStatement {
            raw: raw.to_owned(),
            indent,
            first_word,
            kind: StatementKind::Directive(DirectiveKind::Call),
            argument: argument.clone(),
            object: Some(keyword.to_owned()),
            expression: argument,
        };
        trace!(line = raw, macro_name = keyword, "macro call");
        return Ok(stmt);
    } else if long_form {
        return Err(ErrorKind::Syntax(format!("unknown directive: {first}")));
    } else {
        return Ok(ClassifiedStatement::literal(raw, indent, first_word, argument));
    };

    let desc = directive::descriptor(kind);
    let (object, expression) = if desc.has_object {
        let (object, remainder) = split_object(rest)?;
        if object.is_empty() {
            return Err(ErrorKind::Syntax(format!("{} requires a name", desc.keyword)));
        }
        (Some(object), (!remainder.is_empty()).then(|| remainder.to_owned()))
    } else {
        (None, argument.clone())
    };
    if desc.has_expression && expression.is_none() {
        return Err(ErrorKind::Syntax(format!("{} requires a condition", desc.keyword)));
    }

    trace!(line = raw, directive = desc.keyword, "directive statement");
    Ok(ClassifiedStatement {
        raw: raw.to_owned(),
        indent,
        first_word,
        kind: StatementKind::Directive(kind),
        argument,
        object,
        expression,
    })
}

/// Match the first word against the cursor prefixes, longest first.
fn cursor_prefix<'a>(first: &'a str, ind: &Indicators) -> Option<(CursorOp, &'a str)> {
    let mut prefixes = [
        (ind.cursor_open.as_str(), CursorOp::Open),
        (ind.cursor_close.as_str(), CursorOp::Close),
        (ind.cursor_query.as_str(), CursorOp::Query),
        (ind.cursor_select.as_str(), CursorOp::Select),
    ];
    prefixes.sort_by_key(|(p, _)| std::cmp::Reverse(p.len()));
    prefixes
        .iter()
        .find_map(|(p, op)| first.strip_prefix(*p).map(|name| (*op, name)))
}

fn classify_cursor(
    raw: &str,
    indent: usize,
    first: &str,
    op: CursorOp,
    attached: &str,
    rest: &str,
) -> Result<ClassifiedStatement, ErrorKind> {
    let (name, remainder) = if attached.is_empty() {
        match rest.split_once(char::is_whitespace) {
            Some((n, r)) => (n, r.trim()),
            None => (rest, ""),
        }
    } else {
        (attached, rest)
    };
    if name.is_empty() && op != CursorOp::Close {
        return Err(ErrorKind::Syntax(format!("cursor name missing after {first}")));
    }
    Ok(ClassifiedStatement {
        raw: raw.to_owned(),
        indent,
        first_word: Some(first.to_owned()),
        kind: StatementKind::Cursor(op),
        argument: (!rest.is_empty()).then(|| rest.to_owned()),
        object: (!name.is_empty()).then(|| name.to_owned()),
        expression: (!remainder.is_empty()).then(|| remainder.to_owned()),
    })
}

/// Split off the object word.  A leading double-quoted object may contain
/// blanks; `\"` escapes a quote inside it.
fn split_object(rest: &str) -> Result<(String, &str), ErrorKind> {
    let Some(quoted) = rest.strip_prefix('"') else {
        return Ok(match rest.split_once(char::is_whitespace) {
            Some((o, r)) => (o.to_owned(), r.trim()),
            None => (rest.to_owned(), ""),
        });
    };
    let mut object = String::new();
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    object.push(escaped);
                }
            }
            '"' => return Ok((object, quoted[i + 1..].trim())),
            c => object.push(c),
        }
    }
    Err(ErrorKind::Syntax(format!("unterminated quote: {rest}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cls(line: &str) -> ClassifiedStatement {
        classify(line, &Indicators::default(), |n| n == "greet").expect("classify failed")
    }

    #[test]
    fn blank_line_is_literal() {
        let s = cls("   ");
        assert_eq!(s.kind, StatementKind::Literal);
        assert_eq!(s.indent, 3);
        assert_eq!(s.first_word, None);
    }

    #[test]
    fn plain_text_is_literal() {
        let s = cls("  hello world");
        assert_eq!(s.kind, StatementKind::Literal);
        assert_eq!(s.first_word.as_deref(), Some("hello"));
        assert_eq!(s.argument.as_deref(), Some("world"));
        assert_eq!(s.expression.as_deref(), Some("hello world"));
        assert_eq!(s.indentation(), "  ");
        assert!(!s.is_directive());
    }

    #[test]
    fn long_and_short_forms() {
        assert_eq!(cls("_#IF 1==1").directive(), Some(DirectiveKind::If));
        assert_eq!(cls("_if x").directive(), Some(DirectiveKind::If));
        assert_eq!(cls("_#end_if").directive(), Some(DirectiveKind::EndIf));
    }

    #[test]
    fn expression_directive_keeps_argument() {
        let s = cls("_#IF  a == 1 ");
        assert_eq!(s.expression.as_deref(), Some("a == 1"));
        assert_eq!(s.object, None);
    }

    #[test]
    fn object_directive_splits() {
        let s = cls(r#"_#LOOP r over [{"n":"a"}]"#);
        assert_eq!(s.directive(), Some(DirectiveKind::Loop));
        assert_eq!(s.object.as_deref(), Some("r"));
        assert_eq!(s.expression.as_deref(), Some(r#"over [{"n":"a"}]"#));
    }

    #[test]
    fn quoted_object() {
        let s = cls(r#"_#INCLUDE "my file.tpl" extra"#);
        assert_eq!(s.object.as_deref(), Some("my file.tpl"));
        assert_eq!(s.expression.as_deref(), Some("extra"));
    }

    #[test]
    fn registered_macro_is_call() {
        let s = cls("  _greet name=Bob");
        assert_eq!(s.directive(), Some(DirectiveKind::Call));
        assert_eq!(s.object.as_deref(), Some("greet"));
        assert_eq!(s.expression.as_deref(), Some("name=Bob"));
        assert_eq!(s.indent, 2);
    }

    #[test]
    fn unknown_short_keyword_is_literal() {
        let s = cls("_n");
        assert_eq!(s.kind, StatementKind::Literal);
        assert_eq!(s.expression.as_deref(), Some("_n"));
    }

    #[test]
    fn unknown_long_keyword_is_error() {
        let err = classify("_#FROB x", &Indicators::default(), |_| false).unwrap_err();
        assert!(matches!(err, ErrorKind::Syntax(_)));
    }

    #[test]
    fn missing_object_or_condition_is_error() {
        let ind = Indicators::default();
        assert!(classify("_#INCLUDE", &ind, |_| false).is_err());
        assert!(classify("_#IF", &ind, |_| false).is_err());
        assert!(classify("_#ELSE_IF   ", &ind, |_| false).is_err());
    }

    #[test]
    fn cursor_operations() {
        let s = cls("_{summary");
        assert_eq!(s.kind, StatementKind::Cursor(CursorOp::Open));
        assert_eq!(s.object.as_deref(), Some("summary"));

        let s = cls("_: other");
        assert_eq!(s.kind, StatementKind::Cursor(CursorOp::Select));
        assert_eq!(s.object.as_deref(), Some("other"));

        let s = cls("_}");
        assert_eq!(s.kind, StatementKind::Cursor(CursorOp::Close));
        assert_eq!(s.object, None);

        assert_eq!(cls("_?toc").kind, StatementKind::Cursor(CursorOp::Query));
    }

    #[test]
    fn cursor_without_name_is_error() {
        assert!(classify("_{", &Indicators::default(), |_| false).is_err());
    }

    #[test]
    fn custom_indicators() {
        let ind = Indicators {
            meta: "@".into(),
            meta_command: "@@".into(),
            ..Indicators::default()
        };
        let s = classify("@@loop x in t", &ind, |_| false).unwrap();
        assert_eq!(s.directive(), Some(DirectiveKind::Loop));
        let s = classify("_#IF 1", &ind, |_| false).unwrap();
        assert_eq!(s.kind, StatementKind::Literal);
    }
}
