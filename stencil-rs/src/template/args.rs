//! Directive argument parsing.
//!
//! An argument list is a whitespace-separated sequence of items, each one of:
//!
//! | Form                  | Meaning                              |
//! |-----------------------|--------------------------------------|
//! | `word`                | positional value                     |
//! | `name=value`          | named value                          |
//! | `name="two words"`    | named value containing blanks        |
//! | `"two words"`         | positional value containing blanks   |
//!
//! Inside double quotes `\"` and `\\` are escapes.  An unterminated quote is
//! a syntax error.

use crate::error::ErrorKind;

/// Parsed argument list, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pub positional: Vec<String>,
    pub named: Vec<(String, String)>,
}

impl Args {
    /// Value of the last `name=value` item with this name.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// One raw item before positional/named classification.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    /// Byte offset of an unquoted `=` inside `text`, if any.
    eq_at: Option<usize>,
}

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
pub fn tokenize(s: &str) -> Result<Vec<String>, ErrorKind> {
    Ok(lex(s)?.into_iter().map(|t| t.text).collect())
}

fn lex(s: &str) -> Result<Vec<Token>, ErrorKind> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut cur = String::new();
    let mut eq_at: Option<usize> = None;
    let mut in_quotes = false;
    let mut started = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            '\\' if in_quotes => match chars.next() {
                Some(escaped) => cur.push(escaped),
                None => break,
            },
            '=' if !in_quotes && eq_at.is_none() && !cur.is_empty() => {
                eq_at = Some(cur.len());
                cur.push('=');
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    tokens.push(Token { text: std::mem::take(&mut cur), eq_at: eq_at.take() });
                    started = false;
                }
            }
            c => {
                cur.push(c);
                started = true;
            }
        }
    }
    if in_quotes {
        return Err(ErrorKind::Syntax(format!("unterminated quote in arguments: {s}")));
    }
    if started {
        tokens.push(Token { text: cur, eq_at });
    }
    Ok(tokens)
}

/// One argument item, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Positional(String),
    Named(String, String),
}

/// Split an argument list into items, keeping their written order.
pub fn parse_items(s: &str) -> Result<Vec<Item>, ErrorKind> {
    let items = lex(s)?
        .into_iter()
        .map(|tok| match tok.eq_at {
            Some(i) if is_name(&tok.text[..i]) => {
                Item::Named(tok.text[..i].to_owned(), tok.text[i + 1..].to_owned())
            }
            _ => Item::Positional(tok.text),
        })
        .collect();
    Ok(items)
}

/// Parse an argument list into positional and named values.
pub fn parse_args(s: &str) -> Result<Args, ErrorKind> {
    let mut args = Args::default();
    for item in parse_items(s)? {
        match item {
            Item::Positional(v) => args.positional.push(v),
            Item::Named(n, v) => args.named.push((n, v)),
        }
    }
    Ok(args)
}

/// Identifier rule shared by argument names, macro formals and variables.
pub fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_simple() {
        assert_eq!(tokenize("foo bar  baz").unwrap(), ["foo", "bar", "baz"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(tokenize(r#""two words" 42"#).unwrap(), ["two words", "42"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(tokenize(r#""say \"hi\"""#).unwrap(), [r#"say "hi""#]);
    }

    #[test]
    fn empty_quoted_token_is_kept() {
        assert_eq!(tokenize(r#"a "" b"#).unwrap(), ["a", "", "b"]);
    }

    #[test]
    fn named_and_positional() {
        let args = parse_args(r#"Bob greeting="Good day" loud"#).unwrap();
        assert_eq!(args.positional, ["Bob", "loud"]);
        assert_eq!(args.named("greeting"), Some("Good day"));
    }

    #[test]
    fn quoted_equals_is_positional() {
        let args = parse_args(r#""a=b""#).unwrap();
        assert_eq!(args.positional, ["a=b"]);
        assert!(args.named.is_empty());
    }

    #[test]
    fn value_may_contain_equals() {
        let args = parse_args("expr=a==b").unwrap();
        assert_eq!(args.named("expr"), Some("a==b"));
    }

    #[test]
    fn leading_equals_is_positional() {
        let args = parse_args("=x 1=2").unwrap();
        assert_eq!(args.positional, ["=x", "1=2"]);
    }

    #[test]
    fn empty_named_value() {
        let args = parse_args("name=").unwrap();
        assert_eq!(args.named("name"), Some(""));
    }

    #[test]
    fn last_named_wins() {
        let args = parse_args("n=1 n=2").unwrap();
        assert_eq!(args.named("n"), Some("2"));
    }

    #[test]
    fn items_keep_written_order() {
        let items = parse_items(r#"a b="x y" c"#).unwrap();
        assert_eq!(
            items,
            [
                Item::Positional("a".into()),
                Item::Named("b".into(), "x y".into()),
                Item::Positional("c".into()),
            ]
        );
    }

    #[test]
    fn unterminated_quote_is_syntax_error() {
        assert!(matches!(parse_args(r#"name="open"#), Err(ErrorKind::Syntax(_))));
    }

    #[test]
    fn name_rule() {
        assert!(is_name("greet"));
        assert!(is_name("_private1"));
        assert!(!is_name("1abc"));
        assert!(!is_name("a-b"));
        assert!(!is_name(""));
    }
}
