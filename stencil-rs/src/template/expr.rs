//! Condition expressions: lexer, AST, parser, and the default evaluator.
//!
//! The interpreter treats condition evaluation as a black box behind the
//! [`Evaluator`] trait.  [`ExprEvaluator`] is the implementation installed by
//! default; embedders may replace it.
//!
//! Operator precedence (lowest → highest):
//!   ternary  →  or  →  and  →  relational  →  additive  →
//!   multiplicative  →  unary  →  primary

use regex::Regex;

use super::value::Value;

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Read-only variable access handed to an evaluator.
pub trait VarLookup {
    /// Look up a variable (innermost binding first, then settings).
    fn get_var(&self, name: &str) -> Option<String>;

    /// Whether `name` is bound at all.
    fn is_set(&self, name: &str) -> bool {
        self.get_var(name).is_some()
    }
}

/// Evaluates the boolean condition of `IF` / `ELSE_IF`.
pub trait Evaluator {
    fn eval_condition(&mut self, expr: &str, vars: &dyn VarLookup) -> Result<bool, String>;
}

/// The built-in expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn eval_condition(&mut self, expr: &str, vars: &dyn VarLookup) -> Result<bool, String> {
        Ok(eval_str(expr, vars)?.as_bool())
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,
    GlobMatch,     // =~
    RegexMatch,    // =/
    NotGlobMatch,  // !~
    NotRegexMatch, // !/

    And, // &&
    Or,  // ||

    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    /// Unrecognised input character, reported instead of masking as EOF.
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::from(first);

        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut hex = String::new();
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                hex.extend(self.advance());
            }
            return Token::Int(i64::from_str_radix(&hex, 16).unwrap_or(0));
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            s.extend(self.advance());
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            s.extend(self.advance());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                s.extend(self.advance());
            }
        }

        if is_float {
            Token::Float(s.parse().unwrap_or(0.0))
        } else {
            Token::Int(s.parse().unwrap_or(0))
        }
    }

    fn read_string(&mut self, quote: char) -> Token {
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => break,
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Token::Str(s)
    }

    /// Identifiers may be dotted (`row.name`) to reach loop record fields.
    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        loop {
            match self.peek() {
                Some(c) if c.is_alphanumeric() || c == '_' => s.extend(self.advance()),
                Some('.') if matches!(self.peek2(), Some(c) if c.is_alphabetic() || c == '_') => {
                    s.extend(self.advance())
                }
                _ => break,
            }
        }
        Token::Ident(s)
    }

    /// `yes` when the next character is `next`, otherwise `no`.
    fn pair(&mut self, next: char, yes: Token, no: Token) -> Token {
        if self.eat(next) {
            yes
        } else {
            no
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_ws();
        let Some(ch) = self.advance() else {
            return Token::Eof;
        };

        match ch {
            '0'..='9' => self.read_number(ch),
            '"' | '\'' => self.read_string(ch),
            c if c.is_alphabetic() || c == '_' => self.read_ident(c),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' if self.eat('~') => Token::NotGlobMatch,
            '!' if self.eat('/') => Token::NotRegexMatch,
            '!' => self.pair('=', Token::Ne, Token::Bang),
            '=' if self.eat('~') => Token::GlobMatch,
            '=' if self.eat('/') => Token::RegexMatch,
            // A lone `=` reads as equality in conditions.
            '=' => self.pair('=', Token::Eq, Token::Eq),
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '<' => self.pair('=', Token::Le, Token::Lt),
            '>' => self.pair('=', Token::Ge, Token::Gt),
            '?' => Token::Question,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c => Token::Unknown(c),
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    GlobMatch,
    RegexMatch,
    NotGlobMatch,
    NotRegexMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `&&`: the right side is evaluated only when the left is true.
    And(Box<Expr>, Box<Expr>),
    /// `||`: the right side is evaluated only when the left is false.
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

enum Infix {
    And,
    Or,
    Op(BinOp),
}

/// Binding power of an infix operator; higher binds tighter.  All infix
/// operators are left-associative.
fn infix(t: &Token) -> Option<(u8, Infix)> {
    let (bp, op) = match t {
        Token::Or => return Some((1, Infix::Or)),
        Token::And => return Some((2, Infix::And)),
        Token::Eq => (3, BinOp::Eq),
        Token::Ne => (3, BinOp::Ne),
        Token::Lt => (3, BinOp::Lt),
        Token::Le => (3, BinOp::Le),
        Token::Gt => (3, BinOp::Gt),
        Token::Ge => (3, BinOp::Ge),
        Token::GlobMatch => (3, BinOp::GlobMatch),
        Token::RegexMatch => (3, BinOp::RegexMatch),
        Token::NotGlobMatch => (3, BinOp::NotGlobMatch),
        Token::NotRegexMatch => (3, BinOp::NotRegexMatch),
        Token::Plus => (4, BinOp::Add),
        Token::Minus => (4, BinOp::Sub),
        Token::Star => (5, BinOp::Mul),
        Token::Slash => (5, BinOp::Div),
        Token::Percent => (5, BinOp::Rem),
        _ => return None,
    };
    Some((bp, Infix::Op(op)))
}

/// Prefix operators bind tighter than any infix operator.
const PREFIX_BP: u8 = 6;

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token();
        Parser { lexer, current }
    }

    fn bump(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn expect(&mut self, want: &Token, what: &str) -> Result<(), String> {
        if &self.current == want {
            self.bump();
            Ok(())
        } else {
            Err(format!("expected {what}, found {:?}", self.current))
        }
    }

    /// `cond ? then : else`, right-associative, below every infix operator.
    fn ternary(&mut self) -> Result<Expr, String> {
        let cond = self.expr(1)?;
        if self.current != Token::Question {
            return Ok(cond);
        }
        self.bump();
        let then = self.expr(1)?;
        self.expect(&Token::Colon, "':' in ternary")?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn expr(&mut self, min_bp: u8) -> Result<Expr, String> {
        let mut lhs = self.prefix()?;
        while let Some((bp, op)) = infix(&self.current) {
            if bp < min_bp {
                break;
            }
            self.bump();
            let rhs = Box::new(self.expr(bp + 1)?);
            let lhs_box = Box::new(lhs);
            lhs = match op {
                Infix::And => Expr::And(lhs_box, rhs),
                Infix::Or => Expr::Or(lhs_box, rhs),
                Infix::Op(op) => Expr::Binary(op, lhs_box, rhs),
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, String> {
        let op = match self.current {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.atom(),
        };
        self.bump();
        Ok(Expr::Unary(op, Box::new(self.expr(PREFIX_BP)?)))
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) if self.current == Token::LParen => {
                self.bump();
                let args = self.call_args(&name)?;
                Ok(Expr::Call(name, args))
            }
            Token::Ident(name) => Ok(Expr::Var(name)),
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    /// Comma-separated arguments after the opening parenthesis.
    fn call_args(&mut self, name: &str) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.current == Token::RParen {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.ternary()?);
            match self.bump() {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => return Err(format!("expected ',' or ')' in call to {name}, found {other:?}")),
            }
        }
    }
}

/// Parse an expression string into an AST.  Trailing input is an error.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(src);
    let expr = parser.ternary()?;
    match parser.current {
        Token::Eof => Ok(expr),
        ref other => Err(format!("unexpected trailing {other:?} in '{src}'")),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against the given variables.
pub fn eval_expr(expr: &Expr, vars: &dyn VarLookup) -> Result<Value, String> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => Ok(vars.get_var(name).map(Value::Str).unwrap_or_default()),
        Expr::Unary(UnaryOp::Neg, inner) => Ok(eval_expr(inner, vars)?.neg()),
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::from(!truth(inner, vars)?)),
        Expr::And(lhs, rhs) => Ok(Value::from(truth(lhs, vars)? && truth(rhs, vars)?)),
        Expr::Or(lhs, rhs) => Ok(Value::from(truth(lhs, vars)? || truth(rhs, vars)?)),
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, vars)?;
            let r = eval_expr(rhs, vars)?;
            apply(*op, &l, &r)
        }
        Expr::Ternary(cond, then, otherwise) => {
            let branch = if truth(cond, vars)? { then } else { otherwise };
            eval_expr(branch, vars)
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|a| eval_expr(a, vars))
                .collect::<Result<Vec<_>, _>>()?;
            call_fn(name, &values, vars)
        }
    }
}

fn truth(expr: &Expr, vars: &dyn VarLookup) -> Result<bool, String> {
    Ok(eval_expr(expr, vars)?.as_bool())
}

fn apply(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    use std::cmp::Ordering::{Equal, Greater, Less};
    let value = match op {
        BinOp::Add => l.add(r),
        BinOp::Sub => l.sub(r),
        BinOp::Mul => l.mul(r),
        BinOp::Div => l.div(r)?,
        BinOp::Rem => l.rem(r)?,
        BinOp::Eq => Value::from(l.compare(r) == Equal),
        BinOp::Ne => Value::from(l.compare(r) != Equal),
        BinOp::Lt => Value::from(l.compare(r) == Less),
        BinOp::Le => Value::from(l.compare(r) != Greater),
        BinOp::Gt => Value::from(l.compare(r) == Greater),
        BinOp::Ge => Value::from(l.compare(r) != Less),
        // The pattern is on the right: `name =~ "a*"`.
        BinOp::GlobMatch => Value::from(glob_match(&r.to_string(), &l.to_string())),
        BinOp::NotGlobMatch => Value::from(!glob_match(&r.to_string(), &l.to_string())),
        BinOp::RegexMatch => Value::from(regex_match(&r.to_string(), &l.to_string())?),
        BinOp::NotRegexMatch => Value::from(!regex_match(&r.to_string(), &l.to_string())?),
    };
    Ok(value)
}

/// Functions available inside conditions.
fn call_fn(name: &str, args: &[Value], vars: &dyn VarLookup) -> Result<Value, String> {
    let arg = |i: usize| args.get(i).map(Value::to_string).unwrap_or_default();
    match name {
        "defined" | "isset" => Ok(Value::from(vars.is_set(&arg(0)))),
        "strlen" => Ok(Value::Int(arg(0).chars().count() as i64)),
        "tolower" => Ok(Value::Str(arg(0).to_lowercase())),
        "toupper" => Ok(Value::Str(arg(0).to_uppercase())),
        "trim" => Ok(Value::Str(arg(0).trim().to_owned())),
        _ => Err(format!("unknown function: {name}()")),
    }
}

// ── Matching ──────────────────────────────────────────────────────────────────

/// `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` seen and the text index it is retried from.
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    star = Some((sp, st + 1));
                    pi = sp + 1;
                    ti = st + 1;
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

fn regex_match(pattern: &str, text: &str) -> Result<bool, String> {
    let re = Regex::new(pattern).map_err(|e| format!("bad regex '{pattern}': {e}"))?;
    Ok(re.is_match(text))
}

/// Convenience: parse and evaluate an expression string.
pub fn eval_str(src: &str, vars: &dyn VarLookup) -> Result<Value, String> {
    let expr = parse_expr(src)?;
    eval_expr(&expr, vars)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestVars(HashMap<String, String>);

    impl TestVars {
        fn new() -> Self {
            TestVars(HashMap::new())
        }
        fn with(mut self, k: &str, v: &str) -> Self {
            self.0.insert(k.into(), v.into());
            self
        }
    }

    impl VarLookup for TestVars {
        fn get_var(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    fn eval(src: &str) -> Value {
        eval_str(src, &TestVars::new()).expect("eval failed")
    }

    fn eval_with(src: &str, vars: &TestVars) -> Value {
        eval_str(src, vars).expect("eval failed")
    }

    #[test]
    fn literals() {
        assert_eq!(eval("7"), Value::Int(7));
        assert_eq!(eval("2.5"), Value::Float(2.5));
        assert_eq!(eval("'hi'"), Value::from("hi"));
        assert_eq!(eval("\"a\\\"b\""), Value::from("a\"b"));
        assert_eq!(eval("0xff"), Value::Int(255));
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval("10 - 4 - 3"), Value::Int(3));
        assert_eq!(eval("20 / 5 / 2"), Value::Int(2));
        assert_eq!(eval("7 % 4"), Value::Int(3));
        assert_eq!(eval("- -4"), Value::Int(4));
        assert_eq!(eval("-(1 + 1) * 3"), Value::Int(-6));
        assert_eq!(eval("1 + 1 == 2 && 3 > 2"), Value::Int(1));
    }

    #[test]
    fn comparison() {
        assert_eq!(eval("2==2"), Value::Int(1));
        assert_eq!(eval("2 = 3"), Value::Int(0));
        assert_eq!(eval("5 != 6"), Value::Int(1));
        assert_eq!(eval("4 <= 4"), Value::Int(1));
        assert_eq!(eval("4 < 4"), Value::Int(0));
        assert_eq!(eval("\"b\" > \"a\""), Value::Int(1));
    }

    #[test]
    fn logical_and_ternary() {
        assert_eq!(eval("1 && \"\""), Value::Int(0));
        assert_eq!(eval("\"\" || 5"), Value::Int(1));
        assert_eq!(eval("!\"0\""), Value::Int(1));
        assert_eq!(eval("0 ? 1 : 2"), Value::Int(2));
        assert_eq!(eval("0 ? 1 : 0 ? 2 : 3"), Value::Int(3));
    }

    #[test]
    fn short_circuit_skips_bad_rhs() {
        assert_eq!(eval("0 && 1/0"), Value::Int(0));
        assert_eq!(eval("1 || 1/0"), Value::Int(1));
    }

    #[test]
    fn variables_and_dotted_names() {
        let vars = TestVars::new().with("count", "3").with("row.name", "Bob");
        assert_eq!(eval_with("count > 2", &vars), Value::Int(1));
        assert_eq!(eval_with("row.name == \"Bob\"", &vars), Value::Int(1));
        assert_eq!(eval_with("missing", &vars), Value::Str(String::new()));
    }

    #[test]
    fn functions() {
        let vars = TestVars::new().with("x", "Hello");
        assert_eq!(eval_with("defined(\"x\")", &vars), Value::Int(1));
        assert_eq!(eval_with("defined(\"y\")", &vars), Value::Int(0));
        assert_eq!(eval_with("strlen(x)", &vars), Value::Int(5));
        assert_eq!(eval_with("toupper(x) == \"HELLO\"", &vars), Value::Int(1));
        assert!(eval_str("nope()", &vars).is_err());
    }

    #[test]
    fn matching() {
        assert_eq!(eval("\"hello\" =~ \"h*o\""), Value::Int(1));
        assert_eq!(eval("\"hello\" =~ \"h?llo\""), Value::Int(1));
        assert_eq!(eval("\"hello\" =~ \"*l\""), Value::Int(0));
        assert_eq!(eval("\"\" =~ \"**\""), Value::Int(1));
        assert_eq!(eval("\"hello\" !~ \"x*\""), Value::Int(1));
        assert_eq!(eval("\"hello\" =/ \"^hel.o$\""), Value::Int(1));
        assert_eq!(eval("\"hello\" !/ \"ell\""), Value::Int(0));
        assert!(eval_str("\"x\" =/ \"(\"", &TestVars::new()).is_err());
    }

    #[test]
    fn trailing_garbage_is_error() {
        assert!(parse_expr("1 2").is_err());
        assert!(parse_expr("1 @").is_err());
        assert!(parse_expr("(1").is_err());
        assert!(parse_expr("f(1 2)").is_err());
        assert!(parse_expr("1 ? 2").is_err());
    }

    #[test]
    fn evaluator_truthiness() {
        let mut ev = ExprEvaluator;
        let vars = TestVars::new().with("flag", "0");
        assert!(!ev.eval_condition("flag", &vars).unwrap());
        assert!(ev.eval_condition("\"yes\"", &vars).unwrap());
    }
}
