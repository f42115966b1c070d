//! Runtime value for condition expressions.
//!
//! Template variables are strings; the evaluator coerces to integers and
//! floats when an operator needs numbers.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

/// A value read as a number.
#[derive(Debug, Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

impl Num {
    fn float(self) -> f64 {
        match self {
            Num::I(n) => n as f64,
            Num::F(x) => x,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            // Whole floats keep a trailing `.0` so they still read as floats.
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Value {
    /// `0`, `""`, and `"0"` are falsy.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
        }
    }

    /// Numeric reading; `None` for text that is not a number.
    fn number(&self) -> Option<Num> {
        match self {
            Value::Int(n) => Some(Num::I(*n)),
            Value::Float(x) => Some(Num::F(*x)),
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Num::I)
                    .or_else(|_| s.parse::<f64>().map(Num::F))
                    .ok()
            }
        }
    }

    /// Apply a binary numeric operator.  Non-numbers count as `0`; the
    /// result is an integer unless either side is a float.
    fn numeric(
        &self,
        rhs: &Value,
        int_op: fn(i64, i64) -> i64,
        float_op: fn(f64, f64) -> f64,
    ) -> Value {
        let a = self.number().unwrap_or(Num::I(0));
        let b = rhs.number().unwrap_or(Num::I(0));
        match (a, b) {
            (Num::I(x), Num::I(y)) => Value::Int(int_op(x, y)),
            _ => Value::Float(float_op(a.float(), b.float())),
        }
    }

    fn is_zero(&self) -> bool {
        self.number().map_or(true, |n| n.float() == 0.0)
    }

    /// Numeric addition, or concatenation when either side is text.
    pub fn add(&self, rhs: &Value) -> Value {
        if self.number().is_none() || rhs.number().is_none() {
            return Value::Str(format!("{self}{rhs}"));
        }
        self.numeric(rhs, i64::wrapping_add, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Value) -> Value {
        self.numeric(rhs, i64::wrapping_sub, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Value) -> Value {
        self.numeric(rhs, i64::wrapping_mul, |a, b| a * b)
    }

    pub fn div(&self, rhs: &Value) -> Result<Value, String> {
        if rhs.is_zero() {
            return Err("division by zero".into());
        }
        Ok(self.numeric(rhs, i64::wrapping_div, |a, b| a / b))
    }

    pub fn rem(&self, rhs: &Value) -> Result<Value, String> {
        if rhs.is_zero() {
            return Err("modulo by zero".into());
        }
        Ok(self.numeric(rhs, i64::wrapping_rem, |a, b| a % b))
    }

    pub fn neg(&self) -> Value {
        match self.number() {
            Some(Num::I(n)) => Value::Int(n.wrapping_neg()),
            Some(Num::F(x)) => Value::Float(-x),
            None => Value::Int(0),
        }
    }

    /// Numeric order when both sides are numbers, string order otherwise.
    pub fn compare(&self, rhs: &Value) -> Ordering {
        match (self.number(), rhs.number()) {
            (Some(Num::I(a)), Some(Num::I(b))) => a.cmp(&b),
            (Some(a), Some(b)) => a.float().partial_cmp(&b.float()).unwrap_or(Ordering::Equal),
            _ => self.to_string().cmp(&rhs.to_string()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
