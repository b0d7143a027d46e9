//! Runtime value type for the command language.
//!
//! Every value is a string at heart, but integers and doubles produced by
//! `expr`, `incr` and friends keep their numeric form until something asks
//! for the text.  Conversions follow the usual Tcl rules: numeric strings
//! compare and compute as numbers, everything else is plain text.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use super::error::ExprError;

/// A script runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
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
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Render a double the way scripts expect to read it back: integral values
/// keep a trailing `.0`, very large or very small magnitudes use an exponent
/// with an explicit sign and at least two digits.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Inf" } else { "-Inf" }.to_owned();
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e17).contains(&abs) {
        let s = format!("{x:e}");
        let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(d) => ("-", d),
            None => ("+", exp),
        };
        format!("{mantissa}e{sign}{digits:0>2}")
    } else if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Parse an integer literal: optional sign, then decimal or a `0x`/`0o`/`0b`
/// radix prefix.  Surrounding whitespace is allowed.
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let (neg, body) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    let lower = body.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match lower.as_deref() {
        Some("0x") => (16, &body[2..]),
        Some("0o") => (8, &body[2..]),
        Some("0b") => (2, &body[2..]),
        _ => (10, body),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if neg {
        if magnitude == i64::MIN.unsigned_abs() {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|n| -n)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Parse a floating-point literal (`1.5`, `.5`, `2e10`, `Inf`, `NaN`).
pub fn parse_float(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    // Rust accepts "infinity"/"inf"/"nan" in any case, which matches what
    // scripts may write; reject forms Rust allows that scripts never produce.
    if t.contains('_') {
        return None;
    }
    t.parse::<f64>().ok()
}

impl Value {
    /// Borrow the string form (formats numeric variants).
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Consume the value, returning its string form.
    pub fn into_string(self) -> String {
        match self {
            Value::Str(s) => s,
            other => other.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    /// Numeric interpretation, if the value is (or parses as) a number.
    pub fn as_number(&self) -> Option<Value> {
        match self {
            Value::Int(_) | Value::Float(_) => Some(self.clone()),
            Value::Str(s) => {
                if let Some(n) = parse_int(s) {
                    Some(Value::Int(n))
                } else {
                    parse_float(s).map(Value::Float)
                }
            }
        }
    }

    /// Integer interpretation.  Doubles with no fractional part are accepted.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
            Value::Float(_) => None,
            Value::Str(s) => parse_int(s),
        }
    }

    /// Double interpretation.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Str(s) => parse_int(s).map(|n| n as f64).or_else(|| parse_float(s)),
        }
    }

    /// Boolean interpretation: numbers are true when non-zero; the words
    /// `true/false`, `yes/no` and `on/off` are accepted in any case.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Int(n) => Some(*n != 0),
            Value::Float(x) => Some(*x != 0.0),
            Value::Str(s) => {
                if let Some(n) = self.as_number() {
                    return n.as_bool();
                }
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" => Some(true),
                    "false" | "no" | "off" => Some(false),
                    _ => None,
                }
            }
        }
    }

    /// Name of the type, as reported by `string is` diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    /// Numeric operand for `op`, or a type-mismatch error.
    pub fn numeric_operand(&self, op: &str) -> Result<Value, ExprError> {
        self.as_number().ok_or_else(|| ExprError::TypeMismatch {
            op: op.to_owned(),
            expected: "non-numeric string",
        })
    }

    /// Integer operand for bitwise and modulo operators.
    pub fn int_operand(&self, op: &str) -> Result<i64, ExprError> {
        match self.numeric_operand(op)? {
            Value::Int(n) => Ok(n),
            _ => Err(ExprError::TypeMismatch {
                op: op.to_owned(),
                expected: "floating-point value",
            }),
        }
    }

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, ExprError> {
        arith(self, rhs, "+", i64::checked_add, |a, b| a + b)
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, ExprError> {
        arith(self, rhs, "-", i64::checked_sub, |a, b| a - b)
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, ExprError> {
        arith(self, rhs, "*", i64::checked_mul, |a, b| a * b)
    }

    /// Division.  Integer division floors toward negative infinity.
    pub fn arith_div(&self, rhs: &Value) -> Result<Value, ExprError> {
        let a = self.numeric_operand("/")?;
        let b = rhs.numeric_operand("/")?;
        match (a, b) {
            (Value::Int(_), Value::Int(0)) => Err(ExprError::DivideByZero),
            (Value::Int(x), Value::Int(y)) => {
                let q = x.checked_div(y).ok_or(ExprError::Overflow)?;
                if (x % y != 0) && ((x < 0) != (y < 0)) {
                    Ok(Value::Int(q - 1))
                } else {
                    Ok(Value::Int(q))
                }
            }
            (a, b) => {
                let (x, y) = (float_of(&a), float_of(&b));
                if y == 0.0 {
                    return Err(ExprError::DivideByZero);
                }
                Ok(Value::Float(x / y))
            }
        }
    }

    /// Remainder.  The result takes the sign of the divisor.
    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, ExprError> {
        let x = self.int_operand("%")?;
        let y = rhs.int_operand("%")?;
        if y == 0 {
            return Err(ExprError::DivideByZero);
        }
        let r = x.checked_rem(y).ok_or(ExprError::Overflow)?;
        if r != 0 && ((r < 0) != (y < 0)) {
            Ok(Value::Int(r + y))
        } else {
            Ok(Value::Int(r))
        }
    }

    pub fn arith_pow(&self, rhs: &Value) -> Result<Value, ExprError> {
        let a = self.numeric_operand("**")?;
        let b = rhs.numeric_operand("**")?;
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                if y < 0 {
                    return match x {
                        0 => Err(ExprError::Domain("exponentiation of zero by negative power".into())),
                        1 => Ok(Value::Int(1)),
                        -1 => Ok(Value::Int(if y % 2 == 0 { 1 } else { -1 })),
                        _ => Ok(Value::Int(0)),
                    };
                }
                let exp = u32::try_from(y).map_err(|_| ExprError::Overflow)?;
                x.checked_pow(exp).map(Value::Int).ok_or(ExprError::Overflow)
            }
            (a, b) => Ok(Value::Float(float_of(&a).powf(float_of(&b)))),
        }
    }

    pub fn arith_neg(&self) -> Result<Value, ExprError> {
        match self.numeric_operand("-")? {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
            other => Ok(Value::Float(-float_of(&other))),
        }
    }

    /// Relational comparison: numeric when both sides are numbers, string
    /// otherwise.
    pub fn cmp_value(&self, rhs: &Value) -> Ordering {
        match (self.as_number(), rhs.as_number()) {
            (Some(Value::Int(a)), Some(Value::Int(b))) => a.cmp(&b),
            (Some(a), Some(b)) => float_of(&a)
                .partial_cmp(&float_of(&b))
                .unwrap_or(Ordering::Equal),
            _ => self.as_str().cmp(&rhs.as_str()),
        }
    }
}

fn float_of(v: &Value) -> f64 {
    v.as_float().unwrap_or(0.0)
}

fn arith(
    lhs: &Value,
    rhs: &Value,
    op: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    let a = lhs.numeric_operand(op)?;
    let b = rhs.numeric_operand(op)?;
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y).map(Value::Int).ok_or(ExprError::Overflow),
        _ => Ok(Value::Float(float_op(float_of(&a), float_of(&b)))),
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
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
        Value::Int(if b { 1 } else { 0 })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_int() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Int(-7).to_string(), "-7");
    }

    #[test]
    fn display_float() {
        assert_eq!(Value::Float(3.14).to_string(), "3.14");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(1e20).to_string(), "1e+20");
        assert_eq!(Value::Float(1.5e-7).to_string(), "1.5e-07");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "Inf");
    }

    #[test]
    fn parse_int_forms() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" -7 "), Some(-7));
        assert_eq!(parse_int("+3"), Some(3));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int("9223372036854775808"), None);
        assert_eq!(parse_int("1.5"), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("0x"), None);
    }

    #[test]
    fn as_bool() {
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
        assert_eq!(Value::from("yes").as_bool(), Some(true));
        assert_eq!(Value::from("OFF").as_bool(), Some(false));
        assert_eq!(Value::from("0.0").as_bool(), Some(false));
        assert_eq!(Value::from("hello").as_bool(), None);
    }

    #[test]
    fn as_number_coercions() {
        assert_eq!(Value::from("42").as_number(), Some(Value::Int(42)));
        assert_eq!(Value::from("2.5").as_number(), Some(Value::Float(2.5)));
        assert_eq!(Value::from("abc").as_number(), None);
        assert_eq!(Value::Float(3.0).as_int(), Some(3));
        assert_eq!(Value::Float(3.5).as_int(), None);
    }

    #[test]
    fn arithmetic() {
        let a = Value::Int(10);
        let b = Value::Int(3);
        assert_eq!(a.arith_add(&b), Ok(Value::Int(13)));
        assert_eq!(a.arith_sub(&b), Ok(Value::Int(7)));
        assert_eq!(a.arith_mul(&b), Ok(Value::Int(30)));
        assert_eq!(a.arith_div(&b), Ok(Value::Int(3)));
        assert_eq!(a.arith_rem(&b), Ok(Value::Int(1)));
        assert_eq!(a.arith_pow(&b), Ok(Value::Int(1000)));
    }

    #[test]
    fn floor_division_and_remainder_sign() {
        assert_eq!(Value::Int(-7).arith_div(&Value::Int(2)), Ok(Value::Int(-4)));
        assert_eq!(Value::Int(-7).arith_rem(&Value::Int(2)), Ok(Value::Int(1)));
        assert_eq!(Value::Int(7).arith_rem(&Value::Int(-2)), Ok(Value::Int(-1)));
    }

    #[test]
    fn div_by_zero() {
        assert_eq!(Value::Int(1).arith_div(&Value::Int(0)), Err(ExprError::DivideByZero));
        assert_eq!(Value::Float(1.0).arith_div(&Value::Int(0)), Err(ExprError::DivideByZero));
        assert_eq!(Value::Int(1).arith_rem(&Value::Int(0)), Err(ExprError::DivideByZero));
    }

    #[test]
    fn overflow_is_reported() {
        let max = Value::Int(i64::MAX);
        assert_eq!(max.arith_add(&Value::Int(1)), Err(ExprError::Overflow));
        assert_eq!(Value::Int(i64::MIN).arith_neg(), Err(ExprError::Overflow));
    }

    #[test]
    fn type_mismatch_on_non_numeric() {
        let err = Value::from("abc").arith_add(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch { .. }));
        let err = Value::Float(1.5).arith_rem(&Value::Int(2)).unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch { expected: "floating-point value", .. }));
    }

    #[test]
    fn float_promotion() {
        let a = Value::Int(7);
        let b = Value::Float(2.0);
        assert_eq!(a.arith_add(&b), Ok(Value::Float(9.0)));
    }

    #[test]
    fn compare_numeric_vs_lexical() {
        assert_eq!(Value::from("10").cmp_value(&Value::from("9")), Ordering::Greater);
        assert_eq!(Value::from("10").cmp_value(&Value::from("9x")), Ordering::Less);
        assert_eq!(Value::from("1.0").cmp_value(&Value::Int(1)), Ordering::Equal);
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Int(42));
        let v: Value = "hi".into();
        assert_eq!(v, Value::Str("hi".into()));
        let v: Value = true.into();
        assert_eq!(v, Value::Int(1));
    }
}
