//! Built-in math functions for `expr`.
//!
//! Each function receives its already-evaluated arguments.  The dispatcher
//! is called from the interpreter's `call_function` after it has checked for
//! a script-defined `::tcl::mathfunc::<name>` override.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::ExprError;
use super::value::Value;

/// Generator behind `rand()` / `srand()`.
pub type MathRng = StdRng;

/// Names of every built-in function, sorted.
pub const FUNCTION_NAMES: &[&str] = &[
    "abs", "acos", "asin", "atan", "atan2", "bool", "ceil", "cos", "cosh", "double", "entier",
    "exp", "floor", "fmod", "hypot", "int", "isqrt", "log", "log10", "max", "min", "pow", "rand",
    "round", "sin", "sinh", "sqrt", "srand", "tan", "tanh", "wide",
];

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not a built-in.
pub fn call_builtin(
    name: &str,
    args: &[Value],
    rng: &mut MathRng,
) -> Option<Result<Value, ExprError>> {
    // Ok(None) means "not a builtin"; `.transpose()` turns that into None.
    fn inner(name: &str, args: &[Value], rng: &mut MathRng) -> Result<Option<Value>, ExprError> {
        Ok(Some(match name {
            // ── Float functions ──────────────────────────────────────────────
            "acos" => unary_float(name, args, f64::acos)?,
            "asin" => unary_float(name, args, f64::asin)?,
            "atan" => unary_float(name, args, f64::atan)?,
            "cos" => unary_float(name, args, f64::cos)?,
            "cosh" => unary_float(name, args, f64::cosh)?,
            "exp" => unary_float(name, args, f64::exp)?,
            "log" => unary_float(name, args, f64::ln)?,
            "log10" => unary_float(name, args, f64::log10)?,
            "sin" => unary_float(name, args, f64::sin)?,
            "sinh" => unary_float(name, args, f64::sinh)?,
            "sqrt" => unary_float(name, args, f64::sqrt)?,
            "tan" => unary_float(name, args, f64::tan)?,
            "tanh" => unary_float(name, args, f64::tanh)?,
            "ceil" => unary_float(name, args, f64::ceil)?,
            "floor" => unary_float(name, args, f64::floor)?,
            "double" => unary_float(name, args, |x| x)?,
            "atan2" => binary_float(name, args, f64::atan2)?,
            "hypot" => binary_float(name, args, f64::hypot)?,
            "pow" => binary_float(name, args, f64::powf)?,
            "fmod" => {
                arity(name, args, 2)?;
                let y = float_arg(name, &args[1])?;
                if y == 0.0 {
                    return Err(ExprError::Domain("argument not in valid range".into()));
                }
                Value::Float(float_arg(name, &args[0])? % y)
            }

            // ── Integer functions ────────────────────────────────────────────
            "abs" => {
                arity(name, args, 1)?;
                match number_arg(name, &args[0])? {
                    Value::Int(n) => Value::Int(n.checked_abs().ok_or(ExprError::Overflow)?),
                    other => Value::Float(other.as_float().unwrap_or(0.0).abs()),
                }
            }
            "int" | "wide" | "entier" => {
                arity(name, args, 1)?;
                Value::Int(to_int(number_arg(name, &args[0])?, f64::trunc)?)
            }
            "round" => {
                arity(name, args, 1)?;
                Value::Int(to_int(number_arg(name, &args[0])?, f64::round)?)
            }
            "isqrt" => {
                arity(name, args, 1)?;
                let n = to_int(number_arg(name, &args[0])?, f64::trunc)?;
                if n < 0 {
                    return Err(ExprError::Domain("square root of negative argument".into()));
                }
                Value::Int(isqrt(n))
            }
            "bool" => {
                arity(name, args, 1)?;
                let b = args[0]
                    .as_bool()
                    .ok_or_else(|| ExprError::NotBoolean(args[0].as_str().into_owned()))?;
                Value::from(b)
            }

            // ── Variadic ─────────────────────────────────────────────────────
            "max" | "min" => {
                if args.is_empty() {
                    return Err(too_few(name));
                }
                let want = if name == "max" {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Less
                };
                let mut best = number_arg(name, &args[0])?;
                for a in &args[1..] {
                    let v = number_arg(name, a)?;
                    if v.cmp_value(&best) == want {
                        best = v;
                    }
                }
                best
            }

            // ── Random numbers ───────────────────────────────────────────────
            "rand" => {
                arity(name, args, 0)?;
                Value::Float(rng.gen::<f64>())
            }
            "srand" => {
                arity(name, args, 1)?;
                let seed = to_int(number_arg(name, &args[0])?, f64::trunc)?;
                *rng = MathRng::seed_from_u64(seed as u64);
                Value::Float(rng.gen::<f64>())
            }

            _ => return Ok(None),
        }))
    }
    inner(name, args, rng).transpose()
}

pub fn is_builtin(name: &str) -> bool {
    FUNCTION_NAMES.binary_search(&name).is_ok()
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn too_few(name: &str) -> ExprError {
    ExprError::WrongArgs(format!("too few arguments for math function \"{name}\""))
}

fn arity(name: &str, args: &[Value], n: usize) -> Result<(), ExprError> {
    match args.len().cmp(&n) {
        std::cmp::Ordering::Less => Err(too_few(name)),
        std::cmp::Ordering::Greater => Err(ExprError::WrongArgs(format!(
            "too many arguments for math function \"{name}\""
        ))),
        std::cmp::Ordering::Equal => Ok(()),
    }
}

fn number_arg(name: &str, v: &Value) -> Result<Value, ExprError> {
    v.numeric_operand(name)
}

fn float_arg(name: &str, v: &Value) -> Result<f64, ExprError> {
    Ok(number_arg(name, v)?.as_float().unwrap_or(0.0))
}

/// A NaN result means the argument was outside the function's domain.
fn checked(x: f64) -> Result<Value, ExprError> {
    if x.is_nan() {
        Err(ExprError::Domain("argument not in valid range".into()))
    } else {
        Ok(Value::Float(x))
    }
}

fn unary_float(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, ExprError> {
    arity(name, args, 1)?;
    let x = float_arg(name, &args[0])?;
    if x.is_nan() {
        return Ok(Value::Float(x));
    }
    checked(f(x))
}

fn binary_float(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, ExprError> {
    arity(name, args, 2)?;
    checked(f(float_arg(name, &args[0])?, float_arg(name, &args[1])?))
}

fn to_int(v: Value, conv: fn(f64) -> f64) -> Result<i64, ExprError> {
    match v {
        Value::Int(n) => Ok(n),
        other => {
            let x = conv(other.as_float().unwrap_or(0.0));
            if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
                return Err(ExprError::Overflow);
            }
            Ok(x as i64)
        }
    }
}

fn isqrt(n: i64) -> i64 {
    let mut r = (n as f64).sqrt() as i64;
    while r > 0 && r.checked_mul(r).map_or(true, |sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
        r += 1;
    }
    r
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, ExprError> {
        let mut rng = MathRng::seed_from_u64(1);
        call_builtin(name, args, &mut rng).expect("not a builtin")
    }

    #[test]
    fn names_are_sorted() {
        let mut sorted = FUNCTION_NAMES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, FUNCTION_NAMES);
        assert!(is_builtin("hypot"));
        assert!(!is_builtin("strlen"));
    }

    #[test]
    fn unknown_name_is_none() {
        let mut rng = MathRng::seed_from_u64(1);
        assert!(call_builtin("nope", &[], &mut rng).is_none());
    }

    #[test]
    fn abs_keeps_type() {
        assert_eq!(call("abs", &[Value::Int(-3)]), Ok(Value::Int(3)));
        assert_eq!(call("abs", &[Value::Float(-2.5)]), Ok(Value::Float(2.5)));
        assert_eq!(call("abs", &[Value::Int(i64::MIN)]), Err(ExprError::Overflow));
    }

    #[test]
    fn int_conversions() {
        assert_eq!(call("int", &[Value::Float(3.7)]), Ok(Value::Int(3)));
        assert_eq!(call("int", &[Value::Float(-3.7)]), Ok(Value::Int(-3)));
        assert_eq!(call("round", &[Value::Float(2.5)]), Ok(Value::Int(3)));
        assert_eq!(call("round", &[Value::Float(-2.5)]), Ok(Value::Int(-3)));
        assert_eq!(call("double", &[Value::Int(2)]), Ok(Value::Float(2.0)));
        assert_eq!(call("int", &[Value::Float(1e300)]), Err(ExprError::Overflow));
    }

    #[test]
    fn isqrt_exact() {
        assert_eq!(call("isqrt", &[Value::Int(26)]), Ok(Value::Int(5)));
        assert_eq!(call("isqrt", &[Value::Int(i64::MAX)]), Ok(Value::Int(3037000499)));
        assert!(matches!(call("isqrt", &[Value::Int(-1)]), Err(ExprError::Domain(_))));
    }

    #[test]
    fn domain_errors() {
        assert!(matches!(call("sqrt", &[Value::Int(-1)]), Err(ExprError::Domain(_))));
        assert!(matches!(call("fmod", &[Value::Int(1), Value::Int(0)]), Err(ExprError::Domain(_))));
    }

    #[test]
    fn max_min() {
        let args = [Value::Int(3), Value::Float(7.5), Value::from("2")];
        assert_eq!(call("max", &args), Ok(Value::Float(7.5)));
        assert_eq!(call("min", &args), Ok(Value::Int(2)));
        assert!(matches!(call("max", &[]), Err(ExprError::WrongArgs(_))));
    }

    #[test]
    fn arity_is_checked() {
        assert!(matches!(call("sin", &[]), Err(ExprError::WrongArgs(_))));
        assert!(matches!(
            call("pow", &[Value::Int(1), Value::Int(2), Value::Int(3)]),
            Err(ExprError::WrongArgs(_))
        ));
    }

    #[test]
    fn non_numeric_argument() {
        assert!(matches!(call("sin", &[Value::from("abc")]), Err(ExprError::TypeMismatch { .. })));
    }

    #[test]
    fn srand_is_deterministic() {
        let mut a = MathRng::seed_from_u64(9);
        let mut b = MathRng::seed_from_u64(10);
        let x = call_builtin("srand", &[Value::Int(42)], &mut a).unwrap().unwrap();
        let y = call_builtin("srand", &[Value::Int(42)], &mut b).unwrap().unwrap();
        assert_eq!(x, y);
        let r = call_builtin("rand", &[], &mut a).unwrap().unwrap();
        let f = r.as_float().unwrap();
        assert!((0.0..1.0).contains(&f));
    }
}
