//! Completion codes and non-local control flow.
//!
//! Internally every command returns [`TclResult`]: `Ok(value)` for normal
//! completion and `Err(Exception)` for everything else, so `?` carries
//! errors *and* `return`/`break`/`continue` up through nested evaluation.
//! Loops and procedure bodies are the only places that absorb them; see
//! [`absorb_loop`] and [`absorb_proc`].
//!
//! The host sees the same information as a flat [`Status`].

use std::fmt;
use std::ops::ControlFlow;

use super::error::{ExprError, ParseError, TclError};
use super::value::Value;

pub type TclResult<T = Value> = Result<T, Exception>;

// ── ReturnCode ────────────────────────────────────────────────────────────────

/// The five completion codes, with their conventional numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok = 0,
    Error = 1,
    Return = 2,
    Break = 3,
    Continue = 4,
}

impl ReturnCode {
    /// Parse a `-code` argument: a name or an integer 0-4.
    pub fn parse(s: &str) -> Option<ReturnCode> {
        match s {
            "ok" | "0" => Some(ReturnCode::Ok),
            "error" | "1" => Some(ReturnCode::Error),
            "return" | "2" => Some(ReturnCode::Return),
            "break" | "3" => Some(ReturnCode::Break),
            "continue" | "4" => Some(ReturnCode::Continue),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            ReturnCode::Ok => "ok",
            ReturnCode::Error => "error",
            ReturnCode::Return => "return",
            ReturnCode::Break => "break",
            ReturnCode::Continue => "continue",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Exception ─────────────────────────────────────────────────────────────────

/// A non-Ok completion travelling up the stack.
///
/// `level` counts the boundaries the signal must still cross; it is always
/// at least 1 while the signal is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    Error(Box<TclError>),
    /// `return`, possibly carrying a different completion code for the
    /// caller (`return -code break`).
    Return {
        value: Value,
        level: usize,
        code: ReturnCode,
        error_info: Option<String>,
        error_code: Option<String>,
    },
    Break { level: usize },
    Continue { level: usize },
}

impl Exception {
    pub fn code(&self) -> ReturnCode {
        match self {
            Exception::Error(_) => ReturnCode::Error,
            Exception::Return { .. } => ReturnCode::Return,
            Exception::Break { .. } => ReturnCode::Break,
            Exception::Continue { .. } => ReturnCode::Continue,
        }
    }

    pub fn level(&self) -> usize {
        match self {
            Exception::Error(_) => 0,
            Exception::Return { level, .. }
            | Exception::Break { level }
            | Exception::Continue { level } => *level,
        }
    }

    /// Plain `return value` (level 1, code ok).
    pub fn ret(value: Value) -> Self {
        Exception::Return {
            value,
            level: 1,
            code: ReturnCode::Ok,
            error_info: None,
            error_code: None,
        }
    }

    pub fn as_error(&self) -> Option<&TclError> {
        match self {
            Exception::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_error_mut(&mut self) -> Option<&mut TclError> {
        match self {
            Exception::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The value a `catch` would store in its result variable.
    pub fn result_value(&self) -> Value {
        match self {
            Exception::Error(e) => Value::Str(e.message.clone()),
            Exception::Return { value, .. } => value.clone(),
            Exception::Break { .. } | Exception::Continue { .. } => Value::default(),
        }
    }
}

impl From<TclError> for Exception {
    fn from(e: TclError) -> Self {
        Exception::Error(Box::new(e))
    }
}

impl From<ParseError> for Exception {
    fn from(e: ParseError) -> Self {
        Exception::Error(Box::new(e.into()))
    }
}

impl From<ExprError> for Exception {
    fn from(e: ExprError) -> Self {
        Exception::Error(Box::new(e.into()))
    }
}

// ── Boundary handling ─────────────────────────────────────────────────────────

/// Interpret a loop body's completion.
///
/// `Continue(())` means run the next iteration, `Break(())` means leave the
/// loop normally.  Signals aimed at an outer loop lose one level and keep
/// propagating.
pub fn absorb_loop(result: TclResult) -> Result<ControlFlow<()>, Exception> {
    match result {
        Ok(_) => Ok(ControlFlow::Continue(())),
        Err(Exception::Break { level: 1 }) => Ok(ControlFlow::Break(())),
        Err(Exception::Continue { level: 1 }) => Ok(ControlFlow::Continue(())),
        Err(Exception::Break { level }) => Err(Exception::Break { level: level - 1 }),
        // `continue 2` ends this loop and continues the enclosing one.
        Err(Exception::Continue { level }) => Err(Exception::Continue { level: level - 1 }),
        Err(other) => Err(other),
    }
}

/// Interpret a procedure body's completion at the procedure boundary.
///
/// A level-1 `return` becomes the procedure's own completion; higher levels
/// lose one level.  A `break`/`continue` that escaped every loop is an
/// error here.
pub fn absorb_proc(result: TclResult) -> TclResult {
    match result {
        Ok(v) => Ok(v),
        Err(Exception::Return { level, value, code, error_info, error_code }) => {
            if level > 1 {
                Err(Exception::Return { value, level: level - 1, code, error_info, error_code })
            } else {
                complete_return(value, code, error_info, error_code)
            }
        }
        Err(Exception::Break { .. }) => {
            Err(TclError::script("invoked \"break\" outside of a loop").into())
        }
        Err(Exception::Continue { .. }) => {
            Err(TclError::script("invoked \"continue\" outside of a loop").into())
        }
        Err(e) => Err(e),
    }
}

/// Turn a `return` that has reached its target level into the completion
/// it asked for.
pub fn complete_return(
    value: Value,
    code: ReturnCode,
    error_info: Option<String>,
    error_code: Option<String>,
) -> TclResult {
    match code {
        ReturnCode::Ok => Ok(value),
        ReturnCode::Error => {
            let mut e = TclError::script(value.into_string());
            if let Some(info) = error_info {
                e = e.with_error_info(info);
            }
            if let Some(code) = error_code {
                e = e.with_error_code(code);
            }
            Err(e.into())
        }
        ReturnCode::Return => Err(Exception::ret(value)),
        ReturnCode::Break => Err(Exception::Break { level: 1 }),
        ReturnCode::Continue => Err(Exception::Continue { level: 1 }),
    }
}

// ── Host-facing status ────────────────────────────────────────────────────────

/// The outcome of a top-level evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Ok(Value),
    Error(TclError),
    Return { value: Value, level: usize },
    Break { level: usize },
    Continue { level: usize },
}

impl Status {
    pub fn code(&self) -> ReturnCode {
        match self {
            Status::Ok(_) => ReturnCode::Ok,
            Status::Error(_) => ReturnCode::Error,
            Status::Return { .. } => ReturnCode::Return,
            Status::Break { .. } => ReturnCode::Break,
            Status::Continue { .. } => ReturnCode::Continue,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok(_))
    }

    /// The result value, or the error message.
    pub fn value(&self) -> Value {
        match self {
            Status::Ok(v) | Status::Return { value: v, .. } => v.clone(),
            Status::Error(e) => Value::Str(e.message.clone()),
            Status::Break { .. } | Status::Continue { .. } => Value::default(),
        }
    }

    pub fn error(&self) -> Option<&TclError> {
        match self {
            Status::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TclResult> for Status {
    fn from(r: TclResult) -> Self {
        match r {
            Ok(v) => Status::Ok(v),
            Err(Exception::Error(e)) => Status::Error(*e),
            Err(Exception::Return { value, level, .. }) => Status::Return { value, level },
            Err(Exception::Break { level }) => Status::Break { level },
            Err(Exception::Continue { level }) => Status::Continue { level },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_code_parse() {
        assert_eq!(ReturnCode::parse("break"), Some(ReturnCode::Break));
        assert_eq!(ReturnCode::parse("4"), Some(ReturnCode::Continue));
        assert_eq!(ReturnCode::parse("5"), None);
        assert_eq!(ReturnCode::Error.as_i64(), 1);
    }

    #[test]
    fn loop_absorbs_level_one() {
        assert_eq!(absorb_loop(Ok(Value::default())), Ok(ControlFlow::Continue(())));
        assert_eq!(absorb_loop(Err(Exception::Break { level: 1 })), Ok(ControlFlow::Break(())));
        assert_eq!(
            absorb_loop(Err(Exception::Continue { level: 1 })),
            Ok(ControlFlow::Continue(()))
        );
    }

    #[test]
    fn loop_decrements_higher_levels() {
        assert_eq!(
            absorb_loop(Err(Exception::Break { level: 2 })),
            Err(Exception::Break { level: 1 })
        );
        assert_eq!(
            absorb_loop(Err(Exception::Continue { level: 3 })),
            Err(Exception::Continue { level: 2 })
        );
    }

    #[test]
    fn loop_passes_return_through() {
        let r = absorb_loop(Err(Exception::ret(Value::Int(1))));
        assert_eq!(r, Err(Exception::ret(Value::Int(1))));
    }

    #[test]
    fn proc_absorbs_return() {
        assert_eq!(absorb_proc(Err(Exception::ret(Value::Int(7)))), Ok(Value::Int(7)));
    }

    #[test]
    fn proc_decrements_return_level() {
        let r = absorb_proc(Err(Exception::Return {
            value: Value::Int(1),
            level: 2,
            code: ReturnCode::Ok,
            error_info: None,
            error_code: None,
        }));
        assert_eq!(r.unwrap_err().level(), 1);
    }

    #[test]
    fn stray_break_is_an_error() {
        let err = absorb_proc(Err(Exception::Break { level: 1 })).unwrap_err();
        assert_eq!(
            err.as_error().map(|e| e.message.as_str()),
            Some("invoked \"break\" outside of a loop")
        );
    }

    #[test]
    fn return_code_error_becomes_error() {
        let r = complete_return(
            Value::from("bad"),
            ReturnCode::Error,
            None,
            Some("MY CODE".into()),
        );
        let err = r.unwrap_err();
        let e = err.as_error().unwrap();
        assert_eq!(e.message, "bad");
        assert_eq!(e.error_code, "MY CODE");
    }

    #[test]
    fn status_from_result() {
        assert_eq!(Status::from(Ok(Value::Int(1))), Status::Ok(Value::Int(1)));
        let s = Status::from(Err(Exception::Break { level: 1 }));
        assert_eq!(s.code(), ReturnCode::Break);
    }
}
