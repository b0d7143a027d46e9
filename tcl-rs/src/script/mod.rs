//! The command-language interpreter.
//!
//! A script is a sequence of commands; each command is a list of words
//! after substitution, and the first word names the command.  The pieces:
//!
//! - [`lexer`]: splits text into commands and words
//! - [`subst`]: `$var`, `[script]` and backslash substitution
//! - [`expr`] and [`functions`]: the `expr` language
//! - [`frame`] and [`vars`]: call frames, namespaces and variable slots
//! - [`interp`]: dispatch, procedures and the public evaluation API
//! - [`commands`]: the built-in command set
//!
//! # Quick start
//!
//! ```rust
//! use tcl::script::{Interpreter, Status};
//!
//! let mut interp = Interpreter::new();
//! let status = interp.evaluate("proc sq {x} {expr {$x * $x}}; sq 7");
//! assert!(matches!(status, Status::Ok(v) if v.as_str() == "49"));
//! ```

pub mod commands;
pub mod error;
pub mod expr;
pub mod frame;
pub mod functions;
pub mod interp;
pub mod lexer;
pub mod list;
pub mod status;
pub mod subst;
pub mod value;
pub mod vars;

// Re-exports for convenience.
pub use error::{ErrorKind, ExprError, ParseError, TclError};
pub use frame::{FrameKind, FrameStats, TraceOp};
pub use interp::{Interpreter, InterpreterBuilder, InterruptHandle, NativeCommand};
pub use status::{Exception, ReturnCode, Status, TclResult};
pub use value::Value;
pub use vars::{FrameHandle, VarHandle};

/// Free stack below which a recursive step moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each fresh stack segment.
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// Run `f`, switching to a new stack segment first when the current thread
/// is close to the end of its stack.  Wraps every recursive step (command
/// dispatch, bracket scanning, expression parsing and evaluation) so nesting
/// is bounded by the configured limits rather than by the host thread's
/// stack size.
pub(crate) fn with_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, f)
}
