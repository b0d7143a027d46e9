//! Error taxonomy.
//!
//! Every failure the engine can produce is a [`TclError`]: a kind, a stable
//! machine-readable code, the human message and the accumulated `errorInfo`
//! trace.  Parse and expression failures have their own enums so the lexer
//! and the expression evaluator can report precise causes without knowing
//! about the interpreter.

use std::fmt;

use thiserror::Error;

/// Broad category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unterminated quote/brace/bracket, malformed substitution.
    Parse,
    /// Unset variable, bad array access.
    Substitution,
    /// Type mismatch, divide-by-zero, malformed literal, unknown function.
    Expression,
    /// Unknown command or namespace.
    Resolution,
    /// Dangling alias, recursion limit.
    Frame,
    /// Cooperative cancellation.
    Interrupted,
    /// Wrong number or form of arguments to a command.
    Arguments,
    /// Raised by a script (`error`, `return -code error`).
    Script,
}

impl ErrorKind {
    /// Upper-case tag used as the first element of `errorCode`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Parse => "PARSE",
            ErrorKind::Substitution => "SUBSTITUTION",
            ErrorKind::Expression => "EXPRESSION",
            ErrorKind::Resolution => "RESOLUTION",
            ErrorKind::Frame => "FRAME",
            ErrorKind::Interrupted => "INTERRUPTED",
            ErrorKind::Arguments => "ARGUMENTS",
            ErrorKind::Script => "SCRIPT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ParseError ────────────────────────────────────────────────────────────────

/// A syntax error found while splitting a script into words.
///
/// `offset` is the byte position where the unterminated construct began.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing close-brace")]
    MissingBrace { offset: usize },
    #[error("missing \"")]
    MissingQuote { offset: usize },
    #[error("missing close-bracket")]
    MissingBracket { offset: usize },
    #[error("missing )")]
    MissingParen { offset: usize },
    #[error("missing close-brace for variable name")]
    MissingVarBrace { offset: usize },
    #[error("extra characters after close-brace")]
    ExtraAfterBrace { offset: usize },
    #[error("extra characters after close-quote")]
    ExtraAfterQuote { offset: usize },
    #[error("command substitutions nested too deeply")]
    TooDeep { offset: usize },
}

impl ParseError {
    pub fn offset(&self) -> usize {
        match self {
            ParseError::MissingBrace { offset }
            | ParseError::MissingQuote { offset }
            | ParseError::MissingBracket { offset }
            | ParseError::MissingParen { offset }
            | ParseError::MissingVarBrace { offset }
            | ParseError::ExtraAfterBrace { offset }
            | ParseError::ExtraAfterQuote { offset }
            | ParseError::TooDeep { offset } => *offset,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ParseError::MissingBrace { .. } => "unterminated-brace",
            ParseError::MissingQuote { .. } => "unterminated-quote",
            ParseError::MissingBracket { .. } => "unterminated-bracket",
            ParseError::MissingParen { .. } => "unterminated-index",
            ParseError::MissingVarBrace { .. } => "unterminated-variable",
            ParseError::ExtraAfterBrace { .. } | ParseError::ExtraAfterQuote { .. } => {
                "extra-characters"
            }
            ParseError::TooDeep { .. } => "nesting-too-deep",
        }
    }

    /// `true` when more input could complete the script (used by
    /// `info complete` and the interactive shell).
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ParseError::MissingBrace { .. }
                | ParseError::MissingQuote { .. }
                | ParseError::MissingBracket { .. }
                | ParseError::MissingVarBrace { .. }
        )
    }

    /// Re-base the offset onto an enclosing script.
    pub fn shifted(self, base: usize) -> Self {
        match self {
            ParseError::MissingBrace { offset } => ParseError::MissingBrace { offset: offset + base },
            ParseError::MissingQuote { offset } => ParseError::MissingQuote { offset: offset + base },
            ParseError::MissingBracket { offset } => {
                ParseError::MissingBracket { offset: offset + base }
            }
            ParseError::MissingParen { offset } => ParseError::MissingParen { offset: offset + base },
            ParseError::MissingVarBrace { offset } => {
                ParseError::MissingVarBrace { offset: offset + base }
            }
            ParseError::ExtraAfterBrace { offset } => {
                ParseError::ExtraAfterBrace { offset: offset + base }
            }
            ParseError::ExtraAfterQuote { offset } => {
                ParseError::ExtraAfterQuote { offset: offset + base }
            }
            ParseError::TooDeep { offset } => ParseError::TooDeep { offset: offset + base },
        }
    }
}

// ── ExprError ─────────────────────────────────────────────────────────────────

/// A failure inside the expression sub-language.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("divide by zero")]
    DivideByZero,
    #[error("integer value too large to represent")]
    Overflow,
    #[error("malformed numeric literal \"{0}\"")]
    MalformedLiteral(String),
    #[error("can't use {expected} as operand of \"{op}\"")]
    TypeMismatch { op: String, expected: &'static str },
    #[error("expected boolean value but got \"{0}\"")]
    NotBoolean(String),
    #[error("unknown math function \"{0}\"")]
    UnknownFunction(String),
    #[error("{0}")]
    Syntax(String),
    #[error("domain error: {0}")]
    Domain(String),
    #[error("{0}")]
    WrongArgs(String),
}

impl ExprError {
    pub fn code(&self) -> &'static str {
        match self {
            ExprError::DivideByZero => "divide-by-zero",
            ExprError::Overflow => "overflow",
            ExprError::MalformedLiteral(_) => "malformed-literal",
            ExprError::TypeMismatch { .. } | ExprError::NotBoolean(_) => "type-mismatch",
            ExprError::UnknownFunction(_) => "unknown-function",
            ExprError::Syntax(_) => "syntax",
            ExprError::Domain(_) => "domain",
            ExprError::WrongArgs(_) => "wrong-args",
        }
    }
}

// ── TclError ──────────────────────────────────────────────────────────────────

/// Longest command text quoted verbatim in `errorInfo`.
const MAX_INFO_COMMAND: usize = 150;

/// An error travelling up the call chain.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct TclError {
    pub kind: ErrorKind,
    /// Stable machine-readable code, e.g. `"divide-by-zero"`.
    pub code: &'static str,
    pub message: String,
    /// Accumulated stack trace, starting with the message.
    pub error_info: String,
    /// Script-visible `errorCode` list.
    pub error_code: String,
    /// First word of the command that raised the error, once known.
    pub origin: Option<String>,
    /// Evaluation nesting depth at which the error was raised.
    pub depth: usize,
    /// Whether a "while executing" line has been appended yet.
    in_context: bool,
}

impl TclError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        TclError {
            kind,
            code,
            error_info: message.clone(),
            error_code: format!("{} {}", kind.as_str(), code),
            message,
            origin: None,
            depth: 0,
            in_context: false,
        }
    }

    /// An error raised by script code (`error`, `return -code error`).
    pub fn script(message: impl Into<String>) -> Self {
        let mut e = TclError::new(ErrorKind::Script, "user", message);
        e.error_code = "NONE".to_owned();
        e
    }

    /// `wrong # args: should be "usage"`.
    pub fn wrong_args(usage: &str) -> Self {
        TclError::new(
            ErrorKind::Arguments,
            "wrong-args",
            format!("wrong # args: should be \"{usage}\""),
        )
    }

    /// A bad argument value (non-integer count, unknown option, ...).
    pub fn bad_arg(message: impl Into<String>) -> Self {
        TclError::new(ErrorKind::Arguments, "bad-argument", message)
    }

    pub fn expected_int(got: &str) -> Self {
        TclError::new(
            ErrorKind::Arguments,
            "bad-argument",
            format!("expected integer but got \"{got}\""),
        )
    }

    pub fn unknown_command(name: &str) -> Self {
        TclError::new(
            ErrorKind::Resolution,
            "unknown-command",
            format!("invalid command name \"{name}\""),
        )
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = code.into();
        self
    }

    pub fn with_error_info(mut self, info: impl Into<String>) -> Self {
        self.error_info = info.into();
        self.in_context = true;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Record the command the error passed through, growing `errorInfo`
    /// the way the stack unwinds.
    pub fn add_context(&mut self, command: &str) {
        let shown = truncate_command(command);
        if self.in_context {
            self.error_info.push_str("\n    invoked from within\n\"");
        } else {
            self.error_info.push_str("\n    while executing\n\"");
            self.in_context = true;
        }
        self.error_info.push_str(&shown);
        self.error_info.push('"');
        if self.origin.is_none() {
            self.origin = command.split_whitespace().next().map(str::to_owned);
        }
    }

    /// Append a free-form line such as `(procedure "f" line 2)`.
    pub fn append_info(&mut self, line: &str) {
        self.error_info.push_str("\n    ");
        self.error_info.push_str(line);
    }
}

fn truncate_command(command: &str) -> String {
    let trimmed = command.trim();
    if trimmed.len() <= MAX_INFO_COMMAND {
        return trimmed.to_owned();
    }
    let mut end = MAX_INFO_COMMAND;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

impl From<ParseError> for TclError {
    fn from(e: ParseError) -> Self {
        TclError::new(ErrorKind::Parse, e.code(), e.to_string())
    }
}

impl From<ExprError> for TclError {
    fn from(e: ExprError) -> Self {
        TclError::new(ErrorKind::Expression, e.code(), e.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
