//! Expression lexer, AST, parser, and evaluator.
//!
//! The expression language is used by `expr`, `if`, `while` and `for`.
//! Operands may be numbers, braced or quoted strings, `$variables`,
//! `[command]` substitutions and function calls.  Substitutions are parsed
//! into the AST and resolved at evaluation time, so `&&`, `||` and `?:`
//! only substitute the branch they actually take.
//!
//! Operator precedence (lowest → highest):
//!   ternary  →  `||`  →  `&&`  →  `|`  →  `^`  →  `&`  →  `in ni`  →
//!   `eq ne`  →  `== !=`  →  relational  →  shift  →  additive  →
//!   multiplicative  →  `**`  →  unary  →  primary

use std::cmp::Ordering;

use super::error::{ExprError, TclError};
use super::lexer::{find_close_brace, find_close_bracket, find_close_quote, scan_variable};
use super::list::split_list;
use super::status::TclResult;
use super::subst::{fold_continuations, tokenize, Part, SubstFlags};
use super::value::{parse_float, parse_int, Value};
use super::with_stack;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Callback interface used by the expression evaluator.
///
/// The [`Interpreter`](super::interp::Interpreter) implements this trait to
/// give the evaluator access to variables, command substitution and math
/// functions.
pub trait EvalContext {
    /// Resolve `$var` / `"quoted $text"` parts.
    fn subst_parts(&mut self, parts: &[Part]) -> TclResult;

    /// Run a `[command]` substitution in the current frame.
    fn eval_script(&mut self, script: &str) -> TclResult;

    /// Invoke a math function.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> TclResult;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Operands
    Number(Value),
    Braced(String),
    Quoted(Vec<Part>),
    Var(Vec<Part>),
    Command(String),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Tilde,
    Ampersand,
    Pipe,
    Caret,
    ShiftLeft,
    ShiftRight,

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And, // &&
    Or,  // ||

    // Misc
    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
}

fn syntax(text: &str, detail: impl std::fmt::Display) -> TclError {
    ExprError::Syntax(format!("syntax error in expression \"{text}\": {detail}")).into()
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, src: text.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')) {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self, radix: u32) {
        while self.peek().is_some_and(|b| (b as char).is_digit(radix)) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, TclError> {
        let start = self.pos;
        let radix = match (self.peek(), self.peek2().map(|b| b.to_ascii_lowercase())) {
            (Some(b'0'), Some(b'x')) => 16,
            (Some(b'0'), Some(b'o')) => 8,
            (Some(b'0'), Some(b'b')) => 2,
            _ => 10,
        };
        if radix != 10 {
            self.pos += 2;
            self.skip_digits(radix);
        } else {
            self.skip_digits(10);
            if self.peek() == Some(b'.') {
                self.pos += 1;
                self.skip_digits(10);
            }
            if matches!(self.peek(), Some(b'e' | b'E')) {
                self.pos += 1;
                if matches!(self.peek(), Some(b'+' | b'-')) {
                    self.pos += 1;
                }
                let digits = self.pos;
                self.skip_digits(10);
                if self.pos == digits {
                    return Err(self.malformed(start));
                }
            }
        }
        if self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.') {
            return Err(self.malformed(start));
        }

        let lit = &self.text[start..self.pos];
        if let Some(n) = parse_int(lit) {
            return Ok(Token::Number(Value::Int(n)));
        }
        if radix == 10 && lit.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExprError::Overflow.into());
        }
        match parse_float(lit) {
            Some(x) if radix == 10 => Ok(Token::Number(Value::Float(x))),
            _ => Err(ExprError::MalformedLiteral(lit.to_owned()).into()),
        }
    }

    fn malformed(&mut self, start: usize) -> TclError {
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.') {
            self.pos += 1;
        }
        ExprError::MalformedLiteral(self.text[start..self.pos].to_owned()).into()
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_alphanumeric() || b == b'_' => self.pos += 1,
                Some(b':') if self.peek2() == Some(b':') => self.pos += 2,
                _ => break,
            }
        }
        Token::Ident(self.text[start..self.pos].to_owned())
    }

    fn next_token(&mut self) -> Result<Token, TclError> {
        self.skip_ws();
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            b'0'..=b'9' => return self.read_number(),
            b'.' if self.peek2().is_some_and(|b| b.is_ascii_digit()) => return self.read_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return Ok(self.read_ident()),
            b':' if self.peek2() == Some(b':') => return Ok(self.read_ident()),
            b'$' => {
                let span = scan_variable(self.text, self.pos)?
                    .ok_or_else(|| syntax(self.text, "invalid character \"$\""))?;
                let parts = tokenize(&self.text[self.pos..span.end], SubstFlags::default())
                    .map_err(|e| e.shifted(self.pos))?;
                self.pos = span.end;
                return Ok(Token::Var(parts));
            }
            b'[' => {
                let close = find_close_bracket(self.text, self.pos)?;
                let script = self.text[self.pos + 1..close].to_owned();
                self.pos = close + 1;
                return Ok(Token::Command(script));
            }
            b'{' => {
                let close = find_close_brace(self.text, self.pos)?;
                let body = fold_continuations(&self.text[self.pos + 1..close]);
                self.pos = close + 1;
                return Ok(Token::Braced(body));
            }
            b'"' => {
                let close = find_close_quote(self.text, self.pos)?;
                let parts = tokenize(&self.text[self.pos + 1..close], SubstFlags::default())
                    .map_err(|e| e.shifted(self.pos + 1))?;
                self.pos = close + 1;
                return Ok(Token::Quoted(parts));
            }
            _ => {
                self.pos += 1;
                ch
            }
        };

        Ok(match token {
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => {
                if self.eat(b'*') {
                    Token::StarStar
                } else {
                    Token::Star
                }
            }
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'!' => {
                if self.eat(b'=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            b'~' => Token::Tilde,
            b'^' => Token::Caret,
            b'&' => {
                if self.eat(b'&') {
                    Token::And
                } else {
                    Token::Ampersand
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    Token::ShiftLeft
                } else if self.eat(b'=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    Token::ShiftRight
                } else if self.eat(b'=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    Token::Eq
                } else {
                    Token::Unknown('=')
                }
            }
            b'?' => Token::Question,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            _ => {
                // Report the whole character, not a UTF-8 fragment.
                let c = self.text[self.pos - 1..].chars().next().unwrap_or('?');
                self.pos += c.len_utf8() - 1;
                Token::Unknown(c)
            }
        })
    }

    fn tokenize(mut self) -> Result<Vec<Token>, TclError> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Pow,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrEq,
    StrNe,
    In,
    Ni,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Pow => "**",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::StrEq => "eq",
            BinOp::StrNe => "ne",
            BinOp::In => "in",
            BinOp::Ni => "ni",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
            BinOp::BitOr => "|",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `$name` or `$name(index)`.
    Var(Vec<Part>),
    /// `"text with $substitutions"`.
    Quoted(Vec<Part>),
    /// `[script]`.
    Command(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest run of parentheses, unary operators, `**` or `?:` the parser
/// recurses through.
pub const MAX_EXPR_NESTING: usize = 128;

/// Tallest expression tree the parser builds.
pub const MAX_EXPR_HEIGHT: usize = 1000;

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    /// Height of the tree above the node being parsed.
    height: usize,
}

fn too_deep() -> TclError {
    ExprError::Syntax("expression nesting too deep".into()).into()
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, tokens: Vec<Token>) -> Self {
        Parser { text, tokens, pos: 0, nesting: 0, height: 0 }
    }

    fn grow(&mut self) -> Result<(), TclError> {
        self.height += 1;
        if self.height > MAX_EXPR_HEIGHT {
            return Err(too_deep());
        }
        Ok(())
    }

    /// Parse a subexpression one level further down the tree.
    fn nested(&mut self, parse: fn(&mut Self) -> Result<Expr, TclError>) -> Result<Expr, TclError> {
        if self.nesting >= MAX_EXPR_NESTING {
            return Err(too_deep());
        }
        let saved = (self.nesting, self.height);
        self.nesting += 1;
        self.grow()?;
        let inner = with_stack(|| parse(self));
        (self.nesting, self.height) = saved;
        inner
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, detail: impl std::fmt::Display) -> TclError {
        syntax(self.text, detail)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, TclError>,
        op_of: fn(&Token) -> Option<BinOp>,
    ) -> Result<Expr, TclError> {
        let mut lhs = next(self)?;
        while let Some(op) = op_of(self.peek()) {
            self.pos += 1;
            // A chain nests to the left, so every link adds a level.
            self.grow()?;
            let rhs = next(self)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_ternary(&mut self) -> Result<Expr, TclError> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.nested(Self::parse_ternary)?;
            if !self.eat(&Token::Colon) {
                return Err(self.error("missing \":\" in ternary conditional"));
            }
            let else_ = self.nested(Self::parse_ternary)?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(else_)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_and, |t| (*t == Token::Or).then_some(BinOp::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_bitor, |t| (*t == Token::And).then_some(BinOp::And))
    }

    fn parse_bitor(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_bitxor, |t| (*t == Token::Pipe).then_some(BinOp::BitOr))
    }

    fn parse_bitxor(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_bitand, |t| (*t == Token::Caret).then_some(BinOp::BitXor))
    }

    fn parse_bitand(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_membership, |t| {
            (*t == Token::Ampersand).then_some(BinOp::BitAnd)
        })
    }

    fn parse_membership(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_string_eq, |t| match t {
            Token::Ident(s) if s == "in" => Some(BinOp::In),
            Token::Ident(s) if s == "ni" => Some(BinOp::Ni),
            _ => None,
        })
    }

    fn parse_string_eq(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_equality, |t| match t {
            Token::Ident(s) if s == "eq" => Some(BinOp::StrEq),
            Token::Ident(s) if s == "ne" => Some(BinOp::StrNe),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_relational, |t| match t {
            Token::Eq => Some(BinOp::Eq),
            Token::Ne => Some(BinOp::Ne),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_shift, |t| match t {
            Token::Lt => Some(BinOp::Lt),
            Token::Le => Some(BinOp::Le),
            Token::Gt => Some(BinOp::Gt),
            Token::Ge => Some(BinOp::Ge),
            _ => None,
        })
    }

    fn parse_shift(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_additive, |t| match t {
            Token::ShiftLeft => Some(BinOp::Shl),
            Token::ShiftRight => Some(BinOp::Shr),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, TclError> {
        self.binary_level(Self::parse_pow, |t| match t {
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Percent => Some(BinOp::Rem),
            _ => None,
        })
    }

    /// `**` is right-associative.
    fn parse_pow(&mut self) -> Result<Expr, TclError> {
        let base = self.parse_unary()?;
        if self.eat(&Token::StarStar) {
            let exp = self.nested(Self::parse_pow)?;
            Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, TclError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            Token::Tilde => UnaryOp::BitNot,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.nested(Self::parse_unary)?)))
    }

    fn parse_primary(&mut self) -> Result<Expr, TclError> {
        match self.advance() {
            Token::Number(v) => Ok(Expr::Literal(v)),
            Token::Braced(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Quoted(parts) => Ok(match parts.as_slice() {
                [] => Expr::Literal(Value::default()),
                [Part::Literal(s)] => Expr::Literal(Value::Str(s.clone())),
                _ => Expr::Quoted(parts),
            }),
            Token::Var(parts) => Ok(Expr::Var(parts)),
            Token::Command(script) => Ok(Expr::Command(script)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.nested(Self::parse_ternary)?);
                        while self.eat(&Token::Comma) {
                            args.push(self.nested(Self::parse_ternary)?);
                        }
                    }
                    if !self.eat(&Token::RParen) {
                        return Err(self.error(format!("missing close parenthesis after arguments to \"{name}\"")));
                    }
                    return Ok(Expr::Call(name, args));
                }
                match name.to_ascii_lowercase().as_str() {
                    "inf" | "infinity" => Ok(Expr::Literal(Value::Float(f64::INFINITY))),
                    "nan" => Ok(Expr::Literal(Value::Float(f64::NAN))),
                    "true" | "false" | "yes" | "no" | "on" | "off" => {
                        Ok(Expr::Literal(Value::Str(name)))
                    }
                    _ => Err(self.error(format!("invalid bareword \"{name}\""))),
                }
            }
            Token::LParen => {
                let inner = self.nested(Self::parse_ternary)?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("missing close parenthesis"));
                }
                Ok(inner)
            }
            Token::Eof => Err(self.error("premature end of expression")),
            Token::Unknown(c) => Err(self.error(format!("invalid character \"{c}\""))),
            other => Err(self.error(format!("unexpected operator {}", token_text(&other)))),
        }
    }
}

fn token_text(t: &Token) -> String {
    let s = match t {
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::StarStar => "**",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Bang => "!",
        Token::Tilde => "~",
        Token::Ampersand => "&",
        Token::Pipe => "|",
        Token::Caret => "^",
        Token::ShiftLeft => "<<",
        Token::ShiftRight => ">>",
        Token::Eq => "==",
        Token::Ne => "!=",
        Token::Lt => "<",
        Token::Le => "<=",
        Token::Gt => ">",
        Token::Ge => ">=",
        Token::And => "&&",
        Token::Or => "||",
        Token::Question => "?",
        Token::Colon => ":",
        Token::Comma => ",",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::Number(v) => return format!("\"{v}\""),
        Token::Ident(w) => return format!("\"{w}\""),
        Token::Unknown(c) => return format!("\"{c}\""),
        Token::Eof => "end of expression",
        _ => "operand",
    };
    format!("\"{s}\"")
}

/// Parse an expression string into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, TclError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(src, tokens);
    let expr = parser.parse_ternary()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("extra tokens at end of expression: {}", token_text(other)))),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

fn to_bool(v: &Value) -> Result<bool, ExprError> {
    v.as_bool()
        .ok_or_else(|| ExprError::NotBoolean(v.as_str().into_owned()))
}

/// Evaluate an [`Expr`] AST node against the given context.
pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> TclResult {
    with_stack(|| eval_node(expr, ctx))
}

fn eval_node(expr: &Expr, ctx: &mut dyn EvalContext) -> TclResult {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(parts) | Expr::Quoted(parts) => ctx.subst_parts(parts),
        Expr::Command(script) => ctx.eval_script(script),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            Ok(match op {
                UnaryOp::Neg => v.arith_neg()?,
                UnaryOp::Plus => v.numeric_operand("+")?,
                UnaryOp::Not => match v.as_number() {
                    Some(n) => Value::from(!to_bool(&n)?),
                    None => Value::from(!to_bool(&v).map_err(|_| ExprError::TypeMismatch {
                        op: "!".to_owned(),
                        expected: "non-numeric string",
                    })?),
                },
                UnaryOp::BitNot => Value::Int(!v.int_operand("~")?),
            })
        }

        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit for && and ||
            match op {
                BinOp::And => {
                    let l = eval_expr(lhs, ctx)?;
                    if !to_bool(&l)? {
                        return Ok(Value::Int(0));
                    }
                    let r = eval_expr(rhs, ctx)?;
                    return Ok(Value::from(to_bool(&r)?));
                }
                BinOp::Or => {
                    let l = eval_expr(lhs, ctx)?;
                    if to_bool(&l)? {
                        return Ok(Value::Int(1));
                    }
                    let r = eval_expr(rhs, ctx)?;
                    return Ok(Value::from(to_bool(&r)?));
                }
                _ => {}
            }
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binop(*op, &l, &r)
        }

        Expr::Ternary(cond, then, else_) => {
            let c = eval_expr(cond, ctx)?;
            if to_bool(&c)? {
                eval_expr(then, ctx)
            } else {
                eval_expr(else_, ctx)
            }
        }

        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for ae in arg_exprs {
                args.push(eval_expr(ae, ctx)?);
            }
            ctx.call_function(name, args)
        }
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> TclResult {
    let truth = |b: bool| Ok(Value::from(b));
    match op {
        BinOp::Add => Ok(l.arith_add(r)?),
        BinOp::Sub => Ok(l.arith_sub(r)?),
        BinOp::Mul => Ok(l.arith_mul(r)?),
        BinOp::Div => Ok(l.arith_div(r)?),
        BinOp::Rem => Ok(l.arith_rem(r)?),
        BinOp::Pow => Ok(l.arith_pow(r)?),

        BinOp::Eq => truth(l.cmp_value(r) == Ordering::Equal),
        BinOp::Ne => truth(l.cmp_value(r) != Ordering::Equal),
        BinOp::Lt => truth(l.cmp_value(r) == Ordering::Less),
        BinOp::Le => truth(l.cmp_value(r) != Ordering::Greater),
        BinOp::Gt => truth(l.cmp_value(r) == Ordering::Greater),
        BinOp::Ge => truth(l.cmp_value(r) != Ordering::Less),

        BinOp::StrEq => truth(l.as_str() == r.as_str()),
        BinOp::StrNe => truth(l.as_str() != r.as_str()),
        BinOp::In | BinOp::Ni => {
            let needle = l.as_str();
            let found = split_list(&r.as_str())?.iter().any(|e| *e == needle);
            truth(found == (op == BinOp::In))
        }

        BinOp::BitAnd => Ok(Value::Int(l.int_operand("&")? & r.int_operand("&")?)),
        BinOp::BitOr => Ok(Value::Int(l.int_operand("|")? | r.int_operand("|")?)),
        BinOp::BitXor => Ok(Value::Int(l.int_operand("^")? ^ r.int_operand("^")?)),
        BinOp::Shl | BinOp::Shr => {
            let sym = op.symbol();
            let x = l.int_operand(sym)?;
            let n = r.int_operand(sym)?;
            Ok(Value::Int(shift(x, n, op == BinOp::Shl)?))
        }

        BinOp::And | BinOp::Or => unreachable!("handled by the short-circuit path"),
    }
}

fn shift(x: i64, n: i64, left: bool) -> Result<i64, ExprError> {
    if n < 0 {
        return Err(ExprError::Domain("negative shift argument".into()));
    }
    if left {
        if x == 0 {
            return Ok(0);
        }
        if n >= 64 {
            return Err(ExprError::Overflow);
        }
        let r = x << n;
        if r >> n != x {
            return Err(ExprError::Overflow);
        }
        Ok(r)
    } else if n >= 64 {
        Ok(if x < 0 { -1 } else { 0 })
    } else {
        Ok(x >> n)
    }
}

/// Convenience: parse and evaluate an expression string.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> TclResult {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::functions::{call_builtin, MathRng};
    use crate::script::status::Exception;
    use rand::SeedableRng;
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, Value>,
        scripts_run: Vec<String>,
        rng: MathRng,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx { vars: HashMap::new(), scripts_run: Vec::new(), rng: MathRng::seed_from_u64(0) }
        }
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn subst_parts(&mut self, parts: &[Part]) -> TclResult {
            let mut out = Vec::new();
            for p in parts {
                out.push(match p {
                    Part::Literal(s) => Value::Str(s.clone()),
                    Part::Var { name, .. } => self
                        .vars
                        .get(name)
                        .cloned()
                        .ok_or_else(|| TclError::script(format!("no such variable {name}")))?,
                    Part::Command(s) => self.eval_script(s)?,
                });
            }
            if out.len() == 1 {
                return Ok(out.remove(0));
            }
            Ok(Value::Str(out.iter().map(|v| v.as_str().into_owned()).collect()))
        }
        fn eval_script(&mut self, script: &str) -> TclResult {
            self.scripts_run.push(script.to_owned());
            Ok(Value::Int(script.len() as i64))
        }
        fn call_function(&mut self, name: &str, args: Vec<Value>) -> TclResult {
            match call_builtin(name, &args, &mut self.rng) {
                Some(r) => Ok(r?),
                None => Err(ExprError::UnknownFunction(name.to_owned()).into()),
            }
        }
    }

    fn eval(src: &str) -> Value {
        eval_str(src, &mut TestCtx::new()).expect("eval failed")
    }

    fn eval_ctx(src: &str, ctx: &mut TestCtx) -> Value {
        eval_str(src, ctx).expect("eval failed")
    }

    fn eval_err(src: &str) -> TclError {
        match eval_str(src, &mut TestCtx::new()) {
            Err(Exception::Error(e)) => *e,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("3.14"), Value::Float(3.14));
        assert_eq!(eval(".5"), Value::Float(0.5));
        assert_eq!(eval("1e3"), Value::Float(1000.0));
        assert_eq!(eval("\"hello\""), Value::Str("hello".into()));
        assert_eq!(eval("{a $b}"), Value::Str("a $b".into()));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3"), Value::Int(5));
        assert_eq!(eval("10 - 4"), Value::Int(6));
        assert_eq!(eval("3 * 4"), Value::Int(12));
        assert_eq!(eval("10 / 3"), Value::Int(3));
        assert_eq!(eval("10 % 3"), Value::Int(1));
        assert_eq!(eval("7 / 2.0"), Value::Float(3.5));
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(eval("2 ** 3 ** 2"), Value::Int(512));
        assert_eq!(eval("-2 ** 2"), Value::Int(4));
        assert_eq!(eval("2 ** -1"), Value::Int(0));
    }

    #[test]
    fn unary_ops() {
        assert_eq!(eval("-5"), Value::Int(-5));
        assert_eq!(eval("-(3 + 2)"), Value::Int(-5));
        assert_eq!(eval("+7"), Value::Int(7));
        assert_eq!(eval("~0"), Value::Int(-1));
        assert_eq!(eval("!0"), Value::Int(1));
        assert_eq!(eval("!1"), Value::Int(0));
        assert_eq!(eval("!true"), Value::Int(0));
    }

    #[test]
    fn comparison_numeric_and_string() {
        assert_eq!(eval("3 == 3"), Value::Int(1));
        assert_eq!(eval("3 != 4"), Value::Int(1));
        assert_eq!(eval("2 < 3"), Value::Int(1));
        assert_eq!(eval("3 >= 3"), Value::Int(1));
        assert_eq!(eval("10 > 9"), Value::Int(1));
        assert_eq!(eval("\"10\" < \"9x\""), Value::Int(1));
        assert_eq!(eval("1.0 == 1"), Value::Int(1));
    }

    #[test]
    fn string_operators() {
        assert_eq!(eval("\"abc\" eq \"abc\""), Value::Int(1));
        assert_eq!(eval("1.0 eq 1"), Value::Int(0));
        assert_eq!(eval("\"a\" ne \"b\""), Value::Int(1));
        assert_eq!(eval("\"b\" in {a b c}"), Value::Int(1));
        assert_eq!(eval("\"d\" ni {a b c}"), Value::Int(1));
    }

    #[test]
    fn ternary() {
        assert_eq!(eval("1 ? 10 : 20"), Value::Int(10));
        assert_eq!(eval("0 ? 10 : 20"), Value::Int(20));
        assert_eq!(eval("0 ? 1 : 0 ? 2 : 3"), Value::Int(3));
    }

    #[test]
    fn logical_and_or() {
        assert_eq!(eval("1 && 1"), Value::Int(1));
        assert_eq!(eval("1 && 0"), Value::Int(0));
        assert_eq!(eval("0 || 1"), Value::Int(1));
        assert_eq!(eval("0 || 0"), Value::Int(0));
        assert_eq!(eval("yes && on"), Value::Int(1));
    }

    #[test]
    fn short_circuit_skips_substitution() {
        let mut ctx = TestCtx::new();
        assert_eq!(eval_ctx("0 && [side effect]", &mut ctx), Value::Int(0));
        assert_eq!(eval_ctx("1 || [side effect]", &mut ctx), Value::Int(1));
        assert_eq!(eval_ctx("1 ? 2 : [side effect]", &mut ctx), Value::Int(2));
        assert!(ctx.scripts_run.is_empty());
        eval_ctx("1 && [x]", &mut ctx);
        assert_eq!(ctx.scripts_run, vec!["x"]);
    }

    #[test]
    fn variable_lookup() {
        let mut ctx = TestCtx::new().with("x", Value::Int(7));
        assert_eq!(eval_ctx("$x + 1", &mut ctx), Value::Int(8));
        let mut ctx = TestCtx::new().with("s", Value::from("5"));
        assert_eq!(eval_ctx("$s * 2", &mut ctx), Value::Int(10));
        assert_eq!(eval_ctx("\"<$s>\"", &mut ctx), Value::Str("<5>".into()));
    }

    #[test]
    fn bitwise_and_shift() {
        assert_eq!(eval("5 & 3"), Value::Int(1));
        assert_eq!(eval("5 | 2"), Value::Int(7));
        assert_eq!(eval("5 ^ 3"), Value::Int(6));
        assert_eq!(eval("1 << 3"), Value::Int(8));
        assert_eq!(eval("8 >> 2"), Value::Int(2));
        assert_eq!(eval("-8 >> 70"), Value::Int(-1));
    }

    #[test]
    fn radix_literals() {
        assert_eq!(eval("0xff"), Value::Int(255));
        assert_eq!(eval("0b101"), Value::Int(5));
        assert_eq!(eval("0o17"), Value::Int(15));
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("1 + 2 == 3"), Value::Int(1));
        assert_eq!(eval("1 | 2 == 2"), Value::Int(1));
    }

    #[test]
    fn functions() {
        assert_eq!(eval("abs(-4)"), Value::Int(4));
        assert_eq!(eval("max(1, 5, 3)"), Value::Int(5));
        assert_eq!(eval("int(7.9) + round(0.5)"), Value::Int(8));
        assert_eq!(eval("pow(2, 10)"), Value::Float(1024.0));
    }

    #[test]
    fn divide_by_zero_kind() {
        let e = eval_err("1/0");
        assert_eq!(e.code, "divide-by-zero");
        assert_eq!(e.message, "divide by zero");
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let e = eval_err("\"abc\" + 1");
        assert_eq!(e.code, "type-mismatch");
        assert_eq!(e.message, "can't use non-numeric string as operand of \"+\"");
        assert_eq!(eval_err("1.5 % 2").code, "type-mismatch");
        assert_eq!(eval_err("\"abc\" && 1").code, "type-mismatch");
    }

    #[test]
    fn malformed_literals() {
        assert_eq!(eval_err("12abc").code, "malformed-literal");
        assert_eq!(eval_err("1e").code, "malformed-literal");
        assert_eq!(eval_err("0x").code, "malformed-literal");
        assert_eq!(eval_err("1.2.3").code, "malformed-literal");
    }

    #[test]
    fn overflow() {
        assert_eq!(eval_err("9223372036854775807 + 1").code, "overflow");
        assert_eq!(eval_err("99999999999999999999").code, "overflow");
        assert_eq!(eval_err("1 << 64").code, "overflow");
    }

    #[test]
    fn unknown_function() {
        let e = eval_err("nosuch(1)");
        assert_eq!(e.code, "unknown-function");
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(eval_err("1 +").code, "syntax");
        assert_eq!(eval_err("(1").code, "syntax");
        assert_eq!(eval_err("1 2").code, "syntax");
        assert_eq!(eval_err("abc").code, "syntax");
        assert_eq!(eval_err("1 ? 2").code, "syntax");
        assert_eq!(eval_err("").code, "syntax");
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        for src in [
            format!("{}1", "(".repeat(200_000)),
            format!("{}1", "-".repeat(200_000)),
            format!("1{}", " ** 2".repeat(MAX_EXPR_NESTING + 1)),
            format!("1{}", " + 1".repeat(MAX_EXPR_HEIGHT + 1)),
        ] {
            let e = eval_err(&src);
            assert_eq!((e.code, e.message.as_str()), ("syntax", "expression nesting too deep"));
        }
        let parens = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval(&parens), Value::Int(1));
        assert_eq!(eval(&format!("0{}", " + 1".repeat(500))), Value::Int(500));
        assert_eq!(eval(&format!("{}1", "!".repeat(100))), Value::Int(1));
    }

    #[test]
    fn unterminated_substitutions_are_parse_errors() {
        assert_eq!(eval_err("[foo").code, "unterminated-bracket");
        assert_eq!(eval_err("\"abc").code, "unterminated-quote");
    }

    #[test]
    fn special_float_words() {
        assert_eq!(eval("Inf"), Value::Float(f64::INFINITY));
        assert_eq!(eval("-inf < 0"), Value::Int(1));
    }
}
