//! Substitution engine.
//!
//! A word is first cut into [`Part`]s: literal text (with backslash escapes
//! already applied), variable references and command substitutions.  The
//! parts are then resolved left to right against the interpreter.  A
//! command substitution re-enters the evaluator in the *current* frame, and
//! any non-Ok completion it produces aborts the whole word.

use super::error::ParseError;
use super::interp::Interpreter;
use super::lexer::{find_close_bracket, scan_variable, Word, WordKind};
use super::status::{Exception, TclResult};
use super::value::Value;

/// A segment of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    /// `$name` or `$name(index)`; the index is itself substituted.
    Var { name: String, index: Option<Vec<Part>> },
    /// Script text between `[` and `]`.
    Command(String),
}

/// Which substitutions to perform (`subst -nobackslashes` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstFlags {
    pub backslashes: bool,
    pub variables: bool,
    pub commands: bool,
}

impl Default for SubstFlags {
    fn default() -> Self {
        SubstFlags { backslashes: true, variables: true, commands: true }
    }
}

// ── Backslash escapes ─────────────────────────────────────────────────────────

/// Decode the escape whose backslash is at `i`.
///
/// Returns the replacement text and the number of bytes consumed.
pub fn backslash(src: &str, i: usize) -> (String, usize) {
    let bytes = src.as_bytes();
    let Some(&next) = bytes.get(i + 1) else {
        return ("\\".to_owned(), 1);
    };
    let simple = |c: char| (c.to_string(), 2);
    match next {
        b'a' => simple('\x07'),
        b'b' => simple('\x08'),
        b'f' => simple('\x0c'),
        b'n' => simple('\n'),
        b'r' => simple('\r'),
        b't' => simple('\t'),
        b'v' => simple('\x0b'),
        b'\n' => {
            let mut j = i + 2;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\t') {
                j += 1;
            }
            (" ".to_owned(), j - i)
        }
        b'0'..=b'7' => {
            let digits = take_digits(&bytes[i + 1..], 3, 8);
            let code = u32::from_str_radix(&src[i + 1..i + 1 + digits], 8).unwrap_or(0) & 0xff;
            (char_from(code), 1 + digits)
        }
        b'x' => hex_escape(src, i, 2, 'x'),
        b'u' => hex_escape(src, i, 4, 'u'),
        b'U' => hex_escape(src, i, 8, 'U'),
        _ => {
            // Any other character stands for itself.
            let c = src[i + 1..].chars().next().unwrap_or('\\');
            (c.to_string(), 1 + c.len_utf8())
        }
    }
}

fn take_digits(bytes: &[u8], max: usize, radix: u32) -> usize {
    bytes
        .iter()
        .take(max)
        .take_while(|b| (**b as char).is_digit(radix))
        .count()
}

fn hex_escape(src: &str, i: usize, max: usize, letter: char) -> (String, usize) {
    let digits = take_digits(&src.as_bytes()[i + 2..], max, 16);
    if digits == 0 {
        return (letter.to_string(), 2);
    }
    let code = u32::from_str_radix(&src[i + 2..i + 2 + digits], 16).unwrap_or(0);
    (char_from(code), 2 + digits)
}

fn char_from(code: u32) -> String {
    char::from_u32(code).unwrap_or('\u{fffd}').to_string()
}

/// Apply every backslash escape in `s`.
pub fn unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while let Some(rel) = s[i..].find('\\') {
        out.push_str(&s[i..i + rel]);
        let (text, used) = backslash(s, i + rel);
        out.push_str(&text);
        i += rel + used;
    }
    out.push_str(&s[i..]);
    out
}

/// Braced text keeps everything except backslash-newline, which folds
/// together with following blanks into one space.
pub fn fold_continuations(s: &str) -> String {
    if !s.contains("\\\n") {
        return s.to_owned();
    }
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    let mut last = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'\n') => {
                out.push_str(&s[last..i]);
                let (text, used) = backslash(s, i);
                out.push_str(&text);
                i += used;
                last = i;
            }
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    out.push_str(&s[last.min(s.len())..]);
    out
}

// ── Tokenizing ────────────────────────────────────────────────────────────────

/// Cut `text` into parts.
pub fn tokenize(text: &str, flags: SubstFlags) -> Result<Vec<Part>, ParseError> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    let mut run = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if flags.backslashes => {
                literal.push_str(&text[run..i]);
                let (s, used) = backslash(text, i);
                literal.push_str(&s);
                i += used;
                run = i;
            }
            b'$' if flags.variables => {
                let Some(span) = scan_variable(text, i)? else {
                    i += 1;
                    continue;
                };
                literal.push_str(&text[run..i]);
                flush(&mut parts, &mut literal);
                let name = text[span.name.0..span.name.1].to_owned();
                let index = match span.index {
                    Some((a, b)) => Some(tokenize(&text[a..b], flags).map_err(|e| e.shifted(a))?),
                    None => None,
                };
                parts.push(Part::Var { name, index });
                i = span.end;
                run = i;
            }
            b'[' if flags.commands => {
                let close = find_close_bracket(text, i)?;
                literal.push_str(&text[run..i]);
                flush(&mut parts, &mut literal);
                parts.push(Part::Command(text[i + 1..close].to_owned()));
                i = close + 1;
                run = i;
            }
            _ => i += 1,
        }
    }
    literal.push_str(&text[run..]);
    flush(&mut parts, &mut literal);
    Ok(parts)
}

fn flush(parts: &mut Vec<Part>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}

// ── Substitution ──────────────────────────────────────────────────────────────

/// Substitute one word of a command.
pub fn subst_word(interp: &mut Interpreter, word: &Word) -> TclResult {
    match word.kind {
        WordKind::Braced => Ok(Value::Str(fold_continuations(&word.text))),
        _ if word.is_literal() => Ok(Value::Str(word.text.clone())),
        _ => {
            let parts = tokenize(&word.text, SubstFlags::default())
                .map_err(|e| e.shifted(word.offset))?;
            subst_parts(interp, &parts)
        }
    }
}

/// Resolve parts and concatenate.  A word made of a single variable or
/// command keeps that value's type.
pub fn subst_parts(interp: &mut Interpreter, parts: &[Part]) -> TclResult {
    if let [single] = parts {
        return subst_part(interp, single);
    }
    let mut out = String::new();
    for part in parts {
        match part {
            Part::Literal(s) => out.push_str(s),
            other => out.push_str(&subst_part(interp, other)?.as_str()),
        }
    }
    Ok(Value::Str(out))
}

fn subst_part(interp: &mut Interpreter, part: &Part) -> TclResult {
    match part {
        Part::Literal(s) => Ok(Value::Str(s.clone())),
        Part::Var { name, index } => {
            let index = match index {
                Some(parts) => Some(subst_parts(interp, parts)?.into_string()),
                None => None,
            };
            interp.read_var(name, index.as_deref())
        }
        Part::Command(script) => interp.eval(script),
    }
}

/// The `subst` command: substitute arbitrary text.
///
/// A `break` inside a command substitution stops and returns what has been
/// built so far; `continue` substitutes nothing for that command.
pub fn subst_text(interp: &mut Interpreter, text: &str, flags: SubstFlags) -> TclResult {
    let parts = tokenize(text, flags)?;
    let mut out = String::new();
    for part in &parts {
        match part {
            Part::Literal(s) => out.push_str(s),
            Part::Command(script) => match interp.eval(script) {
                Ok(v) => out.push_str(&v.as_str()),
                Err(Exception::Break { .. }) => break,
                Err(Exception::Continue { .. }) => {}
                Err(Exception::Return { value, .. }) => out.push_str(&value.as_str()),
                Err(e) => return Err(e),
            },
            other => out.push_str(&subst_part(interp, other)?.as_str()),
        }
    }
    Ok(Value::Str(out))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
