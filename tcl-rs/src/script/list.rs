//! List syntax: splitting a string into elements and quoting elements back.
//!
//! Lists use the same quoting rules as command words, minus substitution:
//! braced elements are verbatim, quoted and bare elements only get
//! backslash escapes.  [`format_list`] is the inverse: any string list
//! round-trips through `split_list(format_list(..))`.

use super::error::{ErrorKind, TclError};
use super::lexer::find_close_brace;
use super::subst::unescape;

fn is_list_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

fn list_error(message: impl Into<String>) -> TclError {
    TclError::new(ErrorKind::Arguments, "bad-list", message)
}

/// Split `s` into list elements.
pub fn split_list(s: &str) -> Result<Vec<String>, TclError> {
    let bytes = s.as_bytes();
    let mut items = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && is_list_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'{' => {
                let close = find_close_brace(s, i)
                    .map_err(|_| list_error("unmatched open brace in list"))?;
                check_follow(s, close + 1, "braces")?;
                items.push(s[i + 1..close].replace("\\\n", " "));
                i = close + 1;
            }
            b'"' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != b'"' {
                    j += if bytes[j] == b'\\' { 2 } else { 1 };
                }
                if j >= bytes.len() {
                    return Err(list_error("unmatched open quote in list"));
                }
                check_follow(s, j + 1, "quotes")?;
                items.push(unescape(&s[i + 1..j]));
                i = j + 1;
            }
            _ => {
                let start = i;
                while i < bytes.len() && !is_list_space(bytes[i]) {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                let end = i.min(bytes.len());
                items.push(unescape(&s[start..end]));
                i = end;
            }
        }
    }
    Ok(items)
}

fn check_follow(s: &str, at: usize, what: &str) -> Result<(), TclError> {
    match s[at..].chars().next() {
        None => Ok(()),
        Some(c) if c.is_ascii() && is_list_space(c as u8) => Ok(()),
        Some(c) => Err(list_error(format!(
            "list element in {what} followed by \"{c}\" instead of space"
        ))),
    }
}

// ── Quoting ───────────────────────────────────────────────────────────────────

fn needs_quoting(b: u8) -> bool {
    is_list_space(b) || matches!(b, b'{' | b'}' | b'[' | b']' | b'$' | b'"' | b'\\' | b';')
}

/// Braces can protect `s` when they balance (ignoring escaped braces), no
/// backslash-newline would be folded and no trailing backslash would
/// escape the closing brace.
fn can_brace(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut depth = 0i64;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 >= bytes.len() || bytes[i + 1] == b'\n' {
                    return false;
                }
                i += 1;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    depth == 0
}

/// Quote one element so that it splits back to exactly `s`.
pub fn quote_element(s: &str) -> String {
    if s.is_empty() {
        return "{}".to_owned();
    }
    if !s.bytes().any(needs_quoting) {
        return s.to_owned();
    }
    if can_brace(s) {
        return format!("{{{s}}}");
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            c if c.is_ascii() && needs_quoting(c as u8) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Join elements into a canonical list string.
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let item = item.as_ref();
        let quoted = quote_element(item);
        // A leading `#` would read back as a comment if the list is
        // evaluated as a command.
        if i == 0 && quoted.starts_with('#') {
            if quoted == item {
                out.push('{');
                out.push_str(item);
                out.push('}');
            } else {
                out.push('\\');
                out.push_str(&quoted);
            }
        } else {
            out.push_str(&quoted);
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
