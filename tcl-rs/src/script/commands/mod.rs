//! The built-in command set.
//!
//! Every command is a plain function over the substituted words, with
//! `args[0]` being the name it was invoked as.  [`register_core`] installs
//! them into the global namespace when an interpreter is built.

mod control;
mod io;
mod lists;
mod procs;
mod strings;
mod variables;

use super::error::{ErrorKind, TclError};
use super::interp::Interpreter;
use super::list::split_list;
use super::status::TclResult;
use super::value::Value;

type CoreFn = fn(&mut Interpreter, &[Value]) -> TclResult;

const CORE: &[(&str, CoreFn)] = &[
    // Variables
    ("set", variables::cmd_set),
    ("unset", variables::cmd_unset),
    ("incr", variables::cmd_incr),
    ("append", variables::cmd_append),
    ("global", variables::cmd_global),
    ("upvar", variables::cmd_upvar),
    ("variable", variables::cmd_variable),
    ("array", variables::cmd_array),
    ("trace", variables::cmd_trace),
    // Control
    ("if", control::cmd_if),
    ("while", control::cmd_while),
    ("for", control::cmd_for),
    ("foreach", control::cmd_foreach),
    ("switch", control::cmd_switch),
    ("break", control::cmd_break),
    ("continue", control::cmd_continue),
    ("return", control::cmd_return),
    ("error", control::cmd_error),
    ("catch", control::cmd_catch),
    ("try", control::cmd_try),
    ("eval", control::cmd_eval),
    ("uplevel", control::cmd_uplevel),
    ("expr", control::cmd_expr),
    ("subst", control::cmd_subst),
    // Procedures and introspection
    ("proc", procs::cmd_proc),
    ("rename", procs::cmd_rename),
    ("apply", procs::cmd_apply),
    ("info", procs::cmd_info),
    ("namespace", procs::cmd_namespace),
    ("interp", procs::cmd_interp),
    // Lists
    ("list", lists::cmd_list),
    ("lindex", lists::cmd_lindex),
    ("llength", lists::cmd_llength),
    ("lappend", lists::cmd_lappend),
    ("lrange", lists::cmd_lrange),
    ("linsert", lists::cmd_linsert),
    ("lreplace", lists::cmd_lreplace),
    ("lsearch", lists::cmd_lsearch),
    ("lsort", lists::cmd_lsort),
    ("lreverse", lists::cmd_lreverse),
    ("concat", lists::cmd_concat),
    ("join", lists::cmd_join),
    ("split", lists::cmd_split),
    // Strings
    ("string", strings::cmd_string),
    ("format", strings::cmd_format),
    ("regexp", strings::cmd_regexp),
    ("regsub", strings::cmd_regsub),
    // I/O
    ("puts", io::cmd_puts),
    ("source", io::cmd_source),
];

/// Install the built-in commands.
pub fn register_core(interp: &mut Interpreter) {
    for &(name, func) in CORE {
        interp.register_core(name, func);
    }
}

/// Names of the built-in commands.
pub fn core_names() -> impl Iterator<Item = &'static str> {
    CORE.iter().map(|(name, _)| *name)
}

// ── Argument helpers ──────────────────────────────────────────────────────────

/// Longest string, in bytes, a command may be asked to build from a size
/// argument.
pub(crate) const MAX_RESULT_LEN: usize = 256 * 1024 * 1024;

pub(crate) fn too_large() -> TclError {
    TclError::new(ErrorKind::Arguments, "too-large", "result exceeds max size")
}

/// A caller-supplied size, rejected when it could exceed [`MAX_RESULT_LEN`].
pub(crate) fn size_arg(n: u64) -> Result<usize, TclError> {
    usize::try_from(n)
        .ok()
        .filter(|&n| n <= MAX_RESULT_LEN)
        .ok_or_else(too_large)
}

/// `wrong # args` using the invoked name and the rest of the usage.
pub(crate) fn usage(args: &[Value], rest: &str) -> TclError {
    let name = args.first().map_or_else(String::new, |v| v.as_str().into_owned());
    if rest.is_empty() {
        TclError::wrong_args(&name)
    } else {
        TclError::wrong_args(&format!("{name} {rest}"))
    }
}

/// Check the argument count (excluding the command name).
pub(crate) fn arity(args: &[Value], min: usize, max: Option<usize>, rest: &str) -> Result<(), TclError> {
    let n = args.len().saturating_sub(1);
    if n < min || max.is_some_and(|m| n > m) {
        return Err(usage(args, rest));
    }
    Ok(())
}

pub(crate) fn int_arg(v: &Value) -> Result<i64, TclError> {
    v.as_int().ok_or_else(|| TclError::expected_int(&v.as_str()))
}

pub(crate) fn list_arg(v: &Value) -> Result<Vec<String>, TclError> {
    split_list(&v.as_str())
}

/// Join words the way `concat` does: trim each, drop empties, join with
/// single spaces.
pub(crate) fn concat_words(words: &[Value]) -> String {
    let parts: Vec<String> = words
        .iter()
        .map(|w| w.as_str().trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();
    parts.join(" ")
}

/// Resolve an index spec (`3`, `end`, `end-1`, `2+1`) against a length.
/// The result may be out of range; callers decide what that means.
pub(crate) fn parse_index(spec: &str, len: usize) -> Result<i64, TclError> {
    let bad = || {
        TclError::bad_arg(format!(
            "bad index \"{spec}\": must be integer?[+-]integer? or end?[+-]integer?"
        ))
    };
    let s = spec.trim();
    let end = len as i64 - 1;
    if let Some(rest) = s.strip_prefix("end") {
        if rest.is_empty() {
            return Ok(end);
        }
        let (sign, num) = rest.split_at(1);
        let n: i64 = num.parse().map_err(|_| bad())?;
        return match sign {
            "-" => Ok(end - n),
            "+" => Ok(end + n),
            _ => Err(bad()),
        };
    }
    if let Some(v) = super::value::parse_int(s) {
        return Ok(v);
    }
    // a+b / a-b, skipping a leading sign on the first operand.
    let split_at = s
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '+' || c == '-')
        .map(|(i, _)| i)
        .ok_or_else(bad)?;
    let a = super::value::parse_int(&s[..split_at]).ok_or_else(bad)?;
    let b = super::value::parse_int(&s[split_at + 1..]).ok_or_else(bad)?;
    Ok(if &s[split_at..=split_at] == "+" { a + b } else { a - b })
}

/// Pick a subcommand, accepting any unique prefix.
pub(crate) fn subcommand<'a>(what: &str, given: &str, options: &[&'a str]) -> Result<&'a str, TclError> {
    if let Some(exact) = options.iter().find(|o| **o == given) {
        return Ok(exact);
    }
    let hits: Vec<&&str> = options.iter().filter(|o| !given.is_empty() && o.starts_with(given)).collect();
    if let [one] = hits.as_slice() {
        return Ok(one);
    }
    let mut listed: Vec<&str> = options.to_vec();
    let last = listed.pop().unwrap_or_default();
    let kind = if hits.is_empty() { "bad" } else { "ambiguous" };
    Err(TclError::bad_arg(format!(
        "{kind} {what} \"{given}\": must be {}, or {last}",
        listed.join(", ")
    )))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
