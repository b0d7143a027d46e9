//! List commands.
//!
//! Lists are plain strings; every command splits its list argument with
//! [`split_list`](crate::script::list::split_list) and builds results with
//! [`format_list`], so list text always round-trips.

use std::cmp::Ordering;

use super::{arity, concat_words, int_arg, list_arg, parse_index, usage};
use crate::pattern::{MatchMode, Pattern};
use crate::script::error::TclError;
use crate::script::interp::Interpreter;
use crate::script::list::{format_list, quote_element};
use crate::script::status::{Exception, TclResult};
use crate::script::value::{parse_float, parse_int, Value};

fn list_value<S: AsRef<str>>(items: &[S]) -> Value {
    Value::Str(format_list(items))
}

/// Clamp a resolved index into `0..=len`.
fn clamp(i: i64, len: usize) -> usize {
    i.clamp(0, len as i64) as usize
}

pub(crate) fn cmd_list(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let items: Vec<String> = args[1..].iter().map(|a| a.as_str().into_owned()).collect();
    Ok(list_value(&items))
}

pub(crate) fn cmd_llength(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(1), "list")?;
    Ok(Value::from(list_arg(&args[1])?.len()))
}

/// `lindex list ?index ...?`; each index may itself be a list of indices
/// walking into nested lists.
pub(crate) fn cmd_lindex(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "list ?index ...?")?;
    let mut current = args[1].as_str().into_owned();
    let indices: Vec<String> = match &args[2..] {
        [single] => list_arg(single)?,
        many => many.iter().map(|v| v.as_str().into_owned()).collect(),
    };
    for spec in indices {
        let items = crate::script::list::split_list(&current)?;
        let i = parse_index(&spec, items.len())?;
        current = if i < 0 { String::new() } else { items.into_iter().nth(i as usize).unwrap_or_default() };
    }
    Ok(Value::Str(current))
}

pub(crate) fn cmd_lrange(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 3, Some(3), "list first last")?;
    let items = list_arg(&args[1])?;
    let first = clamp(parse_index(&args[2].as_str(), items.len())?, items.len());
    let last = parse_index(&args[3].as_str(), items.len())?;
    if last < first as i64 || first >= items.len() {
        return Ok(Value::default());
    }
    let last = (last as usize).min(items.len() - 1);
    Ok(list_value(&items[first..=last]))
}

/// `lappend varName ?value ...?`; the existing text is kept as is.
pub(crate) fn cmd_lappend(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "varName ?value ...?")?;
    let name = args[1].as_str();
    let mut text = match interp.read_var(&name, None) {
        Ok(v) => v.into_string(),
        Err(Exception::Error(e)) if e.code == "no-such-variable" => String::new(),
        Err(e) => return Err(e),
    };
    crate::script::list::split_list(&text)?;
    for v in &args[2..] {
        if !text.trim_end().is_empty() {
            text.push(' ');
        }
        text.push_str(&quote_element(&v.as_str()));
    }
    interp.set_var(&name, None, Value::Str(text))
}

pub(crate) fn cmd_linsert(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 2, None, "list index ?element ...?")?;
    let mut items = list_arg(&args[1])?;
    let spec = args[2].as_str();
    let mut at = parse_index(&spec, items.len())?;
    // `end` inserts after the last element.
    if spec.trim_start().starts_with("end") {
        at += 1;
    }
    let at = clamp(at, items.len());
    items.splice(at..at, args[3..].iter().map(|v| v.as_str().into_owned()));
    Ok(list_value(&items))
}

pub(crate) fn cmd_lreplace(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 3, None, "list first last ?element ...?")?;
    let mut items = list_arg(&args[1])?;
    let len = items.len();
    let first = clamp(parse_index(&args[2].as_str(), len)?, len);
    let last = parse_index(&args[3].as_str(), len)?;
    let end = if last < first as i64 { first } else { ((last + 1) as usize).min(len) };
    items.splice(first..end, args[4..].iter().map(|v| v.as_str().into_owned()));
    Ok(list_value(&items))
}

pub(crate) fn cmd_lreverse(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(1), "list")?;
    let mut items = list_arg(&args[1])?;
    items.reverse();
    Ok(list_value(&items))
}

pub(crate) fn cmd_concat(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    Ok(Value::Str(concat_words(&args[1..])))
}

pub(crate) fn cmd_join(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(2), "list ?joinString?")?;
    let items = list_arg(&args[1])?;
    let sep = args.get(2).map_or_else(|| " ".to_owned(), |s| s.as_str().into_owned());
    Ok(Value::Str(items.join(&sep)))
}

pub(crate) fn cmd_split(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(2), "string ?splitChars?")?;
    let text = args[1].as_str();
    let chars: Vec<char> = match args.get(2) {
        Some(c) => c.as_str().chars().collect(),
        None => vec![' ', '\t', '\n', '\r'],
    };
    if text.is_empty() {
        return Ok(Value::default());
    }
    let parts: Vec<String> = if chars.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(|c| chars.contains(&c)).map(str::to_owned).collect()
    };
    Ok(list_value(&parts))
}

// ── lsearch ───────────────────────────────────────────────────────────────────

/// `lsearch ?options? list pattern`
pub(crate) fn cmd_lsearch(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    const USAGE: &str = "?-option value ...? list pattern";
    if args.len() < 3 {
        return Err(usage(args, USAGE).into());
    }
    let (mut mode, mut all, mut inline, mut negate, mut nocase) = (MatchMode::Glob, false, false, false, false);
    for opt in &args[1..args.len() - 2] {
        match &*opt.as_str() {
            "-exact" => mode = MatchMode::Exact,
            "-glob" => mode = MatchMode::Glob,
            "-regexp" => mode = MatchMode::Regexp,
            "-all" => all = true,
            "-inline" => inline = true,
            "-not" => negate = true,
            "-nocase" => nocase = true,
            other => {
                return Err(TclError::bad_arg(format!(
                    "bad option \"{other}\": must be -all, -exact, -glob, -inline, -nocase, -not, or -regexp"
                ))
                .into())
            }
        }
    }
    let items = list_arg(&args[args.len() - 2])?;
    let pattern = Pattern::new(&args[args.len() - 1].as_str(), mode, nocase)
        .map_err(|e| TclError::bad_arg(e.to_string()))?;
    let hits = items
        .iter()
        .enumerate()
        .filter(|(_, item)| pattern.matches(item) != negate);

    if all {
        let out: Vec<String> = hits
            .map(|(i, item)| if inline { item.clone() } else { i.to_string() })
            .collect();
        return Ok(list_value(&out));
    }
    Ok(match hits.map(|(i, item)| (i, item.clone())).next() {
        Some((_, item)) if inline => Value::Str(item),
        Some((i, _)) => Value::from(i),
        None if inline => Value::default(),
        None => Value::Int(-1),
    })
}

// ── lsort ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortMode {
    Ascii,
    Dictionary,
    Integer,
    Real,
    Command,
}

#[derive(Debug, Clone)]
enum SortKey {
    Text(String),
    Int(i64),
    Real(f64),
}

fn sort_key(mode: SortMode, nocase: bool, text: &str) -> Result<SortKey, TclError> {
    match mode {
        SortMode::Integer => parse_int(text.trim())
            .map(SortKey::Int)
            .ok_or_else(|| TclError::expected_int(text)),
        SortMode::Real => parse_float(text.trim())
            .map(SortKey::Real)
            .ok_or_else(|| TclError::bad_arg(format!("expected floating-point number but got \"{text}\""))),
        _ if nocase => Ok(SortKey::Text(text.to_lowercase())),
        _ => Ok(SortKey::Text(text.to_owned())),
    }
}

/// Dictionary order: case is ignored except as a tie-breaker and runs of
/// digits compare as integers.
pub(crate) fn dictionary_cmp(a: &str, b: &str) -> Ordering {
    let (mut x, mut y) = (a.chars().peekable(), b.chars().peekable());
    let mut tie = Ordering::Equal;
    loop {
        match (x.peek().copied(), y.peek().copied()) {
            (None, None) => return tie,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(c), Some(d)) if c.is_ascii_digit() && d.is_ascii_digit() => {
                let mut n = String::new();
                while let Some(c) = x.next_if(char::is_ascii_digit) {
                    n.push(c);
                }
                let mut m = String::new();
                while let Some(d) = y.next_if(char::is_ascii_digit) {
                    m.push(d);
                }
                let (nt, mt) = (n.trim_start_matches('0'), m.trim_start_matches('0'));
                let ord = nt.len().cmp(&mt.len()).then_with(|| nt.cmp(mt));
                if ord != Ordering::Equal {
                    return ord;
                }
                if tie == Ordering::Equal {
                    tie = m.len().cmp(&n.len());
                }
            }
            (Some(c), Some(d)) => {
                let (lc, ld) = (c.to_lowercase().next().unwrap_or(c), d.to_lowercase().next().unwrap_or(d));
                if lc != ld {
                    return lc.cmp(&ld);
                }
                if tie == Ordering::Equal {
                    // Upper case sorts first among otherwise equal strings.
                    tie = c.cmp(&d);
                }
                x.next();
                y.next();
            }
        }
    }
}

/// `lsort ?options? list`
pub(crate) fn cmd_lsort(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "?-option value ...? list")?;
    let mut mode = SortMode::Ascii;
    let (mut decreasing, mut unique, mut nocase) = (false, false, false);
    let mut index: Option<String> = None;
    let mut command: Option<Vec<Value>> = None;
    let opts = &args[1..args.len() - 1];
    let mut k = 0;
    while k < opts.len() {
        match &*opts[k].as_str() {
            "-ascii" => mode = SortMode::Ascii,
            "-dictionary" => mode = SortMode::Dictionary,
            "-integer" => mode = SortMode::Integer,
            "-real" => mode = SortMode::Real,
            "-increasing" => decreasing = false,
            "-decreasing" => decreasing = true,
            "-unique" => unique = true,
            "-nocase" => nocase = true,
            opt @ ("-index" | "-command") => {
                let value = opts
                    .get(k + 1)
                    .ok_or_else(|| TclError::bad_arg(format!("\"{opt}\" option must be followed by a value")))?;
                if opt == "-index" {
                    index = Some(value.as_str().into_owned());
                } else {
                    mode = SortMode::Command;
                    command = Some(list_arg(value)?.into_iter().map(Value::Str).collect());
                }
                k += 1;
            }
            other => {
                return Err(TclError::bad_arg(format!(
                    "bad option \"{other}\": must be -ascii, -command, -decreasing, -dictionary, -increasing, -index, -integer, -nocase, -real, or -unique"
                ))
                .into())
            }
        }
        k += 1;
    }

    let items = list_arg(&args[args.len() - 1])?;
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let field = match &index {
            Some(spec) => {
                let sub = crate::script::list::split_list(&item)?;
                let i = parse_index(spec, sub.len())?;
                sub.get(usize::try_from(i).unwrap_or(usize::MAX)).cloned().ok_or_else(|| {
                    TclError::bad_arg(format!("element {spec} missing from sublist \"{item}\""))
                })?
            }
            None => item.clone(),
        };
        keyed.push((sort_key(mode, nocase, &field)?, field, item));
    }

    let mut failure: Option<Exception> = None;
    let mut compare = |a: &(SortKey, String, String), b: &(SortKey, String, String)| -> Ordering {
        let ord = match (&a.0, &b.0) {
            (SortKey::Int(x), SortKey::Int(y)) => x.cmp(y),
            (SortKey::Real(x), SortKey::Real(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            (SortKey::Text(x), SortKey::Text(y)) => match (mode, &command) {
                (SortMode::Dictionary, _) => dictionary_cmp(x, y),
                (SortMode::Command, Some(prefix)) => {
                    if failure.is_some() {
                        return Ordering::Equal;
                    }
                    let mut words = prefix.clone();
                    words.push(Value::Str(a.1.clone()));
                    words.push(Value::Str(b.1.clone()));
                    match interp.invoke(&words).and_then(|v| Ok(int_arg(&v)?)) {
                        Ok(n) => n.cmp(&0),
                        Err(e) => {
                            failure = Some(e);
                            Ordering::Equal
                        }
                    }
                }
                _ => x.cmp(y),
            },
            _ => Ordering::Equal,
        };
        if decreasing {
            ord.reverse()
        } else {
            ord
        }
    };
    keyed.sort_by(&mut compare);
    if unique {
        // Keep the last of each run of equal elements.
        let mut out: Vec<(SortKey, String, String)> = Vec::with_capacity(keyed.len());
        for entry in keyed {
            let repeat = out.last().is_some_and(|prev| compare(prev, &entry) == Ordering::Equal);
            match out.last_mut() {
                Some(prev) if repeat => *prev = entry,
                _ => out.push(entry),
            }
        }
        keyed = out;
    }
    drop(compare);
    if let Some(e) = failure {
        return Err(e);
    }
    let sorted: Vec<String> = keyed.into_iter().map(|(_, _, item)| item).collect();
    Ok(list_value(&sorted))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::status::Status;

    fn run(src: &str) -> String {
        match Interpreter::new().evaluate(src) {
            Status::Ok(v) => v.into_string(),
            other => panic!("{src}: {other:?}"),
        }
    }

    fn fails(src: &str) -> TclError {
        match Interpreter::new().evaluate(src) {
            Status::Error(e) => e,
            other => panic!("expected error from {src}, got {other:?}"),
        }
    }

    #[test]
    fn construction_and_access() {
        assert_eq!(run("list a {b c} {} d"), "a {b c} {} d");
        assert_eq!(run("llength {a {b c} d}"), "3");
        assert_eq!(run("lindex {a {b c} d} 1"), "b c");
        assert_eq!(run("lindex {a {b c} d} end"), "d");
        assert_eq!(run("lindex {a {b c} d} 1 0"), "b");
        assert_eq!(run("lindex {a {b c} d} {1 1}"), "c");
        assert_eq!(run("lindex {a b} 5"), "");
        assert_eq!(run("lindex {a b}"), "a b");
        assert_eq!(fails("llength {a {b}c}").code, "bad-list");
    }

    #[test]
    fn slicing() {
        assert_eq!(run("lrange {a b c d e} 1 3"), "b c d");
        assert_eq!(run("lrange {a b c d e} end-1 end"), "d e");
        assert_eq!(run("lrange {a b c} 2 1"), "");
        assert_eq!(run("lrange {a b c} -5 10"), "a b c");
        assert_eq!(run("linsert {a b} 1 x y"), "a x y b");
        assert_eq!(run("linsert {a b} end z"), "a b z");
        assert_eq!(run("lreplace {a b c d} 1 2 X"), "a X d");
        assert_eq!(run("lreplace {a b c} 1 0 ins"), "a ins b c");
        assert_eq!(run("lreplace {a b c} end end"), "a b");
        assert_eq!(run("lreverse {1 2 {3 4}}"), "{3 4} 2 1");
    }

    #[test]
    fn lappend_preserves_text() {
        assert_eq!(run("set l {a  b}; lappend l {c d}"), "a  b {c d}");
        assert_eq!(run("lappend fresh x y"), "x y");
        assert_eq!(fails("set bad \\{; lappend bad x").code, "bad-list");
    }

    #[test]
    fn concat_join_split() {
        assert_eq!(run("concat {a b} { c } {}"), "a b c");
        assert_eq!(run("join {a b c} ,"), "a,b,c");
        assert_eq!(run("join {{a b} c}"), "a b c");
        assert_eq!(run("split a,b,,c ,"), "a b {} c");
        assert_eq!(run("split {a b}"), "a b");
        assert_eq!(run("split abc {}"), "a b c");
        assert_eq!(run("split {} ,"), "");
    }

    #[test]
    fn searching() {
        assert_eq!(run("lsearch {apple banana cherry} b*"), "1");
        assert_eq!(run("lsearch {apple banana cherry} z*"), "-1");
        assert_eq!(run("lsearch -exact {a* b} a*"), "0");
        assert_eq!(run("lsearch -all {a1 b a2} a*"), "0 2");
        assert_eq!(run("lsearch -all -inline {a1 b a2} a*"), "a1 a2");
        assert_eq!(run("lsearch -not {a a b} a"), "2");
        assert_eq!(run("lsearch -regexp {x12 y 3z} {^\\d}"), "2");
        assert_eq!(run("lsearch -nocase -exact {Foo BAR} bar"), "1");
        assert_eq!(run("lsearch -inline {a b} q"), "");
        assert!(fails("lsearch -bogus {a} a").message.starts_with("bad option"));
    }

    #[test]
    fn sorting_modes() {
        assert_eq!(run("lsort {c a b}"), "a b c");
        assert_eq!(run("lsort -decreasing {c a b}"), "c b a");
        assert_eq!(run("lsort -integer {10 9 100 -1}"), "-1 9 10 100");
        assert_eq!(run("lsort -real {2.5 1e1 -3}"), "-3 2.5 1e1");
        assert_eq!(run("lsort -dictionary {x10 x9 X1 x1}"), "X1 x1 x9 x10");
        assert_eq!(run("lsort -unique {b a b c a}"), "a b c");
        assert_eq!(run("lsort -nocase {b A c}"), "A b c");
        assert_eq!(run("lsort -index 1 {{a 3} {b 1} {c 2}}"), "{b 1} {c 2} {a 3}");
        assert_eq!(run("lsort -index end -integer {{x 10} {y 2}}"), "{y 2} {x 10}");
        assert_eq!(fails("lsort -integer {1 x}").message, "expected integer but got \"x\"");
    }

    #[test]
    fn sorting_with_command() {
        let src = "proc bylen {a b} {expr {[string length $a] - [string length $b]}}
                   lsort -command bylen {ccc a bb}";
        assert_eq!(run(src), "a bb ccc");
        let e = fails("proc boom {a b} {error nope}; lsort -command boom {b a}");
        assert_eq!(e.message, "nope");
    }

    #[test]
    fn dictionary_order() {
        assert_eq!(dictionary_cmp("a2", "a10"), Ordering::Less);
        assert_eq!(dictionary_cmp("A", "a"), Ordering::Less);
        assert_eq!(dictionary_cmp("abc", "ABD"), Ordering::Less);
        assert_eq!(dictionary_cmp("x01", "x1"), Ordering::Less);
        assert_eq!(dictionary_cmp("same", "same"), Ordering::Equal);
    }
}
