//! String commands: `string`, `format`, `regexp` and `regsub`.
//!
//! Indices are character positions, not byte offsets.

use std::iter::Peekable;
use std::str::Chars;

use aho_corasick::{AhoCorasickBuilder, MatchKind};

use super::{
    arity, int_arg, list_arg, parse_index, size_arg, subcommand, too_large, usage, MAX_RESULT_LEN,
};
use crate::pattern::{glob_match, Captures, MatchMode, Pattern};
use crate::script::error::TclError;
use crate::script::interp::Interpreter;
use crate::script::list::{format_list, split_list};
use crate::script::status::TclResult;
use crate::script::value::{parse_float, parse_int, Value};

const STRING_OPTIONS: &[&str] = &[
    "compare", "equal", "first", "index", "is", "last", "length", "map", "match", "range",
    "repeat", "reverse", "tolower", "toupper", "trim", "trimleft", "trimright",
];

const WHITESPACE: &str = " \t\n\r\x0b\x0c";

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Substring by inclusive character indices, already resolved.
fn char_range(s: &str, first: i64, last: i64) -> String {
    let len = char_len(s) as i64;
    let first = first.max(0);
    let last = last.min(len - 1);
    if first > last {
        return String::new();
    }
    s.chars().skip(first as usize).take((last - first + 1) as usize).collect()
}

/// Leading `-nocase` / `-length n` options shared by `compare` and `equal`.
fn compare_options(args: &[Value], usage_rest: &str) -> Result<(String, String), TclError> {
    let mut nocase = false;
    let mut length = None;
    let mut i = 2;
    while i + 2 < args.len() {
        match &*args[i].as_str() {
            "-nocase" => nocase = true,
            "-length" => {
                i += 1;
                let n = int_arg(&args[i])?;
                length = usize::try_from(n).ok();
            }
            other => return Err(TclError::bad_arg(format!("bad option \"{other}\": must be -nocase or -length"))),
        }
        i += 1;
    }
    if args.len() != i + 2 {
        return Err(usage(args, usage_rest));
    }
    let prep = |v: &Value| {
        let mut s: String = v.as_str().into_owned();
        if let Some(n) = length {
            s = s.chars().take(n).collect();
        }
        if nocase {
            s = s.to_lowercase();
        }
        s
    };
    Ok((prep(&args[i]), prep(&args[i + 1])))
}

/// Boolean words plus `0` and `1`; other numbers are not booleans here.
fn word_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "0" => Some(false),
        "1" => Some(true),
        t if parse_float(t).is_some() => None,
        t => Value::from(t).as_bool(),
    }
}

fn is_class(class: &str, s: &str) -> Result<bool, TclError> {
    let all = |f: fn(char) -> bool| s.chars().all(f);
    Ok(match class {
        "integer" => parse_int(s.trim()).is_some(),
        "double" => parse_float(s.trim()).is_some(),
        "boolean" => word_bool(s).is_some(),
        "true" => word_bool(s) == Some(true),
        "false" => word_bool(s) == Some(false),
        "alpha" => all(char::is_alphabetic),
        "alnum" => all(char::is_alphanumeric),
        "digit" => all(|c| c.is_ascii_digit()),
        "space" => all(char::is_whitespace),
        "upper" => all(char::is_uppercase),
        "lower" => all(char::is_lowercase),
        "wordchar" => all(|c| c.is_alphanumeric() || c == '_'),
        "xdigit" => all(|c| c.is_ascii_hexdigit()),
        "ascii" => all(|c| c.is_ascii()),
        "punct" => all(|c| c.is_ascii_punctuation()),
        "list" => split_list(s).is_ok(),
        other => {
            return Err(TclError::bad_arg(format!(
                "bad class \"{other}\": must be alnum, alpha, ascii, boolean, digit, double, false, integer, list, lower, punct, space, true, upper, wordchar, or xdigit"
            )))
        }
    })
}

pub(crate) fn cmd_string(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "subcommand ?arg ...?")?;
    let option = subcommand("subcommand", &args[1].as_str(), STRING_OPTIONS)?;
    let s = args.get(2).map(Value::as_str).unwrap_or_default();
    let out = match option {
        "length" => {
            arity(args, 2, Some(2), "length string")?;
            Value::from(char_len(&s))
        }
        "index" => {
            arity(args, 3, Some(3), "index string charIndex")?;
            let i = parse_index(&args[3].as_str(), char_len(&s))?;
            Value::Str(char_range(&s, i, i))
        }
        "range" => {
            arity(args, 4, Some(4), "range string first last")?;
            let len = char_len(&s);
            let first = parse_index(&args[3].as_str(), len)?;
            let last = parse_index(&args[4].as_str(), len)?;
            Value::Str(char_range(&s, first, last))
        }
        "compare" => {
            let (a, b) = compare_options(args, "compare ?-nocase? ?-length length? string1 string2")?;
            Value::Int(match a.cmp(&b) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            })
        }
        "equal" => {
            let (a, b) = compare_options(args, "equal ?-nocase? ?-length length? string1 string2")?;
            Value::from(a == b)
        }
        "match" => {
            let (nocase, pat, text) = match args.len() {
                4 => (false, &args[2], &args[3]),
                5 if args[2].as_str() == "-nocase" => (true, &args[3], &args[4]),
                _ => return Err(usage(args, "match ?-nocase? pattern string").into()),
            };
            Value::from(glob_match(&pat.as_str(), &text.as_str(), nocase))
        }
        "first" | "last" => {
            arity(args, 3, Some(4), &format!("{option} needleString haystackString ?startIndex?"))?;
            let hay: Vec<char> = args[3].as_str().chars().collect();
            let needle: Vec<char> = s.chars().collect();
            Value::Int(find_chars(option == "first", &needle, &hay, args.get(4))?)
        }
        "tolower" | "toupper" => {
            arity(args, 2, Some(4), &format!("{option} string ?first? ?last?"))?;
            let len = char_len(&s) as i64;
            let first = args.get(3).map(|v| parse_index(&v.as_str(), len as usize)).transpose()?.unwrap_or(0);
            let last = match (args.get(4), args.get(3)) {
                (Some(v), _) => parse_index(&v.as_str(), len as usize)?,
                (None, Some(_)) => first,
                (None, None) => len - 1,
            };
            let upper = option == "toupper";
            let mapped: String = s
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    let i = i as i64;
                    if i < first || i > last {
                        c.to_string()
                    } else if upper {
                        c.to_uppercase().collect()
                    } else {
                        c.to_lowercase().collect()
                    }
                })
                .collect();
            Value::Str(mapped)
        }
        "trim" | "trimleft" | "trimright" => {
            arity(args, 2, Some(3), &format!("{option} string ?chars?"))?;
            let set: Vec<char> = args
                .get(3)
                .map_or_else(|| WHITESPACE.chars().collect(), |c| c.as_str().chars().collect());
            let strip = |c: char| set.contains(&c);
            let out = match option {
                "trimleft" => s.trim_start_matches(strip),
                "trimright" => s.trim_end_matches(strip),
                _ => s.trim_matches(strip),
            };
            Value::from(out)
        }
        "map" => {
            let (nocase, mapping, text) = match args.len() {
                4 => (false, &args[2], &args[3]),
                5 if args[2].as_str() == "-nocase" => (true, &args[3], &args[4]),
                _ => return Err(usage(args, "map ?-nocase? charMap string").into()),
            };
            Value::Str(string_map(&list_arg(mapping)?, &text.as_str(), nocase)?)
        }
        "repeat" => {
            arity(args, 3, Some(3), "repeat string count")?;
            let n = usize::try_from(int_arg(&args[3])?).unwrap_or(0);
            match s.len().checked_mul(n) {
                Some(len) if len <= MAX_RESULT_LEN => Value::Str(s.repeat(n)),
                _ => return Err(too_large().into()),
            }
        }
        "reverse" => {
            arity(args, 2, Some(2), "reverse string")?;
            Value::Str(s.chars().rev().collect())
        }
        "is" => {
            arity(args, 3, Some(4), "is class ?-strict? string")?;
            let (strict, text) = match args.len() {
                5 if args[3].as_str() == "-strict" => (true, args[4].as_str()),
                5 => return Err(usage(args, "is class ?-strict? string").into()),
                _ => (false, args[3].as_str()),
            };
            if text.is_empty() {
                Value::from(!strict)
            } else {
                Value::from(is_class(&s, &text)?)
            }
        }
        _ => return Err(usage(args, "subcommand ?arg ...?").into()),
    };
    Ok(out)
}

fn find_chars(forward: bool, needle: &[char], hay: &[char], start: Option<&Value>) -> Result<i64, TclError> {
    if needle.is_empty() || needle.len() > hay.len() {
        return Ok(-1);
    }
    let last_start = hay.len() - needle.len();
    let bound = start
        .map(|v| parse_index(&v.as_str(), hay.len()))
        .transpose()?;
    let hit = if forward {
        let from = bound.unwrap_or(0).max(0) as usize;
        (from..=last_start).find(|&i| hay[i..i + needle.len()] == *needle)
    } else {
        let upto = match bound {
            Some(b) if b < 0 => return Ok(-1),
            Some(b) => (b as usize).min(last_start),
            None => last_start,
        };
        (0..=upto).rev().find(|&i| hay[i..i + needle.len()] == *needle)
    };
    Ok(hit.map_or(-1, |i| i as i64))
}

/// `string map`: at each position the first key in mapping order that
/// matches is replaced; replaced text is not rescanned.
fn string_map(mapping: &[String], text: &str, nocase: bool) -> Result<String, TclError> {
    if mapping.len() % 2 != 0 {
        return Err(TclError::bad_arg("char map list unbalanced"));
    }
    let (keys, values): (Vec<&str>, Vec<&str>) = mapping
        .chunks(2)
        .filter(|kv| !kv[0].is_empty())
        .map(|kv| (kv[0].as_str(), kv[1].as_str()))
        .unzip();
    if keys.is_empty() {
        return Ok(text.to_owned());
    }
    let ac = AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostFirst)
        .ascii_case_insensitive(nocase)
        .build(&keys);
    Ok(ac.replace_all(text, &values))
}

// ── format ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

fn pad(spec: &Spec, body: String, numeric: bool) -> String {
    let len = char_len(&body);
    if len >= spec.width {
        return body;
    }
    let fill = spec.width - len;
    if spec.left {
        return body + &" ".repeat(fill);
    }
    if spec.zero && numeric {
        // Zeros go after any sign or radix prefix.
        let sign = usize::from(body.starts_with(['-', '+', ' ']));
        let radix = body[sign..].starts_with("0x") || body[sign..].starts_with("0X");
        let prefix_len = if radix { sign + 2 } else { sign };
        let (head, tail) = body.split_at(prefix_len);
        return format!("{head}{}{tail}", "0".repeat(fill));
    }
    " ".repeat(fill) + &body
}

fn signed(spec: &Spec, negative: bool, digits: String) -> String {
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    format!("{sign}{digits}")
}

/// `1.5e2` from Rust becomes `1.500000e+02`.
fn exp_form(x: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, x.abs());
    let (mantissa, exp) = raw.split_once('e').unwrap_or((&raw, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

fn strip_fraction_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    let (num, exp) = match s.find(['e', 'E']) {
        Some(i) => (s[..i].to_owned(), s[i..].to_owned()),
        None => (s.clone(), String::new()),
    };
    let num = num.trim_end_matches('0').trim_end_matches('.');
    format!("{num}{exp}")
}

fn general_form(x: f64, precision: usize, upper: bool, alt: bool) -> String {
    let p = precision.max(1);
    if x == 0.0 {
        return if alt { format!("{:.*}", p - 1, 0.0) } else { "0".to_owned() };
    }
    let exp = x.abs().log10().floor() as i32;
    let out = if exp < -4 || exp >= p as i32 {
        exp_form(x, p - 1, upper)
    } else {
        format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, x.abs())
    };
    if alt {
        out
    } else {
        strip_fraction_zeros(out)
    }
}

fn format_one(conv: char, spec: &Spec, arg: &Value) -> Result<String, TclError> {
    let float_arg = || {
        arg.as_float().ok_or_else(|| {
            TclError::bad_arg(format!("expected floating-point number but got \"{}\"", arg.as_str()))
        })
    };
    let body = match conv {
        'd' | 'i' => {
            let n = int_arg(arg)?;
            let digits = n.unsigned_abs().to_string();
            let digits = match spec.precision {
                Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
                _ => digits,
            };
            return Ok(pad(spec, signed(spec, n < 0, digits), true));
        }
        'u' => (int_arg(arg)? as u64).to_string(),
        'x' | 'X' | 'o' => {
            let n = int_arg(arg)? as u64;
            let (digits, prefix) = match conv {
                'x' => (format!("{n:x}"), "0x"),
                'X' => (format!("{n:X}"), "0X"),
                _ => (format!("{n:o}"), "0"),
            };
            if spec.alt && n != 0 {
                format!("{prefix}{digits}")
            } else {
                digits
            }
        }
        'c' => {
            let n = int_arg(arg)?;
            u32::try_from(n).ok().and_then(char::from_u32).map(String::from).unwrap_or_default()
        }
        's' => {
            let s = arg.as_str();
            match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.into_owned(),
            }
        }
        'f' | 'e' | 'E' | 'g' | 'G' => {
            let x = float_arg()?;
            let p = spec.precision.unwrap_or(6);
            let digits = if x.is_nan() {
                "nan".to_owned()
            } else if x.is_infinite() {
                "inf".to_owned()
            } else {
                match conv {
                    'f' => format!("{:.*}", p, x.abs()),
                    'e' | 'E' => exp_form(x, p, conv == 'E'),
                    _ => general_form(x, p, conv == 'G', spec.alt),
                }
            };
            return Ok(pad(spec, signed(spec, x.is_sign_negative() && !x.is_nan(), digits), true));
        }
        other => {
            return Err(TclError::bad_arg(format!("bad field specifier \"{other}\"")));
        }
    };
    Ok(pad(spec, body, matches!(conv, 'u' | 'x' | 'X' | 'o')))
}

/// A run of decimal digits giving a width or precision.
fn digits(chars: &mut Peekable<Chars<'_>>) -> Result<usize, TclError> {
    let mut n = 0u64;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(u64::from(d)))
            .ok_or_else(too_large)?;
        chars.next();
    }
    size_arg(n)
}

/// printf-style formatting: `%[flags][width][.precision]conv`.
pub(crate) fn format_string(fmt: &str, args: &[Value]) -> Result<String, TclError> {
    let mut out = String::new();
    let mut next = args.iter();
    let mut chars = fmt.chars().peekable();
    let missing = || TclError::bad_arg("not enough arguments for all format specifiers");
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.alt = true,
                _ => break,
            }
            chars.next();
        }
        if chars.peek() == Some(&'*') {
            chars.next();
            let w = int_arg(next.next().ok_or_else(missing)?)?;
            if w < 0 {
                spec.left = true;
            }
            spec.width = size_arg(w.unsigned_abs())?;
        } else {
            spec.width = digits(&mut chars)?;
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let p = if chars.peek() == Some(&'*') {
                chars.next();
                let p = int_arg(next.next().ok_or_else(missing)?)?;
                size_arg(u64::try_from(p).unwrap_or(0))?
            } else {
                digits(&mut chars)?
            };
            spec.precision = Some(p);
        }
        // Size modifiers are accepted and ignored.
        while matches!(chars.peek(), Some('l' | 'h' | 'L')) {
            chars.next();
        }
        let conv = chars
            .next()
            .ok_or_else(|| TclError::bad_arg("format string ended in middle of field specifier"))?;
        let arg = next.next().ok_or_else(missing)?;
        out.push_str(&format_one(conv, &spec, arg)?);
    }
    Ok(out)
}

pub(crate) fn cmd_format(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "formatString ?arg ...?")?;
    Ok(Value::Str(format_string(&args[1].as_str(), &args[2..])?))
}

// ── regexp / regsub ───────────────────────────────────────────────────────────

fn regex_pattern(src: &str, nocase: bool) -> Result<Pattern, TclError> {
    Pattern::new(src, MatchMode::Regexp, nocase).map_err(|e| TclError::bad_arg(e.to_string()))
}

/// Leading `-flag` options up to `--` or the first non-option word.
fn take_flags<'a>(args: &'a [Value], known: &[&str]) -> Result<(Vec<String>, &'a [Value]), TclError> {
    let mut flags = Vec::new();
    let mut i = 1;
    while let Some(a) = args.get(i) {
        let a = a.as_str();
        if a == "--" {
            i += 1;
            break;
        }
        if !a.starts_with('-') {
            break;
        }
        if !known.contains(&&*a) {
            return Err(TclError::bad_arg(format!(
                "bad option \"{a}\": must be {}, or --",
                known.join(", ")
            )));
        }
        flags.push(a.into_owned());
        i += 1;
    }
    Ok((flags, &args[i..]))
}

fn char_index(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Group `n` of a match as text, or as `start end` character indices.
fn group_value(text: &str, caps: &Captures<'_>, n: usize, indices: bool) -> String {
    match (caps.group_span(n), indices) {
        (Some((s, e)), true) => {
            let start = char_index(text, s) as i64;
            let end = char_index(text, e) as i64 - 1;
            format!("{start} {end}")
        }
        (Some((s, e)), false) => text[s..e].to_owned(),
        (None, true) => "-1 -1".to_owned(),
        (None, false) => String::new(),
    }
}

/// `regexp ?-nocase? ?-all? ?-inline? ?-indices? ?--? exp string ?matchVar? ?subMatchVar ...?`
pub(crate) fn cmd_regexp(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    const USAGE: &str = "?-option ...? exp string ?matchVar? ?subMatchVar ...?";
    let (flags, rest) = take_flags(args, &["-all", "-indices", "-inline", "-nocase"])?;
    let has = |f: &str| flags.iter().any(|g| g == f);
    let (all, indices, inline) = (has("-all"), has("-indices"), has("-inline"));
    if rest.len() < 2 || (inline && rest.len() > 2) {
        return Err(usage(args, USAGE).into());
    }
    let pattern = regex_pattern(&rest[0].as_str(), has("-nocase"))?;
    let text = rest[1].as_str();
    let matches = if all { pattern.find_all(&text) } else { pattern.find(&text).into_iter().collect() };

    if inline {
        let mut out = Vec::new();
        for caps in &matches {
            for n in 0..=caps.group_count() {
                out.push(group_value(&text, caps, n, indices));
            }
        }
        return Ok(Value::Str(format_list(&out)));
    }
    if let Some(caps) = matches.last() {
        for (n, var) in rest[2..].iter().enumerate() {
            interp.set_var(&var.as_str(), None, Value::Str(group_value(&text, caps, n, indices)))?;
        }
    }
    Ok(Value::from(matches.len()))
}

/// Expand a `regsub` substitution spec: `&` and `\0` are the match, `\1`
/// to `\9` are groups, `\&` and `\\` are literal.
fn expand_subspec(spec: &str, caps: &Captures<'_>) -> String {
    let mut out = String::new();
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str(caps.whole()),
            '\\' => match chars.peek().copied() {
                Some(d @ '0'..='9') => {
                    chars.next();
                    let n = d as usize - '0' as usize;
                    out.push_str(caps.group(n).or_else(|| (n == 0).then(|| caps.whole())).unwrap_or(""));
                }
                Some(e @ ('&' | '\\')) => {
                    chars.next();
                    out.push(e);
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

/// `regsub ?-all? ?-nocase? ?--? exp string subSpec ?varName?`
pub(crate) fn cmd_regsub(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let (flags, rest) = take_flags(args, &["-all", "-nocase"])?;
    if !(3..=4).contains(&rest.len()) {
        return Err(usage(args, "?-option ...? exp string subSpec ?varName?").into());
    }
    let has = |f: &str| flags.iter().any(|g| g == f);
    let pattern = regex_pattern(&rest[0].as_str(), has("-nocase"))?;
    let text = rest[1].as_str();
    let spec = rest[2].as_str();
    let matches = if has("-all") { pattern.find_all(&text) } else { pattern.find(&text).into_iter().collect() };

    let mut out = String::new();
    let mut at = 0;
    for caps in &matches {
        let (s, e) = caps.span();
        out.push_str(&text[at..s]);
        out.push_str(&expand_subspec(&spec, caps));
        at = e;
    }
    out.push_str(&text[at..]);

    match rest.get(3) {
        Some(var) => {
            interp.set_var(&var.as_str(), None, Value::Str(out))?;
            Ok(Value::from(matches.len()))
        }
        None => Ok(Value::Str(out)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
