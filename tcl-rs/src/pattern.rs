//! Pattern matching: exact, glob and regular-expression modes.
//!
//! | Mode | Used by | Description |
//! |------|---------|-------------|
//! | [`MatchMode::Exact`]  | `lsearch -exact` | string equality |
//! | [`MatchMode::Glob`]   | `string match`, `lsearch`, `info` patterns | `*`, `?`, `[a-z]`, `\x` |
//! | [`MatchMode::Regexp`] | `regexp`, `regsub`, `lsearch -regexp` | [`regex`] crate syntax |
//!
//! Glob matching works on characters, not bytes, and is case-sensitive
//! unless `nocase` is requested.

use std::sync::Arc;

use regex::Regex;

// ── Public types ─────────────────────────────────────────────────────────────

/// Which matching algorithm a [`Pattern`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Glob,
    Regexp,
}

/// Error returned when a pattern cannot be compiled.
#[derive(Debug)]
pub enum PatternError {
    InvalidRegex(regex::Error),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::InvalidRegex(e) => {
                write!(f, "couldn't compile regular expression pattern: {e}")
            }
        }
    }
}

impl std::error::Error for PatternError {}

// Compiled form; callers use Pattern's methods.
#[derive(Clone)]
enum Compiled {
    Regex(Arc<Regex>),
    Glob,
    Exact,
}

/// A compiled pattern ready for matching.
#[derive(Clone)]
pub struct Pattern {
    src: String,
    mode: MatchMode,
    nocase: bool,
    compiled: Compiled,
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("src", &self.src)
            .field("mode", &self.mode)
            .field("nocase", &self.nocase)
            .finish()
    }
}

impl Pattern {
    /// Compile `src` using `mode`.
    pub fn new(src: &str, mode: MatchMode, nocase: bool) -> Result<Self, PatternError> {
        let compiled = match mode {
            MatchMode::Regexp => Compiled::Regex(Arc::new(compile_regex(src, nocase)?)),
            MatchMode::Glob => Compiled::Glob,
            MatchMode::Exact => Compiled::Exact,
        };
        Ok(Self { src: src.to_owned(), mode, nocase, compiled })
    }

    /// Returns `true` if this pattern matches `text`.
    pub fn matches(&self, text: &str) -> bool {
        match &self.compiled {
            Compiled::Regex(re) => re.is_match(text),
            Compiled::Glob => glob_match(&self.src, text, self.nocase),
            Compiled::Exact if self.nocase => self.src.to_lowercase() == text.to_lowercase(),
            Compiled::Exact => self.src == text,
        }
    }

    /// Attempt a regex match starting at byte `from`.  Non-regex patterns
    /// match the whole text or nothing.
    pub fn find_at<'t>(&self, text: &'t str, from: usize) -> Option<Captures<'t>> {
        match &self.compiled {
            Compiled::Regex(re) => {
                let caps = re.captures_at(text, from)?;
                let whole = caps.get(0)?;
                let groups = (1..caps.len())
                    .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
                    .collect();
                Some(Captures { text, start: whole.start(), end: whole.end(), groups })
            }
            _ => self
                .matches(text)
                .then(|| Captures { text, start: 0, end: text.len(), groups: vec![] }),
        }
    }

    pub fn find<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.find_at(text, 0)
    }

    /// Every non-overlapping match, left to right.
    pub fn find_all<'t>(&self, text: &'t str) -> Vec<Captures<'t>> {
        let mut out = Vec::new();
        let mut from = 0;
        while from <= text.len() {
            let Some(caps) = self.find_at(text, from) else { break };
            from = if caps.end == caps.start {
                // Step past an empty match to the next character boundary.
                text[caps.end..].chars().next().map_or(text.len() + 1, |c| caps.end + c.len_utf8())
            } else {
                caps.end
            };
            out.push(caps);
            if !matches!(self.compiled, Compiled::Regex(_)) {
                break;
            }
        }
        out
    }
}

/// A successful match with access to capture groups.
#[derive(Debug, Clone)]
pub struct Captures<'t> {
    text: &'t str,
    start: usize,
    end: usize,
    /// (start, end) byte offsets per capture group; `None` = group didn't participate.
    groups: Vec<Option<(usize, usize)>>,
}

impl<'t> Captures<'t> {
    /// The entire matched substring.
    pub fn whole(&self) -> &'t str {
        &self.text[self.start..self.end]
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// The nth capture group, 1-based.
    pub fn group(&self, n: usize) -> Option<&'t str> {
        self.group_span(n).map(|(s, e)| &self.text[s..e])
    }

    /// Byte span of the nth group; group 0 is the whole match.
    pub fn group_span(&self, n: usize) -> Option<(usize, usize)> {
        if n == 0 {
            return Some((self.start, self.end));
        }
        *self.groups.get(n - 1)?
    }

    /// Number of capture groups (excluding the overall match).
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

// ── Regex compilation ─────────────────────────────────────────────────────────

pub fn compile_regex(pattern: &str, nocase: bool) -> Result<Regex, PatternError> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(nocase)
        .build()
        .map_err(PatternError::InvalidRegex)
}

// ── Glob matching ─────────────────────────────────────────────────────────────

fn fold(c: char, nocase: bool) -> char {
    if nocase {
        c.to_lowercase().next().unwrap_or(c)
    } else {
        c
    }
}

/// Match a `[...]` class starting just after the `[`.  Returns whether
/// `ch` is in the class and the index after the closing `]`.
fn class_match(pat: &[char], mut i: usize, ch: char, nocase: bool) -> (bool, usize) {
    let ch = fold(ch, nocase);
    let mut hit = false;
    while i < pat.len() && pat[i] != ']' {
        let mut lo = pat[i];
        if lo == '\\' && i + 1 < pat.len() {
            i += 1;
            lo = pat[i];
        }
        let lo = fold(lo, nocase);
        if i + 2 < pat.len() && pat[i + 1] == '-' && pat[i + 2] != ']' {
            let hi = fold(pat[i + 2], nocase);
            let (a, b) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            if a <= ch && ch <= b {
                hit = true;
            }
            i += 3;
        } else {
            if lo == ch {
                hit = true;
            }
            i += 1;
        }
    }
    // Skip the closing bracket (an unterminated class runs to the end).
    (hit, (i + 1).min(pat.len()))
}

/// Tcl-style glob match of `text` against `pat`.
pub fn glob_match(pat: &str, text: &str, nocase: bool) -> bool {
    let p: Vec<char> = pat.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position after the last `*` and the text position it is trying.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        let step = match p.get(pi) {
            Some('*') => {
                while p.get(pi) == Some(&'*') {
                    pi += 1;
                }
                if pi == p.len() {
                    return true;
                }
                star = Some((pi, ti));
                continue;
            }
            Some('?') => Some(pi + 1),
            Some('[') => match class_match(&p, pi + 1, t[ti], nocase) {
                (true, next) => Some(next),
                (false, _) => None,
            },
            Some('\\') if pi + 1 < p.len() => {
                (fold(p[pi + 1], nocase) == fold(t[ti], nocase)).then_some(pi + 2)
            }
            Some(&c) => (fold(c, nocase) == fold(t[ti], nocase)).then_some(pi + 1),
            None => None,
        };
        match (step, star) {
            (Some(next), _) => {
                pi = next;
                ti += 1;
            }
            (None, Some((sp, st))) => {
                pi = sp;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            (None, None) => return false,
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_and_question() {
        assert!(glob_match("*", "", false));
        assert!(glob_match("a*c", "abbbc", false));
        assert!(!glob_match("a*c", "abbbd", false));
        assert!(glob_match("a?c", "abc", false));
        assert!(!glob_match("a?c", "ac", false));
        assert!(glob_match("*.tcl", "lib/x.tcl", false));
        assert!(glob_match("a**b", "ab", false));
    }

    #[test]
    fn glob_classes() {
        assert!(glob_match("[a-c]x", "bx", false));
        assert!(!glob_match("[a-c]x", "dx", false));
        assert!(glob_match("[xyz]", "y", false));
        assert!(glob_match("[c-a]", "b", false));
    }

    #[test]
    fn glob_escape() {
        assert!(glob_match(r"a\*", "a*", false));
        assert!(!glob_match(r"a\*", "ab", false));
    }

    #[test]
    fn glob_case() {
        assert!(!glob_match("ABC", "abc", false));
        assert!(glob_match("ABC", "abc", true));
        assert!(glob_match("é*", "ÉTÉ", true));
    }

    #[test]
    fn glob_backtracks() {
        assert!(glob_match("*a*b*c", "xxaxxbxxc", false));
        assert!(!glob_match("*a*b*c", "xxaxxcxxb", false));
        let long = "a".repeat(200);
        assert!(!glob_match("*a*a*a*a*b", &long, false));
    }

    #[test]
    fn regex_groups() {
        let p = Pattern::new(r"(\w+)=(\d+)?", MatchMode::Regexp, false).unwrap();
        let caps = p.find("key=42").unwrap();
        assert_eq!(caps.whole(), "key=42");
        assert_eq!(caps.group(1), Some("key"));
        assert_eq!(caps.group(2), Some("42"));
        assert_eq!(caps.group_span(0), Some((0, 6)));
        let caps = p.find("key=").unwrap();
        assert_eq!(caps.group(2), None);
    }

    #[test]
    fn regex_nocase_and_errors() {
        let p = Pattern::new("hello", MatchMode::Regexp, true).unwrap();
        assert!(p.matches("HeLLo"));
        assert!(Pattern::new("(", MatchMode::Regexp, false).is_err());
    }

    #[test]
    fn find_all_steps_over_empty_matches() {
        let p = Pattern::new("x*", MatchMode::Regexp, false).unwrap();
        assert_eq!(p.find_all("axxb").len(), 4);
        let p = Pattern::new("o", MatchMode::Regexp, false).unwrap();
        let all: Vec<_> = p.find_all("foo boo").iter().map(|c| c.span()).collect();
        assert_eq!(all, vec![(1, 2), (2, 3), (5, 6), (6, 7)]);
    }

    #[test]
    fn exact_mode() {
        let p = Pattern::new("a*", MatchMode::Exact, false).unwrap();
        assert!(p.matches("a*"));
        assert!(!p.matches("ab"));
        let p = Pattern::new("AB", MatchMode::Exact, true).unwrap();
        assert!(p.matches("ab"));
    }
}
