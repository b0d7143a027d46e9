//! Script lexer and word splitter.
//!
//! A script is a sequence of commands separated by newlines or `;`.  Each
//! command is a sequence of words separated by blanks.  A word is braced
//! (`{...}`, taken verbatim), quoted (`"..."`) or bare.  No substitution
//! happens here: the splitter only finds word boundaries, honouring nested
//! `[...]` command substitutions so that a `]` or blank inside a nested
//! command never ends the outer word.
//!
//! All syntax characters are ASCII, so the scanner works on bytes and only
//! ever slices the source at ASCII positions.

use super::error::ParseError;
use super::with_stack;

// ── Data types ────────────────────────────────────────────────────────────────

/// How a word was quoted in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Bare,
    Braced,
    Quoted,
}

/// One word of a command.
///
/// For braced and quoted words `text` excludes the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub kind: WordKind,
    pub text: String,
    /// Byte offset of the word (including any `{*}` prefix) in the script.
    pub offset: usize,
    /// Word was prefixed with `{*}`.
    pub expand: bool,
}

impl Word {
    /// A word that needs no substitution at all.
    pub fn is_literal(&self) -> bool {
        match self.kind {
            WordKind::Braced => !self.text.contains("\\\n"),
            _ => !self.text.bytes().any(|b| matches!(b, b'$' | b'[' | b'\\')),
        }
    }
}

/// One command: its words plus the source text it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub words: Vec<Word>,
    /// Source text, used for `errorInfo`.
    pub text: String,
    pub offset: usize,
    /// 1-based line of the command's first word.
    pub line: usize,
}

/// A fully split script.
///
/// A syntax error does not discard the commands before it: they run first
/// and the error is raised when evaluation reaches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub commands: Vec<Command>,
    pub error: Option<ParseError>,
}

impl Script {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.error.is_none()
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Split a whole script into commands.
pub fn parse_script(src: &str) -> Script {
    let mut parser = Parser::new(src, 0, false);
    let mut script = Script::default();
    let mut line = 1;
    let mut counted = 0;
    loop {
        match parser.next_command() {
            Ok(Some(mut cmd)) => {
                line += count_newlines(&src[counted..cmd.offset]);
                counted = cmd.offset;
                cmd.line = line;
                script.commands.push(cmd);
            }
            Ok(None) => break,
            Err(e) => {
                script.error = Some(e);
                break;
            }
        }
    }
    script
}

/// Split the single command starting at `start`.
///
/// Returns the command's words and the number of bytes consumed (including
/// the terminating separator), or `None` when only blanks, separators and
/// comments remain.
pub fn split(src: &str, start: usize) -> Result<Option<(Vec<Word>, usize)>, ParseError> {
    let mut parser = Parser::new(src, start, false);
    Ok(parser
        .next_command()?
        .map(|cmd| (cmd.words, parser.pos - start)))
}

/// `true` when `src` has no unterminated brace, quote or bracket and does
/// not end in a line continuation.
pub fn is_complete(src: &str) -> bool {
    if let Some(e) = parse_script(src).error {
        if e.is_incomplete() {
            return false;
        }
    }
    let body = src.strip_suffix('\n').unwrap_or(src);
    let trailing = body.bytes().rev().take_while(|&b| b == b'\\').count();
    trailing % 2 == 0
}

/// Deepest nesting of `[...]` substitutions and array indices the splitter
/// follows before giving up.
pub const MAX_NESTING: usize = 256;

/// Index of the `]` matching the `[` at `open`.
pub(crate) fn find_close_bracket(src: &str, open: usize) -> Result<usize, ParseError> {
    close_bracket(src, open, 0)
}

fn close_bracket(src: &str, open: usize, depth: usize) -> Result<usize, ParseError> {
    if depth >= MAX_NESTING {
        return Err(ParseError::TooDeep { offset: open });
    }
    let mut parser = Parser::new(src, open + 1, true);
    parser.depth = depth + 1;
    match with_stack(|| parser.skip_commands()) {
        // Report the outermost bracket of the over-deep construct.
        Err(ParseError::TooDeep { .. }) if depth == 0 => Err(ParseError::TooDeep { offset: open }),
        Err(e) => Err(e),
        Ok(()) if parser.peek() == Some(b']') => Ok(parser.pos),
        Ok(()) => Err(ParseError::MissingBracket { offset: open }),
    }
}

/// Index of the `}` matching the `{` at `open`.
pub(crate) fn find_close_brace(src: &str, open: usize) -> Result<usize, ParseError> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(ParseError::MissingBrace { offset: open })
}

/// Index of the `"` closing the quoted text opened at `open`.
pub(crate) fn find_close_quote(src: &str, open: usize) -> Result<usize, ParseError> {
    close_quote(src, open, 0)
}

fn close_quote(src: &str, open: usize, depth: usize) -> Result<usize, ParseError> {
    let bytes = src.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i),
            b'[' => i = close_bracket(src, i, depth)? + 1,
            b'$' => i = variable_span(src, i, depth)?.map_or(i + 1, |v| v.end),
            _ => i += 1,
        }
    }
    Err(ParseError::MissingQuote { offset: open })
}

// ── Variable references ───────────────────────────────────────────────────────

/// Location of a `$name`, `$name(index)` or `${name}` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VarSpan {
    pub name: (usize, usize),
    pub index: Option<(usize, usize)>,
    /// One past the last byte of the reference.
    pub end: usize,
}

pub(crate) fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan the variable reference whose `$` is at `dollar`.
///
/// Returns `None` when the `$` is not followed by a name and so stands for
/// itself.
pub(crate) fn scan_variable(src: &str, dollar: usize) -> Result<Option<VarSpan>, ParseError> {
    variable_span(src, dollar, 0)
}

fn variable_span(src: &str, dollar: usize, depth: usize) -> Result<Option<VarSpan>, ParseError> {
    if depth >= MAX_NESTING {
        return Err(ParseError::TooDeep { offset: dollar });
    }
    match reference_span(src, dollar, depth) {
        Err(ParseError::TooDeep { .. }) if depth == 0 => Err(ParseError::TooDeep { offset: dollar }),
        other => other,
    }
}

fn reference_span(src: &str, dollar: usize, depth: usize) -> Result<Option<VarSpan>, ParseError> {
    let bytes = src.as_bytes();
    let start = dollar + 1;
    if bytes.get(start) == Some(&b'{') {
        let close = bytes[start + 1..]
            .iter()
            .position(|&b| b == b'}')
            .map(|p| p + start + 1)
            .ok_or(ParseError::MissingVarBrace { offset: dollar })?;
        return Ok(Some(VarSpan { name: (start + 1, close), index: None, end: close + 1 }));
    }

    let mut i = start;
    loop {
        match bytes.get(i) {
            Some(&b) if is_name_byte(b) => i += 1,
            Some(b':') if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
                while bytes.get(i) == Some(&b':') {
                    i += 1;
                }
            }
            _ => break,
        }
    }
    if i == start {
        return Ok(None);
    }
    let name = (start, i);
    if bytes.get(i) != Some(&b'(') {
        return Ok(Some(VarSpan { name, index: None, end: i }));
    }

    let open = i;
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b')' => {
                return Ok(Some(VarSpan { name, index: Some((open + 1, j)), end: j + 1 }));
            }
            b'\\' => j += 2,
            b'[' => j = close_bracket(src, j, depth)? + 1,
            b'$' => j = variable_span(src, j, depth + 1)?.map_or(j + 1, |v| v.end),
            _ => j += 1,
        }
    }
    Err(ParseError::MissingParen { offset: open })
}

// ── Parser ────────────────────────────────────────────────────────────────────

fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\x0b' | b'\x0c')
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Inside `[...]`: an unquoted `]` ends the script.
    nested: bool,
    /// Number of enclosing `[...]` substitutions.
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, pos: usize, nested: bool) -> Self {
        Parser { src, bytes: src.as_bytes(), pos, nested, depth: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn at_word_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(b) if is_blank(b) || b == b'\n' || b == b';' => true,
            Some(b']') => self.nested,
            Some(b'\\') => self.peek_at(1) == Some(b'\n'),
            _ => false,
        }
    }

    /// Skip blanks and backslash-newline continuations between words.
    fn skip_blanks(&mut self) {
        loop {
            match self.peek() {
                Some(b) if is_blank(b) => self.pos += 1,
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    /// Skip separators, blank lines and comments before a command.
    fn skip_to_command(&mut self) {
        loop {
            self.skip_blanks();
            match self.peek() {
                Some(b'\n') | Some(b';') => self.pos += 1,
                Some(b'#') => self.skip_comment(),
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos = (self.pos + 2).min(self.bytes.len()),
                b'\n' => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_commands(&mut self) -> Result<(), ParseError> {
        while self.next_command()?.is_some() {}
        Ok(())
    }

    fn next_command(&mut self) -> Result<Option<Command>, ParseError> {
        self.skip_to_command();
        let start = self.pos;
        match self.peek() {
            None => return Ok(None),
            Some(b']') if self.nested => return Ok(None),
            _ => {}
        }

        let mut words = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None => break,
                Some(b'\n') | Some(b';') => break,
                Some(b']') if self.nested => break,
                _ => words.push(self.parse_word()?),
            }
        }
        let text = self.src[start..self.pos].trim_end().to_owned();
        if matches!(self.peek(), Some(b'\n') | Some(b';')) {
            self.pos += 1;
        }
        Ok(Some(Command { words, text, offset: start, line: 1 }))
    }

    fn parse_word(&mut self) -> Result<Word, ParseError> {
        let offset = self.pos;
        let mut expand = false;
        if self.src[self.pos..].starts_with("{*}") {
            let after = self.pos + 3;
            let follows = self.bytes.get(after).copied();
            let ends = |b: u8| is_blank(b) || b == b'\n' || b == b';' || (b == b']' && self.nested);
            if follows.is_some_and(|b| !ends(b)) {
                expand = true;
                self.pos = after;
            }
        }

        let word_start = self.pos;
        let (kind, text) = match self.peek() {
            Some(b'{') => {
                let close = find_close_brace(self.src, word_start)?;
                self.pos = close + 1;
                if !self.at_word_end() {
                    return Err(ParseError::ExtraAfterBrace { offset: word_start });
                }
                (WordKind::Braced, &self.src[word_start + 1..close])
            }
            Some(b'"') => {
                let close = close_quote(self.src, word_start, self.depth)?;
                self.pos = close + 1;
                if !self.at_word_end() {
                    return Err(ParseError::ExtraAfterQuote { offset: word_start });
                }
                (WordKind::Quoted, &self.src[word_start + 1..close])
            }
            _ => {
                self.scan_bare()?;
                (WordKind::Bare, &self.src[word_start..self.pos])
            }
        };
        Ok(Word { kind, text: text.to_owned(), offset, expand })
    }

    fn scan_bare(&mut self) -> Result<(), ParseError> {
        while !self.at_word_end() {
            match self.peek() {
                Some(b'\\') => self.pos = (self.pos + 2).min(self.bytes.len()),
                Some(b'[') => self.pos = close_bracket(self.src, self.pos, self.depth)? + 1,
                Some(b'$') => {
                    let span = variable_span(self.src, self.pos, self.depth)?;
                    self.pos = span.map_or(self.pos + 1, |v| v.end);
                }
                _ => self.pos += 1,
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
