//! Collaborators supplied by the embedding application.
//!
//! The interpreter reaches outside itself through three narrow traits:
//!
//! | Trait | Used for | Default |
//! |-------|----------|---------|
//! | [`TraceSink`] | variable and command events | [`TracingSink`] |
//! | [`PathResolver`] | `source` | [`FsPathResolver`] |
//! | [`EntropySource`] | `rand()` seeding, [`unique_name`] | [`OsEntropy`] |
//!
//! [`unique_name`]: crate::script::Interpreter::unique_name

use std::fmt;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::trace;

use crate::script::status::ReturnCode;
use crate::script::value::Value;

// ── Trace sink ────────────────────────────────────────────────────────────────

/// Something observable happened inside the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    VarRead { name: String, index: Option<String>, value: Option<Value> },
    VarWrite { name: String, index: Option<String>, value: Value },
    VarUnset { name: String, index: Option<String> },
    CommandEnter { words: Vec<Value>, depth: usize },
    CommandLeave { name: String, depth: usize, code: ReturnCode },
}

impl TraceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::VarRead { .. } => "var-read",
            TraceEvent::VarWrite { .. } => "var-write",
            TraceEvent::VarUnset { .. } => "var-unset",
            TraceEvent::CommandEnter { .. } => "command-enter",
            TraceEvent::CommandLeave { .. } => "command-leave",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn var(name: &str, index: &Option<String>) -> String {
            match index {
                Some(i) => format!("{name}({i})"),
                None => name.to_owned(),
            }
        }
        match self {
            TraceEvent::VarRead { name, index, value } => match value {
                Some(v) => write!(f, "read {} = {v}", var(name, index)),
                None => write!(f, "read {} (unset)", var(name, index)),
            },
            TraceEvent::VarWrite { name, index, value } => {
                write!(f, "write {} = {value}", var(name, index))
            }
            TraceEvent::VarUnset { name, index } => write!(f, "unset {}", var(name, index)),
            TraceEvent::CommandEnter { words, depth } => {
                let text: Vec<_> = words.iter().map(|w| w.as_str().into_owned()).collect();
                write!(f, "enter [{depth}] {}", text.join(" "))
            }
            TraceEvent::CommandLeave { name, depth, code } => {
                write!(f, "leave [{depth}] {name} -> {code}")
            }
        }
    }
}

/// Receiver of [`TraceEvent`]s.  Emission is fire-and-forget.
pub trait TraceSink: Send + Sync {
    fn emit(&self, event: &TraceEvent);
}

/// Forwards events to `tracing` under the `tcl::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&self, event: &TraceEvent) {
        trace!(target: "tcl::trace", kind = event.kind(), "{event}");
    }
}

// ── Path resolution ───────────────────────────────────────────────────────────

/// Maps a `source` argument to a file.
pub trait PathResolver: Send + Sync {
    fn resolve_path(&self, candidate: &str) -> Option<PathBuf>;
}

/// Absolute paths as given, then relative to the working directory, then
/// each library directory in order.
#[derive(Debug, Default, Clone)]
pub struct FsPathResolver {
    pub library_dirs: Vec<PathBuf>,
}

impl FsPathResolver {
    pub fn new(library_dirs: Vec<PathBuf>) -> Self {
        FsPathResolver { library_dirs }
    }
}

impl PathResolver for FsPathResolver {
    fn resolve_path(&self, candidate: &str) -> Option<PathBuf> {
        let path = Path::new(candidate);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        if path.is_file() {
            return std::env::current_dir().ok().map(|cwd| cwd.join(path));
        }
        self.library_dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|p| p.is_file())
    }
}

// ── Entropy ───────────────────────────────────────────────────────────────────

pub trait EntropySource: Send + Sync {
    fn random_bytes(&self, n: usize) -> Vec<u8>;
}

/// Operating-system randomness via `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn random_bytes(&self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        rand::thread_rng().fill_bytes(&mut buf);
        buf
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
