//! Interpreter configuration.
//!
//! | Variable | Field | Format |
//! |----------|-------|--------|
//! | `TCLRS_MAX_DEPTH` | `max_nesting_depth` | positive integer |
//! | `TCLRS_TRACE` | `trace_commands` / `trace_variables` | `commands`, `vars`, `all`, `1` |
//! | `TCLRS_LIBRARY` | `library_dirs` | `:`-separated directories |
//!
//! Malformed values are reported as [`ConfigError`]s and otherwise ignored,
//! so a bad environment never prevents the interpreter from starting.

use std::path::PathBuf;

use thiserror::Error;

/// Default limit on nested evaluations (commands, procedures, substitutions).
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// A rejected setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{var}: {message}")]
pub struct ConfigError {
    pub var: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpConfig {
    /// Nested evaluations allowed before a recursion-limit error.
    pub max_nesting_depth: usize,
    /// Send command enter/leave events to the trace sink.
    pub trace_commands: bool,
    /// Send variable read/write/unset events to the trace sink.
    pub trace_variables: bool,
    /// Extra directories searched by `source`.
    pub library_dirs: Vec<PathBuf>,
}

impl Default for InterpConfig {
    fn default() -> Self {
        InterpConfig {
            max_nesting_depth: DEFAULT_MAX_DEPTH,
            trace_commands: false,
            trace_variables: false,
            library_dirs: Vec::new(),
        }
    }
}

impl InterpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> (Self, Vec<ConfigError>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<ConfigError>) {
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(raw) = lookup("TCLRS_MAX_DEPTH") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_nesting_depth = n,
                _ => errors.push(ConfigError {
                    var: "TCLRS_MAX_DEPTH",
                    message: format!("expected a positive integer, got \"{raw}\""),
                }),
            }
        }

        if let Some(raw) = lookup("TCLRS_TRACE") {
            for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match item {
                    "commands" | "cmd" => config.trace_commands = true,
                    "vars" | "variables" => config.trace_variables = true,
                    "all" | "1" | "on" => {
                        config.trace_commands = true;
                        config.trace_variables = true;
                    }
                    "0" | "off" | "none" => {}
                    other => errors.push(ConfigError {
                        var: "TCLRS_TRACE",
                        message: format!("unknown trace class \"{other}\""),
                    }),
                }
            }
        }

        if let Some(raw) = lookup("TCLRS_LIBRARY") {
            config.library_dirs = raw
                .split(':')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        (config, errors)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth.max(1);
        self
    }

    pub fn with_tracing(mut self, commands: bool, variables: bool) -> Self {
        self.trace_commands = commands;
        self.trace_variables = variables;
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
