//! Command-line argument parsing for `tclsh`.
//!
//! Usage:
//!   tclsh [-d] [-f] [-L<dir>] [-c<script>]
//!   tclsh [-d] [-f] [-L<dir>] <file> [arg ...]

use std::path::PathBuf;

use directories::BaseDirs;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Extra `source` search directories (`-L<dir>`, repeatable).
    pub library_dirs: Vec<PathBuf>,
    /// Skip the rc file (`-f`).
    pub no_rc: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// What to run.
    pub mode: RunMode,
}

/// Where the shell takes its script from.
#[derive(Debug, Default, PartialEq)]
pub enum RunMode {
    /// Read commands from stdin (default).
    #[default]
    Interactive,
    /// `-c<script>`: evaluate this text, then exit.
    Command(String),
    /// Run a script file; the remaining words become `argv`.
    File { path: PathBuf, args: Vec<String> },
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing; the first word after it is the file.
        if arg == "--" {
            i += 1;
            break;
        }

        // The first non-flag word is the script; everything after is argv.
        if !arg.starts_with('-') || arg == "-" {
            break;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'f' => args.no_rc = true,

                // -c<script>
                'c' => {
                    let script = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-c requires a script argument".to_owned());
                    };
                    args.mode = RunMode::Command(script);
                }

                // -L<dir>
                'L' => {
                    let dir = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-L requires a directory argument".to_owned());
                    };
                    args.library_dirs.push(PathBuf::from(dir));
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    if let Some((path, rest)) = argv.get(i..).and_then(<[String]>::split_first) {
        if matches!(args.mode, RunMode::Command(_)) {
            return Err("cannot combine -c with a script file".to_owned());
        }
        args.mode = RunMode::File {
            path: PathBuf::from(path),
            args: rest.to_vec(),
        };
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// The interactive startup file, `~/.tclshrc`, when it exists.
pub fn find_rc_file() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".tclshrc"))
        .filter(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(!a.debug && !a.no_rc);
        assert_eq!(a.mode, RunMode::Interactive);
    }

    #[test]
    fn bool_flags() {
        let a = parse_argv(&argv(&["-d", "-f"])).unwrap();
        assert!(a.debug);
        assert!(a.no_rc);
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-df"])).unwrap();
        assert!(a.debug && a.no_rc);
    }

    #[test]
    fn command_embedded_and_separate() {
        let a = parse_argv(&argv(&["-cputs hi"])).unwrap();
        assert_eq!(a.mode, RunMode::Command("puts hi".to_owned()));
        let a = parse_argv(&argv(&["-c", "set x 1"])).unwrap();
        assert_eq!(a.mode, RunMode::Command("set x 1".to_owned()));
        assert!(parse_argv(&argv(&["-c"])).is_err());
    }

    #[test]
    fn file_with_args() {
        let a = parse_argv(&argv(&["-d", "run.tcl", "-x", "y"])).unwrap();
        assert!(a.debug);
        assert_eq!(
            a.mode,
            RunMode::File {
                path: PathBuf::from("run.tcl"),
                args: argv(&["-x", "y"]),
            }
        );
    }

    #[test]
    fn double_dash_allows_dash_file() {
        let a = parse_argv(&argv(&["--", "-odd.tcl"])).unwrap();
        assert!(matches!(a.mode, RunMode::File { ref path, .. } if path == &PathBuf::from("-odd.tcl")));
    }

    #[test]
    fn library_dirs_accumulate() {
        let a = parse_argv(&argv(&["-L/one", "-L", "/two"])).unwrap();
        assert_eq!(a.library_dirs, vec![PathBuf::from("/one"), PathBuf::from("/two")]);
    }

    #[test]
    fn command_and_file_conflict() {
        assert!(parse_argv(&argv(&["-c", "puts x", "file.tcl"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
