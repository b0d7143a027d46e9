/// Shell tests: run script snippets through the `tclsh` binary and check
/// what it prints.
///
/// Each case pipes a script to stdin (with `-f` so no rc file is read) or
/// runs a script file written into a temporary directory.  Output is
/// normalised before comparison (see `normalise_output`).

use std::io::Write;
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `tclsh` binary built by this Cargo workspace.
fn binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_tclsh"))
}

/// Pipe a script into an interactive shell and collect the result.
fn run_stdin(script: &str) -> Output {
    let mut child = Command::new(binary())
        .arg("-f")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn tclsh");
    {
        let stdin = child.stdin.as_mut().expect("stdin not open");
        stdin.write_all(script.as_bytes()).expect("write to stdin");
    }
    child.wait_with_output().expect("wait failed")
}

fn run_args(args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tclsh")
}

/// Trim each line and drop empty ones.
fn normalise_output(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .lines()
        .map(|l| l.trim().to_owned())
        .filter(|l| !l.is_empty())
        .collect()
}

fn check(script: &str, expected: &[&str]) {
    let out = run_stdin(script);
    let got = normalise_output(&out.stdout);
    let want: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    assert_eq!(
        got,
        want,
        "\nScript:\n{script}\nGot:\n{got:#?}\nWant:\n{want:#?}\nStderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
}

// ── Interactive mode ──────────────────────────────────────────────────────────

#[test]
fn puts_and_results() {
    check("puts hello\nset x 42\nexpr {$x + 1}\n", &["hello", "42", "43"]);
}

#[test]
fn multi_line_commands_accumulate() {
    check(
        "proc add {a b} {\n    return [expr {$a + $b}]\n}\nputs [add 2 3]\n",
        &["5"],
    );
}

#[test]
fn errors_go_to_stderr_and_the_loop_continues() {
    let out = run_stdin("nosuchcmd\nputs after\n");
    assert_eq!(normalise_output(&out.stdout), vec!["after"]);
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("invalid command name \"nosuchcmd\""), "{err}");
    assert!(out.status.success());
}

#[test]
fn exit_with_code() {
    let out = run_stdin("puts -nonewline bye\nexit 3\nputs never\n");
    assert_eq!(String::from_utf8_lossy(&out.stdout), "bye");
    assert_eq!(out.status.code(), Some(3));
}

// ── Command and file modes ────────────────────────────────────────────────────

#[test]
fn command_flag() {
    let out = run_args(&["-c", "puts [string toupper abc]"]);
    assert_eq!(normalise_output(&out.stdout), vec!["ABC"]);
    assert!(out.status.success());
}

#[test]
fn script_file_gets_argv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("args.tcl");
    std::fs::write(&path, "puts $argc\nputs [lindex $argv 1]\nputs [file_tail $argv0]\n").unwrap();
    // `file_tail` is not a command; the error ends the script after two lines.
    let out = run_args(&[path.to_str().unwrap(), "one", "two words"]);
    assert_eq!(normalise_output(&out.stdout), vec!["2", "two words"]);
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("while executing"), "{err}");
}

#[test]
fn script_file_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ok.tcl");
    std::fs::write(&path, "set total 0\nforeach n {1 2 3 4} {incr total $n}\nputs $total\n").unwrap();
    let out = run_args(&[path.to_str().unwrap()]);
    assert_eq!(normalise_output(&out.stdout), vec!["10"]);
    assert!(out.status.success());
}

#[test]
fn library_dir_flag_feeds_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("helper.tcl"), "proc greet {who} {return \"hi $who\"}\n").unwrap();
    let lib = format!("-L{}", dir.path().display());
    let out = run_args(&[&lib, "-c", "source helper.tcl; puts [greet you]"]);
    assert_eq!(normalise_output(&out.stdout), vec!["hi you"]);
}

#[test]
fn bad_flag_is_usage_error() {
    let out = run_args(&["-z"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));
}
