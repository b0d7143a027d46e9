//! `puts` and `source`.
//!
//! Output never touches the process streams directly: `stdout` and
//! `stderr` are buffers on the interpreter that the host drains.

use super::usage;
use crate::script::error::{ErrorKind, TclError};
use crate::script::interp::Interpreter;
use crate::script::status::TclResult;
use crate::script::value::Value;

/// `puts ?-nonewline? ?channelId? string`
pub(crate) fn cmd_puts(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let mut rest = &args[1..];
    let newline = match rest.first() {
        Some(first) if rest.len() > 1 && first.as_str() == "-nonewline" => {
            rest = &rest[1..];
            false
        }
        _ => true,
    };
    let (channel, text) = match rest {
        [text] => ("stdout".to_owned(), text),
        [channel, text] => (channel.as_str().into_owned(), text),
        _ => return Err(usage(args, "?-nonewline? ?channelId? string").into()),
    };
    let buffer = match channel.as_str() {
        "stdout" => &mut interp.output,
        "stderr" => &mut interp.error_output,
        other => {
            return Err(TclError::new(
                ErrorKind::Resolution,
                "no-such-channel",
                format!("can not find channel named \"{other}\""),
            )
            .into())
        }
    };
    buffer.push_str(&text.as_str());
    if newline {
        buffer.push('\n');
    }
    Ok(Value::default())
}

/// `source fileName`
pub(crate) fn cmd_source(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    match args {
        [_, file] => interp.source_file(&file.as_str()),
        _ => Err(usage(args, "fileName").into()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::host::FsPathResolver;
    use crate::script::status::Status;

    #[test]
    fn puts_buffers() {
        let mut interp = Interpreter::new();
        assert!(matches!(interp.evaluate("puts hello; puts -nonewline stdout a; puts stderr oops"), Status::Ok(_)));
        assert_eq!(interp.take_output(), "hello\na");
        assert_eq!(interp.take_error_output(), "oops\n");
        assert_eq!(interp.take_output(), "");
    }

    #[test]
    fn puts_nonewline_alone_is_text() {
        let mut interp = Interpreter::new();
        interp.evaluate("puts -nonewline");
        assert_eq!(interp.take_output(), "-nonewline\n");
    }

    #[test]
    fn puts_errors() {
        let mut interp = Interpreter::new();
        match interp.evaluate("puts nowhere text") {
            Status::Error(e) => assert_eq!(e.message, "can not find channel named \"nowhere\""),
            other => panic!("{other:?}"),
        }
        assert!(matches!(interp.evaluate("puts"), Status::Error(_)));
    }

    #[test]
    fn source_runs_file_and_absorbs_return() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.tcl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "proc double {{x}} {{expr {{$x * 2}}}}").unwrap();
        writeln!(file, "return loaded").unwrap();
        writeln!(file, "set never 1").unwrap();
        drop(file);

        let mut interp = Interpreter::builder()
            .path_resolver(FsPathResolver::new(vec![dir.path().to_path_buf()]))
            .build();
        match interp.evaluate("list [source lib.tcl] [double 21] [info exists never]") {
            Status::Ok(v) => assert_eq!(v.as_str(), "loaded 42 0"),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn source_reports_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tcl");
        std::fs::write(&path, "set a 1\nerror boom\n").unwrap();
        let mut interp = Interpreter::new();
        let script = format!("source {{{}}}", path.display());
        match interp.evaluate(&script) {
            Status::Error(e) => {
                assert_eq!(e.message, "boom");
                assert!(e.error_info.contains("line 2"), "{}", e.error_info);
            }
            other => panic!("{other:?}"),
        }
        match interp.evaluate("source missing.tcl") {
            Status::Error(e) => assert!(e.message.starts_with("couldn't read file")),
            other => panic!("{other:?}"),
        }
    }
}
