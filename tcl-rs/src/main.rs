use std::io::{self, BufRead, Write};
use std::path::Path;

use tokio::sync::oneshot;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tcl::cli::{self, CliArgs, RunMode};
use tcl::host::FsPathResolver;
use tcl::script::lexer::is_complete;
use tcl::script::list::format_list;
use tcl::script::{InterruptHandle, TclError};
use tcl::{InterpConfig, Interpreter, Status, Value};

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tclsh: {e}");
            eprintln!("Usage: tclsh [-d] [-f] [-L<dir>] [-c<script>]");
            eprintln!("       tclsh [-d] [-f] [-L<dir>] <file> [arg ...]");
            std::process::exit(2);
        }
    };

    init_tracing(args.debug);

    // ── Interpreter thread ────────────────────────────────────────────────────
    let (handle_tx, handle_rx) = oneshot::channel();
    let worker = std::thread::Builder::new()
        .name("tcl-interp".to_owned())
        .spawn(move || run(args, handle_tx));
    let worker = match worker {
        Ok(w) => w,
        Err(e) => {
            eprintln!("tclsh: can't start interpreter thread: {e}");
            std::process::exit(1);
        }
    };

    // ── Ctrl-C interrupts the running script ──────────────────────────────────
    tokio::spawn(async move {
        let Ok(handle) = handle_rx.await else { return };
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt requested");
            handle.interrupt();
        }
    });

    let code = match tokio::task::spawn_blocking(move || worker.join()).await {
        Ok(Ok(code)) => code,
        _ => {
            eprintln!("tclsh: interpreter thread panicked");
            101
        }
    };
    std::process::exit(code);
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Build the interpreter and run whatever the arguments asked for.
/// Returns the process exit status.
fn run(args: CliArgs, handle_tx: oneshot::Sender<InterruptHandle>) -> i32 {
    let (mut config, problems) = InterpConfig::from_env();
    for problem in problems {
        warn!(%problem, "ignoring configuration setting");
    }
    config.library_dirs.extend(args.library_dirs.iter().cloned());
    let resolver = FsPathResolver::new(config.library_dirs.clone());
    let mut interp = Interpreter::builder().config(config).path_resolver(resolver).build();
    interp.register_command("exit", cmd_exit);
    // The receiver only goes away if the runtime is shutting down.
    let _ = handle_tx.send(interp.interrupt_handle());

    match args.mode {
        RunMode::Command(script) => {
            set_argv(&mut interp, "tclsh", &[]);
            report(&mut interp, &script, true)
        }
        RunMode::File { path, args: rest } => {
            set_argv(&mut interp, &path.display().to_string(), &rest);
            run_file(&mut interp, &path)
        }
        RunMode::Interactive => {
            set_argv(&mut interp, "tclsh", &[]);
            if !args.no_rc {
                if let Some(rc) = cli::find_rc_file() {
                    run_file(&mut interp, &rc);
                }
            }
            repl(&mut interp)
        }
    }
}

fn set_argv(interp: &mut Interpreter, argv0: &str, rest: &[String]) {
    let vars = [
        ("argv0", Value::from(argv0)),
        ("argv", Value::Str(format_list(rest))),
        ("argc", Value::from(rest.len())),
    ];
    for (name, value) in vars {
        if let Err(e) = interp.set_global(name, value) {
            warn!(variable = name, error = ?e, "could not set");
        }
    }
}

fn run_file(interp: &mut Interpreter, path: &Path) -> i32 {
    let script = format!("source {}", format_list(&[path.display().to_string()]));
    report(interp, &script, false)
}

/// Evaluate one chunk, flush the output buffers and print the outcome.
/// Returns 0 on success and 1 on error.
fn report(interp: &mut Interpreter, script: &str, echo: bool) -> i32 {
    let status = interp.evaluate(script);
    flush(interp);
    match status {
        Status::Ok(v) | Status::Return { value: v, .. } => {
            if echo && !v.is_empty() {
                println!("{}", v.as_str());
            }
            0
        }
        Status::Error(e) => {
            eprintln!("{}", e.error_info);
            1
        }
        Status::Break { .. } => {
            eprintln!("invoked \"break\" outside of a loop");
            1
        }
        Status::Continue { .. } => {
            eprintln!("invoked \"continue\" outside of a loop");
            1
        }
    }
}

fn flush(interp: &mut Interpreter) {
    let out = interp.take_output();
    let err = interp.take_error_output();
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(out.as_bytes());
    let _ = stdout.flush();
    let _ = io::stderr().write_all(err.as_bytes());
}

/// Read commands from stdin, accumulating lines until a command is complete.
fn repl(interp: &mut Interpreter) -> i32 {
    // SAFETY: isatty only inspects the descriptor.
    let is_tty = unsafe { libc::isatty(libc::STDIN_FILENO) != 0 };
    let prompt = |continued: bool| {
        if is_tty {
            print!("{}", if continued { "> " } else { "% " });
            let _ = io::stdout().flush();
        }
    };

    let mut pending = String::new();
    prompt(false);
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("tclsh: {e}");
                return 1;
            }
        };
        pending.push_str(&line);
        pending.push('\n');
        if !is_complete(&pending) {
            prompt(true);
            continue;
        }
        let script = std::mem::take(&mut pending);
        report(interp, &script, true);
        prompt(false);
    }
    0
}

/// `exit ?returnCode?`
fn cmd_exit(interp: &mut Interpreter, args: &[Value]) -> tcl::script::TclResult {
    let code = match args {
        [_] => 0,
        [_, code] => code
            .as_int()
            .ok_or_else(|| TclError::expected_int(&code.as_str()))?,
        _ => return Err(TclError::wrong_args("exit ?returnCode?").into()),
    };
    flush(interp);
    std::process::exit(code as i32);
}
