//! Control structures: conditionals, loops, completion codes and the
//! commands that evaluate scripts or expressions on behalf of a caller.

use std::ops::ControlFlow;

use super::{arity, concat_words, int_arg, list_arg, usage};
use crate::pattern::{MatchMode, Pattern};
use crate::script::error::{ErrorKind, TclError};
use crate::script::interp::Interpreter;
use crate::script::list::{format_list, split_list};
use crate::script::status::{absorb_loop, complete_return, Exception, ReturnCode, TclResult};
use crate::script::subst::{subst_text, SubstFlags};
use crate::script::value::Value;
use crate::script::vars::{looks_like_level, parse_level};

fn missing(what: &str) -> TclError {
    TclError::new(ErrorKind::Arguments, "wrong-args", format!("wrong # args: {what}"))
}

/// Run a loop body; `Break(())` asks the loop to stop.
fn run_body(interp: &mut Interpreter, body: &str) -> Result<ControlFlow<()>, Exception> {
    interp.check_interrupt()?;
    absorb_loop(interp.eval(body))
}

// ── Conditionals and loops ────────────────────────────────────────────────────

pub(crate) fn cmd_if(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let mut i = 1;
    loop {
        let cond = args
            .get(i)
            .ok_or_else(|| missing(&format!("no expression after \"{}\" argument", args[i - 1].as_str())))?;
        i += 1;
        if args.get(i).is_some_and(|w| w.as_str() == "then") {
            i += 1;
        }
        let body = args
            .get(i)
            .ok_or_else(|| missing(&format!("no script following \"{}\" argument", args[i - 1].as_str())))?;
        i += 1;
        if interp.eval_condition(&cond.as_str())? {
            return interp.eval(&body.as_str());
        }
        let Some(next) = args.get(i) else {
            return Ok(Value::default());
        };
        match &*next.as_str() {
            "elseif" => i += 1,
            "else" => {
                let body = args
                    .get(i + 1)
                    .ok_or_else(|| missing("no script following \"else\" argument"))?;
                if args.len() > i + 2 {
                    return Err(missing("extra words after \"else\" clause in \"if\" command").into());
                }
                return interp.eval(&body.as_str());
            }
            _ => {
                if args.len() > i + 1 {
                    return Err(missing("extra words after \"else\" clause in \"if\" command").into());
                }
                return interp.eval(&next.as_str());
            }
        }
    }
}

pub(crate) fn cmd_while(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 2, Some(2), "test command")?;
    let (test, body) = (args[1].as_str(), args[2].as_str());
    while interp.eval_condition(&test)? {
        if run_body(interp, &body)?.is_break() {
            break;
        }
    }
    Ok(Value::default())
}

pub(crate) fn cmd_for(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 4, Some(4), "start test next command")?;
    let (start, test, next, body) =
        (args[1].as_str(), args[2].as_str(), args[3].as_str(), args[4].as_str());
    interp.eval(&start)?;
    while interp.eval_condition(&test)? {
        if run_body(interp, &body)?.is_break() {
            break;
        }
        if absorb_loop(interp.eval(&next))?.is_break() {
            break;
        }
    }
    Ok(Value::default())
}

pub(crate) fn cmd_foreach(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(usage(args, "varList list ?varList list ...? command").into());
    }
    let body = args[args.len() - 1].as_str();
    let mut groups = Vec::new();
    for pair in args[1..args.len() - 1].chunks(2) {
        let vars = list_arg(&pair[0])?;
        if vars.is_empty() {
            return Err(TclError::bad_arg("foreach varlist is empty").into());
        }
        groups.push((vars, list_arg(&pair[1])?));
    }
    let rounds = groups
        .iter()
        .map(|(vars, items)| items.len().div_ceil(vars.len()))
        .max()
        .unwrap_or(0);
    for round in 0..rounds {
        for (vars, items) in &groups {
            for (k, var) in vars.iter().enumerate() {
                let item = items.get(round * vars.len() + k).cloned().unwrap_or_default();
                interp.set_var(var, None, Value::Str(item))?;
            }
        }
        if run_body(interp, &body)?.is_break() {
            break;
        }
    }
    Ok(Value::default())
}

/// `switch ?options? string pattern body ?pattern body ...?`, or with all
/// the patterns and bodies in one list.  A body of `-` falls through to the
/// next body and a final `default` pattern matches anything.
pub(crate) fn cmd_switch(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    const USAGE: &str = "?-option ...? string ?pattern body ...? ?default body?";
    let mut mode = MatchMode::Exact;
    let mut nocase = false;
    let mut i = 1;
    while let Some(opt) = args.get(i).map(|v| v.as_str()) {
        // The string and at least one more word always follow the options.
        if !opt.starts_with('-') || i + 2 >= args.len() {
            break;
        }
        i += 1;
        match &*opt {
            "-exact" => mode = MatchMode::Exact,
            "-glob" => mode = MatchMode::Glob,
            "-regexp" => mode = MatchMode::Regexp,
            "-nocase" => nocase = true,
            "--" => break,
            other => {
                return Err(TclError::bad_arg(format!(
                    "bad option \"{other}\": must be -exact, -glob, -nocase, -regexp, or --"
                ))
                .into())
            }
        }
    }
    let subject = args.get(i).ok_or_else(|| usage(args, USAGE))?.as_str();
    let grouped = args.len() == i + 2;
    let arms: Vec<String> = match &args[i + 1..] {
        [] => return Err(usage(args, USAGE).into()),
        [list] => list_arg(list)?,
        words => words.iter().map(|w| w.as_str().into_owned()).collect(),
    };
    if arms.is_empty() {
        return Err(usage(args, "?-option ...? string {?pattern body ...? ?default body?}").into());
    }
    if arms.len() % 2 == 1 {
        let mut message = "extra switch pattern with no body".to_owned();
        if grouped && arms.iter().any(|a| a.starts_with('#')) {
            message.push_str(", this may be due to a comment incorrectly placed outside of a switch body");
        }
        return Err(TclError::bad_arg(message).into());
    }
    if arms[arms.len() - 1] == "-" {
        return Err(TclError::bad_arg(format!(
            "no body specified for pattern \"{}\"",
            arms[arms.len() - 2]
        ))
        .into());
    }

    for (k, arm) in arms.chunks(2).enumerate() {
        let pattern = &arm[0];
        let is_default = k * 2 + 2 == arms.len() && pattern == "default";
        if !is_default {
            let compiled = Pattern::new(pattern, mode, nocase)
                .map_err(|e| TclError::bad_arg(e.to_string()))?;
            if !compiled.matches(&subject) {
                continue;
            }
        }
        // The last body is never `-`, so a body is always found.
        let Some(body) = arms[k * 2 + 1..].iter().step_by(2).find(|b| *b != "-") else {
            break;
        };
        let mut result = interp.eval(body);
        if let Err(Exception::Error(e)) = &mut result {
            e.append_info(&format!("(\"{pattern}\" arm line {})", interp.error_line));
        }
        return result;
    }
    Ok(Value::default())
}

// ── Completion codes ──────────────────────────────────────────────────────────

fn loop_level(args: &[Value]) -> Result<usize, TclError> {
    arity(args, 0, Some(1), "?level?")?;
    match args.get(1) {
        None => Ok(1),
        Some(v) => match int_arg(v)? {
            n if n >= 1 => Ok(n as usize),
            _ => Err(TclError::bad_arg(format!(
                "invalid level \"{}\": must be a positive integer",
                v.as_str()
            ))),
        },
    }
}

pub(crate) fn cmd_break(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    Err(Exception::Break { level: loop_level(args)? })
}

pub(crate) fn cmd_continue(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    Err(Exception::Continue { level: loop_level(args)? })
}

/// `return ?-code c? ?-level n? ?-errorinfo s? ?-errorcode s? ?value?`
pub(crate) fn cmd_return(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let mut rest = &args[1..];
    let value = if rest.len() % 2 == 1 {
        let (last, opts) = rest.split_last().map_or((Value::default(), rest), |(l, o)| (l.clone(), o));
        rest = opts;
        last
    } else {
        Value::default()
    };
    let mut code = ReturnCode::Ok;
    let mut level = 1usize;
    let mut error_info = None;
    let mut error_code = None;
    for pair in rest.chunks(2) {
        let (opt, arg) = (pair[0].as_str(), &pair[1]);
        match &*opt {
            "-code" => {
                code = ReturnCode::parse(&arg.as_str()).ok_or_else(|| {
                    TclError::bad_arg(format!(
                        "bad completion code \"{}\": must be ok, error, return, break, continue, or an integer",
                        arg.as_str()
                    ))
                })?;
            }
            "-level" => {
                level = match arg.as_int() {
                    Some(n) if n >= 0 => n as usize,
                    _ => {
                        return Err(TclError::bad_arg(format!(
                            "bad -level value: expected non-negative integer but got \"{}\"",
                            arg.as_str()
                        ))
                        .into())
                    }
                };
            }
            "-errorinfo" => error_info = Some(arg.as_str().into_owned()),
            "-errorcode" => error_code = Some(arg.as_str().into_owned()),
            // Unknown options are accepted and ignored.
            _ => {}
        }
    }
    if level == 0 {
        return complete_return(value, code, error_info, error_code);
    }
    Err(Exception::Return { value, level, code, error_info, error_code })
}

pub(crate) fn cmd_error(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(3), "message ?errorInfo? ?errorCode?")?;
    let mut e = TclError::script(args[1].as_str());
    if let Some(info) = args.get(2).filter(|v| !v.is_empty()) {
        e = e.with_error_info(info.as_str());
    }
    if let Some(code) = args.get(3) {
        e = e.with_error_code(code.as_str());
    }
    Err(e.into())
}

/// The completion code, result and options dictionary `catch` and `try`
/// report for a finished evaluation.  Errors are recorded in `errorInfo`
/// and `errorCode` on the way.
fn completion(interp: &mut Interpreter, outcome: &TclResult) -> (ReturnCode, Value, Vec<String>) {
    match outcome {
        Ok(v) => (
            ReturnCode::Ok,
            v.clone(),
            vec!["-code".to_owned(), "0".into(), "-level".into(), "0".into()],
        ),
        Err(Exception::Error(e)) => {
            interp.record_error(e);
            let opts = vec![
                "-code".to_owned(),
                "1".into(),
                "-level".into(),
                "0".into(),
                "-errorinfo".into(),
                e.error_info.clone(),
                "-errorcode".into(),
                e.error_code.clone(),
            ];
            (ReturnCode::Error, Value::Str(e.message.clone()), opts)
        }
        Err(Exception::Return { value, level, code, .. }) => {
            let opts = vec![
                "-code".to_owned(),
                code.as_i64().to_string(),
                "-level".into(),
                level.to_string(),
            ];
            (ReturnCode::Return, value.clone(), opts)
        }
        Err(other) => {
            let code = other.code();
            let opts = vec!["-code".to_owned(), code.as_i64().to_string(), "-level".into(), "0".into()];
            (code, Value::default(), opts)
        }
    }
}

fn is_interrupt(outcome: &TclResult) -> bool {
    matches!(outcome, Err(Exception::Error(e)) if e.kind == ErrorKind::Interrupted)
}

/// `catch script ?resultVar? ?optionsVar?`
///
/// An interrupted evaluation is not caught.
pub(crate) fn cmd_catch(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(3), "script ?resultVarName? ?optionVarName?")?;
    let outcome = interp.eval(&args[1].as_str());
    if is_interrupt(&outcome) {
        return outcome;
    }
    let (code, value, options) = completion(interp, &outcome);
    if let Some(var) = args.get(2) {
        interp.set_var(&var.as_str(), None, value)?;
    }
    if let Some(var) = args.get(3) {
        interp.set_var(&var.as_str(), None, Value::Str(format_list(&options)))?;
    }
    Ok(Value::Int(code.as_i64()))
}

enum Trigger {
    On(ReturnCode),
    /// Matches errors whose `errorCode` starts with these words.
    Trap(Vec<String>),
}

struct Handler {
    trigger: Trigger,
    vars: Vec<String>,
    script: String,
}

impl Handler {
    fn fires(&self, code: ReturnCode, error_code: &[String]) -> bool {
        match &self.trigger {
            Trigger::On(on) => *on == code,
            Trigger::Trap(prefix) => {
                code == ReturnCode::Error && error_code.starts_with(prefix)
            }
        }
    }
}

fn clause_args(shape: &str) -> TclError {
    let clause = shape.split(' ').next().unwrap_or_default();
    TclError::new(
        ErrorKind::Arguments,
        "wrong-args",
        format!("wrong # args to {clause} clause: must be \"... {shape}\""),
    )
}

fn parse_handlers(args: &[Value]) -> Result<(Vec<Handler>, Option<String>), TclError> {
    let mut handlers = Vec::new();
    let mut finally = None;
    let mut i = 2;
    while i < args.len() {
        let kind = args[i].as_str();
        match &*kind {
            "on" | "trap" => {
                let [what, vars, script] = match args.get(i + 1..i + 4) {
                    Some([a, b, c]) => [a, b, c],
                    _ => {
                        let shape = if kind == "on" { "code" } else { "pattern" };
                        return Err(clause_args(&format!("{kind} {shape} variableList script")));
                    }
                };
                let trigger = if kind == "on" {
                    Trigger::On(ReturnCode::parse(&what.as_str()).ok_or_else(|| {
                        TclError::bad_arg(format!(
                            "bad completion code \"{}\": must be ok, error, return, break, continue, or an integer",
                            what.as_str()
                        ))
                    })?)
                } else {
                    Trigger::Trap(list_arg(what)?)
                };
                let vars = list_arg(vars)?;
                if vars.len() > 2 {
                    return Err(TclError::bad_arg(
                        "handler variable list must name at most a result and an options variable",
                    ));
                }
                handlers.push(Handler { trigger, vars, script: script.as_str().into_owned() });
                i += 4;
            }
            "finally" => {
                let script = args
                    .get(i + 1)
                    .ok_or_else(|| clause_args("finally script"))?;
                if i + 2 != args.len() {
                    return Err(TclError::bad_arg("finally clause must be last"));
                }
                finally = Some(script.as_str().into_owned());
                i += 2;
            }
            other => {
                return Err(TclError::bad_arg(format!(
                    "bad handler type \"{other}\": must be finally, on, or trap"
                )))
            }
        }
    }
    if handlers.last().is_some_and(|h| h.script == "-") {
        return Err(TclError::bad_arg(
            "last non-finally clause must not have a body of \"-\"",
        ));
    }
    Ok((handlers, finally))
}

/// `try body ?on code varList script ...? ?trap pattern varList script ...?
/// ?finally script?`
///
/// The first matching handler runs in place of the body's outcome; a handler
/// body of `-` falls through to the next one.  `finally` runs on every
/// outcome, and only its own non-ok completion replaces the result.  Like
/// `catch`, an interrupted evaluation is never handled.
pub(crate) fn cmd_try(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "body ?handler ...? ?finally script?")?;
    let (handlers, finally) = parse_handlers(args)?;

    let mut result = interp.eval(&args[1].as_str());
    if is_interrupt(&result) {
        return result;
    }
    if let Err(Exception::Error(e)) = &mut result {
        e.append_info(&format!("(\"try\" body line {})", interp.error_line));
    }

    if !handlers.is_empty() {
        let (code, value, options) = completion(interp, &result);
        let error_code = match &result {
            Err(Exception::Error(e)) => split_list(&e.error_code).unwrap_or_default(),
            _ => Vec::new(),
        };
        if let Some(first) = handlers.iter().position(|h| h.fires(code, &error_code)) {
            // Validated above: the last handler has a real body.
            if let Some(chosen) = handlers[first..].iter().find(|h| h.script != "-") {
                let bound = [value, Value::Str(format_list(&options))];
                for (var, v) in chosen.vars.iter().zip(bound) {
                    interp.set_var(var, None, v)?;
                }
                result = interp.eval(&chosen.script);
            }
        }
    }

    if let Some(script) = finally {
        if is_interrupt(&result) {
            return result;
        }
        if let Err(mut e) = interp.eval(&script) {
            if let Some(err) = e.as_error_mut() {
                err.append_info(&format!("(\"finally\" body line {})", interp.error_line));
            }
            return Err(e);
        }
    }
    result
}

// ── Evaluation ────────────────────────────────────────────────────────────────

pub(crate) fn cmd_eval(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "arg ?arg ...?")?;
    let script = if args.len() == 2 { args[1].as_str().into_owned() } else { concat_words(&args[1..]) };
    interp.eval(&script)
}

/// `uplevel ?level? arg ?arg ...?`
pub(crate) fn cmd_uplevel(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "?level? command ?arg ...?")?;
    let (spec, words) = match args.get(1).map(|v| v.as_str()) {
        Some(first) if args.len() > 2 && looks_like_level(&first) => (first.into_owned(), &args[2..]),
        _ => ("1".to_owned(), &args[1..]),
    };
    let current = interp.current_level();
    let level = parse_level(&spec, current)
        .filter(|&l| l <= current)
        .ok_or_else(|| bad_level(&spec))?;
    let frame = interp.frame_at_level(level).ok_or_else(|| bad_level(&spec))?;
    let script = if words.len() == 1 { words[0].as_str().into_owned() } else { concat_words(words) };
    interp.eval_in_frame(frame, level, &script)
}

pub(crate) fn bad_level(spec: &str) -> TclError {
    TclError::new(ErrorKind::Frame, "bad-level", format!("bad level \"{spec}\""))
}

pub(crate) fn cmd_expr(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "arg ?arg ...?")?;
    if args.len() == 2 {
        return interp.eval_expr_str(&args[1].as_str());
    }
    let joined: Vec<String> = args[1..].iter().map(|a| a.as_str().into_owned()).collect();
    interp.eval_expr_str(&joined.join(" "))
}

/// `subst ?-nobackslashes? ?-nocommands? ?-novariables? string`
pub(crate) fn cmd_subst(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    const USAGE: &str = "?-nobackslashes? ?-nocommands? ?-novariables? string";
    arity(args, 1, None, USAGE)?;
    let mut flags = SubstFlags::default();
    let (text, opts) = args[1..].split_last().ok_or_else(|| usage(args, USAGE))?;
    for opt in opts {
        match &*opt.as_str() {
            "-nobackslashes" => flags.backslashes = false,
            "-nocommands" => flags.commands = false,
            "-novariables" => flags.variables = false,
            other => {
                return Err(TclError::bad_arg(format!(
                    "bad option \"{other}\": must be -nobackslashes, -nocommands, or -novariables"
                ))
                .into())
            }
        }
    }
    subst_text(interp, &text.as_str(), flags)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::script::error::ErrorKind;
    use crate::script::interp::Interpreter;
    use crate::script::status::{ReturnCode, Status};

    fn ok(interp: &mut Interpreter, src: &str) -> String {
        match interp.evaluate(src) {
            Status::Ok(v) => v.into_string(),
            other => panic!("{src}: {other:?}"),
        }
    }

    fn run(src: &str) -> String {
        ok(&mut Interpreter::new(), src)
    }

    #[test]
    fn if_chains() {
        assert_eq!(run("if {1} {set r a} else {set r b}"), "a");
        assert_eq!(run("if 0 then {set r a} elseif {2 > 1} then {set r b} else {set r c}"), "b");
        assert_eq!(run("if 0 {set r a} {set r implicit}"), "implicit");
        assert_eq!(run("if 0 {set r a}"), "");
        let mut i = Interpreter::new();
        let e = i.evaluate("if 1").error().cloned().unwrap();
        assert_eq!(e.message, "wrong # args: no script following \"1\" argument");
        let e = i.evaluate("if {abc} {}").error().cloned().unwrap();
        assert_eq!(e.kind, ErrorKind::Expression);
    }

    #[test]
    fn loops_and_levels() {
        assert_eq!(run("set s 0; for {set i 0} {$i < 5} {incr i} {incr s $i}; set s"), "10");
        assert_eq!(run("set n 0; while {$n < 10} {incr n; if {$n == 3} break}; set n"), "3");
        assert_eq!(
            run("set out {}; foreach i {1 2 3 4} {if {$i % 2} continue; lappend out $i}; set out"),
            "2 4"
        );
        let nested = "set r {}
            foreach a {1 2} {
                foreach b {x y} {
                    if {$b eq {y}} {continue 2}
                    lappend r $a$b
                }
                lappend r never
            }
            set r";
        assert_eq!(run(nested), "1x 2x");
        assert_eq!(run("set r 0; foreach a {1 2} {foreach b {1 2} {break 2}; set r bad}; set r"), "0");
    }

    #[test]
    fn foreach_multiple_lists() {
        assert_eq!(run("set r {}; foreach {a b} {1 2 3} {lappend r $a-$b}; set r"), "1-2 3-");
        assert_eq!(run("set r {}; foreach a {1 2} b {x y z} {lappend r $a$b}; set r"), "1x 2y z");
    }

    #[test]
    fn return_options() {
        assert_eq!(run("proc f {} {return -code ok v}; f"), "v");
        let mut i = Interpreter::new();
        ok(&mut i, "proc f {} {return -code error -errorcode {MY CODE} bad}");
        let e = i.evaluate("f").error().cloned().unwrap();
        assert_eq!(e.message, "bad");
        assert_eq!(ok(&mut i, "set errorCode"), "MY CODE");
        ok(&mut i, "proc inner {} {return -level 2 deep}; proc outer {} {inner; return shallow}");
        assert_eq!(ok(&mut i, "outer"), "deep");
        assert_eq!(ok(&mut i, "proc g {} {foreach x {1 2} {return -code break}}; catch g"), "3");
        assert_eq!(ok(&mut i, "return -level 0 same"), "same");
    }

    #[test]
    fn stray_break_in_proc() {
        let mut i = Interpreter::new();
        let e = i.evaluate("proc f {} {break}; f").error().cloned().unwrap();
        assert_eq!(e.message, "invoked \"break\" outside of a loop");
    }

    #[test]
    fn catch_codes_and_options() {
        let mut i = Interpreter::new();
        assert_eq!(ok(&mut i, "catch {error oops} msg"), "1");
        assert_eq!(ok(&mut i, "set msg"), "oops");
        assert_eq!(ok(&mut i, "catch {set x 1} msg"), "0");
        assert_eq!(ok(&mut i, "catch {return r} msg"), "2");
        assert_eq!(ok(&mut i, "set msg"), "r");
        assert_eq!(ok(&mut i, "catch break"), "3");
        assert_eq!(ok(&mut i, "catch continue"), "4");
        ok(&mut i, "catch {error m info CODE} r opts");
        assert_eq!(ok(&mut i, "lindex $opts 1"), "1");
        assert_eq!(ok(&mut i, "set errorCode"), "CODE");
        assert!(ok(&mut i, "set errorInfo").starts_with("info"));
    }

    #[test]
    fn switch_forms() {
        assert_eq!(run("switch b {a {set r 1} b {set r 2} default {set r 3}}"), "2");
        assert_eq!(run("switch zz a {set r 1} default {set r 3}"), "3");
        assert_eq!(run("switch q {a {set r 1}}"), "");
        assert_eq!(run("switch -glob abc {x* {set r x} a* {set r a}}"), "a");
        assert_eq!(run("switch -regexp -- abc123 {{^\\d} {set r d} {\\d+$} {set r tail}}"), "tail");
        assert_eq!(run("switch -nocase ABC {abc {set r lower}}"), "lower");
        assert_eq!(run("switch b {a - b - c {set r abc} d {set r d}}"), "abc");
        assert_eq!(run("switch -- -x {-x {set r dash}}"), "dash");
        assert_eq!(run("switch -x {-x {set r dash}}"), "dash");
        // `default` only acts as a catch-all in the last arm.
        assert_eq!(run("switch x {default {set r first} x {set r x}}"), "x");
        assert_eq!(run("set n 0; foreach i {1 2 3} {switch $i {2 break}; incr n}; set n"), "1");
    }

    #[test]
    fn switch_errors() {
        let mut i = Interpreter::new();
        let e = i.evaluate("switch a {a {set r 1} b}").error().cloned().unwrap();
        assert_eq!(e.message, "extra switch pattern with no body");
        let e = i.evaluate("switch a {a -}").error().cloned().unwrap();
        assert_eq!(e.message, "no body specified for pattern \"a\"");
        let e = i.evaluate("switch -bogus a {a b}").error().cloned().unwrap();
        assert!(e.message.starts_with("bad option \"-bogus\""), "{}", e.message);
        let e = i.evaluate("switch a").error().cloned().unwrap();
        assert_eq!(e.kind, ErrorKind::Arguments);
        let e = i.evaluate("switch a {a {error inner}}").error().cloned().unwrap();
        assert!(e.error_info.contains("(\"a\" arm line 1)"), "{}", e.error_info);
    }

    #[test]
    fn try_handlers() {
        let mut i = Interpreter::new();
        assert_eq!(ok(&mut i, "try {set x 1}"), "1");
        assert_eq!(ok(&mut i, "try {error oops} on error {msg} {set r caught:$msg}"), "caught:oops");
        assert_eq!(ok(&mut i, "try {set x 5} on ok {v} {expr {$v * 2}}"), "10");
        assert_eq!(
            ok(&mut i, "try {error a {} {POSIX ENOENT x}} trap {POSIX EACCES} {} {set r acc} trap {POSIX ENOENT} {m} {set r noent:$m}"),
            "noent:a"
        );
        assert_eq!(ok(&mut i, "try {error x} on error {m o} {lindex $o 1}"), "1");
        assert_eq!(ok(&mut i, "try break on break {} - on continue {} {set r loop}"), "loop");
        assert_eq!(ok(&mut i, "proc f {} {try {return early} on ok {} {set r ok}; return late}; f"), "early");
        // Unmatched outcomes pass through unchanged.
        let e = i.evaluate("try {error raw} on break {} {}").error().cloned().unwrap();
        assert_eq!(e.message, "raw");
        assert!(e.error_info.contains("(\"try\" body line 1)"), "{}", e.error_info);
        let e = i.evaluate("try {error first} on error {} {error second}").error().cloned().unwrap();
        assert_eq!(e.message, "second");
    }

    #[test]
    fn try_finally_runs_on_every_outcome() {
        let mut i = Interpreter::new();
        assert_eq!(ok(&mut i, "set log {}; try {lappend log body} finally {lappend log fin}; set log"), "body fin");

        ok(&mut i, "set log {}");
        let e = i.evaluate("try {error boom} finally {lappend log fin}").error().cloned().unwrap();
        assert_eq!(e.message, "boom");
        assert_eq!(ok(&mut i, "set log"), "fin");

        let src = "set log {}
            foreach n {1 2 3} {
                try {if {$n == 2} break; lappend log $n} finally {lappend log f$n}
            }
            set log";
        assert_eq!(ok(&mut i, src), "1 f1 f2");

        assert_eq!(ok(&mut i, "set log {}; try {error x} on error {} {lappend log handled} finally {lappend log fin}; set log"), "handled fin");
        // The finally result is discarded unless it fails.
        assert_eq!(ok(&mut i, "try {set v body} finally {set v fin}"), "body");
        let e = i.evaluate("try {set v body} finally {error late}").error().cloned().unwrap();
        assert_eq!(e.message, "late");
        assert!(e.error_info.contains("(\"finally\" body line 1)"), "{}", e.error_info);
    }

    #[test]
    fn try_clause_errors() {
        let mut i = Interpreter::new();
        let e = i.evaluate("try {} bogus {} {}").error().cloned().unwrap();
        assert_eq!(e.message, "bad handler type \"bogus\": must be finally, on, or trap");
        let e = i.evaluate("try {} on error {}").error().cloned().unwrap();
        assert_eq!(e.message, "wrong # args to on clause: must be \"... on code variableList script\"");
        let e = i.evaluate("try {} on nope {} {}").error().cloned().unwrap();
        assert!(e.message.starts_with("bad completion code \"nope\""), "{}", e.message);
        let e = i.evaluate("try {} finally {} on ok {} {}").error().cloned().unwrap();
        assert_eq!(e.message, "finally clause must be last");
        let e = i.evaluate("try {} on ok {} -").error().cloned().unwrap();
        assert_eq!(e.message, "last non-finally clause must not have a body of \"-\"");
    }

    #[test]
    fn error_defaults() {
        let mut i = Interpreter::new();
        i.evaluate("error plain");
        assert_eq!(ok(&mut i, "set errorCode"), "NONE");
        assert_eq!(
            ok(&mut i, "set errorInfo"),
            "plain\n    while executing\n\"error plain\""
        );
    }

    #[test]
    fn uplevel_targets_caller() {
        let mut i = Interpreter::new();
        ok(&mut i, "proc setter {} {uplevel 1 {set fromproc 7}}");
        assert_eq!(ok(&mut i, "setter; set fromproc"), "7");
        ok(&mut i, "proc deep {} {uplevel #0 set top 1}; proc mid {} {deep}");
        assert_eq!(ok(&mut i, "mid; set top"), "1");
        let e = i.evaluate("uplevel 5 {set x 1}").error().cloned().unwrap();
        assert_eq!(e.code, "bad-level");
        assert_eq!(i.frame_depth(), 1);
    }

    #[test]
    fn eval_expr_subst() {
        assert_eq!(run("eval set a {{x y}}; set a"), "x y");
        assert_eq!(run("expr 1 + 2"), "3");
        assert_eq!(run("set v 5; subst {v=$v [expr {$v*2}] \\t}"), "v=5 10 \t");
        assert_eq!(run("set v 5; subst -novariables {v=$v}"), "v=$v");
        assert_eq!(run("subst -nocommands {[x]}"), "[x]");
    }

    #[test]
    fn top_level_codes() {
        let mut i = Interpreter::new();
        assert_eq!(i.evaluate("continue").code(), ReturnCode::Continue);
        assert!(matches!(i.evaluate("break 2"), Status::Break { level: 2 }));
        let e = i.evaluate("break 0").error().cloned().unwrap();
        assert_eq!(e.kind, ErrorKind::Arguments);
    }
}
