//! Procedures, lambdas, namespaces, command aliases and introspection.

use std::sync::Arc;

use super::control::bad_level;
use super::{arity, concat_words, int_arg, list_arg, subcommand, usage};
use crate::pattern::glob_match;
use crate::script::error::{ErrorKind, TclError};
use crate::script::frame::{absolute_ns, split_qualified};
use crate::script::interp::{CommandDef, Interpreter, Proc};
use crate::script::lexer::is_complete;
use crate::script::list::format_list;
use crate::script::status::{Exception, TclResult};
use crate::script::value::Value;

pub(crate) fn cmd_proc(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 3, Some(3), "name args body")?;
    interp.define_proc(&args[1].as_str(), &args[2].as_str(), &args[3].as_str())?;
    Ok(Value::default())
}

pub(crate) fn cmd_rename(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 2, Some(2), "oldName newName")?;
    interp.rename_command(&args[1].as_str(), &args[2].as_str())?;
    Ok(Value::default())
}

/// `apply {params body ?namespace?} ?arg ...?`
pub(crate) fn cmd_apply(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "lambdaExpr ?arg ...?")?;
    let lambda = args[1].as_str();
    let fields = list_arg(&args[1])?;
    let (params, body, ns) = match fields.as_slice() {
        [p, b] => (p, b, "::".to_owned()),
        [p, b, ns] => (p, b, absolute_ns("::", ns)),
        _ => {
            return Err(TclError::bad_arg(format!(
                "can't interpret \"{lambda}\" as a lambda expression"
            ))
            .into())
        }
    };
    if interp.frames.namespace(&ns).is_none() {
        return Err(unknown_namespace(&ns).into());
    }
    let proc = Proc::new("apply", &ns, params, body)?;
    let mut words = Vec::with_capacity(args.len() - 1);
    words.push(Value::from("apply lambdaExpr"));
    words.extend_from_slice(&args[2..]);
    interp.invoke_proc(&proc, &words)
}

fn unknown_namespace(ns: &str) -> TclError {
    TclError::new(
        ErrorKind::Resolution,
        "no-such-namespace",
        format!("namespace \"{ns}\" not found"),
    )
}

// ── info ──────────────────────────────────────────────────────────────────────

const INFO_OPTIONS: &[&str] = &[
    "args", "body", "commands", "complete", "default", "exists", "globals", "level", "locals",
    "procs", "script", "vars",
];

fn proc_named(interp: &Interpreter, name: &str) -> Result<Arc<Proc>, TclError> {
    match interp.lookup_command(name) {
        Some(CommandDef::Proc(p)) => Ok(p),
        _ => Err(TclError::bad_arg(format!("\"{name}\" isn't a procedure"))),
    }
}

fn filtered(names: Vec<String>, pattern: Option<&Value>) -> Value {
    let names: Vec<String> = match pattern {
        Some(p) => {
            let p = p.as_str();
            names.into_iter().filter(|n| glob_match(&p, n, false)).collect()
        }
        None => names,
    };
    Value::Str(format_list(&names))
}

pub(crate) fn cmd_info(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "subcommand ?arg ...?")?;
    let option = subcommand("subcommand", &args[1].as_str(), INFO_OPTIONS)?;
    match option {
        "exists" => {
            arity(args, 2, Some(2), "exists varName")?;
            Ok(Value::from(interp.var_exists(&args[2].as_str())))
        }
        "level" => {
            arity(args, 1, Some(2), "level ?number?")?;
            let current = interp.current_level();
            let Some(n) = args.get(2) else {
                return Ok(Value::from(current));
            };
            let n = int_arg(n)?;
            let level = if n > 0 { Some(n as usize) } else { current.checked_sub(n.unsigned_abs() as usize) };
            let words = level
                .filter(|&l| l >= 1 && l <= current)
                .and_then(|l| interp.frames.call_at_level(l))
                .ok_or_else(|| bad_level(&n.to_string()))?;
            let words: Vec<String> = words.iter().map(|w| w.as_str().into_owned()).collect();
            Ok(Value::Str(format_list(&words)))
        }
        "commands" | "procs" => {
            arity(args, 1, Some(2), &format!("{option} ?pattern?"))?;
            let pattern = args.get(2).map(|p| p.as_str().into_owned());
            let names = interp.command_names(pattern.as_deref(), option == "procs");
            Ok(Value::Str(format_list(&names)))
        }
        "args" => {
            arity(args, 2, Some(2), "args procname")?;
            let proc = proc_named(interp, &args[2].as_str())?;
            let names: Vec<&str> = proc.params.iter().map(|p| p.name.as_str()).collect();
            Ok(Value::Str(format_list(&names)))
        }
        "body" => {
            arity(args, 2, Some(2), "body procname")?;
            Ok(Value::Str(proc_named(interp, &args[2].as_str())?.body.clone()))
        }
        "default" => {
            arity(args, 4, Some(4), "default procname arg varname")?;
            let name = args[2].as_str();
            let proc = proc_named(interp, &name)?;
            let arg = args[3].as_str();
            let param = proc.params.iter().find(|p| p.name == arg).ok_or_else(|| {
                TclError::bad_arg(format!("procedure \"{name}\" doesn't have an argument \"{arg}\""))
            })?;
            let var = args[4].as_str();
            match &param.default {
                Some(d) => {
                    interp.set_var(&var, None, d.clone())?;
                    Ok(Value::from(true))
                }
                None => {
                    interp.set_var(&var, None, Value::default())?;
                    Ok(Value::from(false))
                }
            }
        }
        "vars" => {
            arity(args, 1, Some(2), "vars ?pattern?")?;
            Ok(filtered(interp.visible_vars(), args.get(2)))
        }
        "locals" => {
            arity(args, 1, Some(2), "locals ?pattern?")?;
            Ok(filtered(interp.local_vars(), args.get(2)))
        }
        "globals" => {
            arity(args, 1, Some(2), "globals ?pattern?")?;
            Ok(filtered(interp.global_vars(), args.get(2)))
        }
        "script" => {
            arity(args, 1, Some(1), "script")?;
            Ok(Value::Str(interp.script_file.clone().unwrap_or_default()))
        }
        "complete" => {
            arity(args, 2, Some(2), "complete command")?;
            Ok(Value::from(is_complete(&args[2].as_str())))
        }
        _ => Err(usage(args, "subcommand ?arg ...?").into()),
    }
}

// ── namespace ─────────────────────────────────────────────────────────────────

const NAMESPACE_OPTIONS: &[&str] =
    &["children", "current", "delete", "eval", "exists", "qualifiers", "tail"];

pub(crate) fn cmd_namespace(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "subcommand ?arg ...?")?;
    let option = subcommand("subcommand", &args[1].as_str(), NAMESPACE_OPTIONS)?;
    let current = interp.frames.current_namespace().to_owned();
    match option {
        "current" => {
            arity(args, 1, Some(1), "current")?;
            Ok(Value::Str(current))
        }
        "eval" => {
            arity(args, 3, None, "eval name arg ?arg ...?")?;
            let path = absolute_ns(&current, &args[2].as_str());
            let frame = interp.frames.ensure_namespace(&path);
            let script = if args.len() == 4 { args[3].as_str().into_owned() } else { concat_words(&args[3..]) };
            let level = interp.current_level() + 1;
            let mut result = interp.eval_in_frame(frame, level, &script);
            if let Err(Exception::Error(e)) = &mut result {
                e.append_info(&format!(
                    "(in namespace eval \"{path}\" script line {})",
                    interp.error_line
                ));
            }
            result
        }
        "exists" => {
            arity(args, 2, Some(2), "exists name")?;
            let path = absolute_ns(&current, &args[2].as_str());
            Ok(Value::from(interp.frames.namespace(&path).is_some()))
        }
        "delete" => {
            for name in &args[2..] {
                let path = absolute_ns(&current, &name.as_str());
                if interp.frames.namespace(&path).is_none() {
                    return Err(TclError::bad_arg(format!(
                        "unknown namespace \"{}\" in namespace delete command",
                        name.as_str()
                    ))
                    .into());
                }
                for ns in interp.frames.delete_namespace(&path) {
                    let prefix = format!("{ns}::");
                    interp.commands.retain(|key, _| !key.starts_with(&prefix));
                }
            }
            Ok(Value::default())
        }
        "children" => {
            arity(args, 1, Some(3), "children ?name? ?pattern?")?;
            let path = match args.get(2) {
                Some(n) => absolute_ns(&current, &n.as_str()),
                None => current,
            };
            if interp.frames.namespace(&path).is_none() {
                return Err(unknown_namespace(&path).into());
            }
            Ok(filtered(interp.frames.child_namespaces(&path), args.get(3)))
        }
        "qualifiers" => {
            arity(args, 2, Some(2), "qualifiers string")?;
            let name = args[2].as_str();
            Ok(Value::from(split_qualified(&name).0.unwrap_or("")))
        }
        "tail" => {
            arity(args, 2, Some(2), "tail string")?;
            let name = args[2].as_str();
            Ok(Value::from(split_qualified(&name).1))
        }
        _ => Err(usage(args, "subcommand ?arg ...?").into()),
    }
}

// ── interp alias ──────────────────────────────────────────────────────────────

/// `interp alias {} name ?{} target ?arg ...??`.  Only the current
/// interpreter (`{}`) can be named.
pub(crate) fn cmd_interp(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "cmd ?arg ...?")?;
    subcommand("option", &args[1].as_str(), &["alias"])?;
    arity(args, 3, None, "alias srcPath srcCmd ?targetPath targetCmd ?arg ...??")?;
    let check_path = |path: &Value| -> Result<(), TclError> {
        if path.is_empty() {
            Ok(())
        } else {
            Err(TclError::new(
                ErrorKind::Resolution,
                "no-such-interp",
                format!("could not find interpreter \"{}\"", path.as_str()),
            ))
        }
    };
    check_path(&args[2])?;
    let name = args[3].as_str();
    match args.len() {
        // Describe an alias.
        4 => match interp.lookup_command(&name) {
            Some(CommandDef::Alias(target)) => {
                let words: Vec<String> = target.iter().map(|w| w.as_str().into_owned()).collect();
                Ok(Value::Str(format_list(&words)))
            }
            _ => Err(TclError::bad_arg(format!("alias \"{name}\" not found")).into()),
        },
        // Delete with an empty target.
        5 if args[4].is_empty() => {
            interp.rename_command(&name, "")?;
            Ok(Value::default())
        }
        5 => Err(usage(args, "alias srcPath srcCmd ?targetPath targetCmd ?arg ...??").into()),
        _ => {
            check_path(&args[4])?;
            interp.define_alias(&name, args[5..].to_vec())?;
            Ok(Value::Str(name.into_owned()))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::status::Status;

    fn ok(interp: &mut Interpreter, src: &str) -> String {
        match interp.evaluate(src) {
            Status::Ok(v) => v.into_string(),
            other => panic!("{src}: {other:?}"),
        }
    }

    fn fails(interp: &mut Interpreter, src: &str) -> TclError {
        match interp.evaluate(src) {
            Status::Error(e) => e,
            other => panic!("expected error from {src}, got {other:?}"),
        }
    }

    #[test]
    fn rename_and_delete() {
        let mut i = Interpreter::new();
        ok(&mut i, "proc f {} {return f}; rename f g");
        assert_eq!(ok(&mut i, "g"), "f");
        assert_eq!(fails(&mut i, "f").code, "unknown-command");
        ok(&mut i, "rename g {}");
        assert_eq!(fails(&mut i, "g").code, "unknown-command");
        assert_eq!(
            fails(&mut i, "rename nope x").message,
            "can't rename \"nope\": command doesn't exist"
        );
        ok(&mut i, "rename set assign");
        assert_eq!(ok(&mut i, "assign v 3"), "3");
    }

    #[test]
    fn apply_lambdas() {
        let mut i = Interpreter::new();
        assert_eq!(ok(&mut i, "apply {{x {y 10}} {expr {$x + $y}}} 1"), "11");
        assert_eq!(ok(&mut i, "apply {args {llength $args}} a b c"), "3");
        ok(&mut i, "namespace eval lam {proc helper {} {return inside}}");
        assert_eq!(ok(&mut i, "apply {{} {helper} lam}"), "inside");
        assert_eq!(
            fails(&mut i, "apply {{x} {}}").message,
            "wrong # args: should be \"apply lambdaExpr x\""
        );
        assert!(ok(&mut i, "catch {apply {a b c d}}") == "1");
        assert_eq!(i.frame_depth(), 1);
    }

    #[test]
    fn info_introspection() {
        let mut i = Interpreter::new();
        ok(&mut i, "proc sample {a {b dflt} args} {return body}");
        assert_eq!(ok(&mut i, "info args sample"), "a b args");
        assert_eq!(ok(&mut i, "info body sample"), "return body");
        assert_eq!(ok(&mut i, "info default sample b d"), "1");
        assert_eq!(ok(&mut i, "set d"), "dflt");
        assert_eq!(ok(&mut i, "info default sample a d"), "0");
        assert!(fails(&mut i, "info default sample zz d").message.contains("doesn't have an argument"));
        assert_eq!(ok(&mut i, "info procs samp*"), "sample");
        assert_eq!(ok(&mut i, "info commands lappen*"), "lappend");
        assert_eq!(ok(&mut i, "info complete {set a \\{}"), "1");
        assert_eq!(ok(&mut i, "info complete {set a \"}"), "0");
        assert_eq!(ok(&mut i, "info script"), "");
        assert_eq!(fails(&mut i, "info args set").message, "\"set\" isn't a procedure");
    }

    #[test]
    fn info_levels_and_vars() {
        let mut i = Interpreter::new();
        assert_eq!(ok(&mut i, "info level"), "0");
        ok(&mut i, "proc lv {args} {info level 0}; proc depth {} {info level}");
        assert_eq!(ok(&mut i, "lv x {y z}"), "lv x {y z}");
        assert_eq!(ok(&mut i, "depth"), "1");
        ok(&mut i, "proc outer {} {inner}; proc inner {} {info level -1}");
        assert_eq!(ok(&mut i, "outer"), "outer");
        ok(&mut i, "set gv 1; proc lister {p} {set loc 2; global gv; info locals}");
        assert_eq!(ok(&mut i, "lister q"), "loc p");
        ok(&mut i, "proc visible {} {set loc 2; global gv; info vars}");
        assert_eq!(ok(&mut i, "visible"), "gv loc");
        assert!(ok(&mut i, "info globals g*").split(' ').any(|n| n == "gv"));
    }

    #[test]
    fn namespaces() {
        let mut i = Interpreter::new();
        assert_eq!(ok(&mut i, "namespace current"), "::");
        assert_eq!(ok(&mut i, "namespace eval a::b {namespace current}"), "::a::b");
        assert_eq!(ok(&mut i, "namespace exists a"), "1");
        assert_eq!(ok(&mut i, "namespace children"), "::a ::tcl");
        assert_eq!(ok(&mut i, "namespace children :: ::a*"), "::a");
        assert_eq!(ok(&mut i, "namespace children a"), "::a::b");
        assert_eq!(ok(&mut i, "namespace qualifiers ::a::b::c"), "::a::b");
        assert_eq!(ok(&mut i, "namespace tail ::a::b::c"), "c");
        assert_eq!(ok(&mut i, "namespace eval a {proc f {} {return af}}; a::f"), "af");
        assert_eq!(ok(&mut i, "namespace eval a {f}"), "af");
        ok(&mut i, "namespace delete a");
        assert_eq!(ok(&mut i, "namespace exists a::b"), "0");
        assert_eq!(fails(&mut i, "a::f").code, "unknown-command");
        assert!(fails(&mut i, "namespace delete a").message.starts_with("unknown namespace"));
    }

    #[test]
    fn namespace_eval_pushes_a_level() {
        let mut i = Interpreter::new();
        ok(&mut i, "set top 0; namespace eval n {uplevel 1 {set top 1}}");
        assert_eq!(ok(&mut i, "set top"), "1");
        let e = fails(&mut i, "namespace eval n {error bad}");
        assert!(e.error_info.contains("(in namespace eval \"::n\" script line 1)"));
        assert_eq!(i.frame_depth(), 1);
        ok(&mut i, "namespace eval n::m {}");
        assert_eq!(ok(&mut i, "namespace eval n::m {set x [namespace current]}"), "::n::m");
        assert_eq!(ok(&mut i, "set n::m::x"), "::n::m");
    }

    #[test]
    fn deleting_a_namespace_dangles_its_aliases() {
        let mut i = Interpreter::new();
        ok(&mut i, "namespace eval gone {variable v 1}");
        ok(&mut i, "proc f {} {namespace delete gone; upvar #0 keep k; set k 1}; f");
        ok(&mut i, "namespace eval gone2 {variable v 1}");
        let e = fails(
            &mut i,
            "proc g {} {variable ::gone2::v; namespace delete ::gone2; set v}; g",
        );
        assert_eq!((e.kind, e.code), (ErrorKind::Frame, "dangling-alias"));
    }

    #[test]
    fn interp_alias() {
        let mut i = Interpreter::new();
        ok(&mut i, "interp alias {} say {} list hello");
        assert_eq!(ok(&mut i, "say world"), "hello world");
        assert_eq!(ok(&mut i, "interp alias {} say"), "list hello");
        ok(&mut i, "interp alias {} say {}");
        assert_eq!(fails(&mut i, "say x").code, "unknown-command");
        assert_eq!(fails(&mut i, "interp alias other x {} list").code, "no-such-interp");
    }
}
