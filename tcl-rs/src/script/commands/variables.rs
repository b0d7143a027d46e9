//! Variable commands: assignment, linking, arrays and traces.

use super::control::bad_level;
use super::{arity, int_arg, list_arg, subcommand, usage};
use crate::pattern::glob_match;
use crate::script::error::TclError;
use crate::script::frame::{absolute_ns, join_ns, split_qualified, FrameKind, TraceHandler, TraceOp, VarTrace};
use crate::script::interp::Interpreter;
use crate::script::list::format_list;
use crate::script::status::{Exception, TclResult};
use crate::script::value::Value;
use crate::script::vars::parse_level;

pub(crate) fn cmd_set(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(2), "varName ?newValue?")?;
    let name = args[1].as_str();
    match args.get(2) {
        None => interp.read_var(&name, None),
        Some(v) => interp.set_var(&name, None, v.clone()),
    }
}

/// `unset ?-nocomplain? ?--? ?name ...?`
pub(crate) fn cmd_unset(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let mut complain = true;
    let mut i = 1;
    while let Some(opt) = args.get(i) {
        match &*opt.as_str() {
            "-nocomplain" => complain = false,
            "--" => {
                i += 1;
                break;
            }
            _ => break,
        }
        i += 1;
    }
    for name in &args[i..] {
        interp.unset_var(&name.as_str(), None, complain)?;
    }
    Ok(Value::default())
}

pub(crate) fn cmd_incr(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, Some(2), "varName ?increment?")?;
    let name = args[1].as_str();
    let by = args.get(2).map(int_arg).transpose()?.unwrap_or(1);
    let current = match interp.read_var(&name, None) {
        Ok(v) => int_arg(&v)?,
        Err(Exception::Error(e)) if e.code == "no-such-variable" => 0,
        Err(e) => return Err(e),
    };
    interp.set_var(&name, None, Value::Int(current.wrapping_add(by)))
}

pub(crate) fn cmd_append(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "varName ?value ...?")?;
    let name = args[1].as_str();
    let mut text = match interp.read_var(&name, None) {
        Ok(v) => v.into_string(),
        Err(Exception::Error(e)) if e.code == "no-such-variable" => String::new(),
        Err(e) => return Err(e),
    };
    if args.len() == 2 {
        // Nothing to add, but the variable must still exist afterwards.
        return interp.set_var(&name, None, Value::Str(text));
    }
    for v in &args[2..] {
        text.push_str(&v.as_str());
    }
    interp.set_var(&name, None, Value::Str(text))
}

/// `global name ...`: only meaningful inside a procedure.
pub(crate) fn cmd_global(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "varName ?varName ...?")?;
    let in_proc = interp
        .frames
        .get(interp.frames.current())
        .is_some_and(|f| f.kind == FrameKind::Local);
    if !in_proc {
        return Ok(Value::default());
    }
    let global = interp.frames.global();
    for name in &args[1..] {
        let name = name.as_str();
        let (_, tail) = split_qualified(&name);
        interp.declare_alias(tail, global, &name)?;
    }
    Ok(Value::default())
}

/// `upvar ?level? otherVar myVar ?otherVar myVar ...?`
pub(crate) fn cmd_upvar(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    const USAGE: &str = "?level? otherVar localVar ?otherVar localVar ...?";
    arity(args, 2, None, USAGE)?;
    // An odd number of words after the command name means a level was given.
    let (spec, pairs) = if (args.len() - 1) % 2 == 1 {
        (args[1].as_str().into_owned(), &args[2..])
    } else {
        ("1".to_owned(), &args[1..])
    };
    if pairs.is_empty() {
        return Err(usage(args, USAGE).into());
    }
    let current = interp.current_level();
    let level = parse_level(&spec, current)
        .filter(|&l| l <= current)
        .ok_or_else(|| bad_level(&spec))?;
    let frame = interp.frame_at_level(level).ok_or_else(|| bad_level(&spec))?;
    for pair in pairs.chunks(2) {
        interp.declare_alias(&pair[1].as_str(), frame, &pair[0].as_str())?;
    }
    Ok(Value::default())
}

/// `variable ?name value ...? name ?value?`
pub(crate) fn cmd_variable(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 1, None, "?name value ...? name ?value?")?;
    let current_ns = interp.frames.current_namespace().to_owned();
    for pair in args[1..].chunks(2) {
        let name = pair[0].as_str();
        let (qualifier, tail) = split_qualified(&name);
        let ns = match qualifier {
            None => current_ns.clone(),
            Some("") => "::".to_owned(),
            Some(q) if name.starts_with("::") => q.to_owned(),
            Some(q) => absolute_ns(&current_ns, q),
        };
        let ns_frame = interp.frames.namespace(&ns).ok_or_else(|| {
            TclError::new(
                crate::script::error::ErrorKind::Resolution,
                "no-such-namespace",
                format!("can't define \"{name}\": parent namespace doesn't exist"),
            )
        })?;
        interp.link_namespace_var(ns_frame, tail, tail)?;
        if let Some(value) = pair.get(1) {
            interp.set_var(&join_ns(&ns, tail), None, value.clone())?;
        }
    }
    Ok(Value::default())
}

// ── array ─────────────────────────────────────────────────────────────────────

const ARRAY_OPTIONS: &[&str] = &["exists", "get", "names", "set", "size", "unset"];

pub(crate) fn cmd_array(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 2, None, "option arrayName ?arg ...?")?;
    let option = subcommand("option", &args[1].as_str(), ARRAY_OPTIONS)?;
    let name = args[2].as_str();
    let pattern = args.get(3).map(|p| p.as_str().into_owned());
    let matching = |key: &str| pattern.as_deref().map_or(true, |p| glob_match(p, key, false));

    match option {
        "exists" => {
            arity(args, 2, Some(2), "exists arrayName")?;
            Ok(Value::from(interp.array_contents(&name).is_some()))
        }
        "size" => {
            arity(args, 2, Some(2), "size arrayName")?;
            Ok(Value::from(interp.array_contents(&name).map_or(0, |m| m.len())))
        }
        "names" => {
            arity(args, 2, Some(3), "names arrayName ?pattern?")?;
            let keys: Vec<String> = interp
                .array_contents(&name)
                .unwrap_or_default()
                .into_keys()
                .filter(|k| matching(k))
                .collect();
            Ok(Value::Str(format_list(&keys)))
        }
        "get" => {
            arity(args, 2, Some(3), "get arrayName ?pattern?")?;
            let mut flat = Vec::new();
            for (k, v) in interp.array_contents(&name).unwrap_or_default() {
                if matching(&k) {
                    flat.push(k);
                    flat.push(v.into_string());
                }
            }
            Ok(Value::Str(format_list(&flat)))
        }
        "set" => {
            arity(args, 3, Some(3), "set arrayName list")?;
            let items = list_arg(&args[3])?;
            if items.len() % 2 != 0 {
                return Err(TclError::bad_arg("list must have an even number of elements").into());
            }
            interp.make_array(&name)?;
            for kv in items.chunks(2) {
                interp.set_var(&name, Some(&kv[0]), Value::Str(kv[1].clone()))?;
            }
            Ok(Value::default())
        }
        "unset" => {
            arity(args, 2, Some(3), "unset arrayName ?pattern?")?;
            if pattern.is_none() {
                interp.unset_var(&name, None, false)?;
                return Ok(Value::default());
            }
            let keys: Vec<String> = interp
                .array_contents(&name)
                .unwrap_or_default()
                .into_keys()
                .filter(|k| matching(k))
                .collect();
            for k in keys {
                interp.unset_var(&name, Some(&k), false)?;
            }
            Ok(Value::default())
        }
        _ => Err(usage(args, "option arrayName ?arg ...?").into()),
    }
}

// ── trace ─────────────────────────────────────────────────────────────────────

fn parse_ops(spec: &Value) -> Result<Vec<TraceOp>, TclError> {
    let ops = list_arg(spec)?
        .iter()
        .map(|op| {
            TraceOp::parse(op).ok_or_else(|| {
                TclError::bad_arg(format!("bad operation \"{op}\": must be read, unset, or write"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ops.is_empty() {
        return Err(TclError::bad_arg("bad operation list \"\": must be one or more of read, unset, or write"));
    }
    Ok(ops)
}

/// `trace add|remove|info variable name ?ops command?`
pub(crate) fn cmd_trace(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    arity(args, 3, None, "option type name ?arg ...?")?;
    let option = subcommand("option", &args[1].as_str(), &["add", "info", "remove"])?;
    subcommand("type", &args[2].as_str(), &["variable"])?;
    match option {
        "add" | "remove" => {
            arity(args, 5, Some(5), &format!("{option} variable name opList command"))?;
            let name = args[3].as_str();
            let ops = parse_ops(&args[4])?;
            let command = args[5].as_str().into_owned();
            if option == "add" {
                let trace = VarTrace { ops, handler: TraceHandler::Script(command), element: None };
                interp.add_trace(&name, trace)?;
            } else {
                interp.remove_trace(&name, &ops, &command);
            }
            Ok(Value::default())
        }
        _ => {
            arity(args, 3, Some(3), "info variable name")?;
            let entries: Vec<String> = interp
                .trace_info(&args[3].as_str())
                .into_iter()
                .map(|(ops, cmd)| {
                    let names: Vec<&str> = ops.iter().map(|op| op.as_str()).collect();
                    format_list(&[format_list(&names), cmd])
                })
                .collect();
            Ok(Value::Str(format_list(&entries)))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
