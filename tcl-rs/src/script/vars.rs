//! Variable access: resolution, traces and aliases.
//!
//! A name resolves against the current frame.  Qualified names
//! (`::a::x`, `a::x`) go to the namespace frame instead; a relative
//! namespace is looked up under the current namespace first and then under
//! the global one.  Once the slot is found, alias links are followed to the
//! slot that owns the value, and the owning variable's traces fire there.

use std::collections::BTreeMap;

use super::error::{ErrorKind, TclError};
use super::frame::{
    absolute_ns, dangling, split_qualified, FrameId, FrameKind, FrameStats, TraceHandler, TraceOp,
    VarRef, VarState, VarTrace,
};
use super::interp::Interpreter;
use super::list::format_list;
use super::status::{Exception, TclResult};
use super::value::Value;
use crate::host::TraceEvent;

/// Handle returned by [`Interpreter::push_frame`].
pub type FrameHandle = FrameId;
/// Handle returned by [`Interpreter::resolve`].
pub type VarHandle = VarRef;

/// Split `a(k)` into (`a`, `Some("k")`).
pub fn split_var_name(name: &str) -> (&str, Option<&str>) {
    if let (Some(open), true) = (name.find('('), name.ends_with(')')) {
        if open > 0 {
            return (&name[..open], Some(&name[open + 1..name.len() - 1]));
        }
    }
    (name, None)
}

fn display_name(base: &str, index: Option<&str>) -> String {
    match index {
        Some(i) => format!("{base}({i})"),
        None => base.to_owned(),
    }
}

fn var_error(op: &str, display: &str, what: &str, code: &'static str) -> TclError {
    TclError::new(
        ErrorKind::Substitution,
        code,
        format!("can't {op} \"{display}\": {what}"),
    )
}

/// A failed read or write trace fails the access, except that an interrupt
/// keeps its kind so nothing can catch it.
fn trace_failure(op: &str, display: &str, e: TclError) -> TclError {
    if e.kind == ErrorKind::Interrupted {
        return e;
    }
    var_error(op, display, &e.message, e.code)
}

fn no_such_variable(op: &str, display: &str) -> TclError {
    var_error(op, display, "no such variable", "no-such-variable")
}

fn no_such_element(op: &str, display: &str) -> TclError {
    var_error(op, display, "no such element in array", "no-such-element")
}

fn is_array(op: &str, display: &str) -> TclError {
    var_error(op, display, "variable is array", "variable-is-array")
}

fn not_array(op: &str, display: &str) -> TclError {
    var_error(op, display, "variable isn't array", "not-an-array")
}

/// Combine the element an alias points at with the one being accessed.
fn merge_index(
    target: &VarRef,
    index: Option<&str>,
    op: &str,
    display: &str,
) -> Result<Option<String>, TclError> {
    match (&target.elem, index) {
        (Some(_), Some(_)) => Err(not_array(op, display)),
        (Some(e), None) => Ok(Some(e.clone())),
        (None, i) => Ok(i.map(str::to_owned)),
    }
}

/// Parse a level argument: `#n` is absolute, `n` is relative to `current`.
pub fn parse_level(arg: &str, current: usize) -> Option<usize> {
    if let Some(abs) = arg.strip_prefix('#') {
        return abs.parse::<usize>().ok();
    }
    let rel = arg.parse::<usize>().ok()?;
    current.checked_sub(rel)
}

/// `true` if `arg` has the form of a level (`#n` or `n`).
pub fn looks_like_level(arg: &str) -> bool {
    let digits = arg.strip_prefix('#').unwrap_or(arg);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Interpreter {
    // ── Resolution ────────────────────────────────────────────────────────────

    /// Namespace frame for the namespace part of a qualified name.
    fn namespace_frame(&self, from: FrameId, ns: &str, name: &str) -> Option<FrameId> {
        if name.starts_with("::") {
            let path = if ns.is_empty() { "::" } else { ns };
            return self.frames.namespace(path);
        }
        let current = self.frames.get(from).map_or("::", |f| f.namespace.as_str());
        self.frames
            .namespace(&absolute_ns(current, ns))
            .or_else(|| self.frames.namespace(&absolute_ns("::", ns)))
    }

    /// Slot `name` names when looked up from `from`.  With `create`, a
    /// missing slot is added (undefined).
    pub(crate) fn locate_from(
        &mut self,
        from: FrameId,
        name: &str,
        create: bool,
    ) -> Result<Option<(FrameId, usize)>, TclError> {
        let (ns, tail) = split_qualified(name);
        let frame = match ns {
            None => from,
            Some(ns) => match self.namespace_frame(from, ns, name) {
                Some(f) => f,
                None if create => {
                    return Err(TclError::new(
                        ErrorKind::Resolution,
                        "no-such-namespace",
                        format!("can't access \"{name}\": parent namespace doesn't exist"),
                    ))
                }
                None => return Ok(None),
            },
        };
        if create {
            Ok(Some((frame, self.frames.ensure_in(frame, tail)?)))
        } else {
            Ok(self.frames.lookup_in(frame, tail).map(|slot| (frame, slot)))
        }
    }

    fn locate(&mut self, name: &str, create: bool) -> Result<Option<(FrameId, usize)>, TclError> {
        let from = self.frames.current();
        self.locate_from(from, name, create)
    }

    /// The owning slot `name` refers to, following aliases.
    fn target(&mut self, name: &str, create: bool) -> Result<Option<VarRef>, TclError> {
        match self.locate(name, create)? {
            Some((frame, slot)) => self.frames.follow(frame, slot, name).map(Some),
            None => Ok(None),
        }
    }

    // ── Traces ────────────────────────────────────────────────────────────────

    /// Run the traces on `target` that match `op`.  Traces on a variable
    /// are suspended while one of them is running.
    fn fire_traces(
        &mut self,
        target: &VarRef,
        name1: &str,
        name2: Option<&str>,
        op: TraceOp,
    ) -> Result<(), TclError> {
        let traces: Vec<VarTrace> = match self.frames.variable(target) {
            Some(var) if !var.in_trace => var
                .traces
                .iter()
                .filter(|t| t.fires_for(op, name2))
                .cloned()
                .collect(),
            _ => return Ok(()),
        };
        if traces.is_empty() {
            return Ok(());
        }
        if let Some(var) = self.frames.variable_mut(target.frame, target.slot) {
            var.in_trace = true;
        }
        let mut outcome = Ok(());
        for t in &traces {
            let r = match &t.handler {
                TraceHandler::Script(prefix) => {
                    let cmd = format!(
                        "{prefix} {}",
                        format_list(&[name1, name2.unwrap_or(""), op.as_str()])
                    );
                    match self.eval(&cmd) {
                        Err(Exception::Error(e)) => Err(*e),
                        _ => Ok(()),
                    }
                }
                TraceHandler::Native(f) => f(self, name1, name2, op),
            };
            if let Err(e) = r {
                outcome = Err(e);
                break;
            }
        }
        if let Some(var) = self.frames.variable_mut(target.frame, target.slot) {
            var.in_trace = false;
        }
        outcome
    }

    fn emit(&self, event: TraceEvent) {
        if self.config.trace_variables {
            self.trace_sink.emit(&event);
        }
    }

    /// Fire unset traces for the traced locals of a frame about to be
    /// destroyed.
    pub(crate) fn release_frame(&mut self, frame: FrameId) {
        let traced = match self.frames.get(frame) {
            Some(f) => f.traced_slots(),
            None => return,
        };
        for (name, slot) in traced {
            let target = VarRef { frame, slot, elem: None };
            // Unset trace failures are not reported.
            let _ = self.fire_traces(&target, &name, None, TraceOp::Unset);
        }
    }

    // ── Read / write / unset ──────────────────────────────────────────────────

    /// Value of `name` (or `name(index)`).  Read traces run first, even on
    /// a variable that exists but has no value yet.
    pub fn read_var(&mut self, name: &str, index: Option<&str>) -> TclResult {
        Ok(self.read_var_inner(name, index)?)
    }

    fn read_var_inner(&mut self, name: &str, index: Option<&str>) -> Result<Value, TclError> {
        let (base, index) = match index {
            Some(i) => (name, Some(i)),
            None => split_var_name(name),
        };
        let display = display_name(base, index);
        let Some(target) = self.target(base, false)? else {
            self.emit(TraceEvent::VarRead { name: base.to_owned(), index: index.map(str::to_owned), value: None });
            return Err(no_such_variable("read", &display));
        };
        let elem = merge_index(&target, index, "read", &display)?;
        self.fire_traces(&target, base, elem.as_deref(), TraceOp::Read)
            .map_err(|e| trace_failure("read", &display, e))?;

        let var = self.frames.variable(&target).ok_or_else(|| dangling(base))?;
        let value = match (&var.state, elem.as_deref()) {
            (VarState::Scalar(v), None) => Ok(v.clone()),
            (VarState::Array(_), None) => Err(is_array("read", &display)),
            (VarState::Array(map), Some(k)) => {
                map.get(k).cloned().ok_or_else(|| no_such_element("read", &display))
            }
            (VarState::Scalar(_), Some(_)) => Err(not_array("read", &display)),
            (VarState::Undefined | VarState::Link(_), _) => Err(no_such_variable("read", &display)),
        };
        self.emit(TraceEvent::VarRead {
            name: base.to_owned(),
            index: elem.clone(),
            value: value.as_ref().ok().cloned(),
        });
        value
    }

    /// Assign `name` (or `name(index)`), creating it as needed.  Returns
    /// the value the variable holds after write traces ran.
    pub fn set_var(&mut self, name: &str, index: Option<&str>, value: Value) -> TclResult {
        Ok(self.set_var_inner(name, index, value)?)
    }

    fn set_var_inner(&mut self, name: &str, index: Option<&str>, value: Value) -> Result<Value, TclError> {
        let (base, index) = match index {
            Some(i) => (name, Some(i)),
            None => split_var_name(name),
        };
        let display = display_name(base, index);
        let target = self.target(base, true)?.ok_or_else(|| dangling(base))?;
        let elem = merge_index(&target, index, "set", &display)?;
        {
            let var = self
                .frames
                .variable_mut(target.frame, target.slot)
                .ok_or_else(|| dangling(base))?;
            match elem.as_deref() {
                None => {
                    if matches!(var.state, VarState::Array(_)) {
                        return Err(is_array("set", &display));
                    }
                    var.state = VarState::Scalar(value.clone());
                }
                Some(k) => match &mut var.state {
                    VarState::Array(map) => {
                        map.insert(k.to_owned(), value.clone());
                    }
                    VarState::Undefined => {
                        var.state = VarState::Array(BTreeMap::from([(k.to_owned(), value.clone())]));
                    }
                    VarState::Scalar(_) | VarState::Link(_) => return Err(not_array("set", &display)),
                },
            }
        }
        self.fire_traces(&target, base, elem.as_deref(), TraceOp::Write)
            .map_err(|e| trace_failure("set", &display, e))?;
        self.emit(TraceEvent::VarWrite { name: base.to_owned(), index: elem.clone(), value: value.clone() });
        Ok(self.peek(&target, elem.as_deref()).unwrap_or(value))
    }

    /// Current value at `target` without running traces.
    fn peek(&self, target: &VarRef, elem: Option<&str>) -> Option<Value> {
        match (&self.frames.variable(target)?.state, elem) {
            (VarState::Scalar(v), None) => Some(v.clone()),
            (VarState::Array(map), Some(k)) => map.get(k).cloned(),
            _ => None,
        }
    }

    /// Remove `name` (or one element).  With `complain`, a missing variable
    /// is an error.  Unset traces run afterwards; their errors are ignored.
    pub fn unset_var(&mut self, name: &str, index: Option<&str>, complain: bool) -> Result<(), TclError> {
        let (base, index) = match index {
            Some(i) => (name, Some(i)),
            None => split_var_name(name),
        };
        let display = display_name(base, index);
        let target = match self.target(base, false) {
            Ok(Some(t)) => t,
            Ok(None) if !complain => return Ok(()),
            Ok(None) => return Err(no_such_variable("unset", &display)),
            Err(_) if !complain => return Ok(()),
            Err(e) => return Err(e),
        };
        let elem = merge_index(&target, index, "unset", &display)?;
        let removed = match self.frames.variable_mut(target.frame, target.slot) {
            None => false,
            Some(var) => match elem.as_deref() {
                None if var.is_defined() => {
                    var.state = VarState::Undefined;
                    true
                }
                None => false,
                Some(k) => match &mut var.state {
                    VarState::Array(map) => map.remove(k).is_some(),
                    _ => false,
                },
            },
        };
        if !removed {
            if !complain {
                return Ok(());
            }
            return Err(if elem.is_some() {
                no_such_element("unset", &display)
            } else {
                no_such_variable("unset", &display)
            });
        }
        let _ = self.fire_traces(&target, base, elem.as_deref(), TraceOp::Unset);
        if elem.is_none() {
            if let Some(var) = self.frames.variable_mut(target.frame, target.slot) {
                var.traces.clear();
            }
        }
        self.emit(TraceEvent::VarUnset { name: base.to_owned(), index: elem });
        Ok(())
    }

    /// Whether `name` currently has a value.  Runs no traces.
    pub fn var_exists(&mut self, name: &str) -> bool {
        let (base, index) = split_var_name(name);
        let Ok(Some(target)) = self.target(base, false) else {
            return false;
        };
        let Ok(elem) = merge_index(&target, index, "read", name) else {
            return false;
        };
        match (self.frames.variable(&target).map(|v| &v.state), elem.as_deref()) {
            (Some(VarState::Scalar(_) | VarState::Array(_)), None) => true,
            (Some(VarState::Array(map)), Some(k)) => map.contains_key(k),
            _ => false,
        }
    }

    /// Elements of the array `name`, or `None` if it is not an array.
    pub fn array_contents(&mut self, name: &str) -> Option<BTreeMap<String, Value>> {
        let target = self.target(name, false).ok()??;
        match &self.frames.variable(&target)?.state {
            VarState::Array(map) if target.elem.is_none() => Some(map.clone()),
            _ => None,
        }
    }

    /// Turn an undefined `name` into an empty array; an existing array is
    /// left alone.
    pub fn make_array(&mut self, name: &str) -> Result<(), TclError> {
        let target = self.target(name, true)?.ok_or_else(|| dangling(name))?;
        let var = self
            .frames
            .variable_mut(target.frame, target.slot)
            .ok_or_else(|| dangling(name))?;
        match (&var.state, &target.elem) {
            (VarState::Undefined, None) => {
                var.state = VarState::Array(BTreeMap::new());
                Ok(())
            }
            (VarState::Array(_), None) => Ok(()),
            _ => Err(not_array("array set", name)),
        }
    }

    /// Variables visible in the current frame, sorted.
    pub(crate) fn visible_vars(&self) -> Vec<String> {
        self.frames
            .get(self.frames.current())
            .map(|f| f.var_names())
            .unwrap_or_default()
    }

    pub(crate) fn local_vars(&self) -> Vec<String> {
        match self.frames.get(self.frames.current()) {
            Some(f) if f.kind == FrameKind::Local => f.local_names(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn global_vars(&self) -> Vec<String> {
        self.frames
            .get(self.frames.global())
            .map(|f| f.var_names())
            .unwrap_or_default()
    }

    /// Convenience for hosts: read a global without going through the
    /// current frame.
    pub fn global_value(&mut self, name: &str) -> Option<Value> {
        let qualified = if name.starts_with("::") { name.to_owned() } else { format!("::{name}") };
        self.read_var(&qualified, None).ok()
    }

    pub fn set_global(&mut self, name: &str, value: Value) -> TclResult {
        let qualified = if name.starts_with("::") { name.to_owned() } else { format!("::{name}") };
        self.set_var(&qualified, None, value)
    }

    // ── Trace registration ────────────────────────────────────────────────────

    /// Attach a trace to `name` (or one element of it), creating the
    /// variable if needed.
    pub fn add_trace(&mut self, name: &str, trace: VarTrace) -> Result<(), TclError> {
        let (base, index) = split_var_name(name);
        let target = self.target(base, true)?.ok_or_else(|| dangling(base))?;
        let var = self
            .frames
            .variable_mut(target.frame, target.slot)
            .ok_or_else(|| dangling(base))?;
        let element = index.map(str::to_owned).or(target.elem);
        var.traces.push(VarTrace { element, ..trace });
        Ok(())
    }

    /// Remove the first script trace with the same ops and command.
    pub fn remove_trace(&mut self, name: &str, ops: &[TraceOp], command: &str) -> bool {
        let (base, index) = split_var_name(name);
        let Ok(Some(target)) = self.target(base, false) else {
            return false;
        };
        let Some(var) = self.frames.variable_mut(target.frame, target.slot) else {
            return false;
        };
        let pos = var.traces.iter().position(|t| {
            let same_ops = t.ops.len() == ops.len() && ops.iter().all(|op| t.ops.contains(op));
            let same_cmd = matches!(&t.handler, TraceHandler::Script(c) if c == command);
            same_ops && same_cmd && t.element.as_deref() == index
        });
        match pos {
            Some(i) => {
                var.traces.remove(i);
                true
            }
            None => false,
        }
    }

    /// `(ops, command)` for each script trace on `name`, newest first.
    pub fn trace_info(&mut self, name: &str) -> Vec<(Vec<TraceOp>, String)> {
        let (base, _) = split_var_name(name);
        let Ok(Some(target)) = self.target(base, false) else {
            return Vec::new();
        };
        self.frames
            .variable(&target)
            .map(|var| {
                var.traces
                    .iter()
                    .rev()
                    .filter_map(|t| match &t.handler {
                        TraceHandler::Script(cmd) => Some((t.ops.clone(), cmd.clone())),
                        TraceHandler::Native(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Aliases ───────────────────────────────────────────────────────────────

    /// Make `local` in the current frame refer to `target_name` as seen
    /// from `target_frame`.
    pub fn declare_alias(
        &mut self,
        local: &str,
        target_frame: FrameId,
        target_name: &str,
    ) -> Result<(), TclError> {
        if local.contains("::") || split_var_name(local).1.is_some() {
            return Err(TclError::bad_arg(format!(
                "bad variable name \"{local}\": can't create a scalar variable that looks like an array element"
            )));
        }
        let (base, index) = split_var_name(target_name);
        let (frame, slot) = self
            .locate_from(target_frame, base, true)?
            .ok_or_else(|| dangling(target_name))?;
        let target = VarRef { frame, slot, elem: index.map(str::to_owned) };
        let current = self.frames.current();
        self.frames.declare_alias(current, local, target)
    }

    /// Link `local` to `name` in the namespace variable table (`variable`,
    /// `global`).  A no-op when the current frame is that namespace.
    pub(crate) fn link_namespace_var(&mut self, ns_frame: FrameId, name: &str, local: &str) -> Result<(), TclError> {
        let current = self.frames.current();
        if current == ns_frame {
            self.frames.ensure_in(ns_frame, name)?;
            return Ok(());
        }
        let is_local = self.frames.get(current).is_some_and(|f| f.kind == FrameKind::Local);
        if !is_local {
            // A different namespace frame: the qualified name is reachable
            // already, nothing to link.
            self.frames.ensure_in(ns_frame, name)?;
            return Ok(());
        }
        if let Some(slot) = self.frames.lookup_in(current, local) {
            if let Some(VarState::Link(r)) = self.frames.get(current).and_then(|f| f.slot(slot)).map(|v| &v.state) {
                if r.frame == ns_frame {
                    return Ok(());
                }
            }
        }
        let target_slot = self.frames.ensure_in(ns_frame, name)?;
        self.frames
            .declare_alias(current, local, VarRef { frame: ns_frame, slot: target_slot, elem: None })
    }

    // ── Frame API ─────────────────────────────────────────────────────────────

    /// Push a new frame below the current one.
    pub fn push_frame(&mut self, kind: FrameKind) -> FrameHandle {
        let ns = self.frames.current_namespace().to_owned();
        self.frames.push(kind, &ns)
    }

    /// Pop the innermost frame, which must be `handle`.
    pub fn pop_frame(&mut self, handle: FrameHandle) -> Result<(), TclError> {
        self.release_frame(handle);
        self.frames.pop(handle)
    }

    /// Resolve `name` in the current frame to its owning slot, creating it.
    pub fn resolve(&mut self, name: &str) -> Result<VarHandle, TclError> {
        let (base, index) = split_var_name(name);
        let mut r = self.target(base, true)?.ok_or_else(|| dangling(base))?;
        if let Some(i) = index {
            r.elem = Some(i.to_owned());
        }
        Ok(r)
    }

    /// Frame active at an absolute level.
    pub fn frame_at_level(&self, level: usize) -> Option<FrameHandle> {
        self.frames.frame_at_level(level)
    }

    pub fn current_level(&self) -> usize {
        self.frames.current_level()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.depth()
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.frames.stats()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::status::Status;
    use std::sync::Arc;

    fn ok(interp: &mut Interpreter, src: &str) -> String {
        match interp.evaluate(src) {
            Status::Ok(v) => v.into_string(),
            other => panic!("{src}: {other:?}"),
        }
    }

    fn err(interp: &mut Interpreter, src: &str) -> TclError {
        match interp.evaluate(src) {
            Status::Error(e) => e,
            other => panic!("expected error from {src}, got {other:?}"),
        }
    }

    #[test]
    fn split_names() {
        assert_eq!(split_var_name("a(b c)"), ("a", Some("b c")));
        assert_eq!(split_var_name("a"), ("a", None));
        assert_eq!(split_var_name("(x)"), ("(x)", None));
        assert_eq!(split_var_name("a(b"), ("a(b", None));
    }

    #[test]
    fn levels() {
        assert_eq!(parse_level("1", 3), Some(2));
        assert_eq!(parse_level("#0", 3), Some(0));
        assert_eq!(parse_level("4", 3), None);
        assert!(looks_like_level("#2"));
        assert!(!looks_like_level("x"));
        assert!(!looks_like_level("#"));
    }

    #[test]
    fn scalar_and_array_errors() {
        let mut i = Interpreter::new();
        ok(&mut i, "set a(x) 1; set s 2");
        assert_eq!(err(&mut i, "set a").message, "can't read \"a\": variable is array");
        assert_eq!(err(&mut i, "set s(x)").message, "can't read \"s(x)\": variable isn't array");
        assert_eq!(err(&mut i, "set a(y)").message, "can't read \"a(y)\": no such element in array");
        assert_eq!(err(&mut i, "set a 5").message, "can't set \"a\": variable is array");
        let e = err(&mut i, "set nope");
        assert_eq!((e.kind, e.code), (ErrorKind::Substitution, "no-such-variable"));
    }

    #[test]
    fn unset_forms() {
        let mut i = Interpreter::new();
        ok(&mut i, "set a(x) 1; set a(y) 2; unset a(x)");
        assert_eq!(ok(&mut i, "array names a"), "y");
        assert_eq!(err(&mut i, "unset nope").message, "can't unset \"nope\": no such variable");
        ok(&mut i, "unset -nocomplain nope");
    }

    #[test]
    fn qualified_names() {
        let mut i = Interpreter::new();
        ok(&mut i, "namespace eval ns {variable v 3}");
        assert_eq!(ok(&mut i, "set ::ns::v"), "3");
        assert_eq!(ok(&mut i, "set ns::v"), "3");
        assert_eq!(ok(&mut i, "proc f {} {set ::g 4}; f; set g"), "4");
        assert_eq!(err(&mut i, "set ::missing::v 1").code, "no-such-namespace");
    }

    #[test]
    fn upvar_and_global() {
        let mut i = Interpreter::new();
        ok(&mut i, "set x 1; proc bump {name} {upvar 1 $name v; incr v}");
        assert_eq!(ok(&mut i, "bump x; set x"), "2");
        ok(&mut i, "proc g {} {global x; set x 10}");
        assert_eq!(ok(&mut i, "g; set x"), "10");
        ok(&mut i, "proc el {} {upvar #0 arr(k) e; set e v}");
        assert_eq!(ok(&mut i, "el; set arr(k)"), "v");
    }

    #[test]
    fn dangling_alias_is_a_frame_error() {
        let mut i = Interpreter::new();
        let e = err(&mut i, "proc f {} {set x 1; uplevel #0 {upvar #1 x g}}; f; set g");
        assert_eq!((e.kind, e.code), (ErrorKind::Frame, "dangling-alias"));
    }

    #[test]
    fn read_trace_can_supply_value() {
        let mut i = Interpreter::new();
        ok(&mut i, "proc fill {n1 n2 op} {upvar 1 $n1 v; set v filled}");
        ok(&mut i, "trace add variable lazy read fill");
        assert_eq!(ok(&mut i, "set lazy"), "filled");
    }

    #[test]
    fn write_trace_sees_new_value_and_can_rewrite() {
        let mut i = Interpreter::new();
        ok(&mut i, "set log {}; proc clamp {n1 n2 op} {upvar 1 $n1 v; lappend ::log $v; if {$v > 10} {set v 10}}");
        ok(&mut i, "trace add variable t write clamp");
        assert_eq!(ok(&mut i, "set t 50"), "10");
        assert_eq!(ok(&mut i, "set log"), "50");
    }

    #[test]
    fn trace_error_fails_access() {
        let mut i = Interpreter::new();
        ok(&mut i, "proc deny {args} {error denied}; set v 1; trace add variable v write deny");
        assert_eq!(err(&mut i, "set v 2").message, "can't set \"v\": denied");
    }

    #[test]
    fn interrupt_inside_trace_is_not_caught() {
        let mut i = Interpreter::new();
        let handle = i.interrupt_handle();
        i.register_command("halt", move |_: &mut Interpreter, _: &[Value]| -> TclResult {
            handle.interrupt();
            Ok(Value::default())
        });
        ok(&mut i, "proc stop {args} {halt; set never 1}; set v 1; trace add variable v write stop");
        let e = err(&mut i, "catch {set v 2}; set after 1");
        assert_eq!(e.kind, ErrorKind::Interrupted);
        assert_eq!(e.code, "interrupted");
        ok(&mut i, "set r 1; trace add variable r read stop");
        let e = err(&mut i, "catch {set r}; set after 1");
        assert_eq!(e.kind, ErrorKind::Interrupted);
        assert!(matches!(i.evaluate("info exists after"), Status::Ok(v) if v.as_str() == "0"));
    }

    #[test]
    fn unset_trace_on_proc_exit() {
        let mut i = Interpreter::new();
        ok(&mut i, "set gone {}; proc note {n1 n2 op} {lappend ::gone $n1-$op}");
        ok(&mut i, "proc f {} {set loc 1; trace add variable loc unset note}; f");
        assert_eq!(ok(&mut i, "set gone"), "loc-unset");
    }

    #[test]
    fn native_trace() {
        let mut i = Interpreter::new();
        let trace = VarTrace {
            ops: vec![TraceOp::Write],
            handler: TraceHandler::Native(Arc::new(|interp: &mut Interpreter, n1: &str, _: Option<&str>, _: TraceOp| {
                interp.set_global("seen", Value::from(n1)).map(|_| ()).map_err(|e| match e {
                    Exception::Error(e) => *e,
                    _ => TclError::script("unexpected"),
                })
            })),
            element: None,
        };
        i.add_trace("w", trace).unwrap();
        ok(&mut i, "set w 1");
        assert_eq!(i.global_value("seen"), Some(Value::from("w")));
    }

    #[test]
    fn frame_api() {
        let mut i = Interpreter::new();
        let before = i.frame_depth();
        let f = i.push_frame(FrameKind::Local);
        i.set_var("loc", None, Value::Int(1)).unwrap();
        assert_eq!(i.current_level(), 1);
        let g = i.frame_at_level(0).unwrap();
        i.declare_alias("gl", g, "shared").unwrap();
        i.set_var("gl", None, Value::Int(5)).unwrap();
        let h = i.resolve("gl").unwrap();
        assert_eq!(h.frame, g);
        i.pop_frame(f).unwrap();
        assert_eq!(i.frame_depth(), before);
        assert_eq!(i.global_value("shared"), Some(Value::Int(5)));
        let stats = i.frame_stats();
        assert_eq!(stats.pushes, stats.pops);
    }

    #[test]
    fn info_exists_runs_no_traces() {
        let mut i = Interpreter::new();
        ok(&mut i, "proc boom {args} {error no}; trace add variable q read boom");
        assert_eq!(ok(&mut i, "info exists q"), "0");
        ok(&mut i, "set q 1");
        assert_eq!(ok(&mut i, "info exists q"), "1");
    }
}
