//! Call frames.
//!
//! Frames live in an arena keyed by [`FrameId`]; ids are never reused, so a
//! stale id simply fails to resolve.  The call stack is a list of entries
//! pointing into the arena.  A procedure call pushes a fresh frame and pops
//! (destroys) it on return; `uplevel` and `namespace eval` push an entry for
//! a frame that already exists and leave it alive when they pop.
//!
//! Variables sit in per-frame slot vectors.  An alias (`upvar`, `global`,
//! `variable`) is a slot whose state is a [`VarRef`] into another frame's
//! slot, resolved on every access.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::error::{ErrorKind, TclError};
use super::interp::Interpreter;
use super::value::Value;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Stable handle of a frame in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Global,
    Local,
    Namespace,
}

/// A reference to a variable slot (optionally one array element).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    pub frame: FrameId,
    pub slot: usize,
    pub elem: Option<String>,
}

// ── Traces ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    Read,
    Write,
    Unset,
}

impl TraceOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TraceOp::Read => "read",
            TraceOp::Write => "write",
            TraceOp::Unset => "unset",
        }
    }

    pub fn parse(s: &str) -> Option<TraceOp> {
        match s {
            "read" => Some(TraceOp::Read),
            "write" => Some(TraceOp::Write),
            "unset" => Some(TraceOp::Unset),
            _ => None,
        }
    }
}

/// Host callback for a variable trace: `(interp, name1, name2, op)`.
pub type NativeTrace =
    Arc<dyn Fn(&mut Interpreter, &str, Option<&str>, TraceOp) -> Result<(), TclError> + Send + Sync>;

#[derive(Clone)]
pub enum TraceHandler {
    /// Command prefix; invoked as `prefix name1 name2 op`.
    Script(String),
    Native(NativeTrace),
}

impl fmt::Debug for TraceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceHandler::Script(s) => f.debug_tuple("Script").field(s).finish(),
            TraceHandler::Native(_) => f.write_str("Native(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarTrace {
    pub ops: Vec<TraceOp>,
    pub handler: TraceHandler,
    /// Only fire for this array element.
    pub element: Option<String>,
}

impl VarTrace {
    pub fn fires_for(&self, op: TraceOp, elem: Option<&str>) -> bool {
        self.ops.contains(&op)
            && match (&self.element, elem) {
                (None, _) => true,
                (Some(want), Some(got)) => want == got,
                (Some(_), None) => false,
            }
    }
}

// ── Variables ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub enum VarState {
    /// Slot exists (declared, traced or unset) but holds no value.
    #[default]
    Undefined,
    Scalar(Value),
    Array(BTreeMap<String, Value>),
    Link(VarRef),
}

#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub state: VarState,
    pub traces: Vec<VarTrace>,
    /// A trace on this variable is running; further traces are suspended.
    pub in_trace: bool,
}

impl Variable {
    pub fn is_defined(&self) -> bool {
        matches!(self.state, VarState::Scalar(_) | VarState::Array(_))
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Frame {
    pub id: FrameId,
    pub kind: FrameKind,
    /// Enclosing frame: the caller for a procedure frame, the parent
    /// namespace for a namespace frame, `None` for the global frame.
    pub parent: Option<FrameId>,
    /// Fully qualified namespace commands resolve against.
    pub namespace: String,
    /// Words of the invocation that created a procedure frame.
    pub call: Vec<Value>,
    pub level: usize,
    slots: Vec<Variable>,
    names: HashMap<String, usize>,
}

impl Frame {
    fn new(
        id: FrameId,
        kind: FrameKind,
        parent: Option<FrameId>,
        namespace: String,
        level: usize,
    ) -> Self {
        Frame {
            id,
            kind,
            parent,
            namespace,
            call: Vec::new(),
            level,
            slots: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn slot(&self, slot: usize) -> Option<&Variable> {
        self.slots.get(slot)
    }

    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut Variable> {
        self.slots.get_mut(slot)
    }

    /// Slot for `name`, created (undefined) if missing.
    pub fn ensure(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.names.get(name) {
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(Variable::default());
        self.names.insert(name.to_owned(), slot);
        slot
    }

    /// Names of every slot that currently holds a value or an alias.
    pub fn var_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|(_, &slot)| !matches!(self.slots[slot].state, VarState::Undefined))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Defined slots carrying at least one trace.
    pub fn traced_slots(&self) -> Vec<(String, usize)> {
        self.names
            .iter()
            .filter(|(_, &slot)| {
                let var = &self.slots[slot];
                var.is_defined() && !var.traces.is_empty()
            })
            .map(|(name, &slot)| (name.clone(), slot))
            .collect()
    }

    /// Names of slots that are not aliases.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|(_, &slot)| self.slots[slot].is_defined())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

// ── Name helpers ──────────────────────────────────────────────────────────────

/// Split `a::b::c` into (`Some("a::b")`, `"c"`); an unqualified name gives
/// (`None`, name).  `::c` gives (`Some("")`, `"c"`).
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rfind("::") {
        Some(i) => {
            let ns = name[..i].trim_end_matches(':');
            (Some(ns), &name[i + 2..])
        }
        None => (None, name),
    }
}

/// Join a namespace and a simple name.
pub fn join_ns(ns: &str, tail: &str) -> String {
    if ns == "::" || ns.is_empty() {
        format!("::{tail}")
    } else {
        format!("{ns}::{tail}")
    }
}

/// Absolute form of a namespace path relative to `current`.
pub fn absolute_ns(current: &str, path: &str) -> String {
    let trimmed = path.trim_end_matches(':');
    if path.starts_with("::") {
        if trimmed.is_empty() {
            "::".to_owned()
        } else {
            trimmed.to_owned()
        }
    } else if trimmed.is_empty() {
        current.to_owned()
    } else {
        join_ns(current, trimmed)
    }
}

/// The parent of an absolute namespace, or `None` for `::`.
pub fn parent_ns(ns: &str) -> Option<String> {
    if ns == "::" {
        return None;
    }
    match ns.rfind("::") {
        Some(0) | None => Some("::".to_owned()),
        Some(i) => Some(ns[..i].to_owned()),
    }
}

// ── Arena ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct StackEntry {
    frame: FrameId,
    level: usize,
    /// The entry created the frame and destroys it on pop.
    owned: bool,
}

/// Push/pop counters, for checking that every exit path unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub pushes: u64,
    pub pops: u64,
    /// Frames alive in the arena (global and namespaces included).
    pub live: usize,
}

/// The frame arena plus the active call stack.
#[derive(Debug)]
pub struct Frames {
    arena: HashMap<FrameId, Frame>,
    stack: Vec<StackEntry>,
    namespaces: HashMap<String, FrameId>,
    next_id: u64,
    pushes: u64,
    pops: u64,
}

impl Default for Frames {
    fn default() -> Self {
        Self::new()
    }
}

impl Frames {
    pub fn new() -> Self {
        let global = FrameId(0);
        let mut arena = HashMap::new();
        arena.insert(global, Frame::new(global, FrameKind::Global, None, "::".to_owned(), 0));
        let mut namespaces = HashMap::new();
        namespaces.insert("::".to_owned(), global);
        Frames {
            arena,
            stack: vec![StackEntry { frame: global, level: 0, owned: false }],
            namespaces,
            next_id: 1,
            pushes: 0,
            pops: 0,
        }
    }

    pub fn global(&self) -> FrameId {
        FrameId(0)
    }

    fn top(&self) -> StackEntry {
        // The global entry is never popped.
        self.stack[self.stack.len() - 1]
    }

    pub fn current(&self) -> FrameId {
        self.top().frame
    }

    pub fn current_level(&self) -> usize {
        self.top().level
    }

    /// Number of entries on the call stack (1 at top level).
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Namespace of the current frame.
    pub fn current_namespace(&self) -> &str {
        self.arena
            .get(&self.current())
            .map_or("::", |f| f.namespace.as_str())
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.arena.get(&id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.arena.get_mut(&id)
    }

    pub fn contains(&self, id: FrameId) -> bool {
        self.arena.contains_key(&id)
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats { pushes: self.pushes, pops: self.pops, live: self.arena.len() }
    }

    fn fresh_id(&mut self) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Push a new frame one level below the current one.
    pub fn push(&mut self, kind: FrameKind, namespace: &str) -> FrameId {
        let id = self.fresh_id();
        let parent = self.current();
        let level = self.current_level() + 1;
        self.arena.insert(id, Frame::new(id, kind, Some(parent), namespace.to_owned(), level));
        self.stack.push(StackEntry { frame: id, level, owned: true });
        self.pushes += 1;
        debug!(frame = id.0, level, ?kind, "push frame");
        id
    }

    /// Make an existing frame current (`uplevel`, `namespace eval`).
    pub fn push_existing(&mut self, id: FrameId, level: usize) {
        self.stack.push(StackEntry { frame: id, level, owned: false });
        self.pushes += 1;
    }

    /// Pop the innermost entry, which must refer to `id`.
    pub fn pop(&mut self, id: FrameId) -> Result<(), TclError> {
        let top = self.top();
        if self.stack.len() == 1 || top.frame != id {
            return Err(TclError::new(
                ErrorKind::Frame,
                "frame-order",
                "frame popped out of order",
            ));
        }
        self.stack.pop();
        self.pops += 1;
        if top.owned {
            self.arena.remove(&id);
            debug!(frame = id.0, "pop frame");
        }
        Ok(())
    }

    /// Frame active at absolute `level`, searching from the top of the stack.
    pub fn frame_at_level(&self, level: usize) -> Option<FrameId> {
        self.stack
            .iter()
            .rev()
            .find(|e| e.level == level)
            .map(|e| e.frame)
    }

    /// Invocation words of procedure frames from level 1 up to the current
    /// level, for `info level`.
    pub fn call_at_level(&self, level: usize) -> Option<&[Value]> {
        let id = self.frame_at_level(level)?;
        self.arena.get(&id).map(|f| f.call.as_slice())
    }

    // ── Namespaces ────────────────────────────────────────────────────────────

    pub fn namespace(&self, path: &str) -> Option<FrameId> {
        self.namespaces.get(path).copied()
    }

    /// Frame of the absolute namespace `path`, creating it and any missing
    /// parents.
    pub fn ensure_namespace(&mut self, path: &str) -> FrameId {
        if let Some(id) = self.namespaces.get(path) {
            return *id;
        }
        let parent_path = parent_ns(path).unwrap_or_else(|| "::".to_owned());
        let parent = self.ensure_namespace(&parent_path);
        let id = self.fresh_id();
        self.arena
            .insert(id, Frame::new(id, FrameKind::Namespace, Some(parent), path.to_owned(), 0));
        self.namespaces.insert(path.to_owned(), id);
        debug!(namespace = path, "create namespace");
        id
    }

    /// Destroy `path` and every namespace below it.  Returns the deleted
    /// paths.
    pub fn delete_namespace(&mut self, path: &str) -> Vec<String> {
        if path == "::" {
            return Vec::new();
        }
        let prefix = format!("{path}::");
        let doomed: Vec<String> = self
            .namespaces
            .keys()
            .filter(|k| k.as_str() == path || k.starts_with(&prefix))
            .cloned()
            .collect();
        for ns in &doomed {
            if let Some(id) = self.namespaces.remove(ns) {
                self.arena.remove(&id);
            }
        }
        doomed
    }

    /// Direct children of `path`, sorted.
    pub fn child_namespaces(&self, path: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .namespaces
            .keys()
            .filter(|k| k.as_str() != "::" && parent_ns(k).as_deref() == Some(path))
            .cloned()
            .collect();
        out.sort();
        out
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    pub fn variable(&self, r: &VarRef) -> Option<&Variable> {
        self.arena.get(&r.frame)?.slot(r.slot)
    }

    pub fn variable_mut(&mut self, frame: FrameId, slot: usize) -> Option<&mut Variable> {
        self.arena.get_mut(&frame)?.slot_mut(slot)
    }

    /// Follow alias links from `(frame, slot)` to the slot that owns the
    /// value.  An element reference on the way is carried along.
    pub fn follow(&self, frame: FrameId, slot: usize, name: &str) -> Result<VarRef, TclError> {
        let mut at = VarRef { frame, slot, elem: None };
        // Alias chains cannot loop (each link is created against an existing
        // target), but bound the walk anyway.
        for _ in 0..1000 {
            let f = self.arena.get(&at.frame).ok_or_else(|| dangling(name))?;
            let var = f.slot(at.slot).ok_or_else(|| dangling(name))?;
            match &var.state {
                VarState::Link(target) => {
                    let elem = target.elem.clone().or(at.elem);
                    at = VarRef { frame: target.frame, slot: target.slot, elem };
                }
                _ => return Ok(at),
            }
        }
        Err(TclError::new(
            ErrorKind::Frame,
            "alias-loop",
            format!("too many nested aliases for \"{name}\""),
        ))
    }

    /// Resolve `name` in `frame` without creating anything.
    pub fn lookup_in(&self, frame: FrameId, name: &str) -> Option<usize> {
        self.arena.get(&frame)?.lookup(name)
    }

    /// Slot of `name` in `frame`, created when missing.
    pub fn ensure_in(&mut self, frame: FrameId, name: &str) -> Result<usize, TclError> {
        self.arena
            .get_mut(&frame)
            .map(|f| f.ensure(name))
            .ok_or_else(|| dangling(name))
    }

    /// Make `local` in `frame` an alias for `target`.
    pub fn declare_alias(
        &mut self,
        frame: FrameId,
        local: &str,
        target: VarRef,
    ) -> Result<(), TclError> {
        if !self.contains(target.frame) {
            return Err(dangling(local));
        }
        let slot = self.ensure_in(frame, local)?;
        if frame == target.frame && slot == target.slot {
            return Err(TclError::new(
                ErrorKind::Frame,
                "alias-loop",
                format!("can't upvar from variable to itself \"{local}\""),
            ));
        }
        let var = self.variable_mut(frame, slot).ok_or_else(|| dangling(local))?;
        if var.is_defined() {
            return Err(TclError::new(
                ErrorKind::Frame,
                "alias-exists",
                format!("variable \"{local}\" already exists"),
            ));
        }
        var.state = VarState::Link(target);
        Ok(())
    }
}

pub fn dangling(name: &str) -> TclError {
    TclError::new(
        ErrorKind::Frame,
        "dangling-alias",
        format!("can't access \"{name}\": alias target frame no longer exists"),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_balance() {
        let mut frames = Frames::new();
        let a = frames.push(FrameKind::Local, "::");
        let b = frames.push(FrameKind::Local, "::");
        assert_eq!(frames.current_level(), 2);
        assert!(frames.pop(a).is_err());
        frames.pop(b).unwrap();
        frames.pop(a).unwrap();
        let stats = frames.stats();
        assert_eq!(stats.pushes, stats.pops);
        assert_eq!(stats.live, 1);
        assert_eq!(frames.depth(), 1);
    }

    #[test]
    fn global_frame_cannot_be_popped() {
        let mut frames = Frames::new();
        let g = frames.global();
        assert!(frames.pop(g).is_err());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut frames = Frames::new();
        let a = frames.push(FrameKind::Local, "::");
        frames.pop(a).unwrap();
        let b = frames.push(FrameKind::Local, "::");
        assert_ne!(a, b);
        assert!(!frames.contains(a));
    }

    #[test]
    fn alias_to_popped_frame_dangles() {
        let mut frames = Frames::new();
        let local = frames.push(FrameKind::Local, "::");
        let slot = frames.ensure_in(local, "x").unwrap();
        frames.variable_mut(local, slot).unwrap().state = VarState::Scalar(Value::Int(1));
        let g = frames.global();
        frames
            .declare_alias(g, "y", VarRef { frame: local, slot, elem: None })
            .unwrap();
        let ys = frames.lookup_in(g, "y").unwrap();
        assert_eq!(frames.follow(g, ys, "y").unwrap().frame, local);
        frames.pop(local).unwrap();
        let err = frames.follow(g, ys, "y").unwrap_err();
        assert_eq!(err.code, "dangling-alias");
        assert_eq!(err.kind, ErrorKind::Frame);
    }

    #[test]
    fn alias_chain_carries_element() {
        let mut frames = Frames::new();
        let g = frames.global();
        let arr = frames.ensure_in(g, "arr").unwrap();
        let l1 = frames.push(FrameKind::Local, "::");
        frames
            .declare_alias(l1, "e", VarRef { frame: g, slot: arr, elem: Some("k".into()) })
            .unwrap();
        let e = frames.lookup_in(l1, "e").unwrap();
        let l2 = frames.push(FrameKind::Local, "::");
        frames
            .declare_alias(l2, "f", VarRef { frame: l1, slot: e, elem: None })
            .unwrap();
        let f = frames.lookup_in(l2, "f").unwrap();
        let target = frames.follow(l2, f, "f").unwrap();
        assert_eq!(target, VarRef { frame: g, slot: arr, elem: Some("k".into()) });
    }

    #[test]
    fn self_alias_rejected() {
        let mut frames = Frames::new();
        let g = frames.global();
        let x = frames.ensure_in(g, "x").unwrap();
        assert!(frames.declare_alias(g, "x", VarRef { frame: g, slot: x, elem: None }).is_err());
    }

    #[test]
    fn uplevel_entries_do_not_destroy() {
        let mut frames = Frames::new();
        let a = frames.push(FrameKind::Local, "::");
        let g = frames.global();
        frames.push_existing(g, 0);
        assert_eq!(frames.current(), g);
        assert_eq!(frames.frame_at_level(1), Some(a));
        frames.pop(g).unwrap();
        assert!(frames.contains(g));
        frames.pop(a).unwrap();
    }

    #[test]
    fn namespaces() {
        let mut frames = Frames::new();
        let b = frames.ensure_namespace("::a::b");
        assert!(frames.namespace("::a").is_some());
        assert_eq!(frames.get(b).map(|f| f.kind), Some(FrameKind::Namespace));
        assert_eq!(frames.child_namespaces("::"), vec!["::a"]);
        assert_eq!(frames.child_namespaces("::a"), vec!["::a::b"]);
        let mut gone = frames.delete_namespace("::a");
        gone.sort();
        assert_eq!(gone, vec!["::a", "::a::b"]);
        assert!(!frames.contains(b));
    }

    #[test]
    fn name_helpers() {
        assert_eq!(split_qualified("a::b::c"), (Some("a::b"), "c"));
        assert_eq!(split_qualified("::c"), (Some(""), "c"));
        assert_eq!(split_qualified("c"), (None, "c"));
        assert_eq!(join_ns("::", "x"), "::x");
        assert_eq!(join_ns("::a", "x"), "::a::x");
        assert_eq!(absolute_ns("::a", "b"), "::a::b");
        assert_eq!(absolute_ns("::a", "::b::"), "::b");
        assert_eq!(absolute_ns("::a", "::"), "::");
        assert_eq!(parent_ns("::a::b").as_deref(), Some("::a"));
        assert_eq!(parent_ns("::a").as_deref(), Some("::"));
        assert_eq!(parent_ns("::"), None);
    }

    #[test]
    fn var_names_skip_undefined() {
        let mut frames = Frames::new();
        let g = frames.global();
        let a = frames.ensure_in(g, "a").unwrap();
        frames.ensure_in(g, "b").unwrap();
        frames.variable_mut(g, a).unwrap().state = VarState::Scalar(Value::Int(1));
        assert_eq!(frames.get(g).unwrap().var_names(), vec!["a"]);
    }
}
