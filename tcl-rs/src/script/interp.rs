//! The interpreter and its evaluation loop.
//!
//! The [`Interpreter`] owns the frame arena, the command table and the host
//! collaborators.  Evaluating a script walks its commands in order: each
//! command's words are substituted, the first word is resolved to a
//! command and the command is invoked.  Any non-Ok completion stops the
//! script and travels up as an [`Exception`].  It implements
//! [`EvalContext`] so the expression evaluator can call back into it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use tracing::{debug, trace, warn};

use crate::config::InterpConfig;
use crate::host::{
    EntropySource, FsPathResolver, OsEntropy, PathResolver, TraceEvent, TraceSink, TracingSink,
};

use super::{
    commands,
    error::{ErrorKind, ExprError, TclError},
    expr::{eval_expr, parse_expr, EvalContext, Expr},
    frame::{join_ns, split_qualified, FrameId, FrameKind, Frames, VarState},
    functions::{call_builtin, MathRng},
    lexer::{parse_script, Command, Script, Word},
    list::split_list,
    status::{absorb_proc, Exception, ReturnCode, Status, TclResult},
    subst::{subst_parts, subst_word, Part},
    value::Value,
    with_stack,
};

/// Parsed scripts and expressions kept before the caches are flushed.
const SCRIPT_CACHE_LIMIT: usize = 256;
const EXPR_CACHE_LIMIT: usize = 512;

// ── Commands ──────────────────────────────────────────────────────────────────

/// A command implemented in Rust.
///
/// `args[0]` is the command name as invoked.
pub trait NativeCommand: Send + Sync {
    fn invoke(&self, interp: &mut Interpreter, args: &[Value]) -> TclResult;
}

impl<F> NativeCommand for F
where
    F: Fn(&mut Interpreter, &[Value]) -> TclResult + Send + Sync,
{
    fn invoke(&self, interp: &mut Interpreter, args: &[Value]) -> TclResult {
        self(interp, args)
    }
}

/// Who registered a native command.  Host commands cannot be replaced,
/// renamed or deleted from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Core,
    Host,
}

/// One formal parameter of a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

/// A scripted command.  The body is split once, when the procedure is
/// defined.
#[derive(Debug)]
pub struct Proc {
    /// Fully qualified name.
    pub name: String,
    pub params: Vec<Param>,
    pub body: String,
    pub script: Script,
    /// Namespace the body runs in.
    pub namespace: String,
}

impl Proc {
    pub fn new(name: &str, namespace: &str, params: &str, body: &str) -> Result<Self, TclError> {
        let mut parsed = Vec::new();
        for spec in split_list(params)? {
            let fields = split_list(&spec)?;
            let param = match fields.as_slice() {
                [] => return Err(TclError::bad_arg(format!("argument with no name in \"{name}\""))),
                [n] => Param { name: n.clone(), default: None },
                [n, d] => Param { name: n.clone(), default: Some(Value::Str(d.clone())) },
                _ => {
                    return Err(TclError::bad_arg(format!(
                        "too many fields in argument specifier \"{spec}\""
                    )))
                }
            };
            if param.name.contains("::") {
                return Err(TclError::bad_arg(format!(
                    "formal parameter \"{}\" is not a simple name",
                    param.name
                )));
            }
            parsed.push(param);
        }
        Ok(Proc {
            name: name.to_owned(),
            params: parsed,
            body: body.to_owned(),
            script: parse_script(body),
            namespace: namespace.to_owned(),
        })
    }

    fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.name == "args")
    }

    /// `f a ?b? ?arg ...?`
    fn usage(&self, invoked: &str) -> String {
        let mut out = invoked.to_owned();
        for (i, p) in self.params.iter().enumerate() {
            out.push(' ');
            if p.name == "args" && i + 1 == self.params.len() {
                out.push_str("?arg ...?");
            } else if p.default.is_some() {
                out.push_str(&format!("?{}?", p.name));
            } else {
                out.push_str(&p.name);
            }
        }
        out
    }
}

#[derive(Clone)]
pub enum CommandDef {
    Native { func: Arc<dyn NativeCommand>, origin: Origin },
    Proc(Arc<Proc>),
    /// `interp alias`: the stored words are prepended to the arguments.
    Alias(Vec<Value>),
}

impl fmt::Debug for CommandDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandDef::Native { origin, .. } => write!(f, "Native({origin:?})"),
            CommandDef::Proc(p) => write!(f, "Proc({})", p.name),
            CommandDef::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
        }
    }
}

// ── Interrupts ────────────────────────────────────────────────────────────────

/// Cooperative cancellation for one interpreter; clone it into another
/// thread or a signal handler.
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Make the next command dispatch fail with an interrupted error.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InterpreterBuilder {
    config: InterpConfig,
    trace_sink: Option<Arc<dyn TraceSink>>,
    path_resolver: Option<Arc<dyn PathResolver>>,
    entropy: Option<Arc<dyn EntropySource>>,
}

impl InterpreterBuilder {
    pub fn config(mut self, config: InterpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trace_sink(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace_sink = Some(Arc::new(sink));
        self
    }

    pub fn path_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.path_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn entropy(mut self, entropy: impl EntropySource + 'static) -> Self {
        self.entropy = Some(Arc::new(entropy));
        self
    }

    pub fn build(self) -> Interpreter {
        let path_resolver = self
            .path_resolver
            .unwrap_or_else(|| Arc::new(FsPathResolver::new(self.config.library_dirs.clone())));
        let entropy = self.entropy.unwrap_or_else(|| Arc::new(OsEntropy));
        let mut seed = [0u8; 8];
        for (dst, src) in seed.iter_mut().zip(entropy.random_bytes(8)) {
            *dst = src;
        }
        let mut interp = Interpreter {
            frames: Frames::new(),
            commands: HashMap::new(),
            config: self.config,
            depth: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
            output: String::new(),
            error_output: String::new(),
            script_cache: HashMap::new(),
            expr_cache: HashMap::new(),
            rng: MathRng::seed_from_u64(u64::from_le_bytes(seed)),
            trace_sink: self.trace_sink.unwrap_or_else(|| Arc::new(TracingSink)),
            path_resolver,
            entropy,
            unique_counter: 0,
            error_line: 0,
            script_file: None,
        };
        // Scripts extend `expr` by defining procedures here.
        interp.frames.ensure_namespace("::tcl::mathfunc");
        commands::register_core(&mut interp);
        interp
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    pub(crate) frames: Frames,
    /// Command table keyed by fully qualified name (`::set`, `::a::f`).
    pub(crate) commands: HashMap<String, CommandDef>,
    pub(crate) config: InterpConfig,
    /// Nested command invocations in progress.
    pub(crate) depth: usize,
    interrupt: Arc<AtomicBool>,
    /// Text written by `puts` to stdout.
    pub output: String,
    /// Text written by `puts stderr`.
    pub error_output: String,
    script_cache: HashMap<String, Arc<Script>>,
    expr_cache: HashMap<String, Arc<Expr>>,
    pub(crate) rng: MathRng,
    pub(crate) trace_sink: Arc<dyn TraceSink>,
    pub(crate) path_resolver: Arc<dyn PathResolver>,
    entropy: Arc<dyn EntropySource>,
    unique_counter: u64,
    /// Line (within its script) of the command an error last crossed.
    pub(crate) error_line: usize,
    /// File being read by `source`.
    pub(crate) script_file: Option<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("depth", &self.depth)
            .field("frames", &self.frames.stats())
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::default()
    }

    pub fn config(&self) -> &InterpConfig {
        &self.config
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.interrupt))
    }

    /// Drain text written to stdout.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Drain text written to stderr.
    pub fn take_error_output(&mut self) -> String {
        std::mem::take(&mut self.error_output)
    }

    /// A name no other call of this interpreter has returned.
    pub fn unique_name(&mut self, prefix: &str) -> String {
        self.unique_counter += 1;
        let suffix: String = self
            .entropy
            .random_bytes(4)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        format!("{prefix}{}_{suffix}", self.unique_counter)
    }

    // ── Command table ─────────────────────────────────────────────────────────

    /// Register a host command.  Scripts cannot redefine, rename or delete it.
    pub fn register_command(&mut self, name: &str, command: impl NativeCommand + 'static) {
        let key = self.qualify(name);
        debug!(command = %key, "register host command");
        self.commands
            .insert(key, CommandDef::Native { func: Arc::new(command), origin: Origin::Host });
    }

    pub(crate) fn register_core(&mut self, name: &str, command: impl NativeCommand + 'static) {
        self.commands.insert(
            join_ns("::", name),
            CommandDef::Native { func: Arc::new(command), origin: Origin::Core },
        );
    }

    /// Fully qualified form of a command name relative to the current
    /// namespace.
    pub(crate) fn qualify(&self, name: &str) -> String {
        if name.starts_with("::") {
            name.to_owned()
        } else {
            join_ns(self.frames.current_namespace(), name)
        }
    }

    /// Table key `name` resolves to: the current namespace first, then the
    /// global namespace.
    pub(crate) fn command_key(&self, name: &str) -> Option<String> {
        if name.starts_with("::") {
            return self.commands.contains_key(name).then(|| name.to_owned());
        }
        let local = join_ns(self.frames.current_namespace(), name);
        if self.commands.contains_key(&local) {
            return Some(local);
        }
        let global = join_ns("::", name);
        self.commands.contains_key(&global).then_some(global)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.command_key(name).is_some()
    }

    pub(crate) fn lookup_command(&self, name: &str) -> Option<CommandDef> {
        let key = self.command_key(name)?;
        self.commands.get(&key).cloned()
    }

    fn ensure_redefinable(&self, key: &str) -> Result<(), TclError> {
        if let Some(CommandDef::Native { origin: Origin::Host, .. }) = self.commands.get(key) {
            return Err(TclError::new(
                ErrorKind::Resolution,
                "host-command",
                format!("cannot redefine host command \"{key}\""),
            ));
        }
        Ok(())
    }

    /// Create or replace a scripted command.
    pub(crate) fn define_proc(&mut self, name: &str, params: &str, body: &str) -> Result<(), TclError> {
        let key = self.qualify(name);
        let (ns, _) = split_qualified(&key);
        let ns = match ns {
            Some("") | None => "::".to_owned(),
            Some(ns) => ns.to_owned(),
        };
        if self.frames.namespace(&ns).is_none() {
            return Err(TclError::new(
                ErrorKind::Resolution,
                "no-such-namespace",
                format!("can't create procedure \"{name}\": unknown namespace"),
            ));
        }
        self.ensure_redefinable(&key)?;
        let proc = Proc::new(&key, &ns, params, body)?;
        debug!(proc = %key, "define proc");
        self.commands.insert(key, CommandDef::Proc(Arc::new(proc)));
        Ok(())
    }

    /// `rename old new`; an empty `new` deletes.
    pub(crate) fn rename_command(&mut self, old: &str, new: &str) -> Result<(), TclError> {
        let key = self.command_key(old).ok_or_else(|| {
            let verb = if new.is_empty() { "delete" } else { "rename" };
            TclError::new(
                ErrorKind::Resolution,
                "unknown-command",
                format!("can't {verb} \"{old}\": command doesn't exist"),
            )
        })?;
        self.ensure_redefinable(&key)?;
        if new.is_empty() {
            self.commands.remove(&key);
            return Ok(());
        }
        let new_key = self.qualify(new);
        if self.commands.contains_key(&new_key) {
            return Err(TclError::new(
                ErrorKind::Resolution,
                "command-exists",
                format!("can't rename to \"{new}\": command already exists"),
            ));
        }
        if let Some(def) = self.commands.remove(&key) {
            self.commands.insert(new_key, def);
        }
        Ok(())
    }

    pub(crate) fn define_alias(&mut self, name: &str, target: Vec<Value>) -> Result<(), TclError> {
        let key = self.qualify(name);
        self.ensure_redefinable(&key)?;
        self.commands.insert(key, CommandDef::Alias(target));
        Ok(())
    }

    /// Visible command names matching `pattern`.  Names in the current or
    /// global namespace are listed unqualified unless the pattern is
    /// qualified.
    pub(crate) fn command_names(&self, pattern: Option<&str>, procs_only: bool) -> Vec<String> {
        let current = self.frames.current_namespace();
        let qualified = pattern.is_some_and(|p| p.contains("::"));
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, def)| !procs_only || matches!(def, CommandDef::Proc(_)))
            .filter_map(|(key, _)| {
                if qualified {
                    return Some(key.clone());
                }
                let (ns, tail) = split_qualified(key);
                let ns = match ns {
                    Some("") | None => "::",
                    Some(ns) => ns,
                };
                (ns == "::" || ns == current).then(|| tail.to_owned())
            })
            .filter(|name| pattern.map_or(true, |p| crate::pattern::glob_match(p, name, false)))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate a script at the top level, for the host.
    ///
    /// On error the globals `errorInfo` and `errorCode` are set.  The
    /// interrupt flag is cleared once the outermost evaluation returns.
    pub fn evaluate(&mut self, script: &str) -> Status {
        let outermost = self.depth == 0;
        let result = self.eval(script);
        if let Err(Exception::Error(e)) = &result {
            self.record_error(e);
        }
        if outermost {
            self.interrupt.store(false, Ordering::SeqCst);
        }
        Status::from(result)
    }

    /// Store an error's trace in `::errorInfo` / `::errorCode`.
    pub(crate) fn record_error(&mut self, e: &TclError) {
        let info = Value::Str(e.error_info.clone());
        let code = Value::Str(e.error_code.clone());
        for (name, value) in [("::errorInfo", info), ("::errorCode", code)] {
            if let Err(err) = self.set_var(name, None, value) {
                warn!(variable = name, error = ?err, "could not record error");
            }
        }
    }

    /// Evaluate a script in the current frame.
    pub fn eval(&mut self, script: &str) -> TclResult {
        let parsed = self.parsed(script);
        self.eval_parsed(&parsed)
    }

    fn parsed(&mut self, script: &str) -> Arc<Script> {
        if let Some(s) = self.script_cache.get(script) {
            return Arc::clone(s);
        }
        let parsed = Arc::new(parse_script(script));
        if self.script_cache.len() >= SCRIPT_CACHE_LIMIT {
            self.script_cache.clear();
        }
        self.script_cache.insert(script.to_owned(), Arc::clone(&parsed));
        parsed
    }

    /// Run already-split commands in order.
    pub fn eval_parsed(&mut self, script: &Script) -> TclResult {
        let mut last = Value::default();
        for cmd in &script.commands {
            match self.eval_command(cmd) {
                Ok(v) => last = v,
                Err(mut e) => {
                    if let Some(err) = e.as_error_mut() {
                        err.add_context(&cmd.text);
                        self.error_line = cmd.line;
                    }
                    return Err(e);
                }
            }
        }
        match &script.error {
            Some(e) => Err(e.clone().into()),
            None => Ok(last),
        }
    }

    fn eval_command(&mut self, cmd: &Command) -> TclResult {
        let words = self.subst_words(&cmd.words)?;
        if words.is_empty() {
            return Ok(Value::default());
        }
        self.invoke(&words)
    }

    /// Substitute every word of a command, splicing `{*}` words.
    pub(crate) fn subst_words(&mut self, words: &[Word]) -> TclResult<Vec<Value>> {
        let mut out = Vec::with_capacity(words.len());
        for word in words {
            let value = subst_word(self, word)?;
            if word.expand {
                out.extend(split_list(&value.as_str())?.into_iter().map(Value::Str));
            } else {
                out.push(value);
            }
        }
        Ok(out)
    }

    pub(crate) fn check_interrupt(&self) -> Result<(), Exception> {
        if self.interrupt.load(Ordering::SeqCst) {
            warn!(depth = self.depth, "evaluation interrupted");
            return Err(TclError::new(ErrorKind::Interrupted, "interrupted", "evaluation interrupted")
                .with_depth(self.depth)
                .into());
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<(), Exception> {
        if self.depth >= self.config.max_nesting_depth {
            warn!(limit = self.config.max_nesting_depth, "nesting limit reached");
            return Err(TclError::new(
                ErrorKind::Frame,
                "recursion-limit",
                "too many nested evaluations (infinite loop?)",
            )
            .with_depth(self.depth)
            .into());
        }
        self.depth += 1;
        Ok(())
    }

    /// Invoke a command given its fully substituted words.
    pub fn invoke(&mut self, words: &[Value]) -> TclResult {
        let Some(first) = words.first() else {
            return Ok(Value::default());
        };
        self.check_interrupt()?;
        let name = first.as_str().into_owned();
        let Some(def) = self.lookup_command(&name) else {
            return self.invoke_unknown(&name, words);
        };
        self.enter()?;
        trace!(target: "tcl::eval", command = %name, depth = self.depth, "dispatch");
        if self.config.trace_commands {
            self.trace_sink
                .emit(&TraceEvent::CommandEnter { words: words.to_vec(), depth: self.depth });
        }

        let mut result = with_stack(|| match def {
            CommandDef::Native { func, .. } => func.invoke(self, words),
            CommandDef::Proc(proc) => self.invoke_proc(&proc, words),
            CommandDef::Alias(prefix) => {
                let mut full = prefix;
                full.extend_from_slice(&words[1..]);
                self.invoke(&full)
            }
        });

        if let Err(Exception::Error(e)) = &mut result {
            if e.depth == 0 {
                e.depth = self.depth;
            }
        }
        if self.config.trace_commands {
            let code = result.as_ref().err().map_or(ReturnCode::Ok, Exception::code);
            self.trace_sink
                .emit(&TraceEvent::CommandLeave { name, depth: self.depth, code });
        }
        self.depth -= 1;
        result
    }

    fn invoke_unknown(&mut self, name: &str, words: &[Value]) -> TclResult {
        if name != "unknown" && self.commands.contains_key("::unknown") {
            let mut full = Vec::with_capacity(words.len() + 1);
            full.push(Value::from("unknown"));
            full.extend_from_slice(words);
            return self.invoke(&full);
        }
        Err(TclError::unknown_command(name).into())
    }

    /// Run a procedure body in a fresh frame.  The frame is popped on every
    /// exit path.
    pub(crate) fn invoke_proc(&mut self, proc: &Proc, words: &[Value]) -> TclResult {
        let frame = self.frames.push(FrameKind::Local, &proc.namespace);
        if let Some(f) = self.frames.get_mut(frame) {
            f.call = words.to_vec();
        }
        debug!(proc = %proc.name, level = self.frames.current_level(), "enter proc");

        let bound = self.bind_params(frame, proc, words);
        let in_body = bound.is_ok();
        let result = match bound {
            Ok(()) => self.eval_parsed(&proc.script),
            Err(e) => Err(e.into()),
        };
        let line = self.error_line;
        self.release_frame(frame);
        self.frames.pop(frame)?;
        debug!(proc = %proc.name, "leave proc");

        let mut result = absorb_proc(result);
        if let (true, Err(Exception::Error(e))) = (in_body, &mut result) {
            let shown = words.first().map_or_else(String::new, |w| w.as_str().into_owned());
            e.append_info(&format!("(procedure \"{shown}\" line {line})"));
        }
        result
    }

    fn bind_params(&mut self, frame: FrameId, proc: &Proc, words: &[Value]) -> Result<(), TclError> {
        let args = &words[1..];
        let variadic = proc.is_variadic();
        let fixed = if variadic { &proc.params[..proc.params.len() - 1] } else { &proc.params[..] };
        let invoked = words.first().map_or_else(|| proc.name.clone(), |w| w.as_str().into_owned());
        if args.len() > fixed.len() && !variadic {
            return Err(TclError::wrong_args(&proc.usage(&invoked)));
        }
        for (i, param) in fixed.iter().enumerate() {
            let value = match (args.get(i), &param.default) {
                (Some(v), _) => v.clone(),
                (None, Some(d)) => d.clone(),
                (None, None) => return Err(TclError::wrong_args(&proc.usage(&invoked))),
            };
            self.define_local(frame, &param.name, value)?;
        }
        if variadic {
            let rest: Vec<String> = args
                .iter()
                .skip(fixed.len())
                .map(|v| v.as_str().into_owned())
                .collect();
            self.define_local(frame, "args", Value::Str(super::list::format_list(&rest)))?;
        }
        Ok(())
    }

    fn define_local(&mut self, frame: FrameId, name: &str, value: Value) -> Result<(), TclError> {
        let slot = self.frames.ensure_in(frame, name)?;
        if let Some(var) = self.frames.variable_mut(frame, slot) {
            var.state = VarState::Scalar(value);
        }
        Ok(())
    }

    /// Evaluate `script` in another existing frame (`uplevel`,
    /// `namespace eval`).
    pub(crate) fn eval_in_frame(&mut self, frame: FrameId, level: usize, script: &str) -> TclResult {
        self.frames.push_existing(frame, level);
        let result = self.eval(script);
        self.frames.pop(frame)?;
        result
    }

    /// Read and evaluate a file found through the path resolver.  A
    /// `return` ends the file.
    pub fn source_file(&mut self, name: &str) -> TclResult {
        let path = self.path_resolver.resolve_path(name).ok_or_else(|| {
            TclError::new(
                ErrorKind::Resolution,
                "no-such-file",
                format!("couldn't read file \"{name}\": no such file or directory"),
            )
        })?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            TclError::new(
                ErrorKind::Resolution,
                "io-error",
                format!("couldn't read file \"{name}\": {e}"),
            )
        })?;
        debug!(path = %path.display(), "source");
        let previous = self.script_file.replace(path.display().to_string());
        let parsed = parse_script(&text);
        let result = self.eval_parsed(&parsed);
        let line = self.error_line;
        self.script_file = previous;
        let mut result = absorb_proc(result);
        if let Err(Exception::Error(e)) = &mut result {
            e.append_info(&format!("(file \"{name}\" line {line})"));
        }
        result
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Evaluate an expression in the current frame.
    pub fn eval_expr_str(&mut self, src: &str) -> TclResult {
        let expr = match self.expr_cache.get(src) {
            Some(e) => Arc::clone(e),
            None => {
                let parsed = Arc::new(parse_expr(src)?);
                if self.expr_cache.len() >= EXPR_CACHE_LIMIT {
                    self.expr_cache.clear();
                }
                self.expr_cache.insert(src.to_owned(), Arc::clone(&parsed));
                parsed
            }
        };
        eval_expr(&expr, self)
    }

    /// Evaluate an expression and interpret it as a condition.
    pub(crate) fn eval_condition(&mut self, src: &str) -> TclResult<bool> {
        let v = self.eval_expr_str(src)?;
        v.as_bool()
            .ok_or_else(|| ExprError::NotBoolean(v.as_str().into_owned()).into())
    }
}

// ── EvalContext impl ──────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn subst_parts(&mut self, parts: &[Part]) -> TclResult {
        subst_parts(self, parts)
    }

    fn eval_script(&mut self, script: &str) -> TclResult {
        self.eval(script)
    }

    /// A procedure in `::tcl::mathfunc` overrides a built-in function.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> TclResult {
        let qualified = format!("::tcl::mathfunc::{name}");
        if self.commands.contains_key(&qualified) {
            let mut words = Vec::with_capacity(args.len() + 1);
            words.push(Value::Str(qualified));
            words.extend(args);
            return self.invoke(&words);
        }
        match call_builtin(name, &args, &mut self.rng) {
            Some(r) => Ok(r?),
            None => Err(ExprError::UnknownFunction(name.to_owned()).into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Value {
        let mut interp = Interpreter::new();
        match interp.evaluate(src) {
            Status::Ok(v) => v,
            other => panic!("{src}: {other:?}"),
        }
    }

    fn run_err(src: &str) -> TclError {
        let mut interp = Interpreter::new();
        match interp.evaluate(src) {
            Status::Error(e) => e,
            other => panic!("expected error from {src}, got {other:?}"),
        }
    }

    #[test]
    fn last_command_result() {
        assert_eq!(run("set a 1; set b 2").as_str(), "2");
        assert_eq!(run("").as_str(), "");
        assert_eq!(run("# only a comment").as_str(), "");
    }

    #[test]
    fn command_substitution_uses_current_frame() {
        assert_eq!(run("set x 3; set y [set x]").as_str(), "3");
        assert_eq!(run("proc f {} {set l 9; return [set l]}; f").as_str(), "9");
    }

    #[test]
    fn unknown_command() {
        let e = run_err("nosuchcmd a b");
        assert_eq!(e.kind, ErrorKind::Resolution);
        assert_eq!(e.code, "unknown-command");
        assert_eq!(e.message, "invalid command name \"nosuchcmd\"");
    }

    #[test]
    fn unknown_handler_receives_words() {
        let v = run("proc unknown {args} {return \"u:$args\"}; frob 1 2");
        assert_eq!(v.as_str(), "u:frob 1 2");
    }

    #[test]
    fn expand_splices_words() {
        assert_eq!(run("set l {a b c}; llength [list {*}$l d]").as_str(), "4");
        assert_eq!(run("list {*}{}").as_str(), "");
    }

    #[test]
    fn proc_arguments() {
        assert_eq!(run("proc f {a {b 2}} {expr {$a + $b}}; f 1").as_str(), "3");
        assert_eq!(run("proc f {a {b 2}} {expr {$a + $b}}; f 1 5").as_str(), "6");
        assert_eq!(run("proc f {a args} {set args}; f 1 2 {3 4}").as_str(), "2 {3 4}");
        let e = run_err("proc f {a {b 2} args} {}; f");
        assert_eq!(e.message, "wrong # args: should be \"f a ?b? ?arg ...?\"");
        let e = run_err("proc g {a} {}; g 1 2");
        assert_eq!(e.message, "wrong # args: should be \"g a\"");
    }

    #[test]
    fn error_info_accumulates() {
        let mut interp = Interpreter::new();
        let status = interp.evaluate("proc f {} {\n  set x 1\n  error boom\n}\nf");
        let e = status.error().expect("error");
        assert_eq!(
            e.error_info,
            "boom\n    while executing\n\"error boom\"\n    (procedure \"f\" line 3)\n    invoked from within\n\"f\""
        );
        let info = interp.evaluate("set errorInfo");
        assert_eq!(info.value().as_str(), e.error_info);
    }

    #[test]
    fn recursion_limit_is_a_frame_error() {
        let mut interp = Interpreter::builder()
            .config(InterpConfig::default().with_max_depth(40))
            .build();
        let status = interp.evaluate("proc r {} {r}; r");
        let e = status.error().expect("error");
        assert_eq!(e.kind, ErrorKind::Frame);
        assert_eq!(e.code, "recursion-limit");
        assert_eq!(interp.frames.depth(), 1);
        let stats = interp.frames.stats();
        assert_eq!(stats.pushes, stats.pops);
    }

    #[test]
    fn interrupt_stops_and_clears() {
        let mut interp = Interpreter::new();
        let handle = interp.interrupt_handle();
        interp.register_command("stop", move |_: &mut Interpreter, _: &[Value]| -> TclResult {
            handle.interrupt();
            Ok(Value::default())
        });
        let status = interp.evaluate("set n 0; while 1 {catch {stop}; incr n}");
        let e = status.error().expect("interrupted");
        assert_eq!(e.kind, ErrorKind::Interrupted);
        assert!(!interp.interrupt_handle().is_set());
        assert!(interp.evaluate("set n").is_ok());
    }

    #[test]
    fn host_commands_cannot_be_redefined() {
        let mut interp = Interpreter::new();
        interp.register_command("hostcmd", |_: &mut Interpreter, _: &[Value]| -> TclResult {
            Ok(Value::from("h"))
        });
        assert!(!interp.evaluate("proc hostcmd {} {}").is_ok());
        assert!(!interp.evaluate("rename hostcmd {}").is_ok());
        assert_eq!(interp.evaluate("hostcmd").value().as_str(), "h");
    }

    #[test]
    fn mathfunc_override() {
        assert_eq!(run("proc ::tcl::mathfunc::double {x} {return twice$x}; expr {double(4)}").as_str(), "twice4");
    }

    #[test]
    fn top_level_break_is_raw() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.evaluate("break").code(), ReturnCode::Break);
        assert_eq!(interp.evaluate("return -level 1 x").code(), ReturnCode::Return);
    }

    #[test]
    fn parse_error_after_valid_commands() {
        let mut interp = Interpreter::new();
        let status = interp.evaluate("set a 1\nset b {");
        assert_eq!(status.error().map(|e| e.code), Some("unterminated-brace"));
        assert_eq!(interp.evaluate("set a").value().as_str(), "1");
    }

    #[test]
    fn unique_names_differ() {
        let mut interp = Interpreter::new();
        let a = interp.unique_name("tmp");
        let b = interp.unique_name("tmp");
        assert_ne!(a, b);
        assert!(a.starts_with("tmp1_"));
    }

    #[test]
    fn command_trace_events() {
        use std::sync::Mutex;

        #[derive(Default, Clone)]
        struct Collect(Arc<Mutex<Vec<TraceEvent>>>);
        impl TraceSink for Collect {
            fn emit(&self, event: &TraceEvent) {
                self.0.lock().unwrap().push(event.clone());
            }
        }

        let sink = Collect::default();
        let mut interp = Interpreter::builder()
            .config(InterpConfig::default().with_tracing(true, true))
            .trace_sink(sink.clone())
            .build();
        interp.evaluate("set x 1");
        let events = sink.0.lock().unwrap();
        assert!(matches!(events[0], TraceEvent::CommandEnter { depth: 1, .. }));
        assert!(events.iter().any(|e| matches!(e, TraceEvent::VarWrite { name, .. } if name == "x")));
        assert!(matches!(
            events.last(),
            Some(TraceEvent::CommandLeave { code: ReturnCode::Ok, .. })
        ));
    }
}
