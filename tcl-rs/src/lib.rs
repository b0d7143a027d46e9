//! An embeddable Tcl-style command language.
//!
//! The interpreter lives in [`script`]; the host supplies the collaborators
//! in [`host`] and tunes limits through [`config`].

pub mod cli;
pub mod config;
pub mod host;
pub mod pattern;
pub mod script;

pub use config::InterpConfig;
pub use script::{Interpreter, Status, TclError, Value};
