#![allow(clippy::return_self_not_must_use)]

pub mod console;
pub mod env;
pub mod error;
pub mod eval;
pub mod host;
pub mod lexer;

pub use error::{Diagnostic, ScriptError, ScriptResult};
pub use eval::{Interpreter, Status};
pub use host::{Host, Rgb};
pub use lexer::Program;
