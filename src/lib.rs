//! tide: a small interactive shell.
//!
//! Lines are routed to builtins, to a single foreground process, or to the
//! chain evaluator, which parses `&&` / `||` / `;` chains of pipelines and
//! runs each pipeline as one process group tracked by the job manager.

pub mod shell;
pub mod utils;
