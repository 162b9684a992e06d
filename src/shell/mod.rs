pub mod builtins;
pub mod executor;
pub mod job_manager;
pub mod parser;
mod readline;
pub mod router;
pub mod script;
#[allow(clippy::module_inception)]
mod shell;
pub mod signals;

pub use shell::Shell;
