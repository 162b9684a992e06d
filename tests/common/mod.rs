//! Shared helpers for the tide integration tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use tidesh::shell::executor::{ChainEvaluator, ExecutionContext, ExecutionResult, Orchestrator};
pub use tidesh::shell::job_manager::JobManager;
use tidesh::shell::script::TextTransforms;

/// Evaluator wired the way the binary wires it, minus the terminal.
pub fn evaluator() -> ChainEvaluator {
    let orchestrator = Orchestrator::new(JobManager::new()).with_scripts(Arc::new(TextTransforms));
    ChainEvaluator::new(orchestrator)
}

pub fn context_in(dir: &Path) -> ExecutionContext {
    let env: HashMap<String, String> = std::env::vars().collect();
    ExecutionContext::new(dir, env)
}

/// Evaluate one line in the current directory
#[allow(dead_code)]
pub fn eval(line: &str) -> ExecutionResult {
    evaluator().execute_line(line, &ExecutionContext::from_current())
}
