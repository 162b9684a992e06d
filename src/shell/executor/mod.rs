mod chain;
mod orchestrator;

use std::collections::HashMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::job_manager::JobError;

pub use chain::ChainEvaluator;
pub use orchestrator::Orchestrator;

pub const STATUS_PARSE_ERROR: i32 = 2;
pub const STATUS_CANNOT_EXECUTE: i32 = 126;
pub const STATUS_NOT_FOUND: i32 = 127;

/// Working directory and environment every spawned process receives.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new(cwd: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        Self {
            cwd: cwd.into(),
            env,
        }
    }

    pub fn from_current() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::new(cwd, env::vars().collect())
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.cwd.join(path)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn from_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn ok(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("cannot open {}: {source}", .path.display())]
    RedirectionTargetUnavailable { path: PathBuf, source: io::Error },
    #[error("command not found: {program}")]
    ProgramNotFound { program: String },
    #[error("cannot execute {program}: {source}")]
    SpawnFailure { program: String, source: io::Error },
    #[error("no script evaluator configured")]
    NoScriptEvaluator,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl ExecError {
    pub fn spawn(program: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ExecError::ProgramNotFound {
                program: program.to_string(),
            }
        } else {
            ExecError::SpawnFailure {
                program: program.to_string(),
                source,
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::ProgramNotFound { .. } => STATUS_NOT_FOUND,
            ExecError::SpawnFailure { .. } => STATUS_CANNOT_EXECUTE,
            _ => 1,
        }
    }
}

impl From<ExecError> for ExecutionResult {
    fn from(err: ExecError) -> Self {
        ExecutionResult::failure(err.exit_code(), format!("tide: {}", err))
    }
}
