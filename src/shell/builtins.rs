//! Commands the shell runs itself instead of spawning.

use std::io;
use std::path::PathBuf;

use log::{debug, info};
use nix::sys::signal::Signal;
use thiserror::Error;

use super::executor::{ExecutionContext, ExecutionResult};
use super::job_manager::{JobError, JobId, JobManager, JobOutcome};
use super::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Jobs,
    Fg,
    Bg,
    Stop,
    Kill,
    Exit,
}

#[derive(Error, Debug)]
pub enum BuiltinError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid job id: {0}")]
    BadJobId(String),
    #[error("no current job")]
    NoCurrentJob,
    #[error("cd: {}: {source}", .path.display())]
    Cd { path: PathBuf, source: io::Error },
    #[error("cd: {0} not set")]
    Unset(&'static str),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "jobs" => Some(Builtin::Jobs),
            "fg" => Some(Builtin::Fg),
            "bg" => Some(Builtin::Bg),
            "stop" => Some(Builtin::Stop),
            "kill" => Some(Builtin::Kill),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    /// `exit` is left to the caller, it only yields success here.
    pub fn run(
        self,
        args: &[String],
        jobs: &JobManager,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecutionResult, BuiltinError> {
        debug!("builtin {:?} {:?}", self, args);
        match self {
            Builtin::Cd => change_dir(args, ctx),
            Builtin::Jobs => list_jobs(args, jobs),
            Builtin::Fg => {
                let id = current_or(args.first(), jobs)?;
                foreground(id, jobs)
            }
            Builtin::Bg => {
                let id = current_or(args.first(), jobs)?;
                match jobs.resume(id, true) {
                    Err(JobError::InvalidState { .. }) => jobs.background(id)?,
                    other => other?,
                }
                let command = jobs.get(id).map(|job| job.command).unwrap_or_default();
                Ok(ExecutionResult::success(format!("[{}] {} &\n", id, command)))
            }
            Builtin::Stop => {
                let id = parse_job_id(args.first().ok_or(BuiltinError::Usage("stop <job>"))?)?;
                jobs.suspend(id)?;
                Ok(ExecutionResult::default())
            }
            Builtin::Kill => {
                let (signal, target) = match args {
                    [target] => ("TERM", target),
                    [flag, target] if flag.starts_with('-') => (flag.as_str(), target),
                    _ => return Err(BuiltinError::Usage("kill [-SIGNAL] <job>")),
                };
                jobs.kill(parse_job_id(target)?, signal)?;
                Ok(ExecutionResult::default())
            }
            Builtin::Exit => Ok(ExecutionResult::default()),
        }
    }
}

/// Accepts `3` and `%3`.
fn parse_job_id(text: &str) -> Result<JobId, BuiltinError> {
    text.trim_start_matches('%')
        .parse()
        .map(JobId)
        .map_err(|_| BuiltinError::BadJobId(text.to_string()))
}

fn current_or(arg: Option<&String>, jobs: &JobManager) -> Result<JobId, BuiltinError> {
    match arg {
        Some(text) => parse_job_id(text),
        None => jobs.latest_active().ok_or(BuiltinError::NoCurrentJob),
    }
}

fn foreground(id: JobId, jobs: &JobManager) -> Result<ExecutionResult, BuiltinError> {
    match jobs.resume(id, false) {
        // Already running: just take it over.
        Err(JobError::InvalidState { .. }) => {}
        other => other?,
    }
    let command = jobs.get(id).map(|job| job.command).unwrap_or_default();
    info!("job {} brought to foreground", id);
    Ok(match jobs.wait_foreground(id)? {
        JobOutcome::Exited(code) => ExecutionResult::from_code(code),
        JobOutcome::Stopped => ExecutionResult::failure(
            signals::signaled_status(Signal::SIGTSTP),
            format!("[{}] stopped  {}\n", id, command),
        ),
        JobOutcome::Detached => ExecutionResult::default(),
    })
}

fn list_jobs(args: &[String], jobs: &JobManager) -> Result<ExecutionResult, BuiltinError> {
    let clean = match args {
        [] => false,
        [flag] if flag == "-c" => true,
        _ => return Err(BuiltinError::Usage("jobs [-c]")),
    };
    let listing: String = jobs
        .list()
        .iter()
        .map(|job| format!("{}\n", job))
        .collect();
    if clean {
        jobs.cleanup();
    }
    Ok(ExecutionResult::success(listing))
}

fn change_dir(args: &[String], ctx: &mut ExecutionContext) -> Result<ExecutionResult, BuiltinError> {
    let (target, announce) = match args.first().map(String::as_str) {
        None => (home(ctx)?, false),
        Some("-") => (
            ctx.env
                .get("OLDPWD")
                .cloned()
                .ok_or(BuiltinError::Unset("OLDPWD"))?,
            true,
        ),
        Some(dir) => (
            shellexpand::tilde_with_context(dir, || ctx.env.get("HOME")).into_owned(),
            false,
        ),
    };

    let path = ctx.resolve(&target);
    let path = path
        .canonicalize()
        .and_then(|path| {
            if path.is_dir() {
                Ok(path)
            } else {
                Err(io::Error::other("not a directory"))
            }
        })
        .map_err(|source| BuiltinError::Cd {
            path: PathBuf::from(&target),
            source,
        })?;

    let previous = std::mem::replace(&mut ctx.cwd, path);
    ctx.env
        .insert("OLDPWD".to_string(), previous.display().to_string());
    ctx.env
        .insert("PWD".to_string(), ctx.cwd.display().to_string());
    debug!("cwd is now {}", ctx.cwd.display());

    Ok(if announce {
        ExecutionResult::success(format!("{}\n", ctx.cwd.display()))
    } else {
        ExecutionResult::default()
    })
}

fn home(ctx: &ExecutionContext) -> Result<String, BuiltinError> {
    ctx.env.get("HOME").cloned().ok_or(BuiltinError::Unset("HOME"))
}
