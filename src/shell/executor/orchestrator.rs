use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use super::{ExecError, ExecutionContext, ExecutionResult};
use crate::shell::job_manager::{JobManager, JobOutcome};
use crate::shell::parser::lexer::RedirectOp;
use crate::shell::parser::{Pipeline, PipelineCommand, Redirection, Stage};
use crate::shell::script::ScriptEvaluator;
use crate::shell::signals;

/// How the ends of one spawned process group are connected.
struct Wiring {
    /// Text written to the first stage's stdin.
    feed: Option<String>,
    honor_input: bool,
    honor_output: bool,
    background: bool,
}

/// Runs pipelines as process groups registered with the job manager.
///
/// Pipelines made only of process stages are spawned all at once and wired
/// with OS pipes. As soon as a script stage is involved the pipeline runs
/// strictly stage by stage instead, each stage's captured stdout becoming the
/// next stage's stdin text, stopping at the first failing stage.
#[derive(Clone)]
pub struct Orchestrator {
    jobs: JobManager,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
}

impl Orchestrator {
    pub fn new(jobs: JobManager) -> Self {
        Self {
            jobs,
            scripts: None,
        }
    }

    pub fn with_scripts(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = Some(evaluator);
        self
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Like [`Orchestrator::run`], with errors folded into the result.
    pub fn execute(&self, pipeline: &Pipeline, ctx: &ExecutionContext) -> ExecutionResult {
        self.run(pipeline, ctx).unwrap_or_else(|e| {
            warn!("pipeline `{}` failed: {}", pipeline, e);
            e.into()
        })
    }

    pub fn run(
        &self,
        pipeline: &Pipeline,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecError> {
        if pipeline.has_script_stage() {
            if pipeline.background {
                warn!("`{}`: script stages cannot run in background", pipeline);
            }
            return self.run_sequential(pipeline, ctx);
        }

        let commands: Vec<&PipelineCommand> = pipeline
            .stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Process(cmd) => Some(cmd),
                Stage::Script(_) => None,
            })
            .collect();
        let last = commands.len().saturating_sub(1);
        for (i, cmd) in commands.iter().enumerate() {
            if i > 0 && cmd.input().is_some() {
                warn!("ignoring input redirection on interior stage `{}`", cmd.program);
            }
            if i < last && cmd.output().is_some() {
                warn!("ignoring output redirection on interior stage `{}`", cmd.program);
            }
        }

        let wiring = Wiring {
            feed: None,
            honor_input: true,
            honor_output: true,
            background: pipeline.background,
        };
        self.spawn_group(&commands, &pipeline.to_string(), wiring, ctx)
    }

    fn run_sequential(
        &self,
        pipeline: &Pipeline,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecError> {
        debug!("running `{}` stage by stage", pipeline);
        let last = pipeline.stages.len().saturating_sub(1);
        let mut text = String::new();
        let mut stderr = String::new();

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let step = match stage {
                Stage::Script(code) => {
                    let evaluator = self.scripts.as_ref().ok_or(ExecError::NoScriptEvaluator)?;
                    evaluator.evaluate(code, &text)
                }
                Stage::Process(cmd) => {
                    if i > 0 && cmd.input().is_some() {
                        warn!("ignoring input redirection on interior stage `{}`", cmd.program);
                    }
                    if i < last && cmd.output().is_some() {
                        warn!("ignoring output redirection on interior stage `{}`", cmd.program);
                    }
                    let wiring = Wiring {
                        feed: Some(std::mem::take(&mut text)),
                        honor_input: i == 0,
                        honor_output: i == last,
                        background: false,
                    };
                    self.spawn_group(&[cmd], &cmd.command_line(), wiring, ctx)?
                }
            };
            stderr.push_str(&step.stderr);
            if !step.ok() {
                debug!("stage {} of `{}` failed with {}", i, pipeline, step.exit_code);
                return Ok(ExecutionResult {
                    stdout: step.stdout,
                    stderr,
                    exit_code: step.exit_code,
                });
            }
            text = step.stdout;
        }

        Ok(ExecutionResult {
            stdout: text,
            stderr,
            exit_code: 0,
        })
    }

    /// Spawns every command up front, one process group, then hands the
    /// group to the job manager. Stages must not be awaited one at a time:
    /// pipe buffers are bounded and a chatty stage would block forever.
    fn spawn_group(
        &self,
        commands: &[&PipelineCommand],
        text: &str,
        mut wiring: Wiring,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecError> {
        let (Some(first), Some(last_cmd)) = (commands.first(), commands.last()) else {
            return Ok(ExecutionResult::default());
        };
        let last = commands.len() - 1;

        // Files are opened before anything is spawned.
        let mut stdin_file = match first.input() {
            Some(r) if wiring.honor_input => Some(open_redirection(r, ctx)?),
            _ => None,
        };
        let mut stdout_file = match last_cmd.output() {
            Some(r) if wiring.honor_output => Some(open_redirection(r, ctx)?),
            _ => None,
        };

        let mut children: Vec<Child> = Vec::with_capacity(commands.len());
        let mut stderr_readers = Vec::new();
        let mut feed_writer = None;
        let mut pgid = 0;
        let claim_terminal = !wiring.background && self.jobs.claims_terminal();

        for (i, cmd) in commands.iter().enumerate() {
            let stdin = match children.last_mut().and_then(|prev| prev.stdout.take()) {
                Some(pipe) => Stdio::from(pipe),
                None => match stdin_file.take() {
                    Some(file) => Stdio::from(file),
                    None if wiring.feed.is_some() => Stdio::piped(),
                    None if wiring.background => Stdio::null(),
                    None => Stdio::inherit(),
                },
            };
            let stdout = if i < last {
                Stdio::piped()
            } else {
                match stdout_file.take() {
                    Some(file) => Stdio::from(file),
                    None if wiring.background => Stdio::inherit(),
                    None => Stdio::piped(),
                }
            };

            let mut command = Command::new(&cmd.program);
            command
                .args(&cmd.arguments)
                .env_clear()
                .envs(&ctx.env)
                .current_dir(&ctx.cwd)
                .stdin(stdin)
                .stdout(stdout)
                .stderr(if wiring.background {
                    Stdio::inherit()
                } else {
                    Stdio::piped()
                });
            signals::prepare_child(&mut command, pgid, claim_terminal);

            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    abort(children);
                    // Stages forked with the terminal claim may still own it.
                    if claim_terminal {
                        self.jobs.reclaim_terminal();
                    }
                    return Err(ExecError::spawn(&cmd.program, e));
                }
            };
            debug!("spawned `{}` as pid {} (pgid {})", cmd.program, child.id(), pgid);
            if i == 0 {
                pgid = child.id() as i32;
                if let (Some(feed), Some(pipe)) = (wiring.feed.take(), child.stdin.take()) {
                    feed_writer = Some(write_in_background(pipe, feed));
                }
            }
            if let Some(pipe) = child.stderr.take() {
                stderr_readers.push(read_in_background(pipe));
            }
            children.push(child);
        }

        let pids: Vec<Pid> = children
            .iter()
            .map(|child| Pid::from_raw(child.id() as i32))
            .collect();
        let stdout_reader = children
            .last_mut()
            .and_then(|child| child.stdout.take())
            .map(read_in_background);
        // From here on the job manager owns reaping.
        drop(children);

        let id = self.jobs.adopt(text.to_string(), pids.clone(), wiring.background);
        if wiring.background {
            return Ok(ExecutionResult::success(format!("[{}] {}\n", id, pgid)));
        }

        let outcome = self.jobs.wait_foreground(id)?;
        if let Some(writer) = feed_writer {
            let _ = writer.join();
        }
        match outcome {
            JobOutcome::Exited(exit_code) => Ok(ExecutionResult {
                stdout: stdout_reader.map(collect).unwrap_or_default(),
                stderr: stderr_readers.into_iter().map(collect).collect(),
                exit_code,
            }),
            // The readers stay attached to the stopped job's pipes.
            JobOutcome::Stopped => Ok(ExecutionResult::failure(
                signals::signaled_status(Signal::SIGTSTP),
                format!("[{}] stopped  {}\n", id, text),
            )),
            JobOutcome::Detached => Ok(ExecutionResult::success(format!("[{}] {}\n", id, pgid))),
        }
    }
}

fn open_redirection(redirection: &Redirection, ctx: &ExecutionContext) -> Result<File, ExecError> {
    let path = ctx.resolve(&redirection.target);
    let opened = match redirection.operator {
        RedirectOp::Input => File::open(&path),
        RedirectOp::Output => File::create(&path),
        RedirectOp::Append => OpenOptions::new().append(true).create(true).open(&path),
    };
    opened.map_err(|source| ExecError::RedirectionTargetUnavailable { path, source })
}

// Already-spawned siblings of a stage that failed to start.
fn abort(children: Vec<Child>) {
    for mut child in children {
        warn!("killing pid {} after failed spawn", child.id());
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn read_in_background<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!("pipe read ended early: {}", e);
        }
        buf
    })
}

fn write_in_background<W: Write + Send + 'static>(mut pipe: W, text: String) -> JoinHandle<()> {
    thread::spawn(move || {
        // The reader may legitimately exit without consuming everything.
        if let Err(e) = pipe.write_all(text.as_bytes()) {
            debug!("stdin feed ended early: {}", e);
        }
    })
}

fn collect(reader: JoinHandle<Vec<u8>>) -> String {
    let bytes = reader.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
