//! Job table and job control.
//!
//! Every spawned process group becomes a [`Job`]. Each process gets a watcher
//! thread blocked in `waitpid`; watchers never touch the table, they send
//! [`JobEvent`]s down a channel and a single update loop applies them. Control
//! operations (suspend, resume, kill, ...) run on the caller's thread under
//! the same mutex, so exit notifications and commands never lose updates.
//!
//! There is no timeout on jobs: a stalled foreground job blocks its caller
//! until someone interrupts it.

use std::collections::HashMap;
use std::fmt;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use thiserror::Error;

use super::executor::{ExecError, ExecutionContext, ExecutionResult};
use super::signals;
use crate::utils::terminal::{NoTerminal, TerminalHooks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
            JobStatus::Completed => "done",
        };
        write!(f, "{}", status)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    pub pgid: Pid,
    /// In pipeline order; the last one decides the exit code.
    pub pids: Vec<Pid>,
    pub status: JobStatus,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub is_background: bool,
    pub exit_code: Option<i32>,
    live: usize,
    // Stop/continue reports still expected for signals we sent ourselves.
    pending_stops: usize,
    pending_conts: usize,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.status, self.exit_code) {
            (JobStatus::Completed, Some(code)) if code != 0 => format!("exit {}", code),
            (status, _) => status.to_string(),
        };
        write!(
            f,
            "[{}] {} {} {}",
            self.id, self.pgid, status, self.command
        )
    }
}

/// How a foreground wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Exited(i32),
    Stopped,
    /// Still running, but no longer the foreground job.
    Detached,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("no such job: {0}")]
    UnknownJob(JobId),
    #[error("job {id}: cannot {op} a {status} job")]
    InvalidState {
        id: JobId,
        op: &'static str,
        status: JobStatus,
    },
    #[error("job {id}: {op} failed: {source}")]
    SignalDelivery {
        id: JobId,
        op: &'static str,
        source: Errno,
    },
    #[error("unknown signal: {0}")]
    UnknownSignal(String),
    #[error("no foreground job")]
    NoForegroundJob,
}

enum JobEvent {
    Stopped { id: JobId },
    Continued { id: JobId },
    Exited { id: JobId, pid: Pid, code: i32 },
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobId, Job>,
    next_id: u64,
    foreground: Option<JobId>,
}

impl JobTable {
    fn get_mut(&mut self, id: JobId) -> Result<&mut Job, JobError> {
        self.jobs.get_mut(&id).ok_or(JobError::UnknownJob(id))
    }

    fn release_foreground(&mut self, id: JobId) {
        if self.foreground == Some(id) {
            self.foreground = None;
        }
    }

    /// Returns a snapshot when the event completed the job.
    fn apply(&mut self, event: JobEvent) -> Option<Job> {
        match event {
            JobEvent::Stopped { id } => {
                let job = self.jobs.get_mut(&id)?;
                if job.pending_stops > 0 {
                    job.pending_stops -= 1;
                } else if job.status == JobStatus::Running {
                    info!("job {} stopped by signal", id);
                    job.status = JobStatus::Stopped;
                    job.is_background = true;
                    self.release_foreground(id);
                }
                None
            }
            JobEvent::Continued { id } => {
                let job = self.jobs.get_mut(&id)?;
                if job.pending_conts > 0 {
                    job.pending_conts -= 1;
                } else if job.status == JobStatus::Stopped {
                    info!("job {} continued by signal", id);
                    job.status = JobStatus::Running;
                }
                None
            }
            JobEvent::Exited { id, pid, code } => {
                let job = self.jobs.get_mut(&id)?;
                job.live = job.live.saturating_sub(1);
                if job.pids.last() == Some(&pid) {
                    job.exit_code = Some(code);
                }
                if job.live > 0 {
                    return None;
                }
                job.status = JobStatus::Completed;
                job.end_time = Some(Local::now());
                info!("job {} completed with {:?}", id, job.exit_code);
                let snapshot = job.clone();
                self.release_foreground(id);
                Some(snapshot)
            }
        }
    }
}

struct Shared {
    table: Mutex<JobTable>,
    changed: Condvar,
    terminal: Arc<dyn TerminalHooks>,
}

#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
    events: Sender<JobEvent>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self::with_hooks(Arc::new(NoTerminal), None)
    }

    /// `notify` receives a snapshot of every background job that completes.
    pub fn with_hooks(terminal: Arc<dyn TerminalHooks>, notify: Option<Sender<Job>>) -> Self {
        let shared = Arc::new(Shared {
            table: Mutex::new(JobTable::default()),
            changed: Condvar::new(),
            terminal,
        });
        let (events, receiver) = mpsc::channel();
        let loop_shared = Arc::clone(&shared);
        if let Err(e) = thread::Builder::new()
            .name("job-events".to_string())
            .spawn(move || update_loop(loop_shared, receiver, notify))
        {
            error!("cannot start job event loop: {}", e);
        }
        Self { shared, events }
    }

    fn table(&self) -> MutexGuard<'_, JobTable> {
        self.shared
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn claims_terminal(&self) -> bool {
        self.shared.terminal.claim_in_child()
    }

    pub(crate) fn reclaim_terminal(&self) {
        self.shared.terminal.after_foreground();
    }

    /// Spawns `program`, makes it the foreground job with the terminal's
    /// streams, and blocks until it exits or stops.
    pub fn run_in_foreground(
        &self,
        program: &str,
        args: &[String],
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecError> {
        let (command, pid) = self.spawn_job(program, args, ctx, false)?;
        let id = self.adopt(command.clone(), vec![pid], false);

        Ok(match self.wait_foreground(id)? {
            JobOutcome::Exited(code) => ExecutionResult::from_code(code),
            JobOutcome::Stopped => ExecutionResult::failure(
                signals::signaled_status(Signal::SIGTSTP),
                format!("[{}] stopped  {}\n", id, command),
            ),
            JobOutcome::Detached => ExecutionResult::success(format!("[{}] {}\n", id, pid)),
        })
    }

    pub fn run_in_background(
        &self,
        program: &str,
        args: &[String],
        ctx: &ExecutionContext,
    ) -> Result<Job, ExecError> {
        let (command, pid) = self.spawn_job(program, args, ctx, true)?;
        let id = self.adopt(command, vec![pid], true);
        self.get(id).ok_or_else(|| JobError::UnknownJob(id).into())
    }

    fn spawn_job(
        &self,
        program: &str,
        args: &[String],
        ctx: &ExecutionContext,
        background: bool,
    ) -> Result<(String, Pid), ExecError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .env_clear()
            .envs(&ctx.env)
            .current_dir(&ctx.cwd)
            .stdin(if background {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let claim_terminal = !background && self.claims_terminal();
        signals::prepare_child(&mut command, 0, claim_terminal);

        let child = command.spawn().map_err(|e| {
            // The forked child may have taken the terminal before exec failed.
            if claim_terminal {
                self.reclaim_terminal();
            }
            ExecError::spawn(program, e)
        })?;
        let text = shell_words::join(std::iter::once(program).chain(args.iter().map(String::as_str)));
        Ok((text, Pid::from_raw(child.id() as i32)))
    }

    /// Registers already spawned processes as one job. The first pid is the
    /// process group leader. From now on only this manager reaps them.
    pub fn adopt(&self, command: String, pids: Vec<Pid>, background: bool) -> JobId {
        let pgid = pids.first().copied().unwrap_or_else(|| Pid::from_raw(0));
        let now = Local::now();
        let id = {
            let mut table = self.table();
            table.next_id += 1;
            let id = JobId(table.next_id);
            let done = pids.is_empty();
            table.jobs.insert(
                id,
                Job {
                    id,
                    command,
                    pgid,
                    pids: pids.clone(),
                    status: if done {
                        JobStatus::Completed
                    } else {
                        JobStatus::Running
                    },
                    start_time: now,
                    end_time: done.then_some(now),
                    is_background: background,
                    exit_code: done.then_some(0),
                    live: pids.len(),
                    pending_stops: 0,
                    pending_conts: 0,
                },
            );
            if !background && !done {
                table.foreground = Some(id);
            }
            id
        };

        info!("job {} started (pgid {}, background={})", id, pgid, background);
        for pid in pids {
            self.watch(id, pid);
        }
        id
    }

    fn watch(&self, id: JobId, pid: Pid) {
        let events = self.events.clone();
        let spawned = thread::Builder::new()
            .name(format!("job-{}-{}", id, pid))
            .spawn(move || loop {
                let flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
                let event = match waitpid(pid, Some(flags)) {
                    Ok(WaitStatus::Exited(_, code)) => JobEvent::Exited { id, pid, code },
                    Ok(WaitStatus::Signaled(_, sig, _)) => JobEvent::Exited {
                        id,
                        pid,
                        code: signals::signaled_status(sig),
                    },
                    Ok(WaitStatus::Stopped(_, _)) => JobEvent::Stopped { id },
                    Ok(WaitStatus::Continued(_)) => JobEvent::Continued { id },
                    Ok(_) | Err(Errno::EINTR) => continue,
                    Err(e) => {
                        warn!("waitpid({}) failed: {}", pid, e);
                        JobEvent::Exited { id, pid, code: 1 }
                    }
                };
                let exited = matches!(event, JobEvent::Exited { .. });
                if events.send(event).is_err() || exited {
                    break;
                }
            });
        if let Err(e) = spawned {
            error!("cannot watch pid {} of job {}: {}", pid, id, e);
        }
    }

    /// Makes `id` the foreground job, hands it the terminal and blocks until
    /// it exits, stops, or is moved to the background.
    pub fn wait_foreground(&self, id: JobId) -> Result<JobOutcome, JobError> {
        let pgid = {
            let mut table = self.table();
            let job = table.get_mut(id)?;
            match job.status {
                JobStatus::Completed => return Ok(JobOutcome::Exited(job.exit_code.unwrap_or(0))),
                JobStatus::Stopped => return Ok(JobOutcome::Stopped),
                JobStatus::Running => {}
            }
            job.is_background = false;
            let pgid = job.pgid;
            table.foreground = Some(id);
            pgid
        };

        self.shared.terminal.before_foreground(pgid);
        let outcome = {
            let mut table = self.table();
            loop {
                let Some((status, code)) = table.jobs.get(&id).map(|job| (job.status, job.exit_code))
                else {
                    break Err(JobError::UnknownJob(id));
                };
                match status {
                    JobStatus::Completed => break Ok(JobOutcome::Exited(code.unwrap_or(0))),
                    JobStatus::Stopped => {
                        if let Some(job) = table.jobs.get_mut(&id) {
                            job.is_background = true;
                        }
                        table.release_foreground(id);
                        break Ok(JobOutcome::Stopped);
                    }
                    JobStatus::Running if table.foreground != Some(id) => {
                        break Ok(JobOutcome::Detached)
                    }
                    JobStatus::Running => {
                        table = self
                            .shared
                            .changed
                            .wait(table)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                }
            }
        };
        self.shared.terminal.after_foreground();
        debug!("foreground wait for job {} ended: {:?}", id, outcome);
        outcome
    }

    /// Blocks until `id` completes or `timeout` passes.
    pub fn wait_completion(&self, id: JobId, timeout: Duration) -> Option<Job> {
        let deadline = Instant::now() + timeout;
        let mut table = self.table();
        loop {
            let job = table.jobs.get(&id)?;
            if job.status == JobStatus::Completed {
                return Some(job.clone());
            }
            let left = deadline.checked_duration_since(Instant::now())?;
            table = self
                .shared
                .changed
                .wait_timeout(table, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn interrupt_foreground(&self) -> Result<JobId, JobError> {
        let table = self.table();
        let id = table.foreground.ok_or(JobError::NoForegroundJob)?;
        let job = table.jobs.get(&id).ok_or(JobError::UnknownJob(id))?;
        deliver(job, Signal::SIGINT, "interrupt")?;
        info!("interrupted foreground job {}", id);
        Ok(id)
    }

    pub fn suspend(&self, id: JobId) -> Result<(), JobError> {
        let mut table = self.table();
        let job = table.get_mut(id)?;
        if job.status != JobStatus::Running {
            return Err(JobError::InvalidState {
                id,
                op: "suspend",
                status: job.status,
            });
        }
        deliver(job, Signal::SIGSTOP, "suspend")?;
        job.pending_stops += job.live;
        job.status = JobStatus::Stopped;
        job.is_background = true;
        table.release_foreground(id);
        self.shared.changed.notify_all();
        info!("suspended job {}", id);
        Ok(())
    }

    /// Continues a stopped job; unless `to_background` it also becomes the
    /// foreground job (the caller then waits with [`JobManager::wait_foreground`]).
    pub fn resume(&self, id: JobId, to_background: bool) -> Result<(), JobError> {
        let mut table = self.table();
        let job = table.get_mut(id)?;
        if job.status != JobStatus::Stopped {
            return Err(JobError::InvalidState {
                id,
                op: "resume",
                status: job.status,
            });
        }
        deliver(job, Signal::SIGCONT, "resume")?;
        job.pending_conts += job.live;
        job.status = JobStatus::Running;
        job.is_background = to_background;
        if !to_background {
            table.foreground = Some(id);
        }
        self.shared.changed.notify_all();
        info!("resumed job {} (background={})", id, to_background);
        Ok(())
    }

    /// Moves a running job out of the foreground without signalling it.
    pub fn background(&self, id: JobId) -> Result<(), JobError> {
        let mut table = self.table();
        let job = table.get_mut(id)?;
        if job.status != JobStatus::Running {
            return Err(JobError::InvalidState {
                id,
                op: "background",
                status: job.status,
            });
        }
        job.is_background = true;
        table.release_foreground(id);
        self.shared.changed.notify_all();
        Ok(())
    }

    /// Sends a signal by name. Completion is left to the exit report, only
    /// stop and continue signals change the status right away.
    pub fn kill(&self, id: JobId, signal_name: &str) -> Result<(), JobError> {
        let sig = signals::parse_signal(signal_name)
            .ok_or_else(|| JobError::UnknownSignal(signal_name.to_string()))?;
        let mut table = self.table();
        let job = table.get_mut(id)?;
        if job.status == JobStatus::Completed {
            return Err(JobError::InvalidState {
                id,
                op: "kill",
                status: job.status,
            });
        }
        deliver(job, sig, "kill")?;
        info!("sent {} to job {}", sig, id);

        match (sig, job.status) {
            (sig, JobStatus::Running) if signals::is_stop_signal(sig) => {
                job.pending_stops += job.live;
                job.status = JobStatus::Stopped;
                job.is_background = true;
                table.release_foreground(id);
            }
            (Signal::SIGCONT, JobStatus::Stopped) => {
                job.pending_conts += job.live;
                job.status = JobStatus::Running;
            }
            (Signal::SIGCONT, _) => {}
            // Already stopped, nothing to follow up.
            (sig, JobStatus::Stopped) if signals::is_stop_signal(sig) => {}
            (_, JobStatus::Stopped) => {
                // A stopped group only acts on the signal once continued.
                if let Err(e) = killpg(job.pgid, Signal::SIGCONT) {
                    warn!("could not continue job {} after {}: {}", id, sig, e);
                }
            }
            _ => {}
        }
        self.shared.changed.notify_all();
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.table().jobs.get(&id).cloned()
    }

    pub fn foreground(&self) -> Option<JobId> {
        self.table().foreground
    }

    /// Snapshot of all jobs, ordered by id.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.table().jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// The most recent job that is not completed, as `fg`/`bg` default to.
    pub fn latest_active(&self) -> Option<JobId> {
        self.table()
            .jobs
            .values()
            .filter(|job| job.status != JobStatus::Completed)
            .map(|job| job.id)
            .max()
    }

    /// Drops completed jobs from the table, returning how many went away.
    pub fn cleanup(&self) -> usize {
        let mut table = self.table();
        let before = table.jobs.len();
        table.jobs.retain(|_, job| job.status != JobStatus::Completed);
        let removed = before - table.jobs.len();
        debug!("removed {} completed job(s)", removed);
        removed
    }
}

fn deliver(job: &Job, sig: Signal, op: &'static str) -> Result<(), JobError> {
    killpg(job.pgid, sig).map_err(|source| {
        warn!("{} of job {} failed: {}", op, job.id, source);
        JobError::SignalDelivery {
            id: job.id,
            op,
            source,
        }
    })
}

fn update_loop(shared: Arc<Shared>, events: Receiver<JobEvent>, notify: Option<Sender<Job>>) {
    for event in events {
        let finished = {
            let mut table = shared.table.lock().unwrap_or_else(PoisonError::into_inner);
            let finished = table.apply(event);
            shared.changed.notify_all();
            finished
        };
        if let (Some(job), Some(notify)) = (finished, &notify) {
            if job.is_background && notify.send(job).is_err() {
                debug!("job notification receiver is gone");
            }
        }
    }
    debug!("job event loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn ctx() -> ExecutionContext {
        ExecutionContext::from_current()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_foreground_run_completes() {
        let jobs = JobManager::new();
        let result = jobs.run_in_foreground("sh", &args(&["-c", "exit 3"]), &ctx()).unwrap();
        assert_eq!(result.exit_code, 3);
        let job = jobs.list().remove(0);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.end_time.is_some());
        assert!(!job.is_background);
        assert_eq!(jobs.foreground(), None);
    }

    #[test]
    fn test_foreground_missing_program() {
        let jobs = JobManager::new();
        let err = jobs.run_in_foreground("no-such-program-tide", &[], &ctx());
        assert!(matches!(err, Err(ExecError::ProgramNotFound { .. })));
        assert!(jobs.list().is_empty());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_background_completion_is_notified() {
        let (tx, rx) = mpsc::channel();
        let jobs = JobManager::with_hooks(Arc::new(NoTerminal), Some(tx));
        let job = jobs.run_in_background("sleep", &args(&["0.1"]), &ctx()).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.is_background);
        assert_eq!(jobs.foreground(), None);

        let done = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(done.id, job.id);
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.exit_code, Some(0));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_ids_increase() {
        let jobs = JobManager::new();
        let a = jobs.run_in_background("true", &[], &ctx()).unwrap();
        let b = jobs.run_in_background("true", &[], &ctx()).unwrap();
        assert!(b.id > a.id);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_suspend_resume_cycle() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();

        assert!(jobs.resume(job.id, true).is_err());
        jobs.suspend(job.id).unwrap();
        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Stopped);
        assert!(jobs.suspend(job.id).is_err());

        jobs.resume(job.id, true).unwrap();
        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Running);
        assert_eq!(jobs.foreground(), None);

        // Late stop/continue reports must not flip the state back.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Running);

        jobs.kill(job.id, "KILL").unwrap();
        let done = jobs.wait_completion(job.id, WAIT).unwrap();
        assert_eq!(done.exit_code, Some(137));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_resume_to_foreground_takes_the_slot() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        jobs.suspend(job.id).unwrap();
        jobs.resume(job.id, false).unwrap();
        assert_eq!(jobs.foreground(), Some(job.id));

        jobs.interrupt_foreground().unwrap();
        assert_eq!(jobs.wait_foreground(job.id).unwrap(), JobOutcome::Exited(130));
        assert_eq!(jobs.foreground(), None);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_kill_stopped_job_completes() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        jobs.suspend(job.id).unwrap();
        jobs.kill(job.id, "TERM").unwrap();
        // Completion comes from the exit report, not from kill itself.
        let done = jobs.wait_completion(job.id, WAIT).unwrap();
        assert_eq!(done.exit_code, Some(143));
        assert!(jobs.kill(job.id, "TERM").is_err());
    }

    // Waits until the manager has seen the reports for its own stops/continues.
    fn settle(jobs: &JobManager, id: JobId) {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            let pending = jobs
                .table()
                .jobs
                .get(&id)
                .map_or(0, |job| job.pending_stops + job.pending_conts);
            if pending == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    // Process state letter from /proc, `T` for stopped.
    #[cfg(target_os = "linux")]
    fn proc_state(pid: Pid) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        stat.rsplit(')').next()?.trim_start().chars().next()
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_stop_signal_on_stopped_job_keeps_it_stopped() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        jobs.suspend(job.id).unwrap();

        for name in ["STOP", "TSTP"] {
            jobs.kill(job.id, name).unwrap();
        }
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Stopped);
        #[cfg(target_os = "linux")]
        assert_eq!(proc_state(job.pgid), Some('T'));

        jobs.kill(job.id, "KILL").unwrap();
        jobs.wait_completion(job.id, WAIT).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_wait_foreground_on_stopped_job_leaves_slot_empty() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        jobs.suspend(job.id).unwrap();

        assert_eq!(jobs.wait_foreground(job.id).unwrap(), JobOutcome::Stopped);
        assert_eq!(jobs.foreground(), None);
        assert!(jobs.get(job.id).unwrap().is_background);
        assert!(matches!(jobs.interrupt_foreground(), Err(JobError::NoForegroundJob)));

        jobs.kill(job.id, "KILL").unwrap();
        jobs.wait_completion(job.id, WAIT).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_stopped_while_waiting_releases_slot() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        jobs.suspend(job.id).unwrap();
        settle(&jobs, job.id);
        jobs.resume(job.id, false).unwrap();
        settle(&jobs, job.id);
        // Stopped again from outside before anyone waits on it.
        killpg(job.pgid, Signal::SIGTSTP).unwrap();

        assert_eq!(jobs.wait_foreground(job.id).unwrap(), JobOutcome::Stopped);
        assert_eq!(jobs.foreground(), None);

        jobs.kill(job.id, "KILL").unwrap();
        jobs.wait_completion(job.id, WAIT).unwrap();
    }

    #[test]
    fn test_operations_on_unknown_job() {
        let jobs = JobManager::new();
        let ghost = JobId(42);
        assert!(matches!(jobs.suspend(ghost), Err(JobError::UnknownJob(_))));
        assert!(matches!(jobs.resume(ghost, false), Err(JobError::UnknownJob(_))));
        assert!(matches!(jobs.kill(ghost, "TERM"), Err(JobError::UnknownJob(_))));
        assert!(matches!(jobs.interrupt_foreground(), Err(JobError::NoForegroundJob)));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_unknown_signal() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        assert!(matches!(jobs.kill(job.id, "BOGUS"), Err(JobError::UnknownSignal(_))));
        jobs.kill(job.id, "9").unwrap();
        jobs.wait_completion(job.id, WAIT).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cleanup_keeps_unfinished_jobs() {
        let jobs = JobManager::new();
        let quick = jobs.run_in_background("true", &[], &ctx()).unwrap();
        let slow = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        jobs.wait_completion(quick.id, WAIT).unwrap();

        // Completed jobs stay listed until cleaned up.
        assert_eq!(jobs.list().len(), 2);
        assert_eq!(jobs.cleanup(), 1);
        let left = jobs.list();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, slow.id);

        jobs.kill(slow.id, "KILL").unwrap();
        jobs.wait_completion(slow.id, WAIT).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_background_detaches_foreground_waiter() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sleep", &args(&["10"]), &ctx()).unwrap();
        let waiter = {
            let jobs = jobs.clone();
            std::thread::spawn(move || jobs.wait_foreground(job.id))
        };
        while jobs.foreground() != Some(job.id) {
            std::thread::sleep(Duration::from_millis(10));
        }
        jobs.background(job.id).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), JobOutcome::Detached);

        jobs.kill(job.id, "KILL").unwrap();
        jobs.wait_completion(job.id, WAIT).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_display() {
        let jobs = JobManager::new();
        let job = jobs.run_in_background("sh", &args(&["-c", "exit 4"]), &ctx()).unwrap();
        let done = jobs.wait_completion(job.id, WAIT).unwrap();
        let line = done.to_string();
        assert!(line.starts_with(&format!("[{}] ", job.id)));
        assert!(line.contains("exit 4"));
        assert!(line.ends_with("sh -c 'exit 4'"));
    }
}
