//! Signal plumbing shared by the orchestrator and the job manager.

use std::os::unix::process::CommandExt;
use std::process::Command;
use std::str::FromStr;

use log::{debug, warn};
use nix::sys::signal::{self, SigHandler, Signal};

/// Signals the interactive shell ignores so that only the foreground job
/// reacts to Ctrl-C / Ctrl-Z and so the shell can take the terminal back.
const JOB_CONTROL_SIGNALS: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

pub fn ignore_job_control_signals() {
    for sig in JOB_CONTROL_SIGNALS {
        // SAFETY: SigIgn installs no handler code.
        if let Err(e) = unsafe { signal::signal(sig, SigHandler::SigIgn) } {
            warn!("could not ignore {}: {}", sig, e);
        }
    }
    debug!("shell ignores job control signals");
}

/// Ignored dispositions survive exec, so children start with defaults again
/// and run in a fresh process group (`pgid` 0 makes the child its own leader).
///
/// With `claim_terminal` the child makes its group the terminal's foreground
/// group before exec, so it never races the shell's own hand-over and gets
/// stopped by SIGTTIN. SIGTTOU is still ignored at that point.
pub fn prepare_child(command: &mut Command, pgid: i32, claim_terminal: bool) {
    command.process_group(pgid);
    // SAFETY: only async-signal-safe libc calls between fork and exec.
    unsafe {
        command.pre_exec(move || {
            if claim_terminal {
                libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpgrp());
            }
            for sig in JOB_CONTROL_SIGNALS {
                libc::signal(sig as libc::c_int, libc::SIG_DFL);
            }
            Ok(())
        });
    }
}

/// Accepts `TERM`, `SIGTERM`, `-term`, `15` and `-15`.
pub fn parse_signal(name: &str) -> Option<Signal> {
    let name = name.trim().trim_start_matches('-');
    if let Ok(number) = name.parse::<i32>() {
        return Signal::try_from(number).ok();
    }
    let upper = name.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&full).ok()
}

/// Signals whose default action stops the process.
pub fn is_stop_signal(sig: Signal) -> bool {
    matches!(
        sig,
        Signal::SIGSTOP | Signal::SIGTSTP | Signal::SIGTTIN | Signal::SIGTTOU
    )
}

/// Conventional shell status for a process killed by `sig`.
pub fn signaled_status(sig: Signal) -> i32 {
    128 + sig as i32
}
