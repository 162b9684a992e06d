use log::{debug, warn};
use nix::unistd::Pid;

/// Called around every stretch of time in which a foreground job owns the
/// terminal.
pub trait TerminalHooks: Send + Sync {
    fn before_foreground(&self, _pgid: Pid) {}
    fn after_foreground(&self) {}

    /// Whether freshly spawned foreground children should grab the terminal
    /// themselves before exec.
    fn claim_in_child(&self) -> bool {
        false
    }
}

/// Hooks for non-interactive use: nothing to hand over.
pub struct NoTerminal;

impl TerminalHooks for NoTerminal {}

/// Hands the controlling terminal to the foreground job's process group and
/// takes it back afterwards. Inert when stdin is not a terminal.
pub struct Tty {
    shell_pgid: libc::pid_t,
    interactive: bool,
}

impl Tty {
    pub fn new() -> Self {
        // SAFETY: plain libc queries without pointers.
        let (interactive, shell_pgid) =
            unsafe { (libc::isatty(libc::STDIN_FILENO) == 1, libc::getpgrp()) };
        debug!("terminal: interactive={} shell pgid={}", interactive, shell_pgid);
        Self {
            shell_pgid,
            interactive,
        }
    }

    fn give_to(&self, pgid: libc::pid_t) {
        if !self.interactive {
            return;
        }
        // SAFETY: tcsetpgrp takes an fd and a pid, no memory is shared.
        if unsafe { libc::tcsetpgrp(libc::STDIN_FILENO, pgid) } != 0 {
            warn!(
                "tcsetpgrp({}) failed: {}",
                pgid,
                std::io::Error::last_os_error()
            );
        }
    }
}

impl Default for Tty {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalHooks for Tty {
    fn before_foreground(&self, pgid: Pid) {
        self.give_to(pgid.as_raw());
    }

    fn after_foreground(&self) {
        self.give_to(self.shell_pgid);
    }

    fn claim_in_child(&self) -> bool {
        self.interactive
    }
}
