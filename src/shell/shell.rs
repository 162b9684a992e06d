use log::{debug, error, warn};
use std::error::Error;
use std::io::Write;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use crate::shell::builtins::Builtin;
use crate::shell::executor::{ChainEvaluator, ExecutionContext, ExecutionResult, Orchestrator};
use crate::shell::job_manager::{Job, JobManager};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::router::{route, Route};
use crate::shell::script::TextTransforms;
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::terminal::Tty;
use crate::utils::theme::Theme;

enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    theme: Theme,
    readline: ReadlineManager,
    chain: ChainEvaluator,
    ctx: ExecutionContext,
    notices: Receiver<Job>,
    last_status: i32,
}

impl Shell {
    pub fn new(config: &Config, theme: Theme) -> Result<Self, Box<dyn Error>> {
        // Only the foreground job should see Ctrl-C / Ctrl-Z, and taking the
        // terminal back must not stop the shell with SIGTTOU.
        signals::ignore_job_control_signals();
        let (notify, notices) = mpsc::channel();
        let jobs = JobManager::with_hooks(Arc::new(Tty::new()), Some(notify));
        let orchestrator = Orchestrator::new(jobs).with_scripts(Arc::new(TextTransforms));

        Ok(Self {
            theme,
            readline: ReadlineManager::new(config)?,
            chain: ChainEvaluator::new(orchestrator),
            ctx: ExecutionContext::from_current(),
            notices,
            last_status: 0,
        })
    }

    fn jobs(&self) -> &JobManager {
        self.chain.orchestrator().jobs()
    }

    /// Runs one line without the interactive loop and returns its status.
    pub fn run_line(&mut self, line: &str) -> i32 {
        self.handle_input(line);
        self.last_status
    }

    pub fn run(&mut self) -> Result<i32, Box<dyn Error>> {
        debug!("starting tide");
        println!(
            "{}",
            (self.theme.success_style)(self.theme.get_message("welcome"))
        );
        println!(
            "{}",
            (self.theme.warning_style)(self.theme.get_message("help"))
        );

        self.run_loop()?;
        debug!("leaving tide");
        Ok(self.last_status)
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            self.report_finished_jobs();
            std::io::stdout().flush()?;
            let prompt = self.theme.prompt(&self.ctx.cwd);

            match self.readline.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        self.readline.add_history(&line)?;
                    }
                    if let Flow::Exit = self.handle_input(&line) {
                        println!(
                            "{}",
                            (self.theme.success_style)(self.theme.get_message("exit"))
                        );
                        break;
                    }
                }
                Err(ReadlineError::Eof) => {
                    warn!("EOF on input, leaving");
                    println!(
                        "\n{}",
                        (self.theme.warning_style)(self.theme.get_message("eof_signal"))
                    );
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    println!(
                        "{}",
                        (self.theme.warning_style)(self.theme.get_message("interrupt_signal"))
                    );
                }
                // Anything else (EIO on a lost terminal) would fail again on
                // every prompt.
                Err(err) => {
                    error!("readline failed, leaving: {}", err);
                    eprintln!(
                        "{}: {}",
                        (self.theme.error_style)(self.theme.get_message("error")),
                        err
                    );
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) -> Flow {
        let result = match route(line) {
            Route::Empty => return Flow::Continue,
            Route::Builtin(Builtin::Exit, args) => {
                if let Some(code) = args.first().and_then(|arg| arg.parse().ok()) {
                    self.last_status = code;
                }
                return Flow::Exit;
            }
            Route::Builtin(builtin, args) => {
                let jobs = self.jobs().clone();
                builtin.run(&args, &jobs, &mut self.ctx).unwrap_or_else(|e| {
                    warn!("builtin {:?} failed: {}", builtin, e);
                    ExecutionResult::failure(1, format!("tide: {}", e))
                })
            }
            Route::Chain(line) => {
                debug!("evaluating chain `{}`", line);
                self.chain.execute_line(&line, &self.ctx)
            }
            Route::Plain(command) => {
                debug!("running `{}` in foreground", command.program);
                self.jobs()
                    .run_in_foreground(&command.program, &command.arguments, &self.ctx)
                    .unwrap_or_else(ExecutionResult::from)
            }
        };
        self.show(&result);
        self.last_status = result.exit_code;
        Flow::Continue
    }

    fn show(&self, result: &ExecutionResult) {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
            if !result.stdout.ends_with('\n') {
                println!();
            }
        }
        let stderr = result.stderr.trim_end();
        if !stderr.is_empty() {
            eprintln!("{}", (self.theme.error_style)(stderr.to_string()));
        }
        if !result.ok() {
            eprintln!(
                "{} {}",
                self.theme.error_symbol,
                (self.theme.error_style)(format!("exit {}", result.exit_code))
            );
        }
    }

    fn report_finished_jobs(&self) {
        for job in self.notices.try_iter() {
            println!(
                "{} {}",
                self.theme.success_symbol,
                (self.theme.success_style)(job.to_string())
            );
        }
    }
}
