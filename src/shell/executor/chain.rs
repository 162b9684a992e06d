use log::{debug, info};

use super::{ExecutionContext, ExecutionResult, Orchestrator, STATUS_PARSE_ERROR};
use crate::shell::parser::{parse_chain, parse_pipeline, ChainLink, ChainOp, CommandChain};

/// Evaluates `&&` / `||` / `;` chains link by link.
///
/// The operator attached to a link decides whether the *next* link runs:
/// `&&` needs the last decision code to be zero, `||` needs it non-zero and
/// `;` always continues. A link skipped after `&&` counts as a failure for
/// the following decision; one skipped after `||` leaves the code alone.
#[derive(Clone)]
pub struct ChainEvaluator {
    orchestrator: Orchestrator,
}

impl ChainEvaluator {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn execute_line(&self, line: &str, ctx: &ExecutionContext) -> ExecutionResult {
        self.execute(&parse_chain(line), ctx)
    }

    pub fn execute(&self, chain: &CommandChain, ctx: &ExecutionContext) -> ExecutionResult {
        let mut outputs: Vec<String> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        // Code the next operator looks at.
        let mut decision = 0;
        // Code of the last link that actually ran.
        let mut last_run = 0;
        let mut gate: Option<ChainOp> = None;

        for (i, link) in chain.iter().enumerate() {
            let runs = match gate {
                None | Some(ChainOp::Seq) => true,
                Some(ChainOp::And) => decision == 0,
                Some(ChainOp::Or) => decision != 0,
            };

            if runs {
                let result = self.run_link(link, ctx);
                debug!("link {} `{}` exited {}", i, link.pipeline, result.exit_code);
                push_trimmed(&mut outputs, &result.stdout);
                push_trimmed(&mut errors, &result.stderr);
                decision = result.exit_code;
                last_run = result.exit_code;
            } else {
                info!("skipping `{}`", link.pipeline);
                if gate == Some(ChainOp::And) {
                    decision = 1;
                }
            }
            gate = link.operator;
        }

        ExecutionResult {
            stdout: outputs.join("\n"),
            stderr: errors.join("\n"),
            exit_code: last_run,
        }
    }

    // A malformed link fails on its own; the rest of the chain carries on.
    fn run_link(&self, link: &ChainLink, ctx: &ExecutionContext) -> ExecutionResult {
        match parse_pipeline(&link.pipeline) {
            Ok(pipeline) => self.orchestrator.execute(&pipeline, ctx),
            Err(e) => ExecutionResult::failure(STATUS_PARSE_ERROR, format!("tide: {}\n", e)),
        }
    }
}

fn push_trimmed(pieces: &mut Vec<String>, text: &str) {
    let trimmed = text.trim_end_matches('\n');
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}
