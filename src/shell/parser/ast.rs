use std::fmt;

use super::lexer::RedirectOp;

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub operator: RedirectOp,
    pub target: String,
}

/// One program invocation inside a pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineCommand {
    pub program: String,
    pub arguments: Vec<String>,
    pub redirections: Vec<Redirection>,
}

impl PipelineCommand {
    /// Effective input redirection. When several are given the last one wins.
    pub fn input(&self) -> Option<&Redirection> {
        self.redirections
            .iter()
            .rev()
            .find(|r| r.operator == RedirectOp::Input)
    }

    /// Effective output redirection (`>` or `>>`), last one wins.
    pub fn output(&self) -> Option<&Redirection> {
        self.redirections
            .iter()
            .rev()
            .find(|r| r.operator != RedirectOp::Input)
    }

    pub fn command_line(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.arguments.iter()))
    }
}

/// A pipeline stage is either a real program or a chunk of script code that
/// an in-process evaluator runs over text.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Process(PipelineCommand),
    Script(String),
}

impl Stage {
    pub fn is_script(&self) -> bool {
        matches!(self, Stage::Script(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Process(cmd) => write!(f, "{}", cmd.command_line()),
            Stage::Script(code) => write!(f, "@{}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub background: bool,
}

impl Pipeline {
    pub fn has_script_stage(&self) -> bool {
        self.stages.iter().any(Stage::is_script)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", stages.join(" | "))?;
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

/// Relation between a chain link and the link after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOp {
    And,
    Or,
    Seq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub pipeline: String,
    pub operator: Option<ChainOp>,
}

pub type CommandChain = Vec<ChainLink>;
