pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

use thiserror::Error;

use lexer::RedirectOp;

pub use ast::{ChainLink, ChainOp, CommandChain, Pipeline, PipelineCommand, Redirection, Stage};
pub use lexer::{tokenize, Token};
pub use parser::{parse_chain, parse_command, parse_pipeline, SCRIPT_SIGIL};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing target after redirection operator `{0}`")]
    MalformedRedirection(RedirectOp),
    #[error("empty command")]
    EmptyCommand,
    #[error("empty pipeline")]
    EmptyPipeline,
}
