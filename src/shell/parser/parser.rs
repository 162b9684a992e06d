use log::debug;

use super::ast::{ChainLink, ChainOp, CommandChain, Pipeline, PipelineCommand, Redirection, Stage};
use super::lexer::{tokenize, unquoted_chars, RedirectOp, Token};
use super::ParseError;

/// A pipeline stage starting with this character is handed to the script
/// evaluator instead of being spawned.
pub const SCRIPT_SIGIL: char = '@';

pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    current_token: Token,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(tokens: T) -> Self {
        let mut tokens = tokens.into_iter();
        let current_token = tokens.next().unwrap_or(Token::EOF);
        Parser {
            tokens,
            current_token,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.tokens.next().unwrap_or(Token::EOF);
    }

    /// The first word is the program, other words are arguments, and
    /// redirections may appear anywhere.
    pub fn parse_command(mut self) -> Result<PipelineCommand, ParseError> {
        let mut program = None;
        let mut command = PipelineCommand::default();

        loop {
            match &self.current_token {
                Token::EOF => break,
                Token::Redirect(op) => {
                    let redirection = self.parse_redirection(*op)?;
                    command.redirections.push(redirection);
                }
                Token::Word(word) => {
                    if program.is_none() {
                        program = Some(word.clone());
                    } else {
                        command.arguments.push(word.clone());
                    }
                    self.next_token();
                }
            }
        }

        command.program = program.ok_or(ParseError::EmptyCommand)?;
        Ok(command)
    }

    fn parse_redirection(&mut self, operator: RedirectOp) -> Result<Redirection, ParseError> {
        self.next_token(); // skip the operator

        match &self.current_token {
            Token::Word(target) => {
                let redirection = Redirection {
                    operator,
                    target: target.clone(),
                };
                self.next_token();
                Ok(redirection)
            }
            _ => Err(ParseError::MalformedRedirection(operator)),
        }
    }
}

pub fn parse_command(tokens: Vec<Token>) -> Result<PipelineCommand, ParseError> {
    Parser::new(tokens).parse_command()
}

pub fn parse_pipeline(line: &str) -> Result<Pipeline, ParseError> {
    let (body, background) = strip_background(line);
    if body.trim().is_empty() {
        return Err(ParseError::EmptyPipeline);
    }

    let stages = split_unquoted(body, '|')
        .into_iter()
        .map(parse_stage)
        .collect::<Result<Vec<_>, _>>()?;

    debug!("parsed pipeline: {} stage(s), background={}", stages.len(), background);
    Ok(Pipeline { stages, background })
}

pub fn parse_chain(line: &str) -> CommandChain {
    let chars = unquoted_chars(line);
    let mut links = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let doubled = chars
            .get(i + 1)
            .is_some_and(|&(next_pos, next)| next == c && next_pos == pos + 1);

        let (operator, width) = match c {
            '&' if doubled => (ChainOp::And, 2),
            '|' if doubled => (ChainOp::Or, 2),
            ';' => (ChainOp::Seq, 1),
            _ => {
                i += 1;
                continue;
            }
        };

        links.push(ChainLink {
            pipeline: line[start..pos].trim().to_string(),
            operator: Some(operator),
        });
        start = pos + width;
        i += width;
    }

    let tail = line[start..].trim();
    if tail.is_empty() {
        if let Some(last) = links.last_mut() {
            last.operator = None;
        }
    } else {
        links.push(ChainLink {
            pipeline: tail.to_string(),
            operator: None,
        });
    }
    links
}

fn parse_stage(segment: &str) -> Result<Stage, ParseError> {
    let segment = segment.trim();
    if let Some(code) = segment.strip_prefix(SCRIPT_SIGIL) {
        let code = code.trim();
        if code.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        return Ok(Stage::Script(code.to_string()));
    }
    parse_command(tokenize(segment)).map(Stage::Process)
}

// A trailing `&` only counts when it is unquoted and set off by whitespace.
pub(crate) fn strip_background(line: &str) -> (&str, bool) {
    let line = line.trim_end();
    let chars = unquoted_chars(line);
    match chars.as_slice() {
        [.., (before, b), (last, '&')]
            if *last + 1 == line.len() && *before + b.len_utf8() == *last && b.is_whitespace() =>
        {
            (&line[..*last], true)
        }
        [(last, '&')] if *last == 0 && line.len() == 1 => ("", true),
        _ => (line, false),
    }
}

fn split_unquoted(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (pos, c) in unquoted_chars(text) {
        if c == separator {
            parts.push(&text[start..pos]);
            start = pos + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(stage: &Stage) -> &str {
        match stage {
            Stage::Process(cmd) => &cmd.program,
            Stage::Script(code) => code,
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_simple_command() {
        let cmd = parse_command(tokenize("ls -l")).unwrap();
        assert_eq!(cmd.program, "ls");
        assert_eq!(cmd.arguments, vec!["-l"]);
        assert!(cmd.redirections.is_empty());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipeline() {
        let pipeline = parse_pipeline("a | b | c").unwrap();
        assert_eq!(pipeline.stages.len(), 3);
        let names: Vec<&str> = pipeline.stages.iter().map(program).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(!pipeline.background);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_quoted_pipe_is_data() {
        let pipeline = parse_pipeline(r#"echo "a | b" | cat"#).unwrap();
        assert_eq!(pipeline.stages.len(), 2);
        match &pipeline.stages[0] {
            Stage::Process(cmd) => assert_eq!(cmd.arguments, vec!["a | b"]),
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirection() {
        let cmd = parse_command(tokenize("echo hello > output.txt")).unwrap();
        assert_eq!(cmd.program, "echo");
        assert_eq!(cmd.arguments, vec!["hello"]);
        assert_eq!(cmd.redirections.len(), 1);
        assert_eq!(cmd.redirections[0].target, "output.txt");
        assert_eq!(cmd.redirections[0].operator, RedirectOp::Output);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_last_redirection_wins() {
        let cmd = parse_command(tokenize("cmd > a >> b < x < y")).unwrap();
        assert_eq!(cmd.output().unwrap().target, "b");
        assert_eq!(cmd.output().unwrap().operator, RedirectOp::Append);
        assert_eq!(cmd.input().unwrap().target, "y");
    }

    #[test]
    fn test_malformed_redirection() {
        assert_eq!(
            parse_command(tokenize("echo hi >")),
            Err(ParseError::MalformedRedirection(RedirectOp::Output))
        );
        assert_eq!(
            parse_command(tokenize("cat < > x")),
            Err(ParseError::MalformedRedirection(RedirectOp::Input))
        );
    }

    #[test]
    fn test_empty_stage() {
        assert_eq!(parse_pipeline("ls | | wc"), Err(ParseError::EmptyCommand));
        assert_eq!(parse_pipeline("   "), Err(ParseError::EmptyPipeline));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_background() {
        let pipeline = parse_pipeline("sleep 1 &").unwrap();
        assert!(pipeline.background);
        assert_eq!(pipeline.stages.len(), 1);
        match &pipeline.stages[0] {
            Stage::Process(cmd) => {
                assert_eq!(cmd.program, "sleep");
                assert_eq!(cmd.arguments, vec!["1"]);
            }
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_ampersand_without_space_or_quoted() {
        let glued = parse_pipeline("echo a&").unwrap();
        assert!(!glued.background);
        let quoted = parse_pipeline("echo '&'").unwrap();
        assert!(!quoted.background);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_script_stage() {
        let pipeline = parse_pipeline("ls | @upper | wc -l").unwrap();
        assert!(pipeline.has_script_stage());
        assert_eq!(pipeline.stages[1], Stage::Script("upper".to_string()));
        assert!(!pipeline.stages[0].is_script());
    }

    #[test]
    fn test_chain_operators() {
        let chain = parse_chain("a && b || c ; d");
        let shape: Vec<(&str, Option<ChainOp>)> = chain
            .iter()
            .map(|l| (l.pipeline.as_str(), l.operator))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("a", Some(ChainOp::And)),
                ("b", Some(ChainOp::Or)),
                ("c", Some(ChainOp::Seq)),
                ("d", None),
            ]
        );
    }

    #[test]
    fn test_chain_keeps_pipes_and_background() {
        let chain = parse_chain("ls | wc -l && sleep 1 &");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].pipeline, "ls | wc -l");
        assert_eq!(chain[1].pipeline, "sleep 1 &");
    }

    #[test]
    fn test_chain_quoted_operators() {
        let chain = parse_chain(r#"echo "a && b" ; echo 'x || y'"#);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].pipeline, r#"echo "a && b""#);
        assert_eq!(chain[1].operator, None);
    }

    #[test]
    fn test_chain_trailing_separator() {
        let chain = parse_chain("echo a;");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].operator, None);
        assert!(parse_chain("").is_empty());
    }
}
