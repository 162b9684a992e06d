//! Decides which part of the shell handles an input line.

use log::debug;

use super::builtins::Builtin;
use super::parser::lexer::unquoted_chars;
use super::parser::parser::strip_background;
use super::parser::{parse_command, tokenize, PipelineCommand, Token};

#[derive(Debug, PartialEq)]
pub enum Route {
    Empty,
    Builtin(Builtin, Vec<String>),
    /// Anything with pipes, redirections, chain operators or `&`.
    Chain(String),
    Plain(PipelineCommand),
}

/// True when `line` uses any unquoted `|`, `>`, `>>`, `<`, `&&`, `||`, `;`
/// or ends in a background `&`.
pub fn is_pipeline_or_chain(line: &str) -> bool {
    let chars = unquoted_chars(line);
    let operator = chars.iter().enumerate().any(|(i, &(pos, c))| match c {
        '|' | '>' | '<' | ';' => true,
        '&' => chars
            .get(i + 1)
            .is_some_and(|&(next_pos, next)| next == '&' && next_pos == pos + 1),
        _ => false,
    });
    operator || strip_background(line).1
}

pub fn route(line: &str) -> Route {
    let line = line.trim();
    if line.is_empty() {
        return Route::Empty;
    }
    if is_pipeline_or_chain(line) {
        return Route::Chain(line.to_string());
    }

    let tokens = tokenize(line);
    if let Some(Token::Word(first)) = tokens.first() {
        if let Some(builtin) = Builtin::from_name(first) {
            let args = tokens
                .into_iter()
                .skip(1)
                .filter_map(|token| match token {
                    Token::Word(word) => Some(word),
                    _ => None,
                })
                .collect();
            return Route::Builtin(builtin, args);
        }
    }

    match parse_command(tokens) {
        Ok(command) => Route::Plain(command),
        // Only an all-whitespace or otherwise wordless line ends up here; let
        // the chain evaluator report it.
        Err(e) => {
            debug!("`{}` is not a plain command: {}", line, e);
            Route::Chain(line.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_operators() {
        for line in [
            "ls | wc",
            "echo hi > out",
            "echo hi >> out",
            "sort < in",
            "true && false",
            "true || false",
            "a; b",
            "sleep 1 &",
        ] {
            assert!(is_pipeline_or_chain(line), "{}", line);
        }
    }

    #[test]
    fn test_plain_lines() {
        for line in ["ls -la", "echo 'a | b'", "echo \"x > y\"", "echo a&b", "echo '&&'"] {
            assert!(!is_pipeline_or_chain(line), "{}", line);
        }
    }

    #[test]
    fn test_route() {
        assert_eq!(route("   "), Route::Empty);
        assert_eq!(route("ls | wc"), Route::Chain("ls | wc".to_string()));
        assert_eq!(
            route("fg 2"),
            Route::Builtin(Builtin::Fg, vec!["2".to_string()])
        );
        match route("echo 'hello world'") {
            Route::Plain(command) => {
                assert_eq!(command.program, "echo");
                assert_eq!(command.arguments, vec!["hello world"]);
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_builtin_inside_chain_is_a_chain() {
        assert!(matches!(route("cd /tmp && ls"), Route::Chain(_)));
    }
}
