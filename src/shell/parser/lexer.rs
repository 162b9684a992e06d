use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(String),
    Redirect(RedirectOp),
    EOF,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            RedirectOp::Input => "<",
            RedirectOp::Output => ">",
            RedirectOp::Append => ">>",
        };
        write!(f, "{}", op)
    }
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.peek_char() {
            None => Token::EOF,
            Some('<') => {
                self.read_char();
                Token::Redirect(RedirectOp::Input)
            }
            Some('>') => {
                self.read_char();
                if self.peek_char() == Some('>') {
                    self.read_char();
                    Token::Redirect(RedirectOp::Append)
                } else {
                    Token::Redirect(RedirectOp::Output)
                }
            }
            Some(_) => self.read_word(),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    // Quoted runs and bare runs glue together into one word: a"b c" -> ab c.
    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == '<' || c == '>' {
                break;
            }
            self.read_char();
            match c {
                '"' | '\'' => self.read_quoted(c, &mut word),
                // outside quotes a backslash is plain data
                _ => word.push(c),
            }
        }

        Token::Word(word)
    }

    fn read_quoted(&mut self, quote: char, word: &mut String) {
        let mut escaped = false;

        while let Some(c) = self.read_char() {
            match (escaped, c) {
                (true, _) => {
                    word.push(c);
                    escaped = false;
                }
                (false, '\\') => escaped = true,
                (false, c) if c == quote => return,
                (false, c) => word.push(c),
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            Token::EOF => None,
            token => Some(token),
        }
    }
}

pub fn tokenize(line: &str) -> Vec<Token> {
    Lexer::new(line).collect()
}

/// Characters of `line` that sit outside any quote, with their byte offsets.
/// Quote delimiters themselves are never reported.
pub(crate) fn unquoted_chars(line: &str) -> Vec<(usize, char)> {
    let mut chars = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None => chars.push((i, c)),
        }
    }
    chars
}
