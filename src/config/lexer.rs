use std::iter::Peekable;
use std::str::Chars;

use crate::config::parser::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Identifier(String),
    Bool(bool),
    Integer(u64),
    Str(String),
    Assign,
    OpenBracket,
    CloseBracket,
    Comma,
    End,
}

impl Token {
    /// Text of the token as it would appear in the source, used in error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => name.clone(),
            Token::Bool(value) => value.to_string(),
            Token::Integer(value) => value.to_string(),
            Token::Str(value) => format!("\"{}\"", value),
            Token::Assign => "=".to_string(),
            Token::OpenBracket => "[".to_string(),
            Token::CloseBracket => "]".to_string(),
            Token::Comma => ",".to_string(),
            Token::End => "end of file".to_string(),
        }
    }
}

/// Splits configuration text into tokens, tracking the current line.
pub(crate) struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    pub(crate) fn line(&self) -> u32 {
        self.line
    }

    pub(crate) fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();

        let Some(&c) = self.chars.peek() else {
            return Ok(Token::End);
        };

        let token = match c {
            '=' => self.punctuation(Token::Assign),
            '[' => self.punctuation(Token::OpenBracket),
            ']' => self.punctuation(Token::CloseBracket),
            ',' => self.punctuation(Token::Comma),
            '"' => self.read_string()?,
            c if c.is_ascii_alphabetic() || c == '_' => {
                let word = self.take_while(|c| c.is_ascii_alphabetic() || c == '_');
                match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Identifier(word),
                }
            }
            c if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                let value = digits
                    .parse::<u64>()
                    .map_err(|_| ParseError::IntegerTooLarge { line: self.line, digits })?;
                Token::Integer(value)
            }
            other => {
                self.chars.next();
                return Err(ParseError::UnknownToken {
                    line: self.line,
                    token: other,
                });
            }
        };

        Ok(token)
    }

    fn punctuation(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.chars.next();
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if !accept(c) {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        word
    }

    // A string ends at the closing quote; reaching a newline or the end of
    // input first leaves it unterminated. The newline is not consumed.
    fn read_string(&mut self) -> Result<Token, ParseError> {
        self.chars.next();
        let value = self.take_while(|c| c != '"' && c != '\n');
        if self.chars.next_if_eq(&'"').is_some() {
            Ok(Token::Str(value))
        } else {
            Err(ParseError::UnterminatedString { line: self.line })
        }
    }
}
