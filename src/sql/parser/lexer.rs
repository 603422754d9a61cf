use crate::common::Result;
use crate::errinput;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    And,
    Asc,
    By,
    Char,
    Create,
    Delete,
    Desc,
    From,
    Insert,
    Int,
    Into,
    Join,
    On,
    Or,
    Order,
    Select,
    Set,
    Table,
    Update,
    Values,
    Varchar,
    Where,
}

static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    HashMap::from([
        ("AND", Keyword::And),
        ("ASC", Keyword::Asc),
        ("BY", Keyword::By),
        ("CHAR", Keyword::Char),
        ("CREATE", Keyword::Create),
        ("DELETE", Keyword::Delete),
        ("DESC", Keyword::Desc),
        ("FROM", Keyword::From),
        ("INSERT", Keyword::Insert),
        ("INT", Keyword::Int),
        ("INTO", Keyword::Into),
        ("JOIN", Keyword::Join),
        ("ON", Keyword::On),
        ("OR", Keyword::Or),
        ("ORDER", Keyword::Order),
        ("SELECT", Keyword::Select),
        ("SET", Keyword::Set),
        ("TABLE", Keyword::Table),
        ("UPDATE", Keyword::Update),
        ("VALUES", Keyword::Values),
        ("VARCHAR", Keyword::Varchar),
        ("WHERE", Keyword::Where),
    ])
});

/// Keywords are matched case-insensitively; identifiers keep their case.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Ident(String),
    Str(String),
    Number(i32),
    Semicolon,
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Star,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(keyword) => write!(f, "{keyword:?}"),
            Token::Ident(ident) => write!(f, "{ident}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Semicolon => write!(f, ";"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Star => write!(f, "*"),
            Token::Equal => write!(f, "="),
            Token::NotEqual => write!(f, "!="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
        }
    }
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Lexes the whole input in one pass.
    pub fn tokens(input: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let Some(&c) = self.input.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        let token = match c {
            b';' => Token::Semicolon,
            b'(' => Token::LeftParen,
            b')' => Token::RightParen,
            b',' => Token::Comma,
            b'.' => Token::Dot,
            b'*' => Token::Star,
            b'=' => Token::Equal,
            b'>' => {
                if self.input.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            b'<' => {
                if self.input.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    Token::LessEqual
                } else {
                    Token::Less
                }
            }
            b'!' => {
                if self.input.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    Token::NotEqual
                } else {
                    return errinput!("unexpected character '!'");
                }
            }
            quote @ (b'\'' | b'"') => {
                let start = self.pos;
                while self.pos < self.input.len() && self.input[self.pos] != quote {
                    self.pos += 1;
                }
                if self.pos >= self.input.len() {
                    return errinput!("unterminated string literal");
                }
                let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
                self.pos += 1;
                Token::Str(text)
            }
            b'0'..=b'9' => {
                let start = self.pos - 1;
                while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
                let digits = std::str::from_utf8(&self.input[start..self.pos]).unwrap();
                match digits.parse::<i32>() {
                    Ok(n) => Token::Number(n),
                    Err(_) => return errinput!("number literal {digits} out of range"),
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = self.pos - 1;
                while self.pos < self.input.len()
                    && (self.input[self.pos].is_ascii_alphanumeric()
                        || self.input[self.pos] == b'_')
                {
                    self.pos += 1;
                }
                let word = std::str::from_utf8(&self.input[start..self.pos]).unwrap();
                match KEYWORDS.get(word.to_ascii_uppercase().as_str()) {
                    Some(keyword) => Token::Keyword(*keyword),
                    None => Token::Ident(word.to_string()),
                }
            }
            other => return errinput!("unexpected character '{}'", other as char),
        };
        Ok(Some(token))
    }
}
