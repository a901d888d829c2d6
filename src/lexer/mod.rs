//! Hand-written lexer for the host language plus the extension keywords.
//!
//! The lexer never performs full syntactic parsing (see the spec's Non-goals) — it only needs to
//! emit a flat token stream with precise spans so the rewriter can recognize constructs by
//! inspecting a small fixed window of neighbouring tokens.

mod token;

pub use token::*;

use once_cell::sync::Lazy;
use std::{collections::HashMap, error::Error, fmt::Display, iter::Peekable, str::Chars};

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("foreach", TokenKind::Foreach);
    m.insert("map", TokenKind::Map);
    m.insert("filter", TokenKind::Filter);
    m.insert("zipWithIndex", TokenKind::ZipWithIndex);
    m.insert("return", TokenKind::Return);
    m
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError(String);

pub type LexResult<T> = Result<T, LexError>;

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Error for LexError {}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    tokens: Vec<Token>,
    iterator: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            tokens: vec![],
            iterator: input.chars().peekable(),
            line: 1,
            col: 0,
        }
    }

    fn peek(&mut self) -> Option<&char> {
        self.iterator.peek()
    }

    fn peek2(&mut self) -> Option<char> {
        // Peeking two characters ahead needs a clone of the underlying iterator since
        // `Peekable` only remembers a single lookahead slot.
        let mut clone = self.iterator.clone();
        clone.next();
        clone.next()
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.iterator.next();
        if let Some(c) = next {
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += c.len_utf8();
            }
        }
        next
    }

    fn next_if(&mut self, func: impl FnOnce(&char) -> bool) -> Option<char> {
        let next = self.iterator.next_if(func);
        if let Some(c) = next {
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += c.len_utf8();
            }
        }
        next
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn eat_whitespace(&mut self) {
        while self.next_if(|c| c.is_whitespace()).is_some() {}
    }

    /// Skip a `--` comment: `--[[ ... ]]` runs to the matching `]]`, a bare `--` runs to the end
    /// of the line. Emits no token.
    fn eat_comment(&mut self) {
        self.bump(); // first '-'
        self.bump(); // second '-'

        if self.peek() == Some(&'[') && self.peek2() == Some('[') {
            self.bump();
            self.bump();
            loop {
                match self.peek() {
                    None => break,
                    Some(']') if self.peek2() == Some(']') => {
                        self.bump();
                        self.bump();
                        break;
                    }
                    _ => {
                        self.bump();
                    }
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if *c == '\n' {
                    break;
                }
                self.bump();
            }
        }
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        self.lex_internal()?;

        let eof_pos = self.pos();
        self.tokens
            .push(Token::new(TokenKind::EndOfFile, "", eof_pos, eof_pos));

        for (idx, token) in self.tokens.iter_mut().enumerate() {
            token.idx = idx;
        }

        Ok(self.tokens)
    }

    fn lex_internal(&mut self) -> LexResult<()> {
        loop {
            self.eat_whitespace();

            if self.peek() == Some(&'-') && self.peek2() == Some('-') {
                self.eat_comment();
                continue;
            }

            let Some(next) = self.peek().copied() else {
                return Ok(());
            };

            match next {
                'a'..='z' | 'A'..='Z' | '_' => self.lex_alphanumeric(),
                '0'..='9' => self.lex_numeric()?,
                '$' => self.lex_dollar(),
                _ => self.lex_symbol(),
            }
        }
    }

    fn lex_alphanumeric(&mut self) {
        let start = self.pos();
        let mut text = String::new();

        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || *c == '_') {
            text.push(c);
        }

        let end = self.pos();
        let kind = KEYWORDS
            .get(text.as_str())
            .copied()
            .unwrap_or(TokenKind::Identifier);
        self.tokens.push(Token::new(kind, text, start, end));
    }

    fn lex_numeric(&mut self) -> LexResult<()> {
        let start = self.pos();
        let mut text = String::new();

        while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
            text.push(c);
        }

        let end = self.pos();
        self.tokens
            .push(Token::new(TokenKind::Number, text, start, end));
        Ok(())
    }

    fn lex_dollar(&mut self) {
        let start = self.pos();
        let mut text = String::new();
        text.push(self.bump().expect("caller observed '$'"));

        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || *c == '_') {
            text.push(c);
        }

        let end = self.pos();
        let kind = match text.as_str() {
            "$comp_time" => TokenKind::CompTime,
            "$include" => TokenKind::Include,
            _ => TokenKind::Symbol,
        };
        self.tokens.push(Token::new(kind, text, start, end));
    }

    fn lex_symbol(&mut self) {
        let start = self.pos();
        let first = self.bump().expect("caller observed a character");

        // `==` lexes as a single two-character Symbol; every other punctuation character lexes
        // as a one-character Symbol. Quote characters fall through here too — the lexer
        // deliberately does not recognize string literals (see the spec's design notes on the
        // consequence for brace matching inside combinator bodies).
        let mut text = first.to_string();
        if first == '=' && self.peek() == Some(&'=') {
            text.push(self.bump().expect("peeked '='"));
        }

        let end = self.pos();
        self.tokens
            .push(Token::new(TokenKind::Symbol, text, start, end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_identifier() {
        let tokens = Lexer::new("xs").lex().unwrap();
        assert_eq!(kinds(&tokens), vec![TokenKind::Identifier, TokenKind::EndOfFile]);
        assert_eq!(tokens[0].text, "xs");
    }

    #[test]
    fn lexes_combinator_keywords() {
        let tokens = Lexer::new("foreach map filter zipWithIndex return")
            .lex()
            .unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Foreach,
                TokenKind::Map,
                TokenKind::Filter,
                TokenKind::ZipWithIndex,
                TokenKind::Return,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn lexes_comp_time_and_include() {
        let tokens = Lexer::new("$comp_time $include $other").lex().unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::CompTime,
                TokenKind::Include,
                TokenKind::Symbol,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        let tokens = Lexer::new("-- a line comment\nx --[[ block\ncomment ]] y")
            .lex()
            .unwrap();
        assert_eq!(kinds(&tokens), vec![
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::EndOfFile
        ]);
        assert_eq!(tokens[0].text, "x");
        assert_eq!(tokens[0].start.line, 2);
        assert_eq!(tokens[1].text, "y");
        assert_eq!(tokens[1].start.line, 3);
    }

    #[test]
    fn lexes_double_equal_as_single_symbol() {
        let tokens = Lexer::new("x == y").lex().unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Symbol);
        assert_eq!(tokens[1].text, "==");
    }

    #[test]
    fn assigns_sequential_indices() {
        let tokens = Lexer::new("a b c").lex().unwrap();
        for (i, t) in tokens.iter().enumerate() {
            assert_eq!(t.idx, i);
        }
    }

    #[test]
    fn tracks_line_and_column_spans() {
        let tokens = Lexer::new("let\n  foo").lex().unwrap();
        assert_eq!(tokens[0].start, Position::new(1, 0));
        assert_eq!(tokens[0].end, Position::new(1, 3));
        assert_eq!(tokens[1].start, Position::new(2, 2));
        assert_eq!(tokens[1].end, Position::new(2, 5));
    }
}
