use std::fmt::Display;

/// A 1-based line, 0-based column source position. `column` counts bytes from the start of the
/// line, not chars, matching [`crate::buffer::LineBuffer`]'s byte-indexed `String` slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The kind of an extension/host-language token. Only as much of the host language's grammar is
/// classified as the rewriter needs to recognize constructs by local pattern matching; everything
/// else that isn't whitespace or a comment falls through to `Symbol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Foreach,
    Map,
    Filter,
    ZipWithIndex,
    Return,
    Number,
    Symbol,
    CompTime,
    Include,
    EndOfFile,
    Unknown,
}

/// A single lexed token, carrying its exact source text and a precise start/end span.
///
/// `idx` is the token's 0-based position in the vector the [`Lexer`](super::Lexer) produces; the
/// rewriter uses it to index back into that vector while walking a fixed window of neighbours
/// around a construct keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub idx: usize,
    pub start: Position,
    pub end: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            idx: 0,
            start,
            end,
        }
    }

    pub fn start_line(&self) -> usize {
        self.start.line
    }

    pub fn start_column(&self) -> usize {
        self.start.column
    }

    pub fn end_line(&self) -> usize {
        self.end.line
    }

    pub fn end_column(&self) -> usize {
        self.end.column
    }
}
