//! The mutable per-line view of a file the rewriter surgically edits in place.

use crate::lexer::Position;

/// An ordered sequence of source lines. The rewriter replaces line contents or substrings of a
/// line, but never inserts or deletes a line — this keeps line numbers stable across the rewrite
/// so diagnostics in the rewritten file still point at the right place in the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
}

/// Placeholder substituted for a line whose logical content moved elsewhere (e.g. into the first
/// line of a multi-line construct that got collapsed onto one line).
pub const LINE_KEEPER: &str = "--[[line keeper]]";

impl LineBuffer {
    pub fn from_source(source: &str) -> Self {
        let lines = if source.is_empty() {
            vec![String::new()]
        } else {
            source.lines().map(str::to_owned).collect()
        };
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, line: usize) -> &str {
        &self.lines[line - 1]
    }

    /// Overwrite an entire line.
    pub fn set_line(&mut self, line: usize, content: impl Into<String>) {
        self.lines[line - 1] = content.into();
    }

    /// Replace a line's logical content with the [`LINE_KEEPER`] placeholder.
    pub fn blank_line(&mut self, line: usize) {
        self.set_line(line, LINE_KEEPER);
    }

    /// Replace the `[start_col, end_col)` byte range of `line` with `replacement`.
    pub fn replace_span(&mut self, line: usize, start_col: usize, end_col: usize, replacement: &str) {
        let current = &self.lines[line - 1];
        let start = start_col.min(current.len());
        let end = end_col.clamp(start, current.len());

        let mut next = String::with_capacity(current.len() - (end - start) + replacement.len());
        next.push_str(&current[..start]);
        next.push_str(replacement);
        next.push_str(&current[end..]);
        self.lines[line - 1] = next;
    }

    /// Replace the `[start.column, end.column)` range spanning a single line with `replacement`.
    /// Panics (via `replace_span`'s caller contract) when `start.line != end.line`; multi-line
    /// spans are handled by callers with [`Self::collapse_span`] instead.
    pub fn replace(&mut self, start: Position, end: Position, replacement: &str) {
        debug_assert_eq!(start.line, end.line, "replace() requires a single-line span");
        self.replace_span(start.line, start.column, end.column, replacement);
    }

    /// Replace everything on `line` from `start_col` through the end of the line with
    /// `replacement`, keeping only the `[0, start_col)` prefix. Used for the rewriter's closing
    /// `}` edits, which always consume the rest of their line rather than just the brace.
    pub fn replace_to_end(&mut self, line: usize, start_col: usize, replacement: &str) {
        let current = &self.lines[line - 1];
        let start = start_col.min(current.len());
        let mut next = String::with_capacity(start + replacement.len());
        next.push_str(&current[..start]);
        next.push_str(replacement);
        self.lines[line - 1] = next;
    }

    /// Read the raw text spanning `[start, end)`, which may cross multiple lines. Used to pull a
    /// construct's body out for evaluation before the buffer is mutated.
    pub fn span_text(&self, start: Position, end: Position) -> String {
        if start.line == end.line {
            let line = self.line(start.line);
            let s = start.column.min(line.len());
            let e = end.column.clamp(s, line.len());
            return line[s..e].to_owned();
        }

        let mut out = String::new();
        let first = self.line(start.line);
        let s = start.column.min(first.len());
        out.push_str(&first[s..]);

        for l in (start.line + 1)..end.line {
            out.push('\n');
            out.push_str(self.line(l));
        }

        out.push('\n');
        let last = self.line(end.line);
        let e = end.column.min(last.len());
        out.push_str(&last[..e]);
        out
    }

    /// Overwrite the leading `col` characters of `line` with spaces, preserving the remainder.
    pub fn blank_prefix(&mut self, line: usize, col: usize) {
        let current = self.lines[line - 1].clone();
        let col = col.min(current.len());
        let mut next = " ".repeat(col);
        next.push_str(&current[col..]);
        self.lines[line - 1] = next;
    }

    /// Collapse a multi-line span `[start, end]` down to the carrier line: `start.line` receives
    /// `replacement` verbatim, every line strictly between `start.line` and `end.line` becomes a
    /// [`LINE_KEEPER`], and `end.line` has its leading columns up to `end.column` blanked with
    /// spaces (preserving whatever followed the span on that line).
    pub fn collapse_span(&mut self, start: Position, end: Position, replacement: &str) {
        if start.line == end.line {
            self.replace(start, end, replacement);
            return;
        }

        self.set_line(start.line, replacement);
        for line in (start.line + 1)..end.line {
            self.blank_line(line);
        }
        self.blank_prefix(end.line, end.column);
    }

    pub fn to_source(&self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_source_without_rewrite() {
        let src = "a\nb\nc";
        assert_eq!(LineBuffer::from_source(src).to_source(), src);
    }

    #[test]
    fn replace_span_keeps_line_count() {
        let mut buf = LineBuffer::from_source("let x = 1;\nlet y = 2;");
        buf.replace_span(1, 4, 5, "z");
        assert_eq!(buf.line(1), "let z = 1;");
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn collapse_span_preserves_line_count() {
        let mut buf = LineBuffer::from_source("$comp_time(tag) {\n  return \"x\"\n}");
        buf.collapse_span(Position::new(1, 0), Position::new(3, 1), "--[[comp_time]] x");
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.line(1), "--[[comp_time]] x");
        assert_eq!(buf.line(2), LINE_KEEPER);
        assert_eq!(buf.line(3), " ");
    }
}
