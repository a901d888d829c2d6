//! The structural rewriter: walks the token vector, recognizes the five construct families by
//! inspecting a small fixed window of neighbouring tokens, and mutates a [`LineBuffer`] in place.

mod combinators;
mod comp_time;
mod include;

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use log::trace;

use crate::{
    buffer::LineBuffer,
    config::TransformConfig,
    error::{TransformError, TransformResult},
    lexer::{Position, Token, TokenKind},
};

/// Callback the `$include` handler uses to recurse the Transformer Driver onto another file
/// without the rewriter needing to depend on the driver's full type. Kept as a trait rather than
/// a bare function pointer so the implementation (the Driver) can carry its own cache/removal
/// state across the recursive call.
pub trait IncludeContext {
    /// Recursively transform `path` (an `$include` target resolved via the host's module search
    /// path) and return the path of its `.2.transformed` cache slot.
    fn transform_include(&mut self, path: &Path) -> TransformResult<PathBuf>;
}

/// Per-file mutable rewrite state: the line buffer being edited, the immutable token vector
/// driving the walk, and the two re-entry guards described in the spec's data model.
pub struct Rewriter<'a> {
    pub(crate) tokens: &'a [Token],
    pub(crate) buffer: &'a mut LineBuffer,
    pub(crate) filename: String,
    pub(crate) config: &'a TransformConfig,
    pub(crate) processed: HashSet<Position>,
    pub(crate) replaced: HashSet<Position>,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        tokens: &'a [Token],
        buffer: &'a mut LineBuffer,
        filename: impl Into<String>,
        config: &'a TransformConfig,
    ) -> Self {
        Self {
            tokens,
            buffer,
            filename: filename.into(),
            config,
            processed: HashSet::new(),
            replaced: HashSet::new(),
        }
    }

    pub fn run(&mut self, ctx: &mut dyn IncludeContext) -> TransformResult<()> {
        self.run_range(0, self.tokens.len(), ctx)
    }

    /// Walk tokens in `[start, end)`, dispatching each construct keyword to its handler. Used
    /// both for the top-level walk and for the recursive inner-brace walk combinators perform
    /// before computing their own replacement (so nested constructs rewrite first).
    pub(crate) fn run_range(
        &mut self,
        start: usize,
        end: usize,
        ctx: &mut dyn IncludeContext,
    ) -> TransformResult<()> {
        let mut idx = start;
        while idx < end && idx < self.tokens.len() {
            match self.tokens[idx].kind {
                TokenKind::Foreach => combinators::rewrite_foreach(self, idx, ctx)?,
                TokenKind::Map => combinators::rewrite_map(self, idx, ctx)?,
                TokenKind::Filter => combinators::rewrite_filter(self, idx, ctx)?,
                TokenKind::CompTime => comp_time::rewrite(self, idx)?,
                TokenKind::Include => include::rewrite(self, idx, ctx)?,
                _ => {}
            }
            idx += 1;
        }
        Ok(())
    }

    pub(crate) fn is_processed(&self, anchor: Position) -> bool {
        self.processed.contains(&anchor)
    }

    pub(crate) fn mark_processed(&mut self, anchor: Position) {
        self.processed.insert(anchor);
    }

    pub(crate) fn is_replaced(&self, anchor: Position) -> bool {
        self.replaced.contains(&anchor)
    }

    pub(crate) fn mark_replaced(&mut self, anchor: Position) {
        self.replaced.insert(anchor);
    }

    pub(crate) fn trace_construct(&self, kind: &str, anchor: Position) {
        trace!("{}: rewriting {kind} at {anchor}", self.filename);
    }
}

/// Balanced-brace scan paired with the inner-first recursion that makes nested constructs rewrite
/// before the construct enclosing them: every `{` encountered while hunting for the matching `}`
/// (the opening one included) triggers a fresh dispatch pass over everything from just past it to
/// the end of the file. That inner pass mutates and marks its own constructs as processed, so when
/// the outer walk later reaches the same tokens directly it finds them already handled and no-ops.
/// Braces are `Symbol` tokens with text `"{"`/`"}"` — the lexer does not recognize string literals,
/// so a `{` inside a quoted string inside a combinator body is mis-counted here too (see the
/// design notes on the lexer's Non-goals).
pub(crate) fn scan_to_matching_brace(
    rewriter: &mut Rewriter,
    open_idx: usize,
    ctx: &mut dyn IncludeContext,
) -> TransformResult<usize> {
    let tokens = rewriter.tokens;
    let mut depth = 0i32;
    let mut idx = open_idx;

    while idx < tokens.len() {
        let tok = &tokens[idx];
        if tok.kind == TokenKind::Symbol {
            match tok.text.as_str() {
                "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(idx);
                    }
                }
                "{" => {
                    depth += 1;
                    rewriter.run_range(idx + 1, tokens.len(), ctx)?;
                }
                _ => {}
            }
        }
        idx += 1;
    }

    Err(TransformError::structural(
        &rewriter.filename,
        tokens[open_idx].start,
        "unterminated construct: missing closing '}'",
    ))
}

/// Find the `Return` token nearest the closing brace, at the same nesting level as the body
/// (i.e. not inside a nested `{ ... }` introduced by an inner construct).
pub(crate) fn find_top_level_return(tokens: &[Token], open_idx: usize, close_idx: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut found = None;
    for idx in (open_idx + 1)..close_idx {
        let tok = &tokens[idx];
        if tok.kind == TokenKind::Symbol {
            match tok.text.as_str() {
                "{" => depth += 1,
                "}" => depth -= 1,
                _ => {}
            }
        }
        if tok.kind == TokenKind::Return && depth == 0 {
            found = Some(idx);
        }
    }
    found
}

#[cfg(test)]
pub(crate) struct NullIncludeContext;

#[cfg(test)]
impl IncludeContext for NullIncludeContext {
    fn transform_include(&mut self, _path: &Path) -> TransformResult<PathBuf> {
        unimplemented!("no $include in this fixture")
    }
}
