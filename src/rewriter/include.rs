//! `$include(expr)` handling.
//!
//! There is no module-resolution snippet for this construct in the upstream patch this transform
//! is otherwise ported from — it is implemented directly from the construct's description: `expr`
//! is evaluated through `package.searchpath` by the same embedded interpreter `$comp_time` uses,
//! the resolved file is recursively transformed, and its (comment-stripped, single-line) output
//! replaces the construct in the including file.

use std::fs;

use regex::Regex;

use super::{IncludeContext, Rewriter};
use crate::{comptime, error::TransformError, error::TransformResult};

fn strip_comments_and_join(source: &str) -> String {
    static BLOCK: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"(?s)--\[\[.*?\]\]").unwrap());
    static LINE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| Regex::new(r"--[^\n]*").unwrap());

    let without_blocks = BLOCK.replace_all(source, "");
    let without_lines = LINE.replace_all(&without_blocks, "");

    without_lines
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn rewrite(rewriter: &mut Rewriter, idx: usize, ctx: &mut dyn IncludeContext) -> TransformResult<()> {
    let tokens = rewriter.tokens;
    let include_token = &tokens[idx];
    let anchor = include_token.start;

    if rewriter.is_processed(anchor) {
        return Ok(());
    }
    rewriter.mark_processed(anchor);

    let open_paren = tokens.get(idx + 1).filter(|t| t.text == "(").ok_or_else(|| {
        TransformError::structural(&rewriter.filename, anchor, "expected '(' after $include")
    })?;

    let mut depth = 1i32;
    let mut scan = idx + 2;
    while depth != 0 {
        let tok = tokens.get(scan).ok_or_else(|| {
            TransformError::structural(&rewriter.filename, anchor, "unterminated $include: missing ')'")
        })?;
        match tok.text.as_str() {
            "(" => depth += 1,
            ")" => depth -= 1,
            _ => {}
        }
        scan += 1;
    }
    let close_paren = &tokens[scan - 1];

    if open_paren.start.line != close_paren.start.line {
        return Err(TransformError::structural(
            &rewriter.filename,
            anchor,
            "$include(...) must fit on a single line",
        ));
    }

    if rewriter.is_replaced(anchor) {
        return Ok(());
    }
    rewriter.mark_replaced(anchor);
    rewriter.trace_construct("include", anchor);

    let expr = rewriter.buffer.span_text(open_paren.end, close_paren.start);
    let label = format!("{}/include:{}", rewriter.filename, anchor.line);
    let chunk = format!("return assert(package.searchpath({expr}, package.path))");
    let resolved = comptime::eval(&label, &chunk, rewriter.config.verbose_do_string)?;

    if resolved.is_empty() {
        return Err(TransformError::Include {
            file: rewriter.filename.clone(),
            line: anchor.line,
            module: expr,
            message: "package.searchpath did not resolve to a file".to_owned(),
        });
    }

    let resolved_path = std::path::PathBuf::from(&resolved);
    let transformed_path = ctx.transform_include(&resolved_path).map_err(|err| TransformError::Include {
        file: rewriter.filename.clone(),
        line: anchor.line,
        module: resolved.clone(),
        message: err.to_string(),
    })?;

    let included_source = fs::read_to_string(&transformed_path).map_err(|source| TransformError::Input {
        path: transformed_path.clone(),
        source,
    })?;

    let inlined = strip_comments_and_join(&included_source);
    rewriter
        .buffer
        .replace_span(anchor.line, anchor.column, close_paren.end.column, &inlined);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments_and_joins_on_one_line() {
        let src = "-- header comment\nlocal x = 1\n--[[ skip\nthis ]] local y = 2\n";
        assert_eq!(strip_comments_and_join(src), "local x = 1 local y = 2");
    }

    #[test]
    fn empty_source_strips_to_empty_string() {
        assert_eq!(strip_comments_and_join(""), "");
    }
}
