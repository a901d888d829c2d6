//! `foreach`/`map`/`filter`/`zipWithIndex` recognition and rewriting.
//!
//! Each construct is identified by inspecting a fixed window of tokens around the keyword rather
//! than parsing an expression grammar — see the design notes on why a handful of signed offsets
//! suffice. Four "shapes" cover every accepted spelling:
//!
//! - `Plain`: `tbl.foreach { ref => body }`
//! - `Simple`: `tbl.foreach { someFunction }`
//! - `TailZipWithIndex`: `tbl.foreach.zipWithIndex { (ref, idx) => body }`
//! - `HeadZipWithIndex`: `tbl.zipWithIndex.foreach { (idx, ref) => body }`
//!
//! `map` and `filter` additionally carry an assignment target (`retToken`) two tokens further back
//! than the receiver, and locate their own `return` keyword by scanning backward from the closing
//! brace.

use super::{find_top_level_return, scan_to_matching_brace, IncludeContext, Rewriter};
use crate::{
    error::{TransformError, TransformResult},
    lexer::{Token, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Plain,
    Simple,
    TailZipWithIndex,
    HeadZipWithIndex,
}

/// A read-only view of the token window around a construct keyword, with signed offsets resolved
/// relative to the keyword's own index.
struct Window<'a> {
    tokens: &'a [Token],
    idx: usize,
    filename: &'a str,
}

impl<'a> Window<'a> {
    fn at(&self, offset: isize) -> TransformResult<&'a Token> {
        let pos = self.idx as isize + offset;
        if pos < 0 {
            return Err(self.malformed());
        }
        self.tokens.get(pos as usize).ok_or_else(|| self.malformed())
    }

    fn malformed(&self) -> TransformError {
        let anchor = self.tokens[self.idx].start;
        TransformError::structural(
            self.filename,
            anchor,
            "malformed combinator: not enough surrounding tokens to recognize a known shape",
        )
    }
}

fn detect_shape(win: &Window, construct: &str) -> TransformResult<Shape> {
    let before2 = win.at(-2)?;

    if before2.kind == TokenKind::Identifier {
        let after2 = win.at(2)?;
        if after2.kind == TokenKind::ZipWithIndex {
            return Ok(Shape::TailZipWithIndex);
        }
        let is_simple = after2.kind == TokenKind::Identifier
            && win
                .at(3)
                .map(|t| t.kind == TokenKind::Symbol && t.text == "}")
                .unwrap_or(false);
        if is_simple {
            return Ok(Shape::Simple);
        }
        return Ok(Shape::Plain);
    }

    if before2.kind == TokenKind::ZipWithIndex {
        return Ok(Shape::HeadZipWithIndex);
    }

    Err(TransformError::structural(
        win.filename,
        win.tokens[win.idx].start,
        format!("malformed {construct}: expected a table receiver before the keyword"),
    ))
}

/// The tokens a shape resolves to, generalized across foreach/map/filter. `ret` is `None` for
/// foreach (which has no assignment target) and `Some` for map/filter.
struct Receivers<'a> {
    tbl: &'a Token,
    ret: Option<&'a Token>,
    ref_name: String,
    idx_name: String,
    func: Option<&'a Token>,
    body_start: &'a Token,
    open_brace: usize,
}

fn gather<'a>(win: &Window<'a>, shape: Shape, has_ret: bool) -> TransformResult<Receivers<'a>> {
    let idx = win.idx;

    let ret = if has_ret {
        Some(win.at(if shape == Shape::HeadZipWithIndex { -6 } else { -4 })?)
    } else {
        None
    };
    let tbl = win.at(if shape == Shape::HeadZipWithIndex { -4 } else { -2 })?;

    let recv = match shape {
        Shape::Plain => Receivers {
            tbl,
            ret,
            ref_name: win.at(2)?.text.clone(),
            idx_name: "_".to_owned(),
            func: None,
            body_start: win.at(5)?,
            open_brace: idx + 1,
        },
        Shape::Simple => {
            let func = win.at(2)?;
            Receivers {
                tbl,
                ret,
                ref_name: "ref".to_owned(),
                idx_name: "_".to_owned(),
                func: Some(func),
                body_start: func,
                open_brace: idx + 1,
            }
        }
        Shape::TailZipWithIndex => Receivers {
            tbl,
            ret,
            ref_name: win.at(5)?.text.clone(),
            idx_name: win.at(7)?.text.clone(),
            func: None,
            body_start: win.at(11)?,
            open_brace: idx + 3,
        },
        Shape::HeadZipWithIndex => Receivers {
            tbl,
            ret,
            ref_name: win.at(5)?.text.clone(),
            idx_name: win.at(3)?.text.clone(),
            func: None,
            body_start: win.at(9)?,
            open_brace: idx + 1,
        },
    };

    if win.tokens.get(recv.open_brace).map(|t| t.text.as_str()) != Some("{") {
        return Err(TransformError::structural(
            win.filename,
            win.tokens[idx].start,
            "expected '{' to open the combinator body",
        ));
    }

    Ok(recv)
}

fn blank_body_lines(rewriter: &mut Rewriter, tbl_line: usize, body_start_line: usize, body_start_col: usize) {
    for line in (tbl_line + 1)..=body_start_line {
        if line == body_start_line {
            rewriter.buffer.blank_prefix(line, body_start_col);
        } else {
            rewriter.buffer.blank_line(line);
        }
    }
}

pub(crate) fn rewrite_foreach<'a>(
    rewriter: &mut Rewriter<'a>,
    idx: usize,
    ctx: &mut dyn IncludeContext,
) -> TransformResult<()> {
    let filename = rewriter.filename.clone();
    let tokens: &'a [Token] = rewriter.tokens;
    let win = Window { tokens, idx, filename: &filename };
    let shape = detect_shape(&win, "foreach")?;
    let recv = gather(&win, shape, false)?;

    let anchor = recv.tbl.start;
    if rewriter.is_processed(anchor) {
        return Ok(());
    }

    let close_brace = scan_to_matching_brace(rewriter, recv.open_brace, ctx)?;
    rewriter.mark_processed(anchor);

    if rewriter.is_replaced(anchor) {
        return Ok(());
    }
    rewriter.mark_replaced(anchor);
    rewriter.trace_construct("foreach", anchor);

    let right_bracket = &tokens[close_brace];
    let tbl = recv.tbl;
    let body_start = recv.body_start;

    rewriter.buffer.replace_to_end(right_bracket.start.line, right_bracket.start.column, "end");

    if let Some(func) = recv.func {
        rewriter.buffer.replace_span(
            func.start.line,
            func.start.column,
            func.end.column,
            &format!("{}({}) ", func.text, recv.ref_name),
        );
    }

    let header = format!(
        "for {}, {} in ipairs({}) do ",
        recv.idx_name, recv.ref_name, tbl.text
    );

    if tbl.start.line == body_start.start.line {
        rewriter
            .buffer
            .replace_span(tbl.start.line, tbl.start.column, body_start.start.column, &header);
    } else {
        rewriter.buffer.set_line(tbl.start.line, header);
        blank_body_lines(rewriter, tbl.start.line, body_start.start.line, body_start.start.column);
    }

    Ok(())
}

pub(crate) fn rewrite_map<'a>(
    rewriter: &mut Rewriter<'a>,
    idx: usize,
    ctx: &mut dyn IncludeContext,
) -> TransformResult<()> {
    let filename = rewriter.filename.clone();
    let tokens: &'a [Token] = rewriter.tokens;
    let win = Window { tokens, idx, filename: &filename };
    let shape = detect_shape(&win, "map")?;
    let recv = gather(&win, shape, true)?;
    let ret = recv.ret.expect("map always carries an assignment target");

    let anchor = recv.tbl.start;
    if rewriter.is_processed(anchor) {
        return Ok(());
    }

    let close_brace = scan_to_matching_brace(rewriter, recv.open_brace, ctx)?;

    let return_token = if shape != Shape::Simple {
        let return_idx = find_top_level_return(tokens, recv.open_brace, close_brace).ok_or_else(|| {
            TransformError::structural(&filename, anchor, "map body has no top-level 'return'")
        })?;
        Some(&tokens[return_idx])
    } else {
        None
    };

    rewriter.mark_processed(anchor);
    if rewriter.is_replaced(anchor) {
        return Ok(());
    }
    rewriter.mark_replaced(anchor);
    rewriter.trace_construct("map", anchor);

    let right_bracket = &tokens[close_brace];
    let tbl = recv.tbl;
    let body_start = recv.body_start;

    rewriter.buffer.replace_to_end(right_bracket.start.line, right_bracket.start.column, ") end");

    if let Some(func) = recv.func {
        rewriter.buffer.replace_span(
            func.start.line,
            func.start.column,
            func.end.column,
            &format!("_tinsert({}, {}({}) ", ret.text, func.text, recv.ref_name),
        );
    } else if let Some(return_token) = return_token {
        rewriter.buffer.replace_span(
            return_token.start.line,
            return_token.start.column,
            return_token.end.column,
            &format!("_tinsert({},", ret.text),
        );
    }

    let header = format!(
        "{} = {{}}; for {}, {} in ipairs({}) do ",
        ret.text, recv.idx_name, recv.ref_name, tbl.text
    );

    if tbl.start.line == body_start.start.line {
        rewriter
            .buffer
            .replace_span(tbl.start.line, ret.start.column, body_start.start.column, &header);
    } else {
        rewriter.buffer.replace_to_end(tbl.start.line, ret.start.column, &header);
        blank_body_lines(rewriter, tbl.start.line, body_start.start.line, body_start.start.column);
    }

    Ok(())
}

pub(crate) fn rewrite_filter<'a>(
    rewriter: &mut Rewriter<'a>,
    idx: usize,
    ctx: &mut dyn IncludeContext,
) -> TransformResult<()> {
    let filename = rewriter.filename.clone();
    let tokens: &'a [Token] = rewriter.tokens;
    let win = Window { tokens, idx, filename: &filename };
    let shape = detect_shape(&win, "filter")?;
    let recv = gather(&win, shape, true)?;
    let ret = recv.ret.expect("filter always carries an assignment target");

    let anchor = recv.tbl.start;
    if rewriter.is_processed(anchor) {
        return Ok(());
    }

    let close_brace = scan_to_matching_brace(rewriter, recv.open_brace, ctx)?;

    let return_token = if shape != Shape::Simple {
        let return_idx = find_top_level_return(tokens, recv.open_brace, close_brace).ok_or_else(|| {
            TransformError::structural(&filename, anchor, "filter body has no top-level 'return'")
        })?;
        Some(&tokens[return_idx])
    } else {
        None
    };

    rewriter.mark_processed(anchor);
    if rewriter.is_replaced(anchor) {
        return Ok(());
    }
    rewriter.mark_replaced(anchor);
    rewriter.trace_construct("filter", anchor);

    let right_bracket = &tokens[close_brace];
    let tbl = recv.tbl;
    let body_start = recv.body_start;
    let header = format!(
        "{} = {{}}; for {}, {} in ipairs({}) do ",
        ret.text, recv.idx_name, recv.ref_name, tbl.text
    );

    if tbl.start.line == body_start.start.line {
        if let Some(func) = recv.func {
            rewriter.buffer.replace_to_end(right_bracket.start.line, right_bracket.start.column, ") end end");
            rewriter.buffer.replace_span(
                func.start.line,
                func.start.column,
                func.end.column,
                &format!(
                    "if {}({}) then _tinsert({}, {}",
                    func.text, recv.ref_name, ret.text, recv.ref_name
                ),
            );
        } else {
            let return_token = return_token.expect("non-Simple filter always locates a return");
            rewriter.buffer.replace_to_end(
                right_bracket.start.line,
                right_bracket.start.column,
                &format!(" then _tinsert({}, {}) end end", ret.text, recv.ref_name),
            );
            rewriter
                .buffer
                .replace_span(return_token.start.line, return_token.start.column, return_token.end.column, "if");
        }
        rewriter
            .buffer
            .replace_span(tbl.start.line, ret.start.column, body_start.start.column, &header);
    } else {
        if let Some(func) = recv.func {
            rewriter.buffer.replace_to_end(right_bracket.start.line, right_bracket.start.column, "end");
            rewriter.buffer.replace_span(
                func.start.line,
                func.start.column,
                func.end.column,
                &format!(
                    "if {}({}) then _tinsert({}, {}) end",
                    func.text, recv.ref_name, ret.text, recv.ref_name
                ),
            );
        } else {
            let return_token = return_token.expect("non-Simple filter always locates a return");
            // The upstream implementation replaces only the closing brace character here
            // (a one-off departure from the "consume to end of line" pattern it uses
            // everywhere else), which truncates whatever followed the brace on its line.
            // We keep the consistent behaviour instead.
            rewriter.buffer.replace_to_end(
                right_bracket.start.line,
                right_bracket.start.column,
                &format!(" then _tinsert({}, {}) end end", ret.text, recv.ref_name),
            );
            rewriter
                .buffer
                .replace_span(return_token.start.line, return_token.start.column, return_token.end.column, "if");
        }
        rewriter.buffer.replace_to_end(tbl.start.line, ret.start.column, &header);
        blank_body_lines(rewriter, tbl.start.line, body_start.start.line, body_start.start.column);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::LineBuffer, config::TransformConfig, lexer::Lexer, rewriter::NullIncludeContext};

    fn transform(src: &str) -> String {
        let tokens = Lexer::new(src).lex().unwrap();
        let mut buffer = LineBuffer::from_source(src);
        let config = TransformConfig::default();
        let mut rewriter = Rewriter::new(&tokens, &mut buffer, "test.lua", &config);
        rewriter.run(&mut NullIncludeContext).unwrap();
        buffer.to_source()
    }

    #[test]
    fn plain_foreach_single_line() {
        let out = transform("xs.foreach { ref => print(ref) }");
        assert_eq!(out, "for _, ref in ipairs(xs) do print(ref) end");
    }

    #[test]
    fn simple_foreach_uses_named_function() {
        let out = transform("xs.foreach { doThing }");
        assert_eq!(out, "for _, ref in ipairs(xs) do doThing(ref)  end");
    }

    #[test]
    fn zip_with_index_tail_shape() {
        let out = transform("xs.foreach.zipWithIndex { (ref, i) => print(i, ref) }");
        assert_eq!(out, "for i, ref in ipairs(xs) do print(i, ref) end");
    }

    #[test]
    fn zip_with_index_head_shape() {
        let out = transform("xs.zipWithIndex.foreach { (i, ref) => print(i, ref) }");
        assert_eq!(out, "for i, ref in ipairs(xs) do print(i, ref) end");
    }

    #[test]
    fn plain_map_single_line() {
        let out = transform("ys = xs.map { ref => return ref * 2 }");
        assert_eq!(
            out,
            "ys = {}; for _, ref in ipairs(xs) do _tinsert(ys, ref * 2 ) end"
        );
    }

    #[test]
    fn plain_filter_single_line() {
        let out = transform("ys = xs.filter { ref => return ref > 0 }");
        assert_eq!(
            out,
            "ys = {}; for _, ref in ipairs(xs) do if ref > 0  then _tinsert(ys, ref) end end"
        );
    }

    #[test]
    fn simple_filter_single_line() {
        let out = transform("ys = xs.filter { isPositive }");
        assert_eq!(
            out,
            "ys = {}; for _, ref in ipairs(xs) do if isPositive(ref) then _tinsert(ys, ref ) end end"
        );
    }

    #[test]
    fn multi_line_map_preserves_line_count() {
        let src = "ys = xs.map {\n  ref =>\n  return ref * 2\n}";
        let out = transform(src);
        assert_eq!(out.lines().count(), src.lines().count());
        assert!(out.lines().next().unwrap().starts_with("ys = {}; for _, ref in ipairs(xs) do"));
    }

    #[test]
    fn nested_map_inside_foreach_rewrites_inner_first() {
        let src = "xs.foreach { ref => ys = ref.map { inner => return inner + 1 } }";
        let out = transform(src);
        assert!(out.contains("ys = {}; for _, inner in ipairs(ref) do _tinsert(ys, inner + 1) end"));
        assert!(out.starts_with("for _, ref in ipairs(xs) do"));
    }
}
