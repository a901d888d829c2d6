//! `$comp_time [(name)] { body }` handling: the body is sliced out verbatim, handed to the
//! embedded interpreter, and the result is spliced back in place of the construct.

use super::Rewriter;
use crate::{comptime, error::TransformResult, lexer::TokenKind};

pub(crate) fn rewrite(rewriter: &mut Rewriter, idx: usize) -> TransformResult<()> {
    let tokens = rewriter.tokens;
    let comp_time_token = &tokens[idx];
    let anchor = comp_time_token.start;

    if rewriter.is_processed(anchor) {
        return Ok(());
    }

    let mut cursor = idx + 1;
    let mut tag = String::new();
    if tokens.get(cursor).map(|t| t.text.as_str()) == Some("(") {
        cursor += 1;
        while tokens.get(cursor).map(|t| t.text.as_str()) != Some(")") {
            let tok = tokens.get(cursor).ok_or_else(|| {
                crate::error::TransformError::structural(
                    &rewriter.filename,
                    anchor,
                    "unterminated '(' after $comp_time",
                )
            })?;
            tag.push_str(&tok.text);
            cursor += 1;
        }
        cursor += 1; // consume ')'
    }

    let left_brace = tokens.get(cursor).ok_or_else(|| {
        crate::error::TransformError::structural(&rewriter.filename, anchor, "expected '{' after $comp_time")
    })?;
    if left_brace.text != "{" {
        return Err(crate::error::TransformError::structural(
            &rewriter.filename,
            anchor,
            "expected '{' after $comp_time",
        ));
    }

    let mut depth = 1i32;
    let mut scan = cursor + 1;
    while depth != 0 {
        let tok = tokens.get(scan).ok_or_else(|| {
            crate::error::TransformError::structural(
                &rewriter.filename,
                anchor,
                "unterminated $comp_time: missing closing '}'",
            )
        })?;
        match tok.kind {
            TokenKind::Symbol if tok.text == "{" => depth += 1,
            TokenKind::Symbol if tok.text == "}" => depth -= 1,
            _ => {}
        }
        scan += 1;
    }
    let right_brace = &tokens[scan - 1];

    let body = rewriter.buffer.span_text(left_brace.end, right_brace.start);

    rewriter.mark_processed(anchor);

    let tag_segment = if tag.is_empty() { "Unknown" } else { tag.as_str() };
    let label = format!("{}/compTime/{tag_segment}:{}", rewriter.filename, anchor.line);
    let generated = comptime::eval(&label, &body, rewriter.config.verbose_do_string)?;

    if rewriter.is_replaced(anchor) {
        return Ok(());
    }
    rewriter.mark_replaced(anchor);
    rewriter.trace_construct("comp_time", anchor);

    for line in anchor.line..=right_brace.start.line {
        rewriter.buffer.blank_line(line);
    }
    rewriter.buffer.set_line(anchor.line, "--[[comp_time]] ");

    let carrier_line = left_brace.start.line;
    let current = rewriter.buffer.line(carrier_line).to_owned();
    rewriter.buffer.set_line(carrier_line, format!("{current}{generated}"));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::LineBuffer, config::TransformConfig, lexer::Lexer, rewriter::{NullIncludeContext, Rewriter}};

    fn transform(src: &str) -> String {
        let tokens = Lexer::new(src).lex().unwrap();
        let mut buffer = LineBuffer::from_source(src);
        let config = TransformConfig::default();
        let mut rewriter = Rewriter::new(&tokens, &mut buffer, "test.lua", &config);
        rewriter.run(&mut NullIncludeContext).unwrap();
        buffer.to_source()
    }

    #[test]
    fn single_line_comp_time_splices_generated_code_on_the_carrier_line() {
        let out = transform("$comp_time { return \"local N = 42\" }");
        assert_eq!(out, "--[[comp_time]] local N = 42");
    }

    #[test]
    fn tagged_multi_line_comp_time_preserves_line_count() {
        let src = "$comp_time(tag) {\n  return \"local N = 42\"\n}";
        let out = transform(src);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "--[[comp_time]] local N = 42");
        assert_eq!(lines[1], crate::buffer::LINE_KEEPER);
    }
}
