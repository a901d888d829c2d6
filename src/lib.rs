//! Source-to-source preprocessor adding `foreach`/`map`/`filter`/`zipWithIndex` combinators,
//! `$comp_time` compile-time code splicing, and `$include` file inclusion to a Lua-family host
//! language. See [`driver::Driver`] for the top-level per-file pipeline.

pub mod buffer;
pub mod cache;
pub mod comptime;
pub mod config;
pub mod driver;
pub mod error;
pub mod lexer;
pub mod rewriter;
