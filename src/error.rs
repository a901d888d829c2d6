//! Error taxonomy for the transformer.
//!
//! Every fatal condition the driver can hit surfaces as one variant here. There is no recovery
//! path: a [`TransformError`] that reaches the CLI entry point always ends the process with a
//! non-zero exit code, after the diagnostic has already been logged via [`log::error!`].

use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::Position;

/// A single fatal error produced while transforming one file.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("could not read '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}:{column}: {message}")]
    Structural {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{label}: {message}\n{chunk}")]
    Eval {
        label: String,
        message: String,
        chunk: String,
    },

    #[error("{file}:{line}: failed to include '{module}': {message}")]
    Include {
        file: String,
        line: usize,
        module: String,
        message: String,
    },
}

impl TransformError {
    pub fn structural(file: &str, position: Position, message: impl Into<String>) -> Self {
        Self::Structural {
            file: file.to_owned(),
            line: position.line,
            column: position.column,
            message: message.into(),
        }
    }
}

pub type TransformResult<T> = Result<T, TransformError>;
