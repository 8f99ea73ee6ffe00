use std::io;

use thiserror::Error;

/// Failure conditions of the pipeline. Every variant is fatal: the first one
/// detected aborts the whole run and no partial report is ever produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no line terminator within {lookahead} bytes after offset {offset}")]
    NoLineBoundary { offset: u64, lookahead: usize },

    #[error("malformed measurement {value:?}")]
    MalformedNumber { value: String },

    #[error("unexpected EOF at offset {offset}, {remaining} bytes of the range unread")]
    PrematureEof { offset: u64, remaining: u64 },
}

impl PipelineError {
    pub(crate) fn malformed(span: &[u8]) -> Self {
        PipelineError::MalformedNumber {
            value: String::from_utf8_lossy(span).into_owned(),
        }
    }
}
