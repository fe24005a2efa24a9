use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Boxed error type accepted from user-supplied converters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid {encoding} byte sequence on line {line}")]
    Decode { encoding: &'static str, line: usize },

    #[error("allocation failed while growing a parser buffer")]
    OutOfMemory,

    #[error(
        "the number of columns changed from {expected} to {found} at row {row}; \
         use column selection to read a subset and avoid this error"
    )]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("could not convert string {field:?} to {dtype} at row {row}, column {column}")]
    Parse {
        row: usize,
        column: usize,
        dtype: &'static str,
        field: String,
    },

    #[error("converter for column {column} failed at row {row}: {source}")]
    Converter {
        row: usize,
        column: usize,
        source: BoxError,
    },

    #[error("invalid column index {index} at row {row} with {num_fields} columns")]
    InvalidColumnIndex {
        index: isize,
        row: usize,
        num_fields: usize,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("stream returned an empty buffer before the end of input")]
    EmptyBuffer,
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

pub type Result<T> = std::result::Result<T, Error>;
