use thiserror::Error;

/// Error type for array construction, indexing and evaluation.
#[derive(Error, Debug)]
pub enum Error {
    /// Shape, uniformity, broadcast or index-count mismatch.
    #[error("{0}")]
    Value(String),

    /// Unsupported dtype for a given operation or export path.
    #[error("{0}")]
    Type(String),

    /// Out-of-range integer or advanced index, detected at evaluation.
    #[error("index {index} is out of bounds for axis {axis} with size {size}")]
    Index {
        index: i64,
        axis: usize,
        size: usize,
    },

    /// Execution backend failure, surfaced unchanged.
    #[error("{0}")]
    Runtime(String),
}

impl Error {
    pub(crate) fn value(msg: impl Into<String>) -> Self {
        Error::Value(msg.into())
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
