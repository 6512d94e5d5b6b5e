//! Error types for SVM training and prediction

use thiserror::Error;

/// Coarse classification of an [`SVMError`]
///
/// Callers that only need to tell misuse apart from defects can match on
/// the kind instead of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid hyperparameter or kernel parameter
    Config,
    /// Training data (or warm-start model) has the wrong shape
    Shape,
    /// API used in the wrong order, e.g. predicting before fitting
    Usage,
    /// A solver invariant was broken; this is a bug, not a user error
    InternalInvariant,
    /// Reading, parsing or writing data and models
    Io,
}

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Binary classification needs exactly two classes, found {0}")]
    ClassCount(usize),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Warm start model was trained on {expected} samples, dataset has {actual}")]
    WarmStartMismatch { expected: usize, actual: usize },

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SVMError {
    /// The coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SVMError::InvalidParameter(_) | SVMError::InvalidKernel(_) => ErrorKind::Config,
            SVMError::EmptyDataset
            | SVMError::InvalidDataset(_)
            | SVMError::ClassCount(_)
            | SVMError::DimensionMismatch { .. }
            | SVMError::WarmStartMismatch { .. } => ErrorKind::Shape,
            SVMError::ModelNotTrained => ErrorKind::Usage,
            SVMError::InternalInvariant(_) => ErrorKind::InternalInvariant,
            SVMError::IoError(_) | SVMError::ParseError(_) | SVMError::SerializationError(_) => {
                ErrorKind::Io
            }
        }
    }

    /// True for errors that indicate a defect in this crate
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::InternalInvariant
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;
