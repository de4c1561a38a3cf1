use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RustPointerGenError {
    #[error("Shape mismatch error: {0}")]
    ShapeMismatchError(String),

    #[error("Uninitialized state error: {0}")]
    UninitializedStateError(String),

    #[error("Vocabulary lookup error: {0}")]
    VocabularyLookupError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("JSON error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for RustPointerGenError {
    fn from(error: std::io::Error) -> Self {
        RustPointerGenError::IOError(error.to_string())
    }
}

impl From<TchError> for RustPointerGenError {
    fn from(error: TchError) -> Self {
        RustPointerGenError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for RustPointerGenError {
    fn from(error: serde_json::Error) -> Self {
        RustPointerGenError::JsonError(error.to_string())
    }
}
