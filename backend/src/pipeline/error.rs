use std::path::PathBuf;

/// Failure taxonomy shared by the pipeline and its front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailed,
    DecodeFailed,
    ClassificationFailed,
    PersistFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to load image '{}': {reason}", .path.display())]
    DecodeFailed { path: PathBuf, reason: String },
    #[error("classification failed: {0}")]
    ClassificationFailed(String),
    #[error("failed to save labeled image '{}': {reason}", .path.display())]
    PersistFailed { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DecodeFailed { .. } => ErrorKind::DecodeFailed,
            PipelineError::ClassificationFailed(_) => ErrorKind::ClassificationFailed,
            PipelineError::PersistFailed { .. } => ErrorKind::PersistFailed,
        }
    }
}

/// Input rejected by a front-end before the pipeline runs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file field named 'image'")]
    MissingField,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Unsupported file type")]
    UnsupportedType,
    #[error("File too large")]
    TooLarge,
    #[error("image '{}' does not exist", .0.display())]
    NotFound(PathBuf),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationFailed
    }
}
