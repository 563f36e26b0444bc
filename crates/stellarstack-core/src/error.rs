use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Insufficient memory for a single chunk row: need {required} bytes, budget is {budget}")]
    InsufficientMemory { required: usize, budget: usize },

    #[error("Frame {index} unavailable: {reason}")]
    FrameUnavailable { index: usize, reason: String },

    #[error("Normalization failed for frame {index}: {reason}")]
    Normalization { index: usize, reason: String },

    #[error("Geometry mismatch: expected {expected}, got {actual}")]
    GeometryMismatch { expected: String, actual: String },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Stacking run cancelled")]
    Cancelled,

    #[error("Stacking worker panicked")]
    WorkerPanic,
}

pub type Result<T> = std::result::Result<T, StackError>;
