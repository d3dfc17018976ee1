use thiserror::Error;

#[derive(Error, Debug)]
pub enum GanymedeError {
    #[error("Wrong ordering: {0}")]
    WrongOrdering(String),

    #[error("Method not supported: {0}")]
    NotSupported(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Array size mismatch: {expected_h}x{expected_w} vs {actual_h}x{actual_w}")]
    DimensionMismatch {
        expected_h: usize,
        expected_w: usize,
        actual_h: usize,
        actual_w: usize,
    },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Empty frame sequence")]
    EmptySequence,
}

pub type Result<T> = std::result::Result<T, GanymedeError>;
