use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    EmptyFrame { width: u32, height: u32 },
    BufferSize { expected: usize, actual: usize },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyFrame { width, height } => {
                write!(f, "frame has no pixels ({width}x{height})")
            }
            ModelError::BufferSize { expected, actual } => write!(
                f,
                "pixel buffer holds {actual} bytes, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
