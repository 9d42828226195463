use core::fmt;

use crate::frame::PixelFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    SizeMismatch {
        expected: usize,
        actual: usize,
    },
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    FormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },
    OutOfBounds,
    InvalidStride,
    EmptyImage,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            Self::FormatMismatch { expected, actual } => {
                write!(f, "pixel format mismatch: expected {expected}, got {actual}")
            }
            Self::OutOfBounds => write!(f, "out of bounds"),
            Self::InvalidStride => write!(f, "invalid stride"),
            Self::EmptyImage => write!(f, "image is empty"),
        }
    }
}

impl std::error::Error for Error {}
