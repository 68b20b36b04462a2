//! Shared Image Codec Error Types
//!
//! Everything that can go wrong while reading or writing a single image file.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("file no longer exists: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read image: {0}")]
    ImageRead(String),

    #[error("HEIF codec error: {0}")]
    Heif(String),

    #[error("unsupported image shape: {0}")]
    UnsupportedShape(String),

    #[error("Image format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl CodecError {
    /// True when the source vanished between enumeration and decode.
    pub fn is_not_found(&self) -> bool {
        match self {
            CodecError::NotFound(_) => true,
            CodecError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            CodecError::Image(image::ImageError::IoError(e)) => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
