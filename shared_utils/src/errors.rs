use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Any of these aborts the whole batch before (or instead
/// of) per-file work; per-file problems never surface as a `ConvertError`.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Invalid conversion options: {0}")]
    InvalidOptions(String),

    #[error("Failed to create output directory {}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),
}
