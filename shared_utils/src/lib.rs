//! Shared Utilities for the image conversion tools
//!
//! This crate provides common functionality shared across the workspace's binaries:
//! - Codec error types and the libheif-backed HEIC decode/encode path
//! - Batch file enumeration and success/skip/failure tallying
//! - Worker count resolution
//! - Safety checks (dangerous directory detection)
//! - Logging, progress bar, and summary reporting

pub mod batch;
pub mod common_utils;
pub mod errors;
pub mod heic;
pub mod img_errors;
pub mod logging;
pub mod report;
pub mod safety;
pub mod thread_manager;
pub mod unified_progress;

pub use batch::{collect_files, BatchResult, IMAGE_EXTENSIONS};
pub use errors::ConvertError;
pub use img_errors::CodecError;
pub use report::{format_duration, print_summary_report};
pub use safety::check_dangerous_directory;
pub use unified_progress::UnifiedProgressBar;
