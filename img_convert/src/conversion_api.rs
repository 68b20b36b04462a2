//! Conversion API Module
//!
//! One file in, one [`ConversionResult`] out. Everything that can go wrong
//! with a single file is folded into the result; nothing escapes as an
//! error or a panic.

use crate::cancel::CancelToken;
use crate::codec::{flatten_for_jpeg, needs_rgb_flatten, ImageCodec};
use crate::formats::OutputFormat;
use anyhow::Context;
use shared_utils::common_utils::{
    ensure_dir_exists, file_stem_or, get_extension_lowercase, normalize_path,
};
use shared_utils::errors::ConvertError;
use shared_utils::heic::HEIC_QUALITY_DEFAULT;
use shared_utils::thread_manager::{default_worker_count, MAX_WORKERS, MIN_WORKERS};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Appended to the output stem when `append_suffix` is on.
pub const OUTPUT_SUFFIX: &str = "_out";

#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub output_format: OutputFormat,
    /// Ignored when `replace_original` is set.
    pub output_dir: PathBuf,
    /// Ignored when `replace_original` is set.
    pub append_suffix: bool,
    /// Write beside the source and delete the source after a successful encode.
    pub replace_original: bool,
    pub worker_count: usize,
    /// Clamped to 0..=100 at encode time.
    pub heic_quality: i32,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Jpg,
            output_dir: PathBuf::from("."),
            append_suffix: true,
            replace_original: false,
            worker_count: default_worker_count(),
            heic_quality: HEIC_QUALITY_DEFAULT,
        }
    }
}

impl ConversionOptions {
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.worker_count) {
            return Err(ConvertError::InvalidOptions(format!(
                "worker count must be between {} and {}, got {}",
                MIN_WORKERS, MAX_WORKERS, self.worker_count
            )));
        }
        if !self.replace_original && self.output_dir.as_os_str().is_empty() {
            return Err(ConvertError::InvalidOptions(
                "output directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory outputs land in, or `None` when they go beside each source.
    pub fn effective_output_dir(&self) -> Option<&Path> {
        (!self.replace_original).then_some(self.output_dir.as_path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub source_path: PathBuf,
}

impl FileTask {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Cancelled,
    Missing,
    SameFormat,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Cancelled => "conversion cancelled",
            SkipReason::Missing => "file no longer exists",
            SkipReason::SameFormat => "same format conversion",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { output_path: PathBuf },
    Skipped { reason: SkipReason },
    /// `error` carries the whole context chain.
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub source_path: PathBuf,
    pub outcome: Outcome,
    pub logs: Vec<String>,
}

impl ConversionResult {
    fn skipped(source_path: PathBuf, reason: SkipReason, mut logs: Vec<String>) -> Self {
        logs.push(format!("Skipping: {} - {}", source_path.display(), reason));
        Self {
            source_path,
            outcome: Outcome::Skipped { reason },
            logs,
        }
    }

    fn failed(source_path: PathBuf, error: String, mut logs: Vec<String>) -> Self {
        logs.push(format!("Error converting {}: {}", source_path.display(), error));
        Self {
            source_path,
            outcome: Outcome::Failed { error },
            logs,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Succeeded { output_path } => Some(output_path),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match &self.outcome {
            Outcome::Succeeded { output_path } => {
                format!("Successfully converted to {}", output_path.display())
            }
            Outcome::Skipped { reason } => reason.to_string(),
            Outcome::Failed { error } => error.clone(),
        }
    }
}

/// Compute where `source` would be written, or why it is skipped.
///
/// Pure path arithmetic; touches nothing on disk.
pub fn plan_output(source: &Path, options: &ConversionOptions) -> Result<PathBuf, SkipReason> {
    let target = options.output_format;
    if get_extension_lowercase(source) == target.extension() {
        return Err(SkipReason::SameFormat);
    }

    let stem = file_stem_or(source, "output");
    let base = if options.append_suffix && !options.replace_original {
        format!("{}{}", stem, OUTPUT_SUFFIX)
    } else {
        stem.to_string()
    };

    let dir = match options.effective_output_dir() {
        Some(dir) => dir.to_path_buf(),
        None => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    Ok(dir.join(format!("{}.{}", base, target.extension())))
}

enum Attempt {
    Converted,
    Vanished,
}

fn convert(
    source: &Path,
    output: &Path,
    options: &ConversionOptions,
    codec: &dyn ImageCodec,
    logs: &mut Vec<String>,
) -> anyhow::Result<Attempt> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        ensure_dir_exists(dir)?;
    }

    logs.push(format!(
        "Converting: {} to {}",
        source.display(),
        output.display()
    ));

    let img = match codec.decode(source) {
        Ok(img) => img,
        Err(e) if e.is_not_found() => return Ok(Attempt::Vanished),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to decode {}", source.display()))
        }
    };

    let img = match options.output_format {
        OutputFormat::Jpg if needs_rgb_flatten(&img) => {
            logs.push("Converting image to RGB mode for JPG".to_string());
            flatten_for_jpeg(img)
        }
        OutputFormat::Heic => {
            logs.push("Using libheif for HEIC output".to_string());
            img
        }
        _ => img,
    };

    codec
        .encode(&img, options.output_format, output, options.heic_quality)
        .with_context(|| {
            format!(
                "Failed to encode {} as {}",
                output.display(),
                options.output_format
            )
        })?;

    if options.replace_original {
        std::fs::remove_file(source)
            .with_context(|| format!("Failed to remove original {}", source.display()))?;
    }

    Ok(Attempt::Converted)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Convert one file. Always returns a result, never panics.
pub fn execute(
    task: &FileTask,
    options: &ConversionOptions,
    codec: &dyn ImageCodec,
    cancel: &CancelToken,
) -> ConversionResult {
    let source = normalize_path(&task.source_path);
    let mut logs = Vec::new();

    if cancel.is_cancelled() {
        return ConversionResult::skipped(source, SkipReason::Cancelled, logs);
    }

    if !source.exists() {
        return ConversionResult::skipped(source, SkipReason::Missing, logs);
    }

    let output = match plan_output(&source, options) {
        Ok(path) => path,
        Err(reason) => return ConversionResult::skipped(source, reason, logs),
    };

    let attempt = catch_unwind(AssertUnwindSafe(|| {
        convert(&source, &output, options, codec, &mut logs)
    }));

    match attempt {
        Ok(Ok(Attempt::Converted)) => {
            tracing::debug!(source = %source.display(), output = %output.display(), "converted");
            logs.push(format!("Successfully converted: {}", source.display()));
            ConversionResult {
                source_path: source,
                outcome: Outcome::Succeeded {
                    output_path: output,
                },
                logs,
            }
        }
        Ok(Ok(Attempt::Vanished)) => ConversionResult::skipped(source, SkipReason::Missing, logs),
        Ok(Err(e)) => {
            let chain = format!("{:#}", e);
            tracing::warn!(source = %source.display(), error = %chain, "conversion failed");
            ConversionResult::failed(source, chain, logs)
        }
        Err(payload) => {
            let error = format!("codec panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(source = %source.display(), error = %error, "conversion panicked");
            ConversionResult::failed(source, error, logs)
        }
    }
}
