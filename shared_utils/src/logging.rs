//! Logging Module - 统一的日志系统
//!
//! 本模块提供基于tracing框架的统一日志系统，支持：
//! - 日志输出到系统临时目录（或指定目录）
//! - 按天轮转，保留最近N个日志文件
//! - 结构化日志记录
//!
//! # Examples
//!
//! ```no_run
//! use shared_utils::logging::{LogConfig, init_logging};
//! use tracing::{info, error};
//!
//! let config = LogConfig::default();
//! init_logging("img_convert", config).expect("Failed to initialize logging");
//!
//! info!("Program started");
//! error!(error = "something went wrong", "Conversion failed");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志目录路径（默认为系统临时目录）
    pub log_dir: PathBuf,
    /// 日志文件名，默认 `{program_name}.log`
    pub file_name: Option<String>,
    /// 保留的最大日志文件数量，默认5个
    pub max_files: usize,
    /// 日志级别，默认Info
    pub level: Level,
    /// 是否同时输出到stderr
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            file_name: None,
            max_files: 5,
            level: Level::INFO,
            stderr: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 指定完整的日志文件路径（目录 + 文件名）
    pub fn with_log_file<P: AsRef<Path>>(mut self, file: P) -> Self {
        let file = file.as_ref();
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.log_dir = parent.to_path_buf();
        }
        self.file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_stderr(mut self, enabled: bool) -> Self {
        self.stderr = enabled;
        self
    }

    fn resolved_file_name(&self, program_name: &str) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| format!("{}.log", program_name))
    }
}

/// 默认过滤规则：程序本身与 shared_utils 使用相同级别
fn default_filter(program_name: &str, level: Level) -> String {
    let target = program_name.replace('-', "_");
    format!("{}={},shared_utils={}", target, level, level)
}

/// 初始化日志系统
///
/// 文件层按天轮转、不带ANSI颜色；stderr层可选。
/// `RUST_LOG` 环境变量优先于配置中的级别。
///
/// 全局subscriber只能安装一次，重复调用返回错误。
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

    let log_file_name = config.resolved_file_name(program_name);
    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &log_file_name);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(program_name, config.level)));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::info!(
        program = program_name,
        log_dir = ?config.log_dir,
        log_file = log_file_name,
        max_files = config.max_files,
        level = ?config.level,
        "Logging system initialized"
    );

    cleanup_old_logs(&config.log_dir, &log_file_name, config.max_files)?;

    Ok(())
}

/// 清理旧的日志文件，只保留最近的N个
///
/// 轮转后的文件名形如 `{file_name}.2024-01-01`，因此按前缀匹配。
fn cleanup_old_logs(log_dir: &Path, file_name: &str, max_files: usize) -> Result<()> {
    use std::fs;

    let entries = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory: {:?}", log_dir))?;

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(file_name))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    if log_files.len() > max_files {
        // 最新的在前
        log_files.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in log_files.iter().skip(max_files) {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = ?path, error = %e, "Failed to remove old log file");
            } else {
                tracing::debug!(path = ?path, "Removed old log file");
            }
        }
    }

    Ok(())
}
