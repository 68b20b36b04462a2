//! Common Utilities Module
//!
//! 通用工具函数集合：扩展名判断、路径规范化、目录创建。

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

// ═══════════════════════════════════════════════════════════════
// 文件操作工具 (File Operations)
// ═══════════════════════════════════════════════════════════════

/// 安全地获取文件扩展名（小写）
///
/// 如果没有扩展名则返回空字符串。
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("test.JPG")), "jpg");
/// assert_eq!(get_extension_lowercase(Path::new("scan.Tiff")), "tiff");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// 检查文件扩展名是否在给定列表中（不区分大小写）
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::has_extension;
///
/// let extensions = &["jpg", "png", "heic"];
/// assert!(has_extension(Path::new("photo.JPG"), extensions));
/// assert!(has_extension(Path::new("IMG_0001.heic"), extensions));
/// assert!(!has_extension(Path::new("notes.txt"), extensions));
/// ```
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    extensions.contains(&ext.as_str())
}

/// 安全地创建目录（包括父目录）
///
/// 目录已存在时不报错。错误信息包含目录路径。
pub fn ensure_dir_exists(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// 获取文件名主干（不含扩展名），缺失时返回 `fallback`
pub fn file_stem_or<'a>(path: &'a Path, fallback: &'a str) -> &'a str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

// ═══════════════════════════════════════════════════════════════
// 路径处理工具 (Path Processing)
// ═══════════════════════════════════════════════════════════════

/// 词法规范化路径
///
/// 去掉 `.` 组件、折叠 `..`，不访问文件系统（不解析符号链接）。
///
/// # Examples
/// ```
/// use std::path::{Path, PathBuf};
/// use shared_utils::common_utils::normalize_path;
///
/// assert_eq!(normalize_path(Path::new("/a/./b/../c.png")), PathBuf::from("/a/c.png"));
/// assert_eq!(normalize_path(Path::new("a//b/./c.jpg")), PathBuf::from("a/b/c.jpg"));
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !matches!(
                    normalized.components().next_back(),
                    Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// 转换为绝对、规范化的路径（相对于当前工作目录）
pub fn absolute_normalized(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        normalize_path(&cwd.join(path))
    }
}
