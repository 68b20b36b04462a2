//! Safety Module
//!
//! Refuses destructive runs (`--replace`) rooted at system directories or
//! directly at a home directory.

use std::path::Path;

const PROTECTED_DIRS: &[&str] = &[
    "/",
    "/System",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/var",
    "/private",
    "/Library",
    "/Applications",
    "/Users",
    "/home",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "/opt",
];

fn blocked(reason: String, hint: &str) -> String {
    format!(
        "🚨 DANGEROUS OPERATION BLOCKED!\n\
         ❌ {}\n\
         ❌ Replacing originals here could destroy files you cannot recover.\n\
         💡 {}",
        reason, hint
    )
}

/// Check that `path` is safe to replace files in.
pub fn check_dangerous_directory(path: &Path) -> Result<(), String> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    for candidate in [path, canonical.as_path()] {
        let text = candidate.to_string_lossy();
        let trimmed = match text.trim_end_matches('/') {
            "" => "/",
            t => t,
        };
        if PROTECTED_DIRS.contains(&trimmed) {
            return Err(blocked(
                format!("'{}' is a protected system directory.", trimmed),
                "Please specify a safe subdirectory instead.",
            ));
        }
    }

    // "/home/alice" has three components: root, "home", "alice"
    let text = canonical.to_string_lossy();
    let in_home = text.starts_with("/Users/") || text.starts_with("/home/");
    if in_home && canonical.components().count() <= 3 {
        return Err(blocked(
            format!("'{}' is a home directory root.", path.display()),
            "Please specify a subdirectory like ~/Pictures/export instead.",
        ));
    }

    Ok(())
}
