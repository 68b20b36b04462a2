//! Worker Thread Manager
//!
//! Decides how many parallel conversion workers a batch gets:
//! - Bounded to `MIN_WORKERS..=MAX_WORKERS`
//! - Defaults to `min(4, logical cores)`
//! - Allows environment-based override via `IMG_CONVERT_WORKERS`

use std::sync::OnceLock;

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 16;

/// Upper bound for the automatic default; more workers than this mostly
/// contend on disk I/O for typical photo batches.
pub const DEFAULT_WORKER_CAP: usize = 4;

pub const WORKERS_ENV_VAR: &str = "IMG_CONVERT_WORKERS";

/// Cached default worker count for this process
static DEFAULT_WORKERS: OnceLock<usize> = OnceLock::new();

pub fn is_valid_worker_count(count: usize) -> bool {
    (MIN_WORKERS..=MAX_WORKERS).contains(&count)
}

pub fn clamp_worker_count(count: usize) -> usize {
    count.clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Resolve the default worker count from an optional override and the
/// number of logical cores.
///
/// An override that does not parse or is out of range is ignored.
pub fn resolve_worker_count(env_override: Option<&str>, cpu_count: usize) -> usize {
    if let Some(n) = env_override
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| is_valid_worker_count(*n))
    {
        return n;
    }

    clamp_worker_count(cpu_count.min(DEFAULT_WORKER_CAP))
}

/// Get the default worker count (cached)
pub fn default_worker_count() -> usize {
    *DEFAULT_WORKERS.get_or_init(|| {
        let env_value = std::env::var(WORKERS_ENV_VAR).ok();
        let workers = resolve_worker_count(env_value.as_deref(), num_cpus::get());
        tracing::debug!(workers, cpus = num_cpus::get(), "Resolved default worker count");
        workers
    })
}
