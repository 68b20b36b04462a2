//! Unified Progress Bar
//!
//! Batch progress bar shared by the command-line tools. Position is a
//! percentage (0..=100); the message carries the converted/total count.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod templates {
    pub const BATCH: &str = "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {pos:>3}% • ⏱️ {elapsed_precise} • {msg}";
    pub const PROGRESS_CHARS: &str = "█▓░";
    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
}

pub struct UnifiedProgressBar {
    pub bar: ProgressBar,
    total_files: usize,
    is_finished: AtomicBool,
}

impl UnifiedProgressBar {
    /// `hidden` suppresses drawing entirely (quiet runs, non-tty output).
    pub fn new(total_files: usize, prefix: &str, hidden: bool) -> Arc<Self> {
        let bar = ProgressBar::new(100);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_bar()
                .template(templates::BATCH)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(templates::PROGRESS_CHARS)
                .tick_chars(templates::SPINNER_CHARS);
            bar.set_style(style);
            bar.set_prefix(prefix.to_string());
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        }
        bar.set_message(format!("0/{}", total_files));
        Arc::new(Self {
            bar,
            total_files,
            is_finished: AtomicBool::new(false),
        })
    }

    pub fn set_percent(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    pub fn set_completed(&self, completed: usize) {
        self.bar
            .set_message(format!("{}/{}", completed, self.total_files));
    }

    pub fn percent(&self) -> u64 {
        self.bar.position()
    }

    /// Print a line above the bar without tearing it.
    pub fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{}", msg));
    }

    pub fn finish_with_message(&self, msg: &str) {
        if self.is_finished.swap(true, Ordering::Relaxed) {
            return;
        }
        self.bar.finish_with_message(msg.to_string());
    }
}

impl Drop for UnifiedProgressBar {
    fn drop(&mut self) {
        if !self.is_finished.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}
