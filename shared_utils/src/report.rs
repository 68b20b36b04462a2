//! Report Module
//!
//! Summary reporting for batch conversions

use crate::batch::BatchResult;
use std::time::Duration;

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if duration.as_millis() > 0 && secs < 10 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}s", secs)
    }
}

fn report_lines(
    result: &BatchResult,
    duration: Duration,
    cancelled: bool,
    operation_name: &str,
) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "╔══════════════════════════════════════════════════════╗".to_string(),
        format!("║  📊 {:<48} ║", format!("{} Summary Report", operation_name)),
        "╠══════════════════════════════════════════════════════╣".to_string(),
        format!("║  📁 Files Processed:    {:>10}                   ║", result.total),
        format!("║  ✅ Succeeded:          {:>10}                   ║", result.succeeded),
        format!("║  ❌ Failed:             {:>10}                   ║", result.failed),
        format!("║  ⏭️  Skipped:            {:>10}                   ║", result.skipped),
        format!("║  📈 Success Rate:       {:>9.1}%                   ║", result.success_rate()),
        "╠══════════════════════════════════════════════════════╣".to_string(),
        format!("║  ⏱️  Total Time:         {:>10}                   ║", format_duration(duration)),
    ];
    if result.total > 0 {
        let avg_time = duration.as_secs_f64() / result.total as f64;
        lines.push(format!(
            "║  ⏱️  Avg Time/File:      {:>9.2}s                   ║",
            avg_time
        ));
    }
    if cancelled {
        lines.push("║  🛑 Cancelled before all files were processed        ║".to_string());
    }
    lines.push("╚══════════════════════════════════════════════════════╝".to_string());

    if !result.errors.is_empty() {
        lines.push(String::new());
        lines.push("❌ Errors encountered:".to_string());
        lines.push("━".repeat(56));
        for (path, error) in &result.errors {
            lines.push(format!("   {} → {}", path.display(), error));
        }
    }
    lines
}

pub fn print_summary_report(
    result: &BatchResult,
    duration: Duration,
    cancelled: bool,
    operation_name: &str,
) {
    for line in report_lines(result, duration, cancelled, operation_name) {
        println!("{}", line);
    }
}
