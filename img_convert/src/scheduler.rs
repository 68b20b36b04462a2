//! Batch scheduler
//!
//! Fans conversion tasks out over a bounded rayon pool and folds results back
//! on the calling thread, in completion order, into sink events.

use crate::cancel::CancelToken;
use crate::codec::{ImageCodec, StandardCodec};
use crate::conversion_api::{execute, ConversionOptions, ConversionResult, FileTask, Outcome};
use crate::events::EventSink;
use shared_utils::batch::BatchResult;
use shared_utils::errors::ConvertError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const CANCELLED_LOG: &str = "Conversion cancelled";

/// Percentage of successful conversions, rounded down.
pub fn progress_percent(succeeded: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (succeeded.min(total) * 100 / total) as u8
}

/// What a run observed before it ended.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Tasks submitted.
    pub total: usize,
    /// Results consumed; fewer than `total` after cancellation.
    pub tally: BatchResult,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn empty() -> Self {
        Self {
            total: 0,
            tally: BatchResult::new(),
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.tally.succeeded
    }

    pub fn skipped(&self) -> usize {
        self.tally.skipped
    }

    pub fn failed(&self) -> usize {
        self.tally.failed
    }

    pub fn errors(&self) -> &[(PathBuf, String)] {
        &self.tally.errors
    }

    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.tally.succeeded == self.total
    }
}

pub struct BatchScheduler {
    codec: Arc<dyn ImageCodec>,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(StandardCodec))
    }

    pub fn with_codec(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Convert every task and report through `sink`.
    ///
    /// `on_finished` fires exactly once whatever happens. Run-level failures
    /// are reported once through `on_error` and returned.
    pub fn run(
        &self,
        tasks: Vec<FileTask>,
        options: &ConversionOptions,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<BatchSummary, ConvertError> {
        let outcome = self.run_batch(tasks, options, sink, cancel);
        if let Err(e) = &outcome {
            let chain = anyhow::Chain::new(e)
                .map(|cause| cause.to_string())
                .collect::<Vec<_>>()
                .join(": ");
            tracing::error!(error = %chain, "batch aborted");
            sink.on_error(&chain);
        }
        sink.on_finished();
        outcome
    }

    fn run_batch(
        &self,
        tasks: Vec<FileTask>,
        options: &ConversionOptions,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<BatchSummary, ConvertError> {
        options.validate()?;

        let total = tasks.len();
        if total == 0 {
            return Ok(BatchSummary::empty());
        }

        if let Some(dir) = options.effective_output_dir() {
            std::fs::create_dir_all(dir).map_err(|source| ConvertError::OutputDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.worker_count)
            .thread_name(|i| format!("img-convert-{}", i))
            .panic_handler(|_| tracing::error!("conversion worker panicked"))
            .build()
            .map_err(|e| ConvertError::ThreadPool(e.to_string()))?;

        tracing::info!(
            total,
            workers = options.worker_count,
            format = %options.output_format,
            "Starting batch conversion"
        );
        let start = Instant::now();

        let (tx, rx) = flume::unbounded::<ConversionResult>();
        let shared = Arc::new(options.clone());
        for task in tasks {
            let tx = tx.clone();
            let codec = Arc::clone(&self.codec);
            let options = Arc::clone(&shared);
            let cancel = cancel.clone();
            pool.spawn_fifo(move || {
                let result = execute(&task, &options, codec.as_ref(), &cancel);
                // Receiver is gone once the run was cancelled.
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let mut tally = BatchResult::new();
        let mut reported_completed = 0;
        let mut cancelled = false;

        for result in rx.iter() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            for line in &result.logs {
                sink.on_file_log(line);
            }

            match result.outcome {
                Outcome::Succeeded { .. } => tally.success(),
                Outcome::Skipped { .. } => tally.skip(),
                Outcome::Failed { error } => {
                    sink.on_error(&format!(
                        "Error converting {}: {}",
                        result.source_path.display(),
                        error
                    ));
                    tally.fail(result.source_path, error);
                }
            }

            if tally.succeeded > reported_completed {
                reported_completed = tally.succeeded;
                sink.on_completed_count(reported_completed);
            }
            sink.on_progress(progress_percent(tally.succeeded, total));
        }

        if cancelled {
            sink.on_file_log(CANCELLED_LOG);
            tracing::warn!(processed = tally.total, total, "Batch conversion cancelled");
        }

        let summary = BatchSummary {
            total,
            tally,
            cancelled,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            succeeded = summary.succeeded(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch conversion finished"
        );

        // Dropping the pool does not wait; still-queued tasks see the token and skip.
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ConversionEvent;
    use crate::formats::OutputFormat;
    use crate::test_support::{touch_inputs, FakeCodec, RecordingSink};
    use proptest::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn opts(out: &Path, workers: usize) -> ConversionOptions {
        ConversionOptions {
            output_format: OutputFormat::Jpg,
            output_dir: out.to_path_buf(),
            worker_count: workers,
            ..Default::default()
        }
    }

    fn run_with(
        codec: FakeCodec,
        tasks: Vec<FileTask>,
        options: &ConversionOptions,
    ) -> (Result<BatchSummary, ConvertError>, RecordingSink) {
        let sink = RecordingSink::default();
        let scheduler = BatchScheduler::with_codec(Arc::new(codec));
        let result = scheduler.run(tasks, options, &sink, &CancelToken::new());
        (result, sink)
    }

    #[test]
    fn test_all_succeed() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(tmp.path(), &["a.png", "b.png", "c.png", "d.png"]);

        let (summary, sink) = run_with(FakeCodec::new(), tasks, &opts(&tmp.path().join("out"), 3));
        let summary = summary.unwrap();

        assert_eq!(sink.completed(), vec![1, 2, 3, 4]);
        assert_eq!(sink.progress(), vec![25, 50, 75, 100]);
        assert_eq!(sink.finished_count(), 1);
        assert!(sink.errors().is_empty());
        assert!(summary.all_succeeded());
        assert_eq!(summary.succeeded(), 4);
    }

    #[test]
    fn test_counts_strictly_increase_and_partial_progress() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(
            tmp.path(),
            &["a.png", "bad.png", "c.jpg", "d.png", "e.png", "worse.png"],
        );
        let codec = FakeCodec::new().corrupt("bad.png").corrupt("worse.png");

        let (summary, sink) = run_with(codec, tasks, &opts(tmp.path(), 4));
        let summary = summary.unwrap();

        let completed = sink.completed();
        assert!(completed.windows(2).all(|w| w[0] < w[1]), "{:?}", completed);
        assert_eq!(completed.last(), Some(&3));

        let progress = sink.progress();
        assert_eq!(progress.len(), 6, "one progress event per result");
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(!progress.contains(&100));
        assert_eq!(progress.last(), Some(&50));

        assert_eq!(sink.errors().len(), 2);
        assert!(sink.errors().iter().all(|e| e.starts_with("Error converting ")));
        assert_eq!((summary.succeeded(), summary.skipped(), summary.failed()), (3, 1, 2));
        assert_eq!(sink.finished_count(), 1);
    }

    #[test]
    fn test_single_worker_preserves_submission_order() {
        let tmp = TempDir::new().unwrap();
        let names = ["1.png", "2.png", "3.png", "4.png", "5.png"];
        let tasks = touch_inputs(tmp.path(), &names);
        let expected: Vec<String> = tasks
            .iter()
            .map(|t| format!("Successfully converted: {}", t.source_path.display()))
            .collect();
        let codec = FakeCodec::new()
            .latency("1.png", 40)
            .latency("3.png", 25);

        let (_, sink) = run_with(codec, tasks, &opts(tmp.path(), 1));

        let done: Vec<String> = sink
            .logs()
            .into_iter()
            .filter(|l| l.starts_with("Successfully converted: "))
            .collect();
        assert_eq!(done, expected);
    }

    #[test]
    fn test_parallel_variable_latency_finishes_once() {
        let tmp = TempDir::new().unwrap();
        let names: Vec<String> = (0..12).map(|i| format!("img{:02}.png", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let tasks = touch_inputs(tmp.path(), &refs);
        let mut codec = FakeCodec::new();
        for (i, name) in refs.iter().enumerate() {
            codec = codec.latency(name, (i as u64 * 7) % 30);
        }

        let (summary, sink) = run_with(codec, tasks, &opts(tmp.path(), 4));

        assert_eq!(summary.unwrap().succeeded(), 12);
        assert_eq!(sink.finished_count(), 1);
        assert_eq!(sink.events().last(), Some(&ConversionEvent::Finished));
        assert_eq!(sink.completed().last(), Some(&12));
    }

    #[test]
    fn test_file_deleted_after_enumeration_is_skip() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(tmp.path(), &["stay.png", "gone.png"]);
        std::fs::remove_file(&tasks[1].source_path).unwrap();

        let (summary, sink) = run_with(FakeCodec::new(), tasks, &opts(tmp.path(), 2));
        let summary = summary.unwrap();

        assert!(sink.errors().is_empty());
        assert_eq!(summary.skipped(), 1);
        assert_eq!(sink.progress().last(), Some(&50));
        assert!(sink
            .logs()
            .iter()
            .any(|l| l.ends_with("gone.png - file no longer exists")));
    }

    #[test]
    fn test_empty_batch_only_finishes() {
        let tmp = TempDir::new().unwrap();
        let (summary, sink) = run_with(FakeCodec::new(), Vec::new(), &opts(tmp.path(), 2));

        assert_eq!(summary.unwrap().total, 0);
        assert_eq!(sink.events(), vec![ConversionEvent::Finished]);
    }

    #[test]
    fn test_invalid_options_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(tmp.path(), &["a.png"]);

        let (result, sink) = run_with(FakeCodec::new(), tasks, &opts(tmp.path(), 0));

        assert!(matches!(result, Err(ConvertError::InvalidOptions(_))));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ConversionEvent::Error(m) if m.contains("worker count")));
        assert_eq!(events[1], ConversionEvent::Finished);
    }

    #[test]
    fn test_uncreatable_output_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(tmp.path(), &["a.png"]);
        let blocker = tmp.path().join("file_not_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let codec = FakeCodec::new();
        let (result, sink) = run_with(codec, tasks, &opts(&blocker.join("out"), 2));

        assert!(matches!(result, Err(ConvertError::OutputDir { .. })));
        assert_eq!(sink.errors().len(), 1);
        let message = &sink.errors()[0];
        let prefix = format!("Failed to create output directory {}: ", blocker.join("out").display());
        assert!(message.starts_with(&prefix), "{}", message);
        assert!(message.len() > prefix.len());
        assert_eq!(sink.finished_count(), 1);
        assert!(sink.progress().is_empty());
    }

    #[test]
    fn test_all_failed_still_finishes() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(tmp.path(), &["x.png", "y.png"]);
        let codec = FakeCodec::new().fail_encode();

        let (summary, sink) = run_with(codec, tasks, &opts(tmp.path(), 2));

        assert_eq!(summary.unwrap().failed(), 2);
        assert!(sink.completed().is_empty());
        assert_eq!(sink.progress(), vec![0, 0]);
        assert_eq!(sink.finished_count(), 1);
    }

    #[test]
    fn test_cancel_stops_event_stream() {
        let tmp = TempDir::new().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("c{}.png", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let tasks = touch_inputs(tmp.path(), &refs);
        let mut codec = FakeCodec::new();
        for name in &refs {
            codec = codec.latency(name, 20);
        }

        let cancel = CancelToken::new();
        let sink = RecordingSink::default().cancel_on_completed(1, cancel.clone());
        let scheduler = BatchScheduler::with_codec(Arc::new(codec));

        let summary = scheduler
            .run(tasks, &opts(tmp.path(), 1), &sink, &cancel)
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(sink.completed(), vec![1]);

        let events = sink.events();
        let n = events.len();
        assert_eq!(events[n - 1], ConversionEvent::Finished);
        assert_eq!(events[n - 2], ConversionEvent::FileLog(CANCELLED_LOG.to_string()));
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == ConversionEvent::FileLog(CANCELLED_LOG.to_string()))
                .count(),
            1
        );
        assert_eq!(events[n - 3], ConversionEvent::Progress(12));
    }

    #[test]
    fn test_cancelled_before_run_reports_nothing_per_file() {
        let tmp = TempDir::new().unwrap();
        let tasks = touch_inputs(tmp.path(), &["a.png", "b.png"]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = RecordingSink::default();

        let summary = BatchScheduler::with_codec(Arc::new(FakeCodec::new()))
            .run(tasks, &opts(tmp.path(), 2), &sink, &cancel)
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(
            sink.events(),
            vec![
                ConversionEvent::FileLog(CANCELLED_LOG.to_string()),
                ConversionEvent::Finished
            ]
        );
    }

    #[test]
    fn test_progress_percent_edges() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 66);
        assert_eq!(progress_percent(3, 3), 100);
    }

    proptest! {
        #[test]
        fn progress_hits_100_only_when_all_succeeded(total in 1usize..500, succeeded in 0usize..500) {
            let succeeded = succeeded.min(total);
            let p = progress_percent(succeeded, total);
            prop_assert!(p <= 100);
            prop_assert_eq!(p == 100, succeeded == total);
            if succeeded < total {
                prop_assert!(progress_percent(succeeded + 1, total) >= p);
            }
        }
    }
}
