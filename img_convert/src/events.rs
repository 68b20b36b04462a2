//! Batch event reporting
//!
//! The scheduler reports to an [`EventSink`]. Sinks can be driven from any
//! thread; [`ChannelSink`] forwards everything to a single consumer thread
//! when the observer is not thread-safe (terminal UI, GUI event loop).

use std::sync::Arc;

pub trait EventSink: Send + Sync {
    /// Percentage of successfully converted files, 0..=100, never decreasing.
    fn on_progress(&self, percent: u8);
    /// Number of successfully converted files, strictly increasing.
    fn on_completed_count(&self, completed: usize);
    fn on_file_log(&self, line: &str);
    /// Error text including its diagnostic chain.
    fn on_error(&self, message: &str);
    /// Terminal event, fired exactly once per run.
    fn on_finished(&self);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn on_progress(&self, percent: u8) {
        (**self).on_progress(percent)
    }
    fn on_completed_count(&self, completed: usize) {
        (**self).on_completed_count(completed)
    }
    fn on_file_log(&self, line: &str) {
        (**self).on_file_log(line)
    }
    fn on_error(&self, message: &str) {
        (**self).on_error(message)
    }
    fn on_finished(&self) {
        (**self).on_finished()
    }
}

/// One sink callback, as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionEvent {
    Progress(u8),
    CompletedCount(usize),
    FileLog(String),
    Error(String),
    Finished,
}

impl ConversionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionEvent::Finished)
    }

    /// Replay this event on another sink.
    pub fn apply(&self, sink: &dyn EventSink) {
        match self {
            ConversionEvent::Progress(p) => sink.on_progress(*p),
            ConversionEvent::CompletedCount(n) => sink.on_completed_count(*n),
            ConversionEvent::FileLog(line) => sink.on_file_log(line),
            ConversionEvent::Error(msg) => sink.on_error(msg),
            ConversionEvent::Finished => sink.on_finished(),
        }
    }
}

/// Forwards every callback over a flume channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: flume::Sender<ConversionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, flume::Receiver<ConversionEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: ConversionEvent) {
        // Receiver gone means nobody is listening any more.
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_progress(&self, percent: u8) {
        self.send(ConversionEvent::Progress(percent));
    }
    fn on_completed_count(&self, completed: usize) {
        self.send(ConversionEvent::CompletedCount(completed));
    }
    fn on_file_log(&self, line: &str) {
        self.send(ConversionEvent::FileLog(line.to_string()));
    }
    fn on_error(&self, message: &str) {
        self.send(ConversionEvent::Error(message.to_string()));
    }
    fn on_finished(&self) {
        self.send(ConversionEvent::Finished);
    }
}

/// Writes every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_progress(&self, percent: u8) {
        tracing::debug!(percent, "progress");
    }
    fn on_completed_count(&self, completed: usize) {
        tracing::debug!(completed, "completed count");
    }
    fn on_file_log(&self, line: &str) {
        tracing::info!("{}", line);
    }
    fn on_error(&self, message: &str) {
        tracing::error!("{}", message);
    }
    fn on_finished(&self) {
        tracing::info!("batch finished");
    }
}
