//! Per-file progress events.
//!
//! The coordinator emits a sequence of [`ProgressEvent`]s for every file it
//! processes. Sinks only observe; they cannot influence the pipeline.

use std::fmt;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStage {
    Encrypting,
    Uploading,
    Recording,
    Downloading,
    Decrypting,
    HandingOff,
    Completed,
    Failed,
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub file_name: String,
    pub stage: ProgressStage,
    /// 0..=100
    pub percent: u8,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({}%)", self.file_name, self.stage, self.percent)
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into an unbounded channel. Events are dropped once the
/// receiver is gone.
#[derive(Clone, Debug)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Calls a closure for every event.
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

/// Emits the events of one file's pipeline and remembers the last percentage
/// so a failure can be reported where it happened.
pub(crate) struct FileProgress<'a> {
    sink: &'a dyn ProgressSink,
    file_name: String,
    last_percent: u8,
}

impl<'a> FileProgress<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, file_name: &str) -> Self {
        Self {
            sink,
            file_name: file_name.to_string(),
            last_percent: 0,
        }
    }

    pub(crate) fn stage(&mut self, stage: ProgressStage, percent: u8) {
        self.last_percent = percent.min(100);
        self.sink.emit(ProgressEvent {
            file_name: self.file_name.clone(),
            stage,
            percent: self.last_percent,
        });
    }

    pub(crate) fn completed(&mut self) {
        self.stage(ProgressStage::Completed, 100);
    }

    pub(crate) fn failed(&mut self) {
        let percent = self.last_percent;
        self.stage(ProgressStage::Failed, percent);
    }

    /// Reports `Completed` or `Failed` depending on `result`, then returns it.
    pub(crate) fn finish<T, E>(&mut self, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => self.completed(),
            Err(_) => self.failed(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn display_matches_cli_format() {
        let event = ProgressEvent {
            file_name: "a.txt".into(),
            stage: ProgressStage::Uploading,
            percent: 40,
        };
        assert_eq!(event.to_string(), "a.txt - Uploading (40%)");
    }

    #[test]
    fn failure_keeps_last_percent() {
        let seen = Mutex::new(Vec::new());
        let sink = FnProgress(|e: ProgressEvent| seen.lock().unwrap().push(e));
        let mut progress = FileProgress::new(&sink, "a.txt");
        progress.stage(ProgressStage::Encrypting, 10);
        progress.stage(ProgressStage::Uploading, 40);
        progress.failed();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].stage, ProgressStage::Failed);
        assert_eq!(seen[2].percent, 40);
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelProgress::new();
        let mut progress = FileProgress::new(&sink, "b.txt");
        progress.stage(ProgressStage::Downloading, 10);
        progress.completed();

        assert_eq!(rx.recv().await.unwrap().stage, ProgressStage::Downloading);
        assert_eq!(rx.recv().await.unwrap().stage, ProgressStage::Completed);
    }
}
