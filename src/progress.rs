//! Progress events sent from batch workers to a single consumer.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decode,
    Fill,
    Vector,
    Encode,
    Done,
}

/// Fractional completion of one stage of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub path: PathBuf,
    pub stage: Stage,
    /// Completion in `[0, 1]`
    pub portion: f32,
}

impl ProgressEvent {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, portion: f32) -> Self {
        Self {
            path: path.into(),
            stage,
            portion: portion.clamp(0.0, 1.0),
        }
    }
}

/// Receiver of progress events, called from any worker thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn sender_forwards_events() {
        let (sender, receiver) = mpsc::channel();
        sender.report(ProgressEvent::new("a.png", Stage::Fill, 0.5));
        let event = receiver.recv().unwrap();
        assert_eq!(event.stage, Stage::Fill);
        assert_eq!(event.path, PathBuf::from("a.png"));
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);
        sender.report(ProgressEvent::new("a.png", Stage::Done, 2.0));
        NoProgress.report(ProgressEvent::new("a.png", Stage::Done, 1.0));
    }

    #[test]
    fn portion_is_clamped() {
        assert_eq!(ProgressEvent::new("a", Stage::Decode, -1.0).portion, 0.0);
        assert_eq!(ProgressEvent::new("a", Stage::Decode, 3.0).portion, 1.0);
    }
}
