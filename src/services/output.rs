use super::runner::RunSummary;
use tokio::sync::mpsc;

/// Destination for the run transcript.
///
/// The runner calls `append` for every transcript line, in order, and calls
/// `complete` exactly once when the run ends.
pub trait OutputSink: Send {
    /// Append one line of text
    fn append(&mut self, line: &str);

    /// The run is over; `summary` says how it ended
    fn complete(&mut self, summary: &RunSummary);
}

/// A transcript event, as delivered by [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Line(String),
    Completed(RunSummary),
}

/// Keeps every event in memory, mostly useful in tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSink {
    events: Vec<RunEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Transcript lines only, without the completion event
    pub fn lines(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Line(line) => Some(line.as_str()),
                RunEvent::Completed(_) => None,
            })
            .collect()
    }

    pub fn into_events(self) -> Vec<RunEvent> {
        self.events
    }
}

impl OutputSink for RecordingSink {
    fn append(&mut self, line: &str) {
        self.events.push(RunEvent::Line(line.to_string()));
    }

    fn complete(&mut self, summary: &RunSummary) {
        self.events.push(RunEvent::Completed(summary.clone()));
    }
}

/// Forwards transcript events over a tokio channel, so another task or a
/// GUI event loop can render them.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: RunEvent) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.tx.send(event);
    }
}

impl OutputSink for ChannelSink {
    fn append(&mut self, line: &str) {
        self.send(RunEvent::Line(line.to_string()));
    }

    fn complete(&mut self, summary: &RunSummary) {
        self.send(RunEvent::Completed(summary.clone()));
    }
}
