// Execution state for a single run
//
// Created when a run starts, mutated only by the ProcessRunner as each command
// finishes, and dropped when the run ends.

use crate::models::Plan;
use camino::Utf8PathBuf;

/// Progress through a command queue
///
/// Tracks the next queue index, the process currently in flight (at most one)
/// and the intermediate files the finished steps were planned to write.
#[derive(Debug, Default)]
pub struct ExecutionState {
    next_index: usize,
    current_pid: Option<u32>,
    artifacts: Vec<Utf8PathBuf>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the command that will run next
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Whether every command of `plan` has been consumed
    pub fn is_drained(&self, plan: &Plan) -> bool {
        self.next_index >= plan.queue.len()
    }

    /// Process id of the command in flight, if any
    pub fn current_pid(&self) -> Option<u32> {
        self.current_pid
    }

    /// Intermediates written so far, in queue order
    pub fn artifacts(&self) -> &[Utf8PathBuf] {
        &self.artifacts
    }

    /// Record that the command at `next_index` is running.
    ///
    /// Any previous handle is replaced.
    pub fn launched(&mut self, pid: Option<u32>) {
        self.current_pid = pid;
    }

    /// Finish the current step: clear the process handle, remember the
    /// step's intermediates and advance to the next index.
    pub fn finished(&mut self, plan: &Plan) {
        self.current_pid = None;
        self.artifacts
            .extend(plan.intermediates_of(self.next_index).cloned());
        self.next_index += 1;
    }

    /// Advance past a step that never started
    pub fn skipped(&mut self) {
        self.current_pid = None;
        self.next_index += 1;
    }
}
