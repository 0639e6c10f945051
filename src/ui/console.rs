use crate::services::{OutputSink, RunSummary};
use std::io::Write;

/// Writes the run transcript to a terminal (or any writer).
///
/// Output lines are printed as they arrive. At completion the summary
/// message is printed, followed by the removed intermediates when `verbose`.
#[derive(Debug)]
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    verbose: bool,
    write_failed: bool,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out,
            verbose,
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        let result = writeln!(self.out, "{}", line).and_then(|_| self.out.flush());
        // Report a broken terminal once, not once per line
        if let Err(e) = result {
            if !self.write_failed {
                tracing::warn!("Failed to write transcript: {}", e);
                self.write_failed = true;
            }
        }
    }
}

impl<W: Write + Send> OutputSink for ConsoleSink<W> {
    fn append(&mut self, line: &str) {
        self.write_line(line);
    }

    fn complete(&mut self, summary: &RunSummary) {
        self.write_line(&summary.message());

        if !self.verbose {
            return;
        }
        if let Some(cleanup) = &summary.cleanup {
            for path in &cleanup.removed {
                self.write_line(&format!("Removed {}", path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mode;
    use crate::services::{CleanupReport, RunOutcome};

    fn summary(outcome: RunOutcome, cleanup: Option<CleanupReport>) -> RunSummary {
        RunSummary {
            mode: Mode::Pack,
            outcome,
            steps: Vec::new(),
            cleanup,
        }
    }

    fn transcript(sink: ConsoleSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_lines_then_completion_message() {
        let mut sink = ConsoleSink::new(Vec::new(), false);
        sink.append(">> apktool b /work/MyApp");
        sink.append("I: Building apk file...");
        sink.complete(&summary(RunOutcome::Completed, Some(CleanupReport::default())));

        assert_eq!(
            transcript(sink),
            ">> apktool b /work/MyApp\nI: Building apk file...\nAll tasks completed\n"
        );
    }

    #[test]
    fn test_verbose_lists_removed_intermediates() {
        let cleanup = CleanupReport {
            removed: vec!["/work/MyApp/dist/MyApp.apk".into()],
            failed: Vec::new(),
        };
        let mut sink = ConsoleSink::new(Vec::new(), true);
        sink.complete(&summary(RunOutcome::Completed, Some(cleanup)));

        assert_eq!(
            transcript(sink),
            "All tasks completed\nRemoved /work/MyApp/dist/MyApp.apk\n"
        );
    }

    #[test]
    fn test_aborted_message() {
        let mut sink = ConsoleSink::new(Vec::new(), false);
        sink.complete(&summary(
            RunOutcome::Aborted {
                step: 1,
                reason: "exit code 1".to_string(),
            },
            None,
        ));

        assert_eq!(transcript(sink), "Run aborted at step 2: exit code 1\n");
    }
}
