use super::cleanup::{ArtifactCleaner, CleanupReport};
use super::output::OutputSink;
#[cfg(windows)]
use super::tools::WindowsPlatform;
use crate::metrics::RunMetrics;
use crate::models::{CommandLine, Mode, Plan, Settings};
use crate::state::ExecutionState;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time::sleep;

/// How long to keep reading output after a process exits, for pipes held
/// open by its own children
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Deadline for timers that are switched off
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// What to do when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failed step; intermediates are kept
    #[default]
    FailFast,

    /// Log the failure and keep going, cleaning up once the queue drains
    ContinueOnError,
}

#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub failure_policy: FailurePolicy,

    /// Kill a step that runs longer than this
    pub step_timeout: Option<Duration>,
}

impl RunnerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            failure_policy: if settings.continue_on_error {
                FailurePolicy::ContinueOnError
            } else {
                FailurePolicy::FailFast
            },
            step_timeout: settings.step_timeout(),
        }
    }
}

/// How a single step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The process terminated on its own. `code` is None when it was killed
    /// by a signal.
    Exited { code: Option<i32>, success: bool },

    /// The process could not be spawned
    LaunchFailed(String),

    /// The process was killed after exceeding the step timeout
    TimedOut(Duration),

    /// Waiting on the process failed
    WaitFailed(String),

    /// The process was killed because the run was cancelled
    Cancelled,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Exited { success: true, .. })
    }

    /// Short human-readable reason
    pub fn describe(&self) -> String {
        match self {
            StepOutcome::Exited {
                code: Some(code), ..
            } => format!("exit code {}", code),
            StepOutcome::Exited { code: None, .. } => "terminated by a signal".to_string(),
            StepOutcome::LaunchFailed(reason) => format!("launch failed: {}", reason),
            StepOutcome::TimedOut(limit) => format!("timed out after {}s", limit.as_secs_f32()),
            StepOutcome::WaitFailed(reason) => format!("could not collect exit status: {}", reason),
            StepOutcome::Cancelled => "cancelled".to_string(),
        }
    }

    /// The `[Finished]` transcript line for a step that was launched
    fn finished_line(&self) -> String {
        match self {
            StepOutcome::Exited { code, success: _ } => format!(
                "[Finished] exit code {}, status {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
                if code.is_some() { "normal" } else { "crashed" }
            ),
            other => format!("[Finished] {}, process killed", other.describe()),
        }
    }
}

/// Record of one executed (or attempted) step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub index: usize,

    /// Redacted textual form of the command
    pub command: String,
    pub outcome: StepOutcome,
    pub duration: Duration,
}

/// How the run as a whole ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every queued command was consumed
    Completed,

    /// Fail-fast stopped the queue after `step` failed
    Aborted { step: usize, reason: String },

    /// Cancellation was requested while `step` was next or running
    Cancelled { step: usize },
}

/// Result of a run, delivered to the sink's completion notification
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: Mode,
    pub outcome: RunOutcome,
    pub steps: Vec<StepReport>,

    /// Present only when the queue drained and cleanup ran
    pub cleanup: Option<CleanupReport>,
}

impl RunSummary {
    /// Number of steps that did not succeed
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.outcome.is_success()).count()
    }

    /// Completed with every step succeeding
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.failed_steps() == 0
    }

    /// Completion message shown to the user
    pub fn message(&self) -> String {
        match &self.outcome {
            RunOutcome::Completed => match self.failed_steps() {
                0 => "All tasks completed".to_string(),
                n => format!("All tasks completed ({} step(s) failed)", n),
            },
            RunOutcome::Aborted { step, reason } => {
                format!("Run aborted at step {}: {}", step + 1, reason)
            }
            RunOutcome::Cancelled { step } => format!("Run cancelled at step {}", step + 1),
        }
    }
}

/// Executes a plan's queue one command at a time.
///
/// A single task drives each process: output lines, the exit status,
/// cancellation and the step timeout are raced with `tokio::select!`, so
/// every line and the `[Finished]` line of step *i* reach the sink before
/// step *i + 1* is launched.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    options: RunnerOptions,
    metrics: Arc<RunMetrics>,
    cleaner: ArtifactCleaner,
}

impl ProcessRunner {
    pub fn new(options: RunnerOptions, metrics: Arc<RunMetrics>) -> Self {
        Self {
            options,
            cleaner: ArtifactCleaner::new(metrics.clone()),
            metrics,
        }
    }

    /// Drain `plan`'s queue, then clean up and notify the sink.
    ///
    /// Runtime failures never surface as errors: they are written to the sink
    /// and recorded in the returned summary.
    pub async fn run(
        &self,
        plan: &Plan,
        sink: &mut dyn OutputSink,
        mut cancel: watch::Receiver<bool>,
    ) -> RunSummary {
        tracing::info!(
            "Starting {} run: {} command(s), policy {:?}",
            plan.mode,
            plan.queue.len(),
            self.options.failure_policy
        );

        let mut state = ExecutionState::new();
        let mut steps = Vec::with_capacity(plan.queue.len());

        let outcome = loop {
            let index = state.next_index();
            let Some(command) = plan.queue.get(index) else {
                break RunOutcome::Completed;
            };

            if *cancel.borrow() {
                tracing::warn!("Run cancelled before step {}", index + 1);
                break RunOutcome::Cancelled { step: index };
            }

            sink.append(&format!(">> {}", command));
            let report = self.run_step(index, command, &mut state, sink, &mut cancel).await;

            match report.outcome {
                StepOutcome::LaunchFailed(_) => state.skipped(),
                _ => state.finished(plan),
            }

            let step_outcome = report.outcome.clone();
            steps.push(report);

            if step_outcome == StepOutcome::Cancelled {
                break RunOutcome::Cancelled { step: index };
            }

            if !step_outcome.is_success() {
                tracing::warn!("Step {} failed: {}", index + 1, step_outcome.describe());
                if self.options.failure_policy == FailurePolicy::FailFast {
                    break RunOutcome::Aborted {
                        step: index,
                        reason: step_outcome.describe(),
                    };
                }
            }
        };

        let cleanup = if outcome == RunOutcome::Completed {
            let report = self.cleaner.clean(plan.mode, state.artifacts());
            for (path, reason) in &report.failed {
                sink.append(&format!("Could not remove {}: {}", path, reason));
            }
            Some(report)
        } else {
            if !state.artifacts().is_empty() {
                tracing::info!(
                    "Keeping {} intermediate file(s) from the unfinished run",
                    state.artifacts().len()
                );
            }
            None
        };

        let summary = RunSummary {
            mode: plan.mode,
            outcome,
            steps,
            cleanup,
        };

        tracing::info!("{} run finished: {}", plan.mode, summary.message());
        sink.complete(&summary);
        summary
    }

    async fn run_step(
        &self,
        index: usize,
        command: &CommandLine,
        state: &mut ExecutionState,
        sink: &mut dyn OutputSink,
        cancel: &mut watch::Receiver<bool>,
    ) -> StepReport {
        let started = Instant::now();
        let report = |outcome: StepOutcome| StepReport {
            index,
            command: command.redacted(),
            outcome,
            duration: started.elapsed(),
        };

        let mut process = Command::new(command.program());
        add_args(&mut process, command);
        let spawned = process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to launch {}: {}", command.program(), e);
                self.metrics.record_launch_failure();
                sink.append(&format!("Process launch failed: {}", e));
                return report(StepOutcome::LaunchFailed(e.to_string()));
            }
        };

        self.metrics.record_launch();
        state.launched(child.id());
        tracing::info!("Step {} started (pid {:?})", index + 1, child.id());

        let mut stdout = child.stdout.take().map(BufReader::new);
        let mut stderr = child.stderr.take().map(BufReader::new);
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut out_done = stdout.is_none();
        let mut err_done = stderr.is_none();
        let mut cancel_open = true;
        let mut exit: Option<StepOutcome> = None;

        let timeout = sleep(self.options.step_timeout.unwrap_or(FAR_FUTURE));
        tokio::pin!(timeout);
        let drain = sleep(FAR_FUTURE);
        tokio::pin!(drain);

        while exit.is_none() || !(out_done && err_done) {
            tokio::select! {
                read = next_line(&mut stdout, &mut out_buf), if !out_done => {
                    out_done = forward(read, &mut out_buf, sink);
                }
                read = next_line(&mut stderr, &mut err_buf), if !err_done => {
                    err_done = forward(read, &mut err_buf, sink);
                }
                status = child.wait(), if exit.is_none() => {
                    exit = Some(match status {
                        Ok(status) => exited(status),
                        Err(e) => StepOutcome::WaitFailed(e.to_string()),
                    });
                    drain.as_mut().reset(tokio::time::Instant::now() + DRAIN_GRACE);
                }
                changed = cancel.changed(), if exit.is_none() && cancel_open => {
                    if changed.is_err() {
                        cancel_open = false;
                    } else if *cancel.borrow() {
                        tracing::warn!("Cancellation requested; killing step {}", index + 1);
                        kill(&mut child, index).await;
                        exit = Some(StepOutcome::Cancelled);
                        drain.as_mut().reset(tokio::time::Instant::now() + DRAIN_GRACE);
                    }
                }
                () = &mut timeout, if exit.is_none() && self.options.step_timeout.is_some() => {
                    let limit = self.options.step_timeout.unwrap_or(FAR_FUTURE);
                    tracing::warn!("Step {} timed out after {:?}; killing", index + 1, limit);
                    kill(&mut child, index).await;
                    self.metrics.record_timeout();
                    exit = Some(StepOutcome::TimedOut(limit));
                    drain.as_mut().reset(tokio::time::Instant::now() + DRAIN_GRACE);
                }
                () = &mut drain, if exit.is_some() => {
                    tracing::warn!("Output of step {} still open after exit; detaching", index + 1);
                    break;
                }
                else => break,
            }
        }

        // Partial lines left behind by a detached reader
        emit(&mut out_buf, sink);
        emit(&mut err_buf, sink);

        let outcome = exit.unwrap_or_else(|| {
            StepOutcome::WaitFailed("output closed before the process exited".to_string())
        });

        if let StepOutcome::Exited { success, .. } = outcome {
            self.metrics.record_exit(success, started.elapsed());
        }

        sink.append(&outcome.finished_line());
        tracing::info!(
            "Step {} finished in {:.2}s: {}",
            index + 1,
            started.elapsed().as_secs_f32(),
            outcome.describe()
        );

        report(outcome)
    }
}

fn exited(status: ExitStatus) -> StepOutcome {
    StepOutcome::Exited {
        code: status.code(),
        success: status.success(),
    }
}

async fn kill(child: &mut Child, index: usize) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill step {}: {}", index + 1, e);
    }
}

/// Arguments for the child; `cmd /c` lines go to `cmd` unescaped
#[cfg(windows)]
fn add_args(process: &mut Command, command: &CommandLine) {
    match WindowsPlatform::shell_line(command) {
        Some(line) => {
            process.raw_arg(line);
        }
        None => {
            process.args(command.args());
        }
    }
}

#[cfg(not(windows))]
fn add_args(process: &mut Command, command: &CommandLine) {
    process.args(command.args());
}

/// Read up to the next newline into `buf`. Returns 0 at end of stream.
///
/// Bytes read before the future is dropped stay in `buf`, so this is safe to
/// race in `select!`.
async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut Option<BufReader<R>>,
    buf: &mut Vec<u8>,
) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read_until(b'\n', buf).await,
        None => Ok(0),
    }
}

/// Send what `next_line` read to the sink; returns true at end of stream.
fn forward(read: std::io::Result<usize>, buf: &mut Vec<u8>, sink: &mut dyn OutputSink) -> bool {
    let done = match read {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => {
            tracing::warn!("Failed to read process output: {}", e);
            true
        }
    };
    emit(buf, sink);
    done
}

fn emit(buf: &mut Vec<u8>, sink: &mut dyn OutputSink) {
    if buf.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(buf);
    let line = text.trim_end();
    if !line.trim_start().is_empty() {
        tracing::debug!("| {}", line);
        sink.append(line);
    }
    buf.clear();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::{CommandQueue, PlannedArtifact};
    use crate::services::output::{RecordingSink, RunEvent};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh", ["-c", script])
    }

    fn plan(mode: Mode, commands: Vec<CommandLine>) -> Plan {
        Plan {
            mode,
            queue: CommandQueue::from_iter(commands),
            intermediates: Vec::new(),
            output: None,
        }
    }

    fn runner(policy: FailurePolicy) -> ProcessRunner {
        ProcessRunner::new(
            RunnerOptions {
                failure_policy: policy,
                step_timeout: None,
            },
            Arc::new(RunMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_empty_queue_completes_immediately() {
        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();

        let summary = runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, Vec::new()), &mut events, rx)
            .await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(events.into_events(), vec![RunEvent::Completed(summary)]);
    }

    #[tokio::test]
    async fn test_commands_run_in_queue_order() {
        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let commands = vec![sh("echo one"), sh("echo two"), sh("echo three")];

        let summary = runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, commands), &mut events, rx)
            .await;

        assert_eq!(
            events.lines(),
            vec![
                ">> sh -c echo one",
                "one",
                "[Finished] exit code 0, status normal",
                ">> sh -c echo two",
                "two",
                "[Finished] exit code 0, status normal",
                ">> sh -c echo three",
                "three",
                "[Finished] exit code 0, status normal",
            ]
        );
        assert!(matches!(events.events().last(), Some(RunEvent::Completed(_))));
        assert!(summary.is_success());
        assert_eq!(summary.message(), "All tasks completed");
        assert_eq!(summary.steps.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_merged_output_and_blank_lines_skipped() {
        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let commands = vec![sh("echo out; printf '\\n   \\n'; echo err 1>&2; printf 'tail'")];

        runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, commands), &mut events, rx)
            .await;

        let lines = events.lines();
        assert!(lines.contains(&"out"));
        assert!(lines.contains(&"err"));
        assert!(lines.contains(&"tail"));
        assert!(!lines.iter().any(|l| l.trim().is_empty()));
        assert_eq!(lines.last(), Some(&"[Finished] exit code 0, status normal"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_non_zero_exit() {
        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let commands = vec![sh("exit 3"), sh("echo never")];

        let summary = runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, commands), &mut events, rx)
            .await;

        assert_eq!(
            summary.outcome,
            RunOutcome::Aborted {
                step: 0,
                reason: "exit code 3".to_string()
            }
        );
        assert_eq!(summary.steps.len(), 1);
        assert!(summary.cleanup.is_none());
        assert!(events.lines().contains(&"[Finished] exit code 3, status normal"));
        assert!(!events.lines().contains(&"never"));
        assert_eq!(summary.message(), "Run aborted at step 1: exit code 3");
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_every_step() {
        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let commands = vec![sh("exit 3"), sh("echo after")];

        let summary = runner(FailurePolicy::ContinueOnError)
            .run(&plan(Mode::Dump, commands), &mut events, rx)
            .await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.failed_steps(), 1);
        assert!(!summary.is_success());
        assert!(events.lines().contains(&"after"));
        assert_eq!(summary.message(), "All tasks completed (1 step(s) failed)");
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let missing = CommandLine::new("/nonexistent/apkbuilder-missing-tool", ["x"]);

        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let summary = runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, vec![missing.clone(), sh("echo never")]), &mut events, rx)
            .await;

        assert!(matches!(summary.outcome, RunOutcome::Aborted { step: 0, .. }));
        assert!(matches!(summary.steps[0].outcome, StepOutcome::LaunchFailed(_)));
        let shown = events.lines();
        assert!(shown.iter().any(|l| l.starts_with("Process launch failed")));
        assert!(!shown.iter().any(|l| l.starts_with("[Finished]")));

        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let summary = runner(FailurePolicy::ContinueOnError)
            .run(&plan(Mode::Dump, vec![missing, sh("echo next")]), &mut events, rx)
            .await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.steps.len(), 2);
        assert!(events.lines().contains(&"next"));
    }

    #[tokio::test]
    async fn test_step_timeout_kills_process() {
        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let runner = ProcessRunner::new(
            RunnerOptions {
                failure_policy: FailurePolicy::FailFast,
                step_timeout: Some(Duration::from_millis(200)),
            },
            Arc::new(RunMetrics::new()),
        );

        let started = Instant::now();
        let summary = runner
            .run(&plan(Mode::Dump, vec![sh("exec sleep 5")]), &mut events, rx)
            .await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(matches!(summary.steps[0].outcome, StepOutcome::TimedOut(_)));
        assert!(matches!(summary.outcome, RunOutcome::Aborted { step: 0, .. }));
    }

    #[tokio::test]
    async fn test_cancel_kills_running_step() {
        let (tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();

        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            let _ = tx.send(true);
            // keep the sender alive until the run has observed it
            sleep(Duration::from_secs(1)).await;
        });

        let started = Instant::now();
        let summary = runner(FailurePolicy::ContinueOnError)
            .run(
                &plan(Mode::Dump, vec![sh("exec sleep 5"), sh("echo never")]),
                &mut events,
                rx,
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(summary.outcome, RunOutcome::Cancelled { step: 0 });
        assert_eq!(summary.steps[0].outcome, StepOutcome::Cancelled);
        assert!(!events.lines().contains(&"never"));
        assert_eq!(summary.message(), "Run cancelled at step 1");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_launches_nothing() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut events = RecordingSink::new();

        let summary = runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, vec![sh("echo never")]), &mut events, rx)
            .await;

        assert_eq!(summary.outcome, RunOutcome::Cancelled { step: 0 });
        assert!(summary.steps.is_empty());
        assert!(events.lines().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_cancel_sender_does_not_stop_run() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut events = RecordingSink::new();

        let summary = runner(FailurePolicy::FailFast)
            .run(&plan(Mode::Dump, vec![sh("sleep 0.2; echo done")]), &mut events, rx)
            .await;

        assert!(summary.is_success());
        assert!(events.lines().contains(&"done"));
    }

    fn pack_plan(dir: &Utf8PathBuf, last_step: &str) -> Plan {
        let built = dir.join("MyApp.apk");
        let aligned = dir.join("aligned_MyApp.apk");
        let signed = dir.join("signed_MyApp.apk");
        Plan {
            mode: Mode::Pack,
            queue: CommandQueue::from_iter([
                sh(&format!("echo built > '{}'", built)),
                sh(&format!("cp '{}' '{}'", built, aligned)),
                sh(&last_step.replace("{aligned}", aligned.as_str()).replace("{signed}", signed.as_str())),
            ]),
            intermediates: vec![
                PlannedArtifact { step: 0, path: built },
                PlannedArtifact { step: 1, path: aligned },
            ],
            output: Some(signed),
        }
    }

    #[tokio::test]
    async fn test_pack_intermediates_removed_after_drain() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let plan = pack_plan(&dir, "cp '{aligned}' '{signed}'");

        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let summary = runner(FailurePolicy::FailFast).run(&plan, &mut events, rx).await;

        assert!(summary.is_success());
        let cleanup = summary.cleanup.unwrap();
        assert_eq!(cleanup.removed, vec![dir.join("MyApp.apk"), dir.join("aligned_MyApp.apk")]);
        assert!(!dir.join("MyApp.apk").exists());
        assert!(!dir.join("aligned_MyApp.apk").exists());
        assert!(dir.join("signed_MyApp.apk").exists());
    }

    #[tokio::test]
    async fn test_pack_intermediates_kept_when_aborted() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let plan = pack_plan(&dir, "exit 1");

        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let summary = runner(FailurePolicy::FailFast).run(&plan, &mut events, rx).await;

        assert!(matches!(summary.outcome, RunOutcome::Aborted { step: 2, .. }));
        assert!(summary.cleanup.is_none());
        assert!(dir.join("MyApp.apk").exists());
        assert!(dir.join("aligned_MyApp.apk").exists());
    }

    #[tokio::test]
    async fn test_metrics_count_steps() {
        let metrics = Arc::new(RunMetrics::new());
        let runner = ProcessRunner::new(
            RunnerOptions {
                failure_policy: FailurePolicy::ContinueOnError,
                step_timeout: None,
            },
            metrics.clone(),
        );

        let (_tx, rx) = watch::channel(false);
        let mut events = RecordingSink::new();
        let commands = vec![sh("true"), sh("false"), CommandLine::new("/nonexistent/tool", ["x"])];
        runner.run(&plan(Mode::Dump, commands), &mut events, rx).await;

        use std::sync::atomic::Ordering;
        assert_eq!(metrics.commands_launched.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.commands_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.non_zero_exits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.launch_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_runner_options_from_settings() {
        let settings = Settings {
            continue_on_error: true,
            step_timeout_secs: 30,
            ..Default::default()
        };
        let options = RunnerOptions::from_settings(&settings);
        assert_eq!(options.failure_policy, FailurePolicy::ContinueOnError);
        assert_eq!(options.step_timeout, Some(Duration::from_secs(30)));

        let options = RunnerOptions::from_settings(&Settings::default());
        assert_eq!(options.failure_policy, FailurePolicy::FailFast);
        assert_eq!(options.step_timeout, None);
    }
}
