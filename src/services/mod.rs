//! Services module - the build pipeline.
//!
//! Everything here is independent of the front end. The CLI in `main.rs`
//! wires the pieces together; a GUI could do the same through
//! [`ChannelSink`].
//!
//! # Components
//!
//! - [`ToolLocator`]: finds apktool, java, keytool and the newest Android
//!   build-tools (zipalign, apksigner), with platform specific name
//!   resolution behind [`PlatformPolicy`]
//! - [`CommandPlanner`]: validates a settings snapshot and turns it into a
//!   [`Plan`](crate::models::Plan) of external commands
//! - [`ProcessRunner`]: executes the plan one process at a time, streaming
//!   output into an [`OutputSink`], honoring cancellation and step timeouts
//! - [`ArtifactCleaner`]: removes the intermediate APKs of a drained Pack run
//!
//! # Flow
//!
//! ```ignore
//! let locator = ToolLocator::from_env();
//! let plan = CommandPlanner::new(&locator).plan(Mode::Pack, settings.clone())?;
//!
//! let runner = ProcessRunner::new(RunnerOptions::from_settings(&settings), metrics);
//! let summary = runner.run(&plan, &mut sink, cancel_rx).await;
//! ```

pub mod cleanup;
pub mod output;
pub mod planner;
pub mod runner;
pub mod tools;

pub use cleanup::{ArtifactCleaner, CleanupReport};
pub use output::{ChannelSink, OutputSink, RecordingSink, RunEvent};
pub use planner::{CommandPlanner, PackPaths, PlanError};
pub use runner::{
    FailurePolicy, ProcessRunner, RunOutcome, RunSummary, RunnerOptions, StepOutcome, StepReport,
};
pub use tools::{Invocation, PlatformPolicy, ToolError, ToolLocator, ToolPaths};
