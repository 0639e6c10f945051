//! Data models for the APK builder.
//!
//! - [`Mode`]: which operation a run performs (Dump, Pack, KeystoreGen)
//! - [`Settings`]: the flat, persisted settings mapping; cloned into an immutable snapshot per run
//! - [`CommandLine`] / [`CommandQueue`]: external commands in execution order
//! - [`Plan`]: the queue plus the artifact paths decided before the first launch
//!
//! Nothing here performs I/O. Planning, execution and cleanup live in
//! [`crate::services`].

pub mod command;
pub mod mode;
pub mod settings;

pub use command::{CommandLine, CommandQueue, Plan, PlannedArtifact};
pub use mode::Mode;
pub use settings::Settings;
