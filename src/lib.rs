// apkbuilder - APK dump, pack and keystore pipeline
//
// This is the library crate containing the pipeline: tool lookup, command
// planning, sequential process execution and intermediate cleanup.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{SettingsStore, YamlSettingsStore};
pub use metrics::RunMetrics;
pub use models::{CommandLine, Mode, Plan, Settings};
pub use services::{CommandPlanner, ProcessRunner, RunSummary, ToolLocator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
