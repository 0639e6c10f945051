// UI module - terminal front end collaborators
//
// This module contains:
// - ConsoleSink: renders the run transcript to stdout
// - FilePicker / DialogPicker: asks the user for missing paths with native dialogs

pub mod console;
pub mod picker;

pub use console::ConsoleSink;
pub use picker::{DialogPicker, FilePicker, PickKind, fill_missing_paths};
