use super::Mode;
use camino::Utf8PathBuf;
use std::fmt;

/// Arguments whose following value is a secret and must not be echoed.
const SECRET_FLAGS: &[&str] = &["-storepass", "-keypass"];

/// One external command: a program followed by its arguments.
///
/// Commands are immutable once built; the planner creates them and the runner
/// only reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Token 0
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Tokens 1..
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// All tokens in order, program first
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    /// Textual form for transcripts and logs, with passwords masked.
    ///
    /// Values after `-storepass`/`-keypass` become `***` and `pass:<pw>`
    /// becomes `pass:***`.
    pub fn redacted(&self) -> String {
        let mut shown = Vec::with_capacity(self.args.len() + 1);
        let mut mask_next = false;
        for token in self.tokens() {
            if mask_next {
                shown.push("***".to_string());
                mask_next = false;
                continue;
            }
            if token.starts_with("pass:") {
                shown.push("pass:***".to_string());
            } else {
                mask_next = SECRET_FLAGS.contains(&token);
                shown.push(token.to_string());
            }
        }
        shown.join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Ordered commands for a single run, consumed strictly front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandQueue {
    commands: Vec<CommandLine>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: CommandLine) {
        self.commands.push(command);
    }

    pub fn get(&self, index: usize) -> Option<&CommandLine> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandLine> {
        self.commands.iter()
    }
}

impl FromIterator<CommandLine> for CommandQueue {
    fn from_iter<T: IntoIterator<Item = CommandLine>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

/// A file written by one queue step and consumed by a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    /// Index of the step that writes the file
    pub step: usize,
    pub path: Utf8PathBuf,
}

/// Everything the runner needs for one run, fixed before the first launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub mode: Mode,
    pub queue: CommandQueue,

    /// Intermediates to remove after a drained Pack run
    pub intermediates: Vec<PlannedArtifact>,

    /// Final product of the run, if it produces a single file or directory
    pub output: Option<Utf8PathBuf>,
}

impl Plan {
    /// Intermediates written by `step`
    pub fn intermediates_of(&self, step: usize) -> impl Iterator<Item = &Utf8PathBuf> {
        self.intermediates
            .iter()
            .filter(move |artifact| artifact.step == step)
            .map(|artifact| &artifact.path)
    }
}
