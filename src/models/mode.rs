use std::fmt;

/// Operation selected by the user for a run.
///
/// The mode decides which branch of the planner builds the queue and whether
/// intermediate artifacts are removed once the queue drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Disassemble a package into an editable project directory
    Dump,

    /// Assemble a project directory, then align and sign the result
    Pack,

    /// Generate a new signing keystore
    KeystoreGen,
}

impl Mode {
    /// Human-readable label used in validation messages
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Dump => "Dump",
            Mode::Pack => "Pack",
            Mode::KeystoreGen => "Keystore",
        }
    }

    /// Whether this mode needs apktool on the search path.
    ///
    /// KeystoreGen only runs keytool, so it deliberately skips the apktool
    /// lookup and works on machines without apktool installed.
    pub fn needs_apktool(&self) -> bool {
        matches!(self, Mode::Dump | Mode::Pack)
    }

    /// Whether this mode leaves intermediate files behind for cleanup
    pub fn has_intermediates(&self) -> bool {
        matches!(self, Mode::Pack)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
