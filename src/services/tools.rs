use crate::models::{CommandLine, Mode};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fmt;
use std::fs;
use thiserror::Error;

/// Errors raised while resolving external tools
///
/// All of these are fatal to a run and surface before any command executes.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0} was not found on the search path; install it and add it to PATH")]
    NotFound(String),

    #[error("no build-tools versions found under {0}")]
    NoBuildTools(Utf8PathBuf),

    #[error("cannot read build-tools directory {path}: {source}")]
    BuildToolsUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operating-system specific rules for naming and launching tools.
pub trait PlatformPolicy: Send + Sync + fmt::Debug {
    /// Suffix appended to SDK tool names (`.exe` on Windows)
    fn exe_suffix(&self) -> &'static str;

    /// File names to try, in order, when searching a directory for `tool`
    fn candidate_names(&self, tool: &str) -> Vec<String>;

    /// Whether `path` is a batch/script wrapper rather than a native program
    fn is_script_wrapper(&self, path: &Utf8Path) -> bool;

    /// Route a command through the platform shell when its program path
    /// would otherwise be split on whitespace.
    fn wrap(&self, command: CommandLine) -> CommandLine;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPlatform;

#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPlatform;

static WINDOWS: WindowsPlatform = WindowsPlatform;
static UNIX: UnixPlatform = UnixPlatform;

/// Policy for the platform this binary was built for
pub fn current_platform() -> &'static dyn PlatformPolicy {
    if cfg!(windows) {
        return &WINDOWS;
    }
    &UNIX
}

impl PlatformPolicy for WindowsPlatform {
    fn exe_suffix(&self) -> &'static str {
        ".exe"
    }

    fn candidate_names(&self, tool: &str) -> Vec<String> {
        if Utf8Path::new(tool).extension().is_some() {
            return vec![tool.to_string()];
        }
        [".exe", ".bat", ".cmd", ""]
            .iter()
            .map(|ext| format!("{}{}", tool, ext))
            .collect()
    }

    fn is_script_wrapper(&self, path: &Utf8Path) -> bool {
        path.extension()
            .map(|ext| ext.eq_ignore_ascii_case("bat") || ext.eq_ignore_ascii_case("cmd"))
            .unwrap_or(false)
    }

    fn wrap(&self, command: CommandLine) -> CommandLine {
        if !command.program().chars().any(char::is_whitespace) {
            return command;
        }

        let program = if command.program().starts_with('"') {
            command.program().to_string()
        } else {
            format!("\"{}\"", command.program())
        };

        let args = ["/c".to_string(), program]
            .into_iter()
            .chain(command.args().iter().cloned());
        CommandLine::new("cmd", args)
    }
}

impl WindowsPlatform {
    /// Everything after `cmd` for a command produced by
    /// [`wrap`](PlatformPolicy::wrap), to be passed to `cmd` verbatim.
    ///
    /// `cmd` does not understand `\"` escapes, so the tail is built by hand
    /// as `/c "<program> <args>"`; `cmd` strips the outer pair of quotes.
    /// Returns None for commands that are not routed through `cmd /c`.
    pub fn shell_line(command: &CommandLine) -> Option<String> {
        if command.program() != "cmd" {
            return None;
        }
        let (switch, rest) = command.args().split_first()?;
        if switch != "/c" {
            return None;
        }

        let inner: Vec<String> = rest.iter().map(|arg| quote_for_cmd(arg)).collect();
        Some(format!("/c \"{}\"", inner.join(" ")))
    }
}

fn quote_for_cmd(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.chars().any(char::is_whitespace);
    if arg.starts_with('"') || !needs_quotes {
        return arg.to_string();
    }
    format!("\"{}\"", arg)
}

impl PlatformPolicy for UnixPlatform {
    fn exe_suffix(&self) -> &'static str {
        ""
    }

    fn candidate_names(&self, tool: &str) -> Vec<String> {
        vec![tool.to_string()]
    }

    fn is_script_wrapper(&self, _path: &Utf8Path) -> bool {
        false
    }

    fn wrap(&self, command: CommandLine) -> CommandLine {
        command
    }
}

/// How to start a tool: a program plus arguments that precede the tool's own.
///
/// apktool may run as `apktool ...` or as `java -jar apktool.jar ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl Invocation {
    pub fn direct(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Build a command that runs this tool with `args`
    pub fn command<I, S>(&self, args: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = self
            .leading_args
            .iter()
            .cloned()
            .chain(args.into_iter().map(Into::into));
        CommandLine::new(self.program.clone(), args)
    }
}

/// Resolved tool locations for one run. Never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// apktool invocation; only resolved for modes that need it
    pub apktool: Option<Invocation>,
    pub java: Option<Utf8PathBuf>,
    pub zipalign: String,
    pub apksigner: String,
    pub keytool: String,
}

/// Finds external executables on the search path and in the SDK.
#[derive(Debug)]
pub struct ToolLocator {
    search_path: Vec<Utf8PathBuf>,
    platform: &'static dyn PlatformPolicy,

    /// Matches build-tools directory names such as `30.0.3` or `34.0.0-rc1`
    version_dir: Regex,
}

impl ToolLocator {
    pub fn new(search_path: Vec<Utf8PathBuf>, platform: &'static dyn PlatformPolicy) -> Self {
        Self {
            search_path,
            platform,
            version_dir: Regex::new(r"^\d+(\.\d+)*(-[A-Za-z0-9]+)?$")
                .expect("Invalid build-tools version regex"),
        }
    }

    /// Locator over the current `PATH` for the host platform
    pub fn from_env() -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|path| {
                std::env::split_paths(&path)
                    .filter_map(|dir| Utf8PathBuf::try_from(dir).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self::new(search_path, current_platform())
    }

    pub fn platform(&self) -> &'static dyn PlatformPolicy {
        self.platform
    }

    /// First match for `tool` on the search path
    pub fn find_on_path(&self, tool: &str) -> Option<Utf8PathBuf> {
        let candidates = self.platform.candidate_names(tool);
        self.search_path.iter().find_map(|dir| {
            candidates
                .iter()
                .map(|name| dir.join(name))
                .find(|path| is_executable(path))
        })
    }

    /// Locate apktool, preferring `java -jar apktool.jar` over a batch wrapper
    /// because the wrapper pauses for input when it finishes.
    pub fn locate_apktool(&self, java: Option<&Utf8Path>) -> Result<Invocation, ToolError> {
        let apktool = self
            .find_on_path("apktool")
            .ok_or_else(|| ToolError::NotFound("apktool".to_string()))?;

        if let (true, Some(java)) = (self.platform.is_script_wrapper(&apktool), java) {
            let jar = apktool
                .parent()
                .map(|dir| dir.join("apktool.jar"))
                .filter(|jar| jar.is_file());
            if let Some(jar) = jar {
                tracing::debug!("Running apktool through {} -jar {}", java, jar);
                return Ok(Invocation {
                    program: java.to_string(),
                    leading_args: vec!["-jar".to_string(), jar.to_string()],
                });
            }
        }

        tracing::debug!("Running apktool as {}", apktool);
        Ok(Invocation::direct(apktool.to_string()))
    }

    /// Newest build-tools directory under `sdk_root`.
    ///
    /// Version names are compared as plain strings and the greatest wins.
    pub fn select_build_tools(&self, sdk_root: &Utf8Path) -> Result<Utf8PathBuf, ToolError> {
        let build_tools = sdk_root.join("build-tools");
        let entries =
            fs::read_dir(&build_tools).map_err(|source| ToolError::BuildToolsUnreadable {
                path: build_tools.clone(),
                source,
            })?;

        let newest = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.version_dir.is_match(name))
            .max()
            .ok_or_else(|| ToolError::NoBuildTools(build_tools.clone()))?;

        tracing::info!("Using build-tools {} from {}", newest, build_tools);
        Ok(build_tools.join(newest))
    }

    /// Resolve every tool `mode` needs.
    ///
    /// zipalign and apksigner come from the newest build-tools when an SDK root
    /// is set, and are looked up by name on the search path otherwise.
    pub fn resolve(&self, mode: Mode, sdk_root: Option<&Utf8Path>) -> Result<ToolPaths, ToolError> {
        let java = self.find_on_path("java");

        let apktool = if mode.needs_apktool() {
            Some(self.locate_apktool(java.as_deref())?)
        } else {
            None
        };

        let (zipalign, apksigner) = match (mode, sdk_root) {
            (Mode::Pack, Some(sdk)) => {
                let tools = self.select_build_tools(sdk)?;
                let suffix = self.platform.exe_suffix();
                (
                    tools.join(format!("zipalign{}", suffix)).to_string(),
                    tools.join(format!("apksigner{}", suffix)).to_string(),
                )
            }
            _ => (
                self.path_or_name("zipalign"),
                self.path_or_name("apksigner"),
            ),
        };

        Ok(ToolPaths {
            apktool,
            java,
            zipalign,
            apksigner,
            keytool: self.path_or_name("keytool"),
        })
    }

    /// Wrap a command per the platform's shell rules
    pub fn wrap(&self, command: CommandLine) -> CommandLine {
        self.platform.wrap(command)
    }

    fn path_or_name(&self, tool: &str) -> String {
        self.find_on_path(tool)
            .map(|path| path.to_string())
            .unwrap_or_else(|| tool.to_string())
    }
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}
