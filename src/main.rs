//! apkbuilder - decode, rebuild and sign Android packages
//!
//! Command-line entry point.
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/apkbuilder.<date>
//! 2. Load `config.yaml` (plus `APKBUILDER_*` environment overrides)
//! 3. Apply command-line flags, optionally ask for missing paths with native
//!    dialogs (`--browse`), then save the settings back unless the file could
//!    not be read
//! 4. Resolve tools and plan the run from a settings snapshot
//! 5. Execute the queue on a single-threaded tokio runtime, streaming the
//!    transcript to stdout; Ctrl-C cancels the running step
//! 6. Log the run metrics and exit with 0 (success), 1 (run failed) or
//!    2 (run not started)

use anyhow::{Context, Result};
use apkbuilder::config::DEFAULT_SETTINGS_FILE;
use apkbuilder::services::RunnerOptions;
use apkbuilder::ui::{ConsoleSink, DialogPicker, FilePicker, fill_missing_paths};
use apkbuilder::{
    APP_NAME, CommandPlanner, Mode, ProcessRunner, RunMetrics, Settings, SettingsStore,
    ToolLocator, VERSION, YamlSettingsStore,
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

/// Exit status when the run never started
const EXIT_NOT_STARTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "apkbuilder")]
#[command(version = VERSION)]
#[command(about = "Decode, rebuild, align and sign Android packages")]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    config: Utf8PathBuf,

    /// Directory for log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Mirror the log to stderr and list removed intermediates
    #[arg(long, global = true)]
    verbose: bool,

    /// Keep going after a failed step
    #[arg(long, global = true, conflicts_with = "fail_fast")]
    continue_on_error: bool,

    /// Stop at the first failed step (default unless the settings file says otherwise)
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Kill any step running longer than this many seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Ask for missing paths with file dialogs
    #[arg(long, global = true)]
    browse: bool,

    #[command(subcommand)]
    mode: ModeCommand,
}

#[derive(Subcommand, Debug)]
enum ModeCommand {
    /// Decode an APK into an editable smali project
    Dump(DumpArgs),
    /// Build a project, then align and sign the package
    Pack(PackArgs),
    /// Generate a new signing keystore
    Keystore(KeystoreArgs),
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Package to decode
    #[arg(long)]
    apk: Option<String>,

    /// Folder that receives the decoded project
    #[arg(long)]
    out: Option<String>,

    /// Android SDK root
    #[arg(long)]
    sdk: Option<String>,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Decoded project folder
    #[arg(long)]
    project: Option<String>,

    /// Keystore used for signing
    #[arg(long)]
    keystore: Option<String>,

    /// Keystore password
    #[arg(long)]
    keystore_pass: Option<String>,

    /// Android SDK root (build-tools are looked up here)
    #[arg(long)]
    sdk: Option<String>,
}

#[derive(Args, Debug)]
struct KeystoreArgs {
    /// Keystore file to create
    #[arg(long)]
    out: Option<String>,

    /// Key alias
    #[arg(long)]
    alias: Option<String>,

    /// Password for both the store and the key
    #[arg(long)]
    alias_pass: Option<String>,
}

impl Cli {
    fn selected_mode(&self) -> Mode {
        match self.mode {
            ModeCommand::Dump(_) => Mode::Dump,
            ModeCommand::Pack(_) => Mode::Pack,
            ModeCommand::Keystore(_) => Mode::KeystoreGen,
        }
    }

    /// Copy every flag that was given into `settings`
    fn apply_to(&self, settings: &mut Settings) {
        fn set(field: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        match &self.mode {
            ModeCommand::Dump(args) => {
                set(&mut settings.dump_file, &args.apk);
                set(&mut settings.dump_out, &args.out);
                set(&mut settings.sdk_path, &args.sdk);
            }
            ModeCommand::Pack(args) => {
                set(&mut settings.pack_dir, &args.project);
                set(&mut settings.keystore_path, &args.keystore);
                set(&mut settings.keystore_pass, &args.keystore_pass);
                set(&mut settings.sdk_path, &args.sdk);
            }
            ModeCommand::Keystore(args) => {
                set(&mut settings.keystore_out, &args.out);
                set(&mut settings.gen_alias, &args.alias);
                set(&mut settings.gen_alias_pass, &args.alias_pass);
            }
        }

        if self.continue_on_error {
            settings.continue_on_error = true;
        }
        if self.fail_fast {
            settings.continue_on_error = false;
        }
        if let Some(secs) = self.timeout {
            settings.step_timeout_secs = secs;
        }
    }
}

/// Load settings, apply flags and dialogs, and persist the result.
///
/// A settings file that cannot be read is never overwritten; the run uses
/// defaults plus flags instead.
fn prepare_settings(cli: &Cli, store: &dyn SettingsStore, picker: &dyn FilePicker) -> Settings {
    let (mut settings, loaded) = match store.load() {
        Ok(settings) => (settings, true),
        Err(e) => {
            tracing::warn!("{}; using defaults and leaving the file untouched", e);
            eprintln!("Warning: {}", e);
            (Settings::default(), false)
        }
    };
    cli.apply_to(&mut settings);

    if cli.browse {
        let filled = fill_missing_paths(&mut settings, cli.selected_mode(), picker);
        tracing::info!("Filled {} path(s) from dialogs", filled);
    }

    if loaded {
        if let Err(e) = store.save(&settings) {
            tracing::warn!("{}", e);
            eprintln!("Warning: {}", e);
        }
    }

    settings
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _guard = apkbuilder::logging::setup_logging(&cli.log_dir, cli.debug, cli.verbose)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let mode = cli.selected_mode();
    let store = YamlSettingsStore::new(&cli.config);
    let settings = prepare_settings(&cli, &store, &DialogPicker);

    // The run works on a snapshot; nothing below changes the settings
    let snapshot = settings.clone();

    let locator = ToolLocator::from_env();
    let plan = match CommandPlanner::new(&locator).plan(mode, snapshot.clone()) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!("Run not started: {}", e);
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_NOT_STARTED));
        }
    };

    let metrics = Arc::new(RunMetrics::new());
    let runner = ProcessRunner::new(RunnerOptions::from_settings(&snapshot), metrics.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the tokio runtime")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let verbose = cli.verbose;
    let summary = runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling run");
                let _ = cancel_tx.send(true);
            }
        });

        let mut sink = ConsoleSink::new(std::io::stdout(), verbose);
        runner.run(&plan, &mut sink, cancel_rx).await
    });

    metrics.log_summary();

    if summary.is_success() {
        if let Some(output) = &plan.output {
            tracing::info!("{} output: {}", mode, output);
        }
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
