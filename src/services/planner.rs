use super::tools::{ToolError, ToolLocator, ToolPaths};
use crate::models::{CommandLine, CommandQueue, Mode, Plan, PlannedArtifact, Settings};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

/// Page-alignment boundary passed to zipalign
const ZIPALIGN_PAGE: &str = "4";

/// RSA key size for generated keystores
const KEY_SIZE: &str = "2048";

/// Validity of a generated key, in days
const KEY_VALIDITY_DAYS: &str = "10000";

/// Errors that prevent a run from starting
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Please fill in {mode} fields: {}", .fields.join(", "))]
    MissingFields {
        mode: Mode,
        fields: Vec<&'static str>,
    },

    #[error("project folder {0} has no parent directory or name")]
    InvalidProjectDir(Utf8PathBuf),

    #[error("APK file {0} has no file name")]
    InvalidSourceApk(Utf8PathBuf),

    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl PlanError {
    /// True for empty-field validation failures
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlanError::MissingFields { .. }
                | PlanError::InvalidProjectDir(_)
                | PlanError::InvalidSourceApk(_)
        )
    }
}

/// File names derived from a Pack project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPaths {
    pub output_dir: Utf8PathBuf,
    pub built: Utf8PathBuf,
    pub aligned: Utf8PathBuf,
    pub signed: Utf8PathBuf,
}

impl PackPaths {
    /// Derive the build, align and sign outputs for `project_dir`.
    ///
    /// Everything lands next to the project: `/x/MyApp` produces
    /// `/x/MyApp.apk`, `/x/aligned_MyApp.apk` and `/x/signed_MyApp.apk`.
    pub fn derive(project_dir: &Utf8Path) -> Result<Self, PlanError> {
        let invalid = || PlanError::InvalidProjectDir(project_dir.to_path_buf());
        let output_dir = project_dir.parent().ok_or_else(invalid)?;
        let stem = project_dir.file_stem().ok_or_else(invalid)?;
        let apk_name = format!("{}.apk", stem);

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            built: output_dir.join(&apk_name),
            aligned: output_dir.join(format!("aligned_{}", apk_name)),
            signed: output_dir.join(format!("signed_{}", apk_name)),
        })
    }
}

/// Directory a Dump run writes into: `<out>/<apk name without extension>`
pub fn dump_target(source_apk: &Utf8Path, output_dir: &Utf8Path) -> Result<Utf8PathBuf, PlanError> {
    let stem = source_apk
        .file_stem()
        .ok_or_else(|| PlanError::InvalidSourceApk(source_apk.to_path_buf()))?;
    Ok(output_dir.join(stem))
}

/// Validates settings for a mode and builds the command queue.
///
/// Every artifact path is decided here, before the first command runs.
#[derive(Debug)]
pub struct CommandPlanner<'a> {
    locator: &'a ToolLocator,
}

impl<'a> CommandPlanner<'a> {
    pub fn new(locator: &'a ToolLocator) -> Self {
        Self { locator }
    }

    /// Build the plan for `mode` from a settings snapshot.
    ///
    /// Fails without queueing anything when a required field is empty or a
    /// required tool cannot be found.
    pub fn plan(&self, mode: Mode, settings: Settings) -> Result<Plan, PlanError> {
        let missing = settings.missing_fields(mode);
        if !missing.is_empty() {
            tracing::warn!("{} run rejected, missing: {}", mode, missing.join(", "));
            return Err(PlanError::MissingFields {
                mode,
                fields: missing,
            });
        }

        let tools = self
            .locator
            .resolve(mode, settings.sdk_root().map(Utf8Path::new))?;

        let plan = match mode {
            Mode::Dump => self.plan_dump(&settings, &tools)?,
            Mode::Pack => self.plan_pack(&settings, &tools)?,
            Mode::KeystoreGen => self.plan_keystore(&settings, &tools),
        };

        tracing::info!("Planned {} run with {} command(s)", mode, plan.queue.len());
        for (index, command) in plan.queue.iter().enumerate() {
            tracing::debug!("  [{}] {}", index, command);
        }

        Ok(plan)
    }

    fn plan_dump(&self, settings: &Settings, tools: &ToolPaths) -> Result<Plan, PlanError> {
        let apktool = tools
            .apktool
            .as_ref()
            .ok_or_else(|| ToolError::NotFound("apktool".to_string()))?;

        let source = Utf8Path::new(settings.dump_file.trim());
        let target = dump_target(source, Utf8Path::new(settings.dump_out.trim()))?;

        if !target.exists() {
            fs::create_dir_all(&target).map_err(|source| PlanError::CreateDir {
                path: target.clone(),
                source,
            })?;
            tracing::debug!("Created dump target {}", target);
        }

        let queue = CommandQueue::from_iter([apktool.command([
            "d",
            "-f",
            source.as_str(),
            "-o",
            target.as_str(),
        ])]);

        Ok(Plan {
            mode: Mode::Dump,
            queue,
            intermediates: Vec::new(),
            output: Some(target),
        })
    }

    fn plan_pack(&self, settings: &Settings, tools: &ToolPaths) -> Result<Plan, PlanError> {
        let apktool = tools
            .apktool
            .as_ref()
            .ok_or_else(|| ToolError::NotFound("apktool".to_string()))?;

        let project = Utf8Path::new(settings.pack_dir.trim());
        let paths = PackPaths::derive(project)?;
        let keystore = settings.keystore_path.trim();
        let ks_pass = format!("pass:{}", settings.keystore_pass);

        let build = apktool.command(["b", project.as_str(), "-o", paths.built.as_str()]);

        let align = self.locator.wrap(CommandLine::new(
            tools.zipalign.clone(),
            [
                "-v",
                "-p",
                ZIPALIGN_PAGE,
                paths.built.as_str(),
                paths.aligned.as_str(),
            ],
        ));

        let sign = self.locator.wrap(CommandLine::new(
            tools.apksigner.clone(),
            [
                "sign",
                "-v",
                "--ks",
                keystore,
                "--ks-pass",
                ks_pass.as_str(),
                "--out",
                paths.signed.as_str(),
                paths.aligned.as_str(),
            ],
        ));

        Ok(Plan {
            mode: Mode::Pack,
            queue: CommandQueue::from_iter([build, align, sign]),
            intermediates: vec![
                PlannedArtifact {
                    step: 0,
                    path: paths.built,
                },
                PlannedArtifact {
                    step: 1,
                    path: paths.aligned,
                },
            ],
            output: Some(paths.signed),
        })
    }

    fn plan_keystore(&self, settings: &Settings, tools: &ToolPaths) -> Plan {
        let out = settings.keystore_out.trim();
        let password = settings.gen_alias_pass.as_str();

        let keytool = CommandLine::new(
            tools.keytool.clone(),
            [
                "-genkey",
                "-v",
                "-keystore",
                out,
                "-alias",
                settings.gen_alias.trim(),
                "-keyalg",
                "RSA",
                "-keysize",
                KEY_SIZE,
                "-validity",
                KEY_VALIDITY_DAYS,
                "-storepass",
                password,
                "-keypass",
                password,
            ],
        );

        Plan {
            mode: Mode::KeystoreGen,
            queue: CommandQueue::from_iter([keytool]),
            intermediates: Vec::new(),
            output: Some(Utf8PathBuf::from(out)),
        }
    }
}
