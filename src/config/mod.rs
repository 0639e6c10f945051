use crate::models::Settings;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::fs;
use thiserror::Error;

/// Default settings file name, next to the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "config.yaml";

/// Prefix for environment overrides, e.g. `APKBUILDER_SDK_PATH`
pub const ENV_PREFIX: &str = "APKBUILDER";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Load {
        path: Utf8PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("Failed to write settings to {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where settings are loaded from and saved to.
///
/// A missing source loads as defaults. A source that cannot be parsed at all
/// is an error, so the caller can avoid overwriting it.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Settings in a YAML file, with `APKBUILDER_*` environment overrides.
///
/// Keys are read one at a time: a key that is absent, null or of the wrong
/// type keeps its default without affecting the others.
#[derive(Debug, Clone)]
pub struct YamlSettingsStore {
    path: Utf8PathBuf,
    use_env: bool,
}

impl YamlSettingsStore {
    pub fn new<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            use_env: true,
        }
    }

    /// Ignore environment overrides (used by tests)
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn sources(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::new(self.path.as_str(), FileFormat::Yaml).required(false));
        if self.use_env {
            builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));
        }
        builder.build()
    }
}

/// Value of `key`, or `default` when it is absent or unusable
fn key_or_default<T: DeserializeOwned>(config: &Config, key: &str, default: T) -> T {
    match config.get::<T>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => default,
        Err(e) => {
            tracing::warn!("Ignoring settings key {}: {}", key, e);
            default
        }
    }
}

impl SettingsStore for YamlSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            tracing::info!("No settings file at {}, using defaults", self.path);
        }

        let config = self.sources().map_err(|source| SettingsError::Load {
            path: self.path.clone(),
            source,
        })?;

        let d = Settings::default();
        let settings = Settings {
            dump_file: key_or_default(&config, "dump_file", d.dump_file),
            dump_out: key_or_default(&config, "dump_out", d.dump_out),
            pack_dir: key_or_default(&config, "pack_dir", d.pack_dir),
            keystore_path: key_or_default(&config, "keystore_path", d.keystore_path),
            keystore_pass: key_or_default(&config, "keystore_pass", d.keystore_pass),
            keystore_out: key_or_default(&config, "keystore_out", d.keystore_out),
            gen_alias: key_or_default(&config, "gen_alias", d.gen_alias),
            gen_alias_pass: key_or_default(&config, "gen_alias_pass", d.gen_alias_pass),
            sdk_path: key_or_default(&config, "sdk_path", d.sdk_path),
            continue_on_error: key_or_default(&config, "continue_on_error", d.continue_on_error),
            step_timeout_secs: key_or_default(&config, "step_timeout_secs", d.step_timeout_secs),
        };

        tracing::info!("Loaded settings from {}", self.path);
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let yaml_string = serde_yaml_ng::to_string(settings)?;

        fs::write(&self.path, yaml_string).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!("Saved settings to {}", self.path);
        Ok(())
    }
}
