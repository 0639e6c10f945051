use super::Mode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User settings persisted to `config.yaml`
///
/// A flat mapping of named fields. Every field has a default so that a
/// partially written file still loads: missing keys keep their defaults and
/// unknown keys are ignored.
///
/// Once a run starts, the planner receives a clone of this struct by value and
/// never mutates it. Only the front end that owns user input changes settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Package to disassemble (Dump)
    pub dump_file: String,

    /// Directory that receives the disassembled project (Dump)
    pub dump_out: String,

    /// Project directory to assemble (Pack)
    pub pack_dir: String,

    /// Keystore used for signing (Pack)
    pub keystore_path: String,

    /// Password for `keystore_path` (Pack)
    pub keystore_pass: String,

    /// Where to write a generated keystore (KeystoreGen)
    pub keystore_out: String,

    /// Key alias for a generated keystore (KeystoreGen)
    pub gen_alias: String,

    /// Store and key password for a generated keystore (KeystoreGen)
    pub gen_alias_pass: String,

    /// Optional Android SDK root; enables build-tools resolution
    pub sdk_path: String,

    /// Keep running the queue after a failed step
    pub continue_on_error: bool,

    /// Per-step timeout in seconds, 0 disables it
    pub step_timeout_secs: u64,
}

impl Settings {
    /// Required fields for a mode, keyed by their user-facing label, in the
    /// order they are presented.
    pub fn required_fields(&self, mode: Mode) -> IndexMap<&'static str, &str> {
        let mut fields = IndexMap::new();
        match mode {
            Mode::Dump => {
                fields.insert("APK file", self.dump_file.as_str());
                fields.insert("output folder", self.dump_out.as_str());
            }
            Mode::Pack => {
                fields.insert("project folder", self.pack_dir.as_str());
                fields.insert("keystore file", self.keystore_path.as_str());
                fields.insert("keystore password", self.keystore_pass.as_str());
            }
            Mode::KeystoreGen => {
                fields.insert("keystore output", self.keystore_out.as_str());
                fields.insert("alias", self.gen_alias.as_str());
                fields.insert("alias password", self.gen_alias_pass.as_str());
            }
        }
        fields
    }

    /// Labels of required fields that are empty for `mode`
    pub fn missing_fields(&self, mode: Mode) -> Vec<&'static str> {
        self.required_fields(mode)
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(label, _)| label)
            .collect()
    }

    /// SDK root, if one is configured
    pub fn sdk_root(&self) -> Option<&str> {
        let sdk = self.sdk_path.trim();
        (!sdk.is_empty()).then_some(sdk)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_in_order() {
        let settings = Settings {
            keystore_path: "/keys/release.jks".to_string(),
            ..Default::default()
        };

        assert_eq!(
            settings.missing_fields(Mode::Pack),
            vec!["project folder", "keystore password"]
        );
    }

    #[test]
    fn test_whitespace_only_counts_as_missing() {
        let settings = Settings {
            dump_file: "   ".to_string(),
            dump_out: "/out".to_string(),
            ..Default::default()
        };

        assert_eq!(settings.missing_fields(Mode::Dump), vec!["APK file"]);
    }

    #[test]
    fn test_sdk_root_empty_is_none() {
        let mut settings = Settings::default();
        assert_eq!(settings.sdk_root(), None);

        settings.sdk_path = "/opt/android-sdk".to_string();
        assert_eq!(settings.sdk_root(), Some("/opt/android-sdk"));
    }

    #[test]
    fn test_step_timeout_zero_disables() {
        let mut settings = Settings::default();
        assert_eq!(settings.step_timeout(), None);

        settings.step_timeout_secs = 90;
        assert_eq!(settings.step_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_unknown_keys_ignored_and_missing_keys_defaulted() {
        let yaml = "dump_file: /tmp/app.apk\nwindow_geometry: 700x550\n";
        let settings: Settings = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(settings.dump_file, "/tmp/app.apk");
        assert_eq!(settings.dump_out, "");
        assert!(!settings.continue_on_error);
    }
}
