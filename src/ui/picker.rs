use crate::models::{Mode, Settings};
use camino::Utf8PathBuf;
use rfd::FileDialog;

/// What kind of path a dialog asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickKind {
    OpenFile {
        filter_name: &'static str,
        extensions: &'static [&'static str],
    },
    Folder,
    SaveFile {
        default_name: &'static str,
    },
}

/// Source of user-chosen paths.
///
/// Returns None when the user cancels.
#[cfg_attr(test, mockall::automock)]
pub trait FilePicker {
    fn pick(&self, title: &str, kind: PickKind) -> Option<Utf8PathBuf>;
}

/// Native dialogs through `rfd`.
///
/// The dialogs block, so call this before the runtime starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialogPicker;

impl FilePicker for DialogPicker {
    fn pick(&self, title: &str, kind: PickKind) -> Option<Utf8PathBuf> {
        let dialog = FileDialog::new().set_title(title);

        let picked = match kind {
            PickKind::OpenFile {
                filter_name,
                extensions,
            } => dialog.add_filter(filter_name, extensions).pick_file(),
            PickKind::Folder => dialog.pick_folder(),
            PickKind::SaveFile { default_name } => dialog.set_file_name(default_name).save_file(),
        };

        picked.and_then(|path| {
            Utf8PathBuf::try_from(path)
                .map_err(|e| {
                    tracing::error!("Failed to convert path to UTF-8: {}", e);
                    e
                })
                .ok()
        })
    }
}

const APK_FILES: PickKind = PickKind::OpenFile {
    filter_name: "APK Files",
    extensions: &["apk"],
};

const KEYSTORE_FILES: PickKind = PickKind::OpenFile {
    filter_name: "Keystore Files",
    extensions: &["jks", "keystore"],
};

const NEW_KEYSTORE: PickKind = PickKind::SaveFile {
    default_name: "mykeystore.jks",
};

/// Ask `picker` for every empty path field `mode` requires.
///
/// Cancelled dialogs leave the field empty. Picking the Dump source package
/// also fills an empty Dump output folder with the package's directory.
/// Pack also offers the SDK root, which may stay empty when build-tools are
/// found another way. Returns the number of fields filled.
pub fn fill_missing_paths(settings: &mut Settings, mode: Mode, picker: &dyn FilePicker) -> usize {
    let mut filled = 0;
    let mut ask = |field: &mut String, title: &str, kind: PickKind| {
        if !field.trim().is_empty() {
            return;
        }
        if let Some(path) = picker.pick(title, kind) {
            tracing::debug!("{}: {}", title, path);
            *field = path.into_string();
            filled += 1;
        }
    };

    match mode {
        Mode::Dump => {
            ask(&mut settings.dump_file, "Select APK", APK_FILES);
            if settings.dump_out.trim().is_empty() {
                if let Some(parent) = Utf8PathBuf::from(&settings.dump_file).parent() {
                    settings.dump_out = parent.to_string();
                }
            }
            ask(&mut settings.dump_out, "Select Output Folder", PickKind::Folder);
        }
        Mode::Pack => {
            ask(&mut settings.pack_dir, "Select Smali Project Folder", PickKind::Folder);
            ask(&mut settings.keystore_path, "Select Keystore", KEYSTORE_FILES);
            ask(&mut settings.sdk_path, "Select Android SDK Root", PickKind::Folder);
        }
        Mode::KeystoreGen => {
            ask(&mut settings.keystore_out, "Save Keystore", NEW_KEYSTORE);
        }
    }

    filled
}
