use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engify_logging::{engify_info, engify_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::relay_client::CredentialSource;

pub const SETTINGS_FILENAME: &str = "engify_settings.ron";

/// User-editable settings. Every field is optional so older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error("{0:?} exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to prepare settings directory {path:?}: {source}")]
    Dir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings stored as a single ron file in a directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILENAME)
    }

    /// Reads the settings file; missing or unreadable files yield defaults.
    pub fn load(&self) -> UserSettings {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return UserSettings::default();
            }
            Err(err) => {
                engify_warn!("Failed to read settings from {:?}: {}", path, err);
                return UserSettings::default();
            }
        };

        match ron::from_str(&content) {
            Ok(settings) => settings,
            Err(err) => {
                engify_warn!("Failed to parse settings from {:?}: {}", path, err);
                UserSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &UserSettings) -> Result<PathBuf, SettingsError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(settings, pretty)?;
        let path = self.write_atomically(&content)?;
        engify_info!("Saved settings to {:?}", path);
        Ok(path)
    }

    fn prepare_dir(&self) -> Result<(), SettingsError> {
        if self.dir.exists() && !self.dir.is_dir() {
            return Err(SettingsError::NotADirectory(self.dir.clone()));
        }
        fs::create_dir_all(&self.dir).map_err(|source| SettingsError::Dir {
            path: self.dir.clone(),
            source,
        })
    }

    /// Temp file in the same directory, then rename over the target.
    fn write_atomically(&self, content: &str) -> Result<PathBuf, SettingsError> {
        self.prepare_dir()?;
        let target = self.path();
        let write_err = |source: io::Error| SettingsError::Write {
            path: target.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file_mut().sync_all().map_err(write_err)?;
        tmp.persist(&target).map_err(|err| write_err(err.error))?;
        Ok(target)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CredentialSource for SettingsStore {
    fn api_key(&self) -> Option<String> {
        self.load()
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}
