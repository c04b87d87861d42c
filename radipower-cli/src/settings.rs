//! Application settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use radipower_detect::{IdTable, ScanConfig};
use radipower_head::LinkConfig;
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Serial link parameters
    #[serde(default)]
    pub link: LinkConfig,
    /// Port filters and identification limits
    #[serde(default)]
    pub scan: ScanConfig,
    /// JSON ID table to use instead of the built-in one
    #[serde(default)]
    pub id_table: Option<PathBuf>,
}

impl Settings {
    /// Get the XDG config directory for radipower
    /// Uses $XDG_CONFIG_HOME/radipower, falls back to the platform config dir
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("radipower"));
            }
        }

        dirs::config_dir().map(|d| d.join("radipower"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings
    ///
    /// An explicit path must exist and parse. Without one, the default file
    /// is used if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings {}", path.display()))
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings {}", path.display()))
    }

    /// The ID table named in the settings, or the built-in one
    pub fn id_table(&self) -> anyhow::Result<IdTable> {
        match &self.id_table {
            Some(path) => IdTable::load(path)
                .with_context(|| format!("Failed to load ID table {}", path.display())),
            None => Ok(IdTable::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"link": {"read_timeout_ms": 1000}}"#).unwrap();
        assert_eq!(settings.link.read_timeout_ms, 1000);
        assert_eq!(settings.link.baud_rate, 115_200);
        assert_eq!(settings.scan, ScanConfig::default());
        assert!(settings.id_table.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("radipower-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let mut settings = Settings::default();
        settings.scan.attempts = 5;

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(Some(&path)).unwrap(), settings);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("radipower-does-not-exist.json");
        assert!(Settings::load(Some(&path)).is_err());
    }
}
