//! Per-extension enable switches.
//!
//! Every extension gets its own section keyed by plugin name. A missing section
//! is created as enabled the first time the extension registers.

use crate::error::SettingsError;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

fn default_enabled() -> bool {
    true
}

/// Settings section of one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for ExtensionSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Source of extension enable switches.
pub trait ExtensionSettings: Send + Sync {
    fn has_section(&self, plugin_name: &str) -> bool;

    /// Creates an enabled section. Existing sections are left untouched.
    fn create_section(&self, plugin_name: &str) -> Result<(), SettingsError>;

    /// Extensions without a section are enabled.
    fn is_enabled(&self, plugin_name: &str) -> bool;
}

/// Settings kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryExtensionSettings {
    sections: DashMap<String, ExtensionSection>,
}

impl MemoryExtensionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, plugin_name: &str, enabled: bool) {
        self.sections
            .insert(plugin_name.to_string(), ExtensionSection { enabled });
    }
}

impl ExtensionSettings for MemoryExtensionSettings {
    fn has_section(&self, plugin_name: &str) -> bool {
        self.sections.contains_key(plugin_name)
    }

    fn create_section(&self, plugin_name: &str) -> Result<(), SettingsError> {
        self.sections
            .entry(plugin_name.to_string())
            .or_default();
        Ok(())
    }

    fn is_enabled(&self, plugin_name: &str) -> bool {
        self.sections
            .get(plugin_name)
            .map(|section| section.enabled)
            .unwrap_or(true)
    }
}

/// Settings persisted to a TOML file with one table per extension:
///
/// ```toml
/// [Economy]
/// enabled = true
///
/// ["Broken Plugin"]
/// enabled = false
/// ```
#[derive(Debug)]
pub struct FileExtensionSettings {
    path: PathBuf,
    sections: RwLock<BTreeMap<String, ExtensionSection>>,
}

impl FileExtensionSettings {
    /// Loads the file, creating an empty one when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let sections = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            std::fs::write(&path, "")?;
            info!("Created extension settings file: {}", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path,
            sections: RwLock::new(sections),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, sections: &BTreeMap<String, ExtensionSection>) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(sections)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ExtensionSettings for FileExtensionSettings {
    fn has_section(&self, plugin_name: &str) -> bool {
        self.sections.read().contains_key(plugin_name)
    }

    fn create_section(&self, plugin_name: &str) -> Result<(), SettingsError> {
        let mut sections = self.sections.write();
        if sections.contains_key(plugin_name) {
            return Ok(());
        }
        sections.insert(plugin_name.to_string(), ExtensionSection::default());
        self.persist(&sections)?;
        info!("Added settings section for extension '{}'", plugin_name);
        Ok(())
    }

    fn is_enabled(&self, plugin_name: &str) -> bool {
        self.sections
            .read()
            .get(plugin_name)
            .map(|section| section.enabled)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_settings_create_section_is_idempotent() {
        let settings = MemoryExtensionSettings::new();
        assert!(!settings.has_section("Economy"));
        assert!(settings.is_enabled("Economy"));

        settings.set_enabled("Economy", false);
        settings.create_section("Economy").unwrap();
        assert!(settings.has_section("Economy"));
        assert!(!settings.is_enabled("Economy"));
    }

    #[test]
    fn test_file_settings_persist_new_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extensions.toml");

        let settings = FileExtensionSettings::load(&path).unwrap();
        assert!(path.exists());
        settings.create_section("Economy").unwrap();
        settings.create_section("Spaced Name").unwrap();

        let reloaded = FileExtensionSettings::load(&path).unwrap();
        assert!(reloaded.has_section("Economy"));
        assert!(reloaded.has_section("Spaced Name"));
        assert!(reloaded.is_enabled("Economy"));
    }

    #[test]
    fn test_file_settings_read_disabled_section() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extensions.toml");
        std::fs::write(&path, "[Economy]\nenabled = false\n\n[Other]\n").unwrap();

        let settings = FileExtensionSettings::load(&path).unwrap();
        assert!(!settings.is_enabled("Economy"));
        assert!(settings.is_enabled("Other"));
        assert!(settings.is_enabled("Missing"));
    }

    #[test]
    fn test_file_settings_reject_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extensions.toml");
        std::fs::write(&path, "[Economy\nenabled = ").unwrap();

        assert!(matches!(
            FileExtensionSettings::load(&path),
            Err(SettingsError::Parse(_))
        ));
    }
}
