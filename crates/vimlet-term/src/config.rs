//! Configuration: a TOML file under the platform config directory.
//!
//! The engine reads settings as named strings through the host adapter;
//! this module owns the typed form, the string mapping, and persistence.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use vimlet_core::settings;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Use the internal `:` commandline instead of the host palette.
    pub commandline_mode: bool,
    /// Spaces per indent level for `>`/`<` and Tab.
    pub indent_width: usize,
    /// Prefix toggled by the comment command.
    pub comment_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commandline_mode: true,
            indent_width: 4,
            comment_prefix: "// ".to_string(),
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vimlet").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from disk; any failure logs and falls back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("bad config at {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("no config directory available")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// The string map handed to the engine through the host adapter.
    pub fn as_settings(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                settings::COMMANDLINE_MODE.to_string(),
                self.commandline_mode.to_string(),
            ),
            (
                settings::INDENT_WIDTH.to_string(),
                self.indent_width.to_string(),
            ),
            (
                settings::COMMENT_PREFIX.to_string(),
                self.comment_prefix.clone(),
            ),
        ])
    }

    /// Apply one named setting back onto the typed form (`:set` path).
    /// Unknown names are kept only in the string map.
    pub fn apply(&mut self, name: &str, value: &str) {
        match name {
            settings::COMMANDLINE_MODE => {
                self.commandline_mode = matches!(value, "true" | "1" | "on" | "yes");
            }
            settings::INDENT_WIDTH => {
                if let Ok(width) = value.parse::<usize>() {
                    if width > 0 {
                        self.indent_width = width;
                    }
                }
            }
            settings::COMMENT_PREFIX => {
                self.comment_prefix = value.to_string();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.commandline_mode);
        assert_eq!(config.indent_width, 4);
        assert_eq!(config.comment_prefix, "// ");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.indent_width = 2;
        config.commandline_mode = false;
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.indent_width, 2);
        assert!(!back.commandline_mode);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("indent_width = 8").unwrap();
        assert_eq!(config.indent_width, 8);
        assert!(config.commandline_mode);
    }

    #[test]
    fn test_apply_setting_strings() {
        let mut config = Config::default();
        config.apply(settings::INDENT_WIDTH, "2");
        assert_eq!(config.indent_width, 2);
        config.apply(settings::INDENT_WIDTH, "zero");
        assert_eq!(config.indent_width, 2);
        config.apply(settings::COMMANDLINE_MODE, "off");
        assert!(!config.commandline_mode);
    }

    #[test]
    fn test_settings_map_keys() {
        let map = Config::default().as_settings();
        assert_eq!(map.get(settings::COMMANDLINE_MODE).unwrap(), "true");
        assert_eq!(map.get(settings::INDENT_WIDTH).unwrap(), "4");
    }
}
