/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Configuration system for the bubble instrument.

pub mod controls;

use std::path::{Path, PathBuf};

use bubble_scales::RoundingMode;
use serde::{Deserialize, Serialize};

use crate::world::WorldBounds;

pub use controls::ControlSettings;

/// Get the config directory for bubbleshell
pub fn config_dir() -> PathBuf {
    if let Some(config_home) = dirs::config_dir() {
        config_home.join("bubbleshell")
    } else {
        PathBuf::from(".bubbleshell")
    }
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// World geometry and population settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub depth: f32,

    /// Hard cap on stored particles; spawns beyond it are dropped
    pub population_cap: usize,

    /// Particles spawned when the simulation starts
    pub initial_particles: usize,

    /// Seed for the simulation and audio random streams
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let bounds = WorldBounds::default();
        Self {
            width: bounds.width,
            height: bounds.height,
            depth: bounds.depth,
            population_cap: 200,
            initial_particles: 24,
            seed: 0x5EED_B0B5,
        }
    }
}

impl WorldConfig {
    pub fn bounds(&self) -> WorldBounds {
        WorldBounds {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

/// Settings consumed by the audio trigger mapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Base voice frequency in Hz
    pub base_frequency: f32,

    /// Master gain in [0, 1]
    pub volume: f32,

    /// Scale id to quantize pitches to; unquantized when absent
    pub scale: Option<String>,

    /// MIDI note of the scale root
    pub root_midi: i32,

    pub rounding: RoundingMode,

    pub no_immediate_repeat: bool,

    /// Drop thirds above the root regardless of the scale's tags
    pub no_thirds: bool,

    /// Maximum play instructions emitted per tick
    pub max_triggers_per_tick: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            base_frequency: 220.0,
            volume: 0.8,
            scale: None,
            root_midi: 57,
            rounding: RoundingMode::Nearest,
            no_immediate_repeat: false,
            no_thirds: false,
            max_triggers_per_tick: 6,
        }
    }
}

/// Full on-disk configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub world: WorldConfig,
    pub controls: ControlSettings,
    pub audio: AudioConfig,
}

impl ShellConfig {
    /// Load the config from the user config directory, falling back to
    /// defaults when it is missing or unreadable.
    pub fn load() -> Self {
        Self::load_or_default(&Self::config_path())
    }

    /// Load from `path`, falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            },
            Err(e) => {
                log::warn!("Ignoring config at {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Load from `path`, reporting why it could not be used.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save the config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, toml_string).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// Save the config to the user config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Get the path to the main config file
    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Get the path to the user scale definitions file
    pub fn scales_path() -> PathBuf {
        config_dir().join("scales.toml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Parse error: {e}"),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ShellConfig::from_toml(
            r#"
            [world]
            population_cap = 50

            [controls]
            blackHole = 0.4

            [audio]
            scale = "minor_pentatonic"
            rounding = "down"
            "#,
        )
        .unwrap();

        assert_eq!(config.world.population_cap, 50);
        assert_eq!(config.world.width, WorldConfig::default().width);
        assert_eq!(config.controls.black_hole, 0.4);
        assert_eq!(config.controls.tempo, 1.0);
        assert_eq!(config.audio.scale.as_deref(), Some("minor_pentatonic"));
        assert_eq!(config.audio.rounding, RoundingMode::Down);
        assert_eq!(config.audio.base_frequency, 220.0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ShellConfig::default();
        config.world.seed = 42;
        config.controls.wind = 0.75;
        config.audio.scale = Some("dorian".into());
        config.save_to(&path).unwrap();

        let loaded = ShellConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_or_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(ShellConfig::load_or_default(&missing), ShellConfig::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[world\nwidth = ").unwrap();
        assert!(matches!(
            ShellConfig::load_from(&broken),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(ShellConfig::load_or_default(&broken), ShellConfig::default());
    }

    #[test]
    fn test_world_bounds_from_config() {
        let world = WorldConfig {
            width: 10.0,
            height: 20.0,
            depth: 30.0,
            ..WorldConfig::default()
        };
        assert_eq!(world.bounds().depth, 30.0);
        assert_eq!(world.bounds().center().y, 10.0);
    }
}
