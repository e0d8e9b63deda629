//! Configuration for SongBridge
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file at all) gives a working setup. Durations are whole milliseconds.
//!
//! ```toml
//! catalog_path = "songs.csv"
//! window_titles = ["DJMAX RESPECT V"]
//!
//! [timing]
//! move_delay_ms = 40
//!
//! [keys]
//! quick_jump_nonlatin = "page_down"
//!
//! [gate]
//! policy = "queue"
//! depth = 2
//! ```

use crate::bridge::BridgeSettings;
use crate::dispatch::{DispatcherConfig, FocusPolicy, KeyBindings};
use crate::error::ConfigError;
use crate::gate::AdmissionPolicy;
use crate::keys::KeyCode;
use crate::planner::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for every configured delay.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Main configuration for the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Song list CSV, in game-list order. Relative paths resolve against the
    /// config file's directory.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Log keys instead of injecting them.
    #[serde(default)]
    pub dry_run: bool,

    /// Target window title candidates (case-insensitive substrings).
    #[serde(default = "default_window_titles")]
    pub window_titles: Vec<String>,

    #[serde(default)]
    pub focus: FocusConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub keys: KeysConfig,

    #[serde(default)]
    pub planner: PlanningConfig,

    #[serde(default)]
    pub gate: AdmissionPolicy,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("songs.csv")
}

fn default_window_titles() -> Vec<String> {
    vec!["DJMAX RESPECT V".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            dry_run: false,
            window_titles: default_window_titles(),
            focus: FocusConfig::default(),
            timing: TimingConfig::default(),
            keys: KeysConfig::default(),
            planner: PlanningConfig::default(),
            gate: AdmissionPolicy::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub settle_ms: u64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 800,
            settle_ms: 300,
        }
    }
}

/// Pauses after each key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub entry_delay_ms: u64,
    pub move_delay_ms: u64,
    pub confirm_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            entry_delay_ms: 150,
            move_delay_ms: 50,
            confirm_delay_ms: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub up: KeyCode,
    pub down: KeyCode,
    pub confirm: KeyCode,
    pub quick_jump_nonlatin: KeyCode,
    pub quick_jump_symbol: KeyCode,
    /// Letter that switches the list into alphabetic mode before a quick jump.
    pub alpha_mode_letter: char,
}

impl Default for KeysConfig {
    fn default() -> Self {
        let bindings = KeyBindings::default();
        Self {
            up: bindings.up,
            down: bindings.down,
            confirm: bindings.confirm,
            quick_jump_nonlatin: bindings.quick_jump_nonlatin,
            quick_jump_symbol: bindings.quick_jump_symbol,
            alpha_mode_letter: 'a',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub press_confirm: bool,
    pub shortest_path: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origin allowed to call the bridge (`*` for any page).
    pub allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 29184,
            allow_origin: "*".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if config.catalog_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.catalog_path = dir.join(&config.catalog_path);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Validate and convert into runtime settings.
    pub fn settings(&self) -> Result<BridgeSettings, ConfigError> {
        let window_titles: Vec<String> = self
            .window_titles
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if window_titles.is_empty() {
            return Err(ConfigError::Invalid(
                "window_titles must contain at least one title".into(),
            ));
        }
        if self.focus.attempts == 0 {
            return Err(ConfigError::Invalid("focus.attempts must be at least 1".into()));
        }
        if !self.keys.alpha_mode_letter.is_ascii_alphabetic() {
            return Err(ConfigError::Invalid(format!(
                "keys.alpha_mode_letter must be a-z, got '{}'",
                self.keys.alpha_mode_letter
            )));
        }
        for (name, value) in [
            ("timing.entry_delay_ms", self.timing.entry_delay_ms),
            ("timing.move_delay_ms", self.timing.move_delay_ms),
            ("timing.confirm_delay_ms", self.timing.confirm_delay_ms),
            ("focus.initial_backoff_ms", self.focus.initial_backoff_ms),
            ("focus.max_backoff_ms", self.focus.max_backoff_ms),
            ("focus.settle_ms", self.focus.settle_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::Invalid(format!(
                    "{} must be at most {} ms, got {}",
                    name, MAX_DELAY_MS, value
                )));
            }
        }
        if let AdmissionPolicy::Queue { depth: 0 } = self.gate {
            return Err(ConfigError::Invalid("gate.depth must be at least 1".into()));
        }

        let planner = PlannerConfig {
            press_confirm: self.planner.press_confirm,
            shortest_path: self.planner.shortest_path,
            alpha_mode_letter: self.keys.alpha_mode_letter.to_ascii_lowercase(),
            entry_delay: Duration::from_millis(self.timing.entry_delay_ms),
            move_delay: Duration::from_millis(self.timing.move_delay_ms),
            confirm_delay: Duration::from_millis(self.timing.confirm_delay_ms),
        };
        let dispatcher = DispatcherConfig {
            window_titles,
            focus: FocusPolicy {
                attempts: self.focus.attempts,
                initial_backoff: Duration::from_millis(self.focus.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.focus.max_backoff_ms),
                settle: Duration::from_millis(self.focus.settle_ms),
            },
            bindings: KeyBindings {
                up: self.keys.up,
                down: self.keys.down,
                confirm: self.keys.confirm,
                quick_jump_nonlatin: self.keys.quick_jump_nonlatin,
                quick_jump_symbol: self.keys.quick_jump_symbol,
            },
        };

        Ok(BridgeSettings {
            planner,
            dispatcher,
            admission: self.gate,
            dry_run: self.dry_run,
        })
    }
}
