//! Server configuration, read from a TOML file.
//!
//! Every field has a default, so a missing file or an empty one yields a
//! working server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dialogue::{DialogueNavigation, OptionRequirementPolicy};
use crate::player::DEFAULT_INVENTORY_SIZE;
use crate::quest::UnknownRequirementPolicy;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "QUEST_SERVER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Holds `quests/` and `dialogue/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Watch the data directory and reload content on change
    #[serde(default)]
    pub hot_reload: bool,
    /// Drop player sessions untouched for this long; 0 keeps them forever
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default)]
    pub engine: EngineSettings,
}

fn default_bind_addr() -> String {
    "0.0.0.0:2567".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_session_idle_secs() -> u64 {
    1800
}

/// Behaviour switches for the quest and dialogue engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub navigation: DialogueNavigation,
    #[serde(default)]
    pub option_requirements: OptionRequirementPolicy,
    #[serde(default)]
    pub unknown_requirements: UnknownRequirementPolicy,
    #[serde(default = "default_inventory_size")]
    pub inventory_size: usize,
}

fn default_inventory_size() -> usize {
    DEFAULT_INVENTORY_SIZE
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            navigation: DialogueNavigation::default(),
            option_requirements: OptionRequirementPolicy::default(),
            unknown_requirements: UnknownRequirementPolicy::default(),
            inventory_size: DEFAULT_INVENTORY_SIZE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            hot_reload: false,
            session_idle_secs: default_session_idle_secs(),
            engine: EngineSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        Self::from_toml(&content).map_err(|e| format!("Failed to parse config {:?}: {}", path, e))
    }

    /// Load from `$QUEST_SERVER_CONFIG` or `config.toml`, falling back to
    /// defaults when the file is absent or broken
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }
}
