//! Configuration file support for the fsmeta CLI.
//!
//! Configuration is stored at `~/.config/fsmeta/config.toml` (XDG standard)
//! or `~/Library/Application Support/com.fsmeta.fsmeta/config.toml` on macOS.
//! `FSMETA_CONFIG_DIR` overrides the directory on every platform.
//!
//! # Example configuration
//!
//! ```toml
//! [defaults]
//! verbosity = 1
//! show_hidden = false
//! json = false
//!
//! [script]
//! program = "/usr/bin/osascript"
//! timeout_secs = 30
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use fsmeta_core::OsaScript;

/// Environment variable that overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "FSMETA_CONFIG_DIR";

/// Main configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Default settings applied to all commands
    #[serde(default)]
    pub defaults: Defaults,

    /// How Finder scripts are run
    #[serde(default)]
    pub script: ScriptConfig,
}

/// Default settings
#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    /// Default verbosity level (0-3), used when no `-v` is given
    pub verbosity: Option<u8>,

    /// Include hidden volumes in `volumes`
    pub show_hidden: Option<bool>,

    /// Emit JSON from `xattr list` and `volumes`
    pub json: Option<bool>,
}

/// Script interpreter settings
#[derive(Debug, Default, Deserialize)]
pub struct ScriptConfig {
    /// Interpreter binary (default: `osascript` on `PATH`)
    pub program: Option<PathBuf>,

    /// Kill the interpreter after this many seconds (default: wait forever)
    pub timeout_secs: Option<u64>,
}

impl ScriptConfig {
    /// Build the script bridge these settings describe.
    pub fn bridge(&self) -> OsaScript {
        let mut bridge = OsaScript::new();
        if let Some(program) = &self.program {
            bridge = bridge.with_program(program);
        }
        if let Some(secs) = self.timeout_secs {
            bridge = bridge.with_timeout(Duration::from_secs(secs));
        }
        bridge
    }
}

impl Config {
    /// Load configuration from the default path, or return empty config if not found.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Get the path to the configuration file.
///
/// Uses `FSMETA_CONFIG_DIR` if set, otherwise the XDG config directory on
/// Linux and Application Support on macOS.
pub fn config_path() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("config.toml"));
    }

    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    #[cfg(target_os = "macos")]
    {
        // macOS: ~/Library/Application Support/com.fsmeta.fsmeta/config.toml
        let config_dir = base_dirs
            .home_dir()
            .join("Library/Application Support/com.fsmeta.fsmeta");
        Ok(config_dir.join("config.toml"))
    }

    #[cfg(not(target_os = "macos"))]
    {
        // Linux/other: ~/.config/fsmeta/config.toml
        let config_dir = base_dirs.config_dir().join("fsmeta");
        Ok(config_dir.join("config.toml"))
    }
}
