//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$PHYSIM_CONFIG` environment variable
//! 2. `config.toml` in the platform config dir (e.g. `~/.config/physim/`)
//! 3. Built-in defaults (everything is optional)

use std::path::PathBuf;

use anyhow::{Context, Result};
use physim_script::SandboxLimits;
use serde::Deserialize;

use crate::render::OutputFormat;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sandbox: SandboxLimits,
    pub client: ClientConfig,
    pub output: OutputConfig,
    pub mcp: McpConfig,
}

/// External command that answers problem statements with a solution.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Program to run. Unset means `solve` is unavailable.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

/// Sample rendering defaults for `run`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Print every n-th sample.
    pub every: usize,
}

/// MCP server settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Replaces the default server instructions.
    pub instructions: Option<String>,
}

// --- Defaults ---

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: 180,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            every: 1,
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    match config_path() {
        Some(p) if p.exists() => load_config_from(&p),
        _ => Ok(Config::default()),
    }
}

fn load_config_from(path: &std::path::Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("PHYSIM_CONFIG") {
        return Some(PathBuf::from(p));
    }
    directories::ProjectDirs::from("dev", "physim", "physim")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Show the active config path (for `physim config`).
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}
