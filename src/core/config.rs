//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.mutator/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::presence::ResponseCheck;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MutatorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub response_check: Option<ResponseCheck>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DemoConfig {
    pub delay_ms: Option<u64>,
    pub fail_every: Option<u32>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
pub const DEFAULT_DELAY_MS: u64 = 250;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub response_check: ResponseCheck,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub delay_ms: u64,
    /// Fail every N-th demo run. `None` never fails.
    pub fail_every: Option<u32>,
}

/// Values given on the command line. `None` = not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub response_check: Option<ResponseCheck>,
    pub log_level: Option<String>,
    pub delay_ms: Option<u64>,
    pub fail_every: Option<u32>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.mutator/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mutator").join("config.toml"))
}

/// Load config from `~/.mutator/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `MutatorConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<MutatorConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(MutatorConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<MutatorConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(MutatorConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: MutatorConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Mutator Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# response_check = "defined"   # "defined" or "truthy" (falsy responses count as absent)
# log_level = "info"           # "off", "error", "warn", "info", "debug", "trace"
# log_file = "mutator.log"     # Omit to log to stderr

# [demo]
# delay_ms = 250               # Simulated action latency
# fail_every = 3               # Fail every N-th run
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &MutatorConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

fn resolve_with_env(
    config: &MutatorConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Response check: CLI → env → config → default
    let response_check = cli
        .response_check
        .or_else(|| {
            env("MUTATOR_RESPONSE_CHECK").and_then(|raw| match raw.parse() {
                Ok(check) => Some(check),
                Err(e) => {
                    warn!("Ignoring MUTATOR_RESPONSE_CHECK: {}", e);
                    None
                }
            })
        })
        .or(config.general.response_check)
        .unwrap_or_default();

    // Log level: CLI → env → config → default
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| env("MUTATOR_LOG_LEVEL"))
        .or_else(|| config.general.log_level.clone())
        .and_then(|raw| match raw.parse::<LevelFilter>() {
            Ok(level) => Some(level),
            Err(_) => {
                warn!("Unknown log level '{}', using {}", raw, DEFAULT_LOG_LEVEL);
                None
            }
        })
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // Log file: env → config
    let log_file = env("MUTATOR_LOG_FILE")
        .or_else(|| config.general.log_file.clone())
        .map(PathBuf::from);

    ResolvedConfig {
        response_check,
        log_level,
        log_file,
        delay_ms: cli
            .delay_ms
            .or(config.demo.delay_ms)
            .unwrap_or(DEFAULT_DELAY_MS),
        fail_every: cli
            .fail_every
            .or(config.demo.fail_every)
            .filter(|n| *n > 0),
    }
}
