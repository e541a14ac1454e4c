// Configuration loading and parsing (config/playxi.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the single config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "playxi.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// The assembled configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub rules: LineupRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path. Empty means the platform data directory; `:memory:` is
    /// passed through for ephemeral databases.
    #[serde(default)]
    pub path: String,
}

impl DatabaseConfig {
    /// Resolve the configured path, falling back to
    /// `<data dir>/playxi/playxi.db` when none is set.
    pub fn resolve_path(&self) -> PathBuf {
        if !self.path.trim().is_empty() {
            return PathBuf::from(&self.path);
        }
        match directories::ProjectDirs::from("", "", "playxi") {
            Some(dirs) => dirs.data_dir().join("playxi.db"),
            None => PathBuf::from("playxi.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropagationConfig {
    /// Seconds between auto-propagation passes.
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_true() -> bool {
    true
}

/// Numeric lineup rules. Defaults are the league rules; `[rules]` in the
/// config file may override any of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LineupRules {
    /// Transfer budget for leagues created without an explicit limit.
    pub default_transfer_limit: u32,
    pub lineup_size: usize,
    pub min_keepers: usize,
    pub min_bowling_overs: u32,
    pub bowler_overs: u32,
    pub bowling_allrounder_overs: u32,
    pub batting_allrounder_overs: u32,
}

impl Default for LineupRules {
    fn default() -> Self {
        LineupRules {
            default_transfer_limit: 10,
            lineup_size: 11,
            min_keepers: 1,
            min_bowling_overs: 20,
            bowler_overs: 4,
            bowling_allrounder_overs: 4,
            batting_allrounder_overs: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/playxi.toml` relative to `base_dir`.
///
/// Does not copy defaults; prefer [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;
    Ok(config)
}

/// Seed `config/playxi.toml` from `defaults/playxi.toml` when it is missing.
///
/// Returns the path written, or `None` when a config file was already in
/// place. An existing file is never replaced.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let mut defaults = std::fs::File::open(&source).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!(
            "no config/{CONFIG_FILE} under {} and defaults/{CONFIG_FILE} is unreadable: {e}",
            base_dir.display()
        ),
    })?;

    if let Some(config_dir) = target.parent() {
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("cannot create {}: {e}", config_dir.display()),
        })?;
    }

    // create_new: a file written by a concurrent start wins.
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("cannot create {}: {e}", target.display()),
            })
        }
    };
    std::io::copy(&mut defaults, &mut dest).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot seed {} from defaults: {e}", target.display()),
    })?;

    Ok(Some(target))
}

/// Load config relative to `base_dir`, copying defaults first.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_file(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.propagation.interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "propagation.interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.rules.lineup_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "rules.lineup_size".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.rules.min_keepers > config.rules.lineup_size {
        return Err(ConfigError::ValidationError {
            field: "rules.min_keepers".into(),
            message: format!(
                "cannot exceed lineup_size ({}), got {}",
                config.rules.lineup_size, config.rules.min_keepers
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
