// Configuration loading and parsing (config/companion.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

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
// companion.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire companion.toml file.
#[derive(Debug, Clone, Deserialize)]
struct CompanionFile {
    server: ServerSection,
    session: SessionSection,
    #[serde(default)]
    live: LiveSection,
    #[serde(default)]
    reconnect: ReconnectSection,
    #[serde(default)]
    diff: DiffSection,
    #[serde(default)]
    cache: CacheSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Base URL of the event server, e.g. `http://192.168.1.20:8000`.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// The browser session's cookie string
    /// (`username=...; user_role=...; session_token=...`).
    pub cookie: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveSection {
    /// Trailing debounce window for leaderboard pushes.
    pub debounce_ms: u64,
    /// Poll fallback cadence; keeps the view eventually consistent even
    /// when both push feeds are down.
    pub poll_interval_secs: u64,
}

impl Default for LiveSection {
    fn default() -> Self {
        LiveSection {
            debounce_ms: 100,
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSection {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        ReconnectSection {
            base_delay_ms: 1000,
            max_attempts: 5,
        }
    }
}

/// Table-rebuild heuristic thresholds. These are tuning constants, kept
/// configurable rather than hard-coded.
#[derive(Debug, Clone, Deserialize)]
pub struct DiffSection {
    /// Rebuild when the row count changes by more than this.
    pub rebuild_count_delta: usize,
    /// Rebuild when more than this many previously unseen identities appear.
    pub rebuild_new_entries: usize,
}

impl Default for DiffSection {
    fn default() -> Self {
        DiffSection {
            rebuild_count_delta: 2,
            rebuild_new_entries: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// SQLite file for the reload-guard snapshot. `":memory:"` in tests.
    pub db_path: String,
    /// Maximum age of a persisted snapshot before it is ignored.
    pub snapshot_ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            db_path: "housie-companion.db".to_string(),
            snapshot_ttl_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSection,
    pub session: SessionSection,
    pub live: LiveSection,
    pub reconnect: ReconnectSection,
    pub diff: DiffSection,
    pub cache: CacheSection,
}

impl Config {
    /// Derive the WebSocket URL for a feed path from the HTTP base URL
    /// (`http` -> `ws`, `https` -> `wss`).
    pub fn ws_url(&self, path: &str) -> String {
        let base = self.server.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}{path}")
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/companion.toml` relative to
/// the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("companion.toml");
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
        path: path.clone(),
    })?;

    let file: CompanionFile =
        toml::from_str(&text).map_err(|e| ConfigError::ParseError { path, source: e })?;

    let config = Config {
        server: file.server,
        session: file.session,
        live: file.live,
        reconnect: file.reconnect,
        diff: file.diff,
        cache: file.cache,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure `config/companion.toml` exists by copying it from `defaults/`
/// when missing. Returns `true` if a copy was made.
pub fn ensure_config_file(base_dir: &Path) -> Result<bool, ConfigError> {
    let target = base_dir.join("config").join("companion.toml");
    if target.exists() {
        return Ok(false);
    }

    let source = base_dir.join("defaults").join("companion.toml");
    if !source.exists() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither {} nor defaults/companion.toml found in {}; \
                 run from the project root or create the config file",
                target.display(),
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(target.parent().expect("config path has a parent")).map_err(|e| {
        ConfigError::DefaultsCopyError {
            message: format!("failed to create config directory: {e}"),
        }
    })?;
    std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {}: {e}", source.display()),
    })?;

    Ok(true)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying the default file first when needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let url = &config.server.base_url;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::ValidationError {
            field: "server.base_url".into(),
            message: format!("must start with http:// or https://, got `{url}`"),
        });
    }

    if config.live.debounce_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "live.debounce_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.live.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "live.poll_interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.reconnect.base_delay_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "reconnect.base_delay_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.reconnect.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            field: "reconnect.max_attempts".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.cache.snapshot_ttl_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "cache.snapshot_ttl_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
