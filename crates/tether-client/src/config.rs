//! TOML configuration for the client.
//!
//! Read from `$XDG_CONFIG_HOME/tether/config.toml` (or
//! `~/.config/tether/config.toml`).  Every field has a default, so a missing
//! file or a file with only some sections is fine.
//!
//! ```toml
//! log_level = "debug"
//!
//! [display]
//! name = ":1"
//! use_shared_memory = false
//!
//! [audio]
//! client_name = "my-app"
//!
//! [events]
//! queue_capacity = 1024
//! ```
//!
//! Overrides set here win over the environment variables each protocol
//! normally consults (`DISPLAY`, `XAUTHORITY`, `PULSE_SERVER`,
//! `PULSE_COOKIE`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    /// Display name such as `":0"`; `DISPLAY` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Directory holding the per-display sockets.
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,
    /// Authority file; `XAUTHORITY` or `~/.Xauthority` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xauthority: Option<PathBuf>,
    /// Probe for and use the shared-memory image extension.
    #[serde(default = "default_true")]
    pub use_shared_memory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Server socket, as a path or `unix:<path>`; `PULSE_SERVER` and the
    /// runtime directory are consulted when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Cookie file; `PULSE_COOKIE` and the conventional paths when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<PathBuf>,
    /// `application.name` announced to the server.
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventsConfig {
    /// Capacity of the pump's event queue.  Events beyond it are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_socket_dir() -> PathBuf {
    PathBuf::from("/tmp/.X11-unix")
}
fn default_true() -> bool {
    true
}
fn default_client_name() -> String {
    "tether".to_string()
}
fn default_queue_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            display: DisplayConfig::default(),
            audio: AudioConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            name: None,
            socket_dir: default_socket_dir(),
            xauthority: None,
            use_shared_memory: default_true(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            server: None,
            cookie: None,
            client_name: default_client_name(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] if neither `XDG_CONFIG_HOME` nor
/// `HOME` is set.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("tether").join("config.toml"))
}

/// Loads the config from `path`, or from the default location when `path` is
/// `None`.  A missing file yields [`ClientConfig::default()`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.events.queue_capacity, 256);
        assert!(cfg.display.use_shared_memory);
        assert_eq!(cfg.display.socket_dir, PathBuf::from("/tmp/.X11-unix"));
        assert_eq!(cfg.audio.client_name, "tether");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ClientConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
log_level = "debug"
[display]
name = ":3"
use_shared_memory = false
[events]
queue_capacity = 8
"#;

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.display.name.as_deref(), Some(":3"));
        assert!(!cfg.display.use_shared_memory);
        assert_eq!(cfg.events.queue_capacity, 8);
        assert_eq!(cfg.audio, AudioConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[[ not toml").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = ClientConfig::default();
        cfg.audio.server = Some("unix:/run/pulse/native".into());
        cfg.display.xauthority = Some(PathBuf::from("/tmp/xauth"));

        // Act
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_unset_options_are_omitted() {
        let text = toml::to_string_pretty(&ClientConfig::default()).unwrap();
        assert!(!text.contains("xauthority"));
        assert!(!text.contains("cookie"));
    }
}
