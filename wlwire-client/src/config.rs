//! Client-side configuration loading
//!
//! Reads display selection and required globals from the shared config file
//! (`~/.config/wlwire/config.toml`).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use wlwire_utils::{paths, Result, WlwireError};

/// Attempts `wait_for_globals` makes when the config does not say
pub const DEFAULT_WAIT_ATTEMPTS: usize = 3;

/// Client configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Display name, resolved under the runtime directory unless absolute
    pub display: Option<String>,
    /// Explicit socket path; wins over `display`
    pub socket: Option<PathBuf>,
    pub globals: GlobalsConfig,
}

/// Globals the client expects the server to advertise
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalsConfig {
    /// Interface names that must be present
    pub required: Vec<String>,
    /// Roundtrips to wait for late globals
    pub wait_attempts: usize,
}

impl Default for GlobalsConfig {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            wait_attempts: DEFAULT_WAIT_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    /// Load from the default config file
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = paths::config_file();

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| WlwireError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| WlwireError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check whether the config names a display or socket itself
    pub fn has_socket_override(&self) -> bool {
        self.socket.is_some() || self.display.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Resolve the socket path: explicit socket, then display, then environment
    pub fn socket_path(&self) -> Result<PathBuf> {
        if let Some(socket) = &self.socket {
            return Ok(socket.clone());
        }

        match self.display.as_deref().filter(|d| !d.is_empty()) {
            Some(display) => {
                let runtime_dir = std::env::var_os(paths::RUNTIME_DIR_ENV).map(PathBuf::from);
                paths::resolve_socket_path(runtime_dir.as_deref(), Some(OsStr::new(display)))
            }
            None => paths::socket_path(),
        }
    }
}
