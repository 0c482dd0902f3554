//! Path utilities for wlwire
//!
//! Resolves the display socket from the environment and handles XDG Base
//! Directory locations for configuration and logs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::{Result, WlwireError};

/// Application identifier for XDG directories
const APP_NAME: &str = "wlwire";

/// Display name used when `WAYLAND_DISPLAY` is unset
pub const DEFAULT_DISPLAY: &str = "wayland-0";

/// Environment variable naming the display socket
pub const DISPLAY_ENV: &str = "WAYLAND_DISPLAY";

/// Environment variable naming the per-user runtime directory
pub const RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";

/// Get project directories (cached)
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Resolve the display socket path
///
/// Absolute display names are used verbatim. Relative names are joined
/// under the runtime directory, which must then be known.
pub fn resolve_socket_path(
    runtime_dir: Option<&Path>,
    display: Option<&OsStr>,
) -> Result<PathBuf> {
    let display = display
        .filter(|d| !d.is_empty())
        .map(Path::new)
        .unwrap_or_else(|| Path::new(DEFAULT_DISPLAY));

    if display.is_absolute() {
        return Ok(display.to_path_buf());
    }

    match runtime_dir.filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => Ok(dir.join(display)),
        None => Err(WlwireError::config(format!(
            "{} is not set and display name {:?} is relative",
            RUNTIME_DIR_ENV, display
        ))),
    }
}

/// Get the display socket path from the environment
///
/// Location: `$WAYLAND_DISPLAY` if absolute, else
/// `$XDG_RUNTIME_DIR/$WAYLAND_DISPLAY` (display defaults to `wayland-0`)
pub fn socket_path() -> Result<PathBuf> {
    let runtime_dir = std::env::var_os(RUNTIME_DIR_ENV).map(PathBuf::from);
    let display = std::env::var_os(DISPLAY_ENV);
    let path = resolve_socket_path(runtime_dir.as_deref(), display.as_deref())?;
    tracing::debug!(path = %path.display(), "Resolved display socket");
    Ok(path)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/wlwire` or `~/.config/wlwire`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/wlwire/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/wlwire` or `~/.local/state/wlwire`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/wlwire/log` or `~/.local/state/wlwire/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_display_joins_runtime_dir() {
        let path = resolve_socket_path(
            Some(Path::new("/run/user/1000")),
            Some(OsStr::new("wayland-1")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/run/user/1000/wayland-1"));
    }

    #[test]
    fn test_absolute_display_used_verbatim() {
        let path = resolve_socket_path(
            Some(Path::new("/run/user/1000")),
            Some(OsStr::new("/tmp/nested/wayland-9")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/nested/wayland-9"));

        // No runtime dir needed for absolute names
        let path = resolve_socket_path(None, Some(OsStr::new("/tmp/wl.sock"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/wl.sock"));
    }

    #[test]
    fn test_default_display() {
        let path = resolve_socket_path(Some(Path::new("/run/user/42")), None).unwrap();
        assert_eq!(path, PathBuf::from("/run/user/42/wayland-0"));

        let path =
            resolve_socket_path(Some(Path::new("/run/user/42")), Some(OsStr::new(""))).unwrap();
        assert_eq!(path, PathBuf::from("/run/user/42/wayland-0"));
    }

    #[test]
    fn test_missing_runtime_dir() {
        let result = resolve_socket_path(None, Some(OsStr::new("wayland-0")));
        assert!(matches!(result, Err(WlwireError::Config(_))));
    }

    #[test]
    fn test_config_file_is_toml() {
        let path = config_file();
        assert!(path.to_string_lossy().ends_with(".toml"));
        assert!(path.to_string_lossy().contains("wlwire"));
    }

    #[test]
    fn test_log_dir_under_state_dir() {
        assert!(log_dir().starts_with(state_dir()));
    }
}
