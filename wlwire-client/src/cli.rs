//! Command-line argument parsing for wlwire-info
//!
//! Uses clap for argument parsing with derive macros.

use clap::Parser;
use std::path::PathBuf;

/// wlwire-info - list the globals a display server advertises
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Display name to connect to
    ///
    /// Relative names are looked up in `$XDG_RUNTIME_DIR`. Overrides the
    /// config file and `WAYLAND_DISPLAY`.
    #[arg(long, short = 'd')]
    pub display: Option<String>,

    /// Custom socket path
    ///
    /// Connect to this socket directly. Takes precedence over --display.
    #[arg(long, short = 'S')]
    pub socket: Option<PathBuf>,

    /// Interface that must be advertised (repeatable)
    ///
    /// Example: wlwire-info --wait-for wl_compositor --wait-for wl_shm
    #[arg(long = "wait-for", value_name = "INTERFACE")]
    pub wait_for: Vec<String>,

    /// Roundtrips to wait for required interfaces
    #[arg(long)]
    pub attempts: Option<usize>,

    /// Alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter (overrides WLWIRE_LOG)
    ///
    /// Example: --log wlwire_client=trace
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,

    /// Also write logs to wlwire.log in the state directory
    #[arg(long, default_value_t = false)]
    pub log_file: bool,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["wlwire-info"]);
        assert!(args.display.is_none());
        assert!(args.socket.is_none());
        assert!(args.wait_for.is_empty());
        assert!(args.attempts.is_none());
        assert!(args.config.is_none());
        assert!(args.log.is_none());
        assert!(!args.log_file);
    }

    #[test]
    fn test_display_flag() {
        let args = Args::parse_from(["wlwire-info", "-d", "wayland-1"]);
        assert_eq!(args.display.as_deref(), Some("wayland-1"));

        let args = Args::parse_from(["wlwire-info", "--display", "wayland-2"]);
        assert_eq!(args.display.as_deref(), Some("wayland-2"));
    }

    #[test]
    fn test_socket_path() {
        let args = Args::parse_from(["wlwire-info", "-S", "/tmp/custom.sock"]);
        assert_eq!(args.socket, Some(PathBuf::from("/tmp/custom.sock")));
    }

    #[test]
    fn test_repeated_wait_for() {
        let args = Args::parse_from([
            "wlwire-info",
            "--wait-for",
            "wl_compositor",
            "--wait-for",
            "wl_shm",
            "--attempts",
            "5",
        ]);
        assert_eq!(args.wait_for, vec!["wl_compositor", "wl_shm"]);
        assert_eq!(args.attempts, Some(5));
    }

    #[test]
    fn test_config_and_log() {
        let args = Args::parse_from([
            "wlwire-info",
            "--config",
            "/etc/wlwire.toml",
            "--log",
            "debug",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/wlwire.toml")));
        assert_eq!(args.log.as_deref(), Some("debug"));
        assert!(!args.log_file);

        let args = Args::parse_from(["wlwire-info", "--log-file"]);
        assert!(args.log_file);
    }
}
