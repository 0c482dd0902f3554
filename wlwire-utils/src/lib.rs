//! wlwire-utils: Common utilities shared across wlwire crates
//!
//! This crate provides:
//! - Unified error types ([`WlwireError`], [`Result`])
//! - Logging infrastructure ([`init_logging_with_config`], [`LogConfig`])
//! - Socket and XDG path resolution ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{WlwireError, Result};
pub use logging::{init_logging_with_config, log_file_path, LogConfig, LogOutput};

// Re-export commonly used path functions
pub use paths::{
    config_dir, config_file, log_dir, resolve_socket_path, socket_path, state_dir,
    DEFAULT_DISPLAY,
};
