//! wlwire-info - list the globals a display server advertises
//!
//! Connects to the display, waits for any required interfaces and prints
//! one `name interface version` line per global.

use wlwire_client::{ClientConfig, Connection};
use wlwire_utils::{init_logging_with_config, log_file_path, LogConfig, LogOutput, Result};

mod cli;

use cli::Args;

fn main() -> Result<()> {
    let args = Args::parse_args();

    let mut log_config = LogConfig::client();
    if let Some(filter) = &args.log {
        log_config = log_config.with_filter(filter.clone());
    }
    if args.log_file {
        log_config = log_config.with_output(LogOutput::Both);
    }
    init_logging_with_config(log_config)?;
    if args.log_file {
        tracing::debug!("Logging to {}", log_file_path().display());
    }
    tracing::debug!("CLI args: {:?}", args);

    match run(args) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("wlwire-info failed: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

/// Merge CLI flags over the loaded configuration
fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load(),
    };

    if let Some(display) = &args.display {
        config.display = Some(display.clone());
        config.socket = None;
    }
    if let Some(socket) = &args.socket {
        config.socket = Some(socket.clone());
    }
    if !args.wait_for.is_empty() {
        config.globals.required = args.wait_for.clone();
    }
    if let Some(attempts) = args.attempts {
        config.globals.wait_attempts = attempts;
    }

    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;

    let mut conn = Connection::connect_with_config(&config)?;
    let registry = conn.get_registry()?;
    conn.roundtrip()?;

    let required: Vec<&str> = config.globals.required.iter().map(String::as_str).collect();
    registry.wait_for_globals(&mut conn, &required, config.globals.wait_attempts)?;

    tracing::info!("Server advertises {} globals", registry.len());
    for global in registry.globals() {
        println!("{:>4} {} {}", global.name, global.interface, global.version);
    }

    conn.close();
    Ok(())
}
