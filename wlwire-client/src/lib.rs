//! wlwire-client: Display-server protocol client
//!
//! Connects to a display server over its Unix socket, routes incoming
//! events to per-object handlers and discovers server globals through the
//! registry. Object-specific protocol wrappers build on three operations:
//! [`Connection::alloc_id`], [`Connection::send_message`] and
//! [`Connection::set_handler`].
//!
//! ```no_run
//! use wlwire_client::Connection;
//!
//! let mut conn = Connection::connect()?;
//! let registry = conn.get_registry()?;
//! conn.roundtrip()?;
//!
//! for global in registry.globals() {
//!     println!("{} {} v{}", global.name, global.interface, global.version);
//! }
//! # Ok::<(), wlwire_utils::WlwireError>(())
//! ```

pub mod config;
pub mod connection;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ClientConfig, GlobalsConfig};
pub use connection::{
    CallbackHandler, Connection, EventHandler, MessageSender, ProtocolError, SyncCallback,
};
pub use registry::{BoundObject, Global, Registry};
