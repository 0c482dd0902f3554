//! Connection to a display server
//!
//! Provides the Unix socket connection with message framing, descriptor
//! passing, per-object event dispatch and sync round-trips.

mod client;
mod handler;
pub(crate) mod socket;
mod sync;


pub use client::{Connection, ProtocolError, MAX_QUEUED_FDS, SOCKET_FD_ENV};
pub use handler::{CallbackHandler, EventHandler, MessageSender};
pub use sync::SyncCallback;
