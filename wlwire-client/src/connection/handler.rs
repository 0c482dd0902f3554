//! Event handler trait and the cloneable sending half

use std::sync::Arc;

use wlwire_protocol::{Message, ObjectId, WireError};
use wlwire_utils::Result;

use super::client::{ProtocolError, Shared};
use super::sync::SyncCallback;

/// Clonable sending half of a connection
///
/// Safe to use from any thread; writes are serialized by the connection's
/// send lock. Receiving stays with the owning [`Connection`](super::Connection).
#[derive(Debug, Clone)]
pub struct MessageSender {
    shared: Arc<Shared>,
}

impl MessageSender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Allocate a fresh object id
    pub fn alloc_id(&self) -> ObjectId {
        self.shared.alloc_id()
    }

    /// Frame and write a message, passing its descriptors along
    pub fn send_message(&self, msg: Message) -> Result<()> {
        self.shared.send_message(msg)
    }

    /// Issue a `sync` request; the returned handle settles once the owning
    /// connection dispatches the matching `done` event
    pub fn sync(&self) -> Result<SyncCallback> {
        self.shared.sync()
    }

    /// Error event recorded from the server, if any
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        self.shared.protocol_error()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Trait for handling events addressed to one object
pub trait EventHandler: Send {
    /// Handle an event; decode failures are reported to the dispatch caller
    fn handle(&mut self, msg: Message) -> std::result::Result<(), WireError>;
}

/// Simple callback-based handler
pub struct CallbackHandler<F>
where
    F: FnMut(Message) -> std::result::Result<(), WireError> + Send,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: FnMut(Message) -> std::result::Result<(), WireError> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: FnMut(Message) -> std::result::Result<(), WireError> + Send,
{
    fn handle(&mut self, msg: Message) -> std::result::Result<(), WireError> {
        (self.callback)(msg)
    }
}
