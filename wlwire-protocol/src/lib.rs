//! wlwire-protocol: Wire format for the display-server protocol
//!
//! This crate holds everything that touches bytes: the argument codec,
//! the message envelope and the stream framing codec. It performs no I/O
//! and carries no connection state.

pub mod codec;
pub mod error;
pub mod message;
pub mod wire;

// Re-export main types at crate root
pub use codec::MessageCodec;
pub use error::WireError;
pub use message::{ArgReader, FdQueue, Header, Message, MessageBuilder, HEADER_SIZE, MAX_MESSAGE_SIZE};
pub use wire::{pad, Fixed, NewId};

/// Object identifier, allocated by the client
pub type ObjectId = u32;

/// Request or event number within an interface
pub type Opcode = u16;

/// The display object every connection starts with
pub const DISPLAY_ID: ObjectId = 1;

/// First identifier handed out by the client allocator
pub const FIRST_CLIENT_ID: ObjectId = 2;

/// Well-known requests and events of the display object
pub mod display {
    use crate::Opcode;

    /// Request: `sync(callback: new_id)`
    pub const REQ_SYNC: Opcode = 0;
    /// Request: `get_registry(registry: new_id)`
    pub const REQ_GET_REGISTRY: Opcode = 1;

    /// Event: `error(object_id: object, code: uint, message: string)`
    pub const EVT_ERROR: Opcode = 0;
    /// Event: `delete_id(id: uint)`
    pub const EVT_DELETE_ID: Opcode = 1;
}

/// Well-known requests and events of the registry object
pub mod registry {
    use crate::Opcode;

    /// Request: `bind(name: uint, id: new_id)`
    pub const REQ_BIND: Opcode = 0;

    /// Event: `global(name: uint, interface: string, version: uint)`
    pub const EVT_GLOBAL: Opcode = 0;
    /// Event: `global_remove(name: uint)`
    pub const EVT_GLOBAL_REMOVE: Opcode = 1;
}

/// Well-known events of the sync callback object
pub mod callback {
    use crate::Opcode;

    /// Event: `done(callback_data: uint)`
    pub const EVT_DONE: Opcode = 0;
}
