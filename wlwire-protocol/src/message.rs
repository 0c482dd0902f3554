//! Message envelope
//!
//! Every message starts with an 8-byte header:
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ object id    │ size << 16 | opcode          │
//! │ u32          │ u32                          │
//! └──────────────┴──────────────────────────────┘
//! ```
//! `size` counts the whole message including the header. Both words are in
//! host byte order. File descriptors ride alongside in ancillary data. An
//! outgoing [`Message`] owns the descriptors attached to it; an incoming one
//! reads from the connection's [`FdQueue`], since the peer may batch the
//! descriptors of several messages into one ancillary payload.

use std::collections::VecDeque;
use std::os::fd::OwnedFd;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use crate::error::WireError;
use crate::wire::{self, Fixed, NewId};
use crate::{ObjectId, Opcode};

/// Header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Upper bound on a message and on any single string or array inside it
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Largest size the 16-bit header field can express
const MAX_ENCODABLE_SIZE: usize = u16::MAX as usize;

/// Decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub object_id: ObjectId,
    pub opcode: Opcode,
    /// Total message size, header included
    pub size: usize,
}

impl Header {
    pub fn new(object_id: ObjectId, opcode: Opcode, size: usize) -> Self {
        Self {
            object_id,
            opcode,
            size,
        }
    }

    /// Number of argument bytes following the header
    pub fn payload_len(&self) -> usize {
        self.size.saturating_sub(HEADER_SIZE)
    }

    /// Append the header to `dst`. The size must already be validated.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        debug_assert!(self.size <= MAX_ENCODABLE_SIZE);
        dst.put_u32_ne(self.object_id);
        dst.put_u32_ne(((self.size as u32) << 16) | u32::from(self.opcode));
    }

    /// Decode and validate a header from the front of `buf`
    ///
    /// # Example
    ///
    /// ```
    /// use wlwire_protocol::{Header, WireError};
    ///
    /// let err = Header::decode(&[0x05, 0, 0, 0]).unwrap_err();
    /// assert!(matches!(err, WireError::HeaderTooShort(4)));
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::HeaderTooShort(buf.len()));
        }

        let object_id = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let word = u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let size = (word >> 16) as usize;
        let opcode = (word & 0xffff) as Opcode;

        if !(HEADER_SIZE..=MAX_MESSAGE_SIZE).contains(&size) {
            return Err(WireError::InvalidMessageSize(size));
        }

        Ok(Self {
            object_id,
            opcode,
            size,
        })
    }
}

/// One request or event
#[derive(Debug)]
pub struct Message {
    /// Object the request targets, or the object that emitted the event
    pub target: ObjectId,
    pub opcode: Opcode,
    /// Encoded arguments, without the header
    pub args: Bytes,
    /// Descriptors for `fd` arguments, in argument order
    pub fds: Vec<OwnedFd>,
    /// Received descriptors shared with later messages on the same stream
    pub fd_queue: Option<FdQueue>,
}

impl Message {
    pub fn new(target: ObjectId, opcode: Opcode, args: impl Into<Bytes>) -> Self {
        Self {
            target,
            opcode,
            args: args.into(),
            fds: Vec::new(),
            fd_queue: None,
        }
    }

    /// Start building a message argument by argument
    pub fn builder(target: ObjectId, opcode: Opcode) -> MessageBuilder {
        MessageBuilder::new(target, opcode)
    }

    pub fn with_fds(mut self, fds: Vec<OwnedFd>) -> Self {
        self.fds = fds;
        self
    }

    /// Read `fd` arguments from `queue` once the attached ones run out
    pub fn with_fd_queue(mut self, queue: FdQueue) -> Self {
        self.fd_queue = Some(queue);
        self
    }

    /// Total size on the wire, header included
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.args.len()
    }

    pub fn header(&self) -> Header {
        Header::new(self.target, self.opcode, self.wire_size())
    }

    /// Append header and arguments to `dst`. Descriptors are not written.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), WireError> {
        let size = self.wire_size();
        if size > MAX_ENCODABLE_SIZE {
            return Err(WireError::MessageTooLarge {
                size,
                max: MAX_ENCODABLE_SIZE,
            });
        }

        dst.reserve(size);
        self.header().encode_into(dst);
        dst.put_slice(&self.args);
        Ok(())
    }

    /// Decode one complete message from the front of `buf`
    ///
    /// Fails with [`WireError::UnexpectedEof`] if the buffer holds less than
    /// the size declared in the header.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let header = Header::decode(buf)?;
        if buf.len() < header.size {
            return Err(WireError::UnexpectedEof {
                needed: header.size,
                remaining: buf.len(),
            });
        }

        Ok(Self::new(
            header.object_id,
            header.opcode,
            Bytes::copy_from_slice(&buf[HEADER_SIZE..header.size]),
        ))
    }

    /// Cursor over the arguments and descriptors of this message
    pub fn reader(&mut self) -> ArgReader<'_> {
        ArgReader {
            args: &self.args[..],
            fds: &mut self.fds,
            queue: self.fd_queue.as_ref(),
        }
    }
}

/// Fluent builder producing a [`Message`]
#[derive(Debug)]
pub struct MessageBuilder {
    target: ObjectId,
    opcode: Opcode,
    args: BytesMut,
    fds: Vec<OwnedFd>,
}

impl MessageBuilder {
    pub fn new(target: ObjectId, opcode: Opcode) -> Self {
        Self {
            target,
            opcode,
            args: BytesMut::new(),
            fds: Vec::new(),
        }
    }

    pub fn int(mut self, value: i32) -> Self {
        wire::put_int(&mut self.args, value);
        self
    }

    pub fn uint(mut self, value: u32) -> Self {
        wire::put_uint(&mut self.args, value);
        self
    }

    pub fn fixed(mut self, value: Fixed) -> Self {
        wire::put_fixed(&mut self.args, value);
        self
    }

    /// Object reference or typed `new_id`
    pub fn object(mut self, id: ObjectId) -> Self {
        wire::put_object(&mut self.args, id);
        self
    }

    /// Untyped `new_id` carrying its interface and version
    pub fn new_id(mut self, new_id: &NewId) -> Self {
        wire::put_new_id(&mut self.args, new_id);
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        wire::put_string(&mut self.args, Some(value));
        self
    }

    pub fn nullable_string(mut self, value: Option<&str>) -> Self {
        wire::put_string(&mut self.args, value);
        self
    }

    pub fn array(mut self, value: &[u8]) -> Self {
        wire::put_array(&mut self.args, value);
        self
    }

    /// Attach a descriptor; it is sent as ancillary data, not as bytes
    pub fn fd(mut self, fd: OwnedFd) -> Self {
        self.fds.push(fd);
        self
    }

    pub fn build(self) -> Message {
        Message {
            target: self.target,
            opcode: self.opcode,
            args: self.args.freeze(),
            fds: self.fds,
            fd_queue: None,
        }
    }
}

/// Descriptors received on a stream, handed out in arrival order
///
/// Clones share the same queue. A descriptor stays queued until some
/// message's reader takes it, so one that arrived with an earlier batch is
/// still there when the message it belongs to is decoded.
#[derive(Debug, Clone, Default)]
pub struct FdQueue {
    inner: Arc<Mutex<VecDeque<OwnedFd>>>,
}

impl FdQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, fds: impl IntoIterator<Item = OwnedFd>) {
        self.inner.lock().extend(fds);
    }

    /// Take the oldest descriptor
    pub fn pop(&self) -> Option<OwnedFd> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Close the oldest descriptors until at most `max` remain; returns how
    /// many were closed
    pub fn trim_to(&self, max: usize) -> usize {
        let mut queue = self.inner.lock();
        let excess = queue.len().saturating_sub(max);
        queue.drain(..excess);
        excess
    }

    /// Close every queued descriptor
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// Sequential reader over a message's arguments
///
/// Descriptors are handed out one per [`ArgReader::fd`] call, attached ones
/// first and then from the message's [`FdQueue`]. Ownership moves to the
/// caller.
#[derive(Debug)]
pub struct ArgReader<'a> {
    args: &'a [u8],
    fds: &'a mut Vec<OwnedFd>,
    queue: Option<&'a FdQueue>,
}

impl<'a> ArgReader<'a> {
    pub fn int(&mut self) -> Result<i32, WireError> {
        wire::get_int(&mut self.args)
    }

    pub fn uint(&mut self) -> Result<u32, WireError> {
        wire::get_uint(&mut self.args)
    }

    pub fn fixed(&mut self) -> Result<Fixed, WireError> {
        wire::get_fixed(&mut self.args)
    }

    pub fn object(&mut self) -> Result<ObjectId, WireError> {
        wire::get_object(&mut self.args)
    }

    pub fn new_id(&mut self) -> Result<NewId, WireError> {
        wire::get_new_id(&mut self.args)
    }

    pub fn string(&mut self) -> Result<String, WireError> {
        wire::get_string(&mut self.args)
    }

    pub fn array(&mut self) -> Result<Vec<u8>, WireError> {
        wire::get_array(&mut self.args)
    }

    pub fn fd(&mut self) -> Result<OwnedFd, WireError> {
        if !self.fds.is_empty() {
            return Ok(self.fds.remove(0));
        }
        self.queue
            .and_then(FdQueue::pop)
            .ok_or(WireError::MissingFd)
    }

    /// Argument bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}
