//! Connection to the display server
//!
//! The connection is split in two:
//! - [`Shared`] holds everything senders need (socket, id counter, send
//!   lock, pending sync slots, terminal error) and lives behind an `Arc`
//! - [`Connection`] owns the shared half plus the read state (input buffer,
//!   received descriptors, per-object handlers)
//!
//! Reading requires `&mut Connection`, so only one dispatch loop can run at
//! a time while any number of [`MessageSender`] clones keep writing.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::Shutdown;
use std::os::fd::{FromRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio_util::codec::Decoder;

use wlwire_protocol::{
    callback, display, FdQueue, Message, MessageCodec, ObjectId, DISPLAY_ID, FIRST_CLIENT_ID,
};
use wlwire_utils::{paths, Result, WlwireError};

use super::handler::{EventHandler, MessageSender};
use super::socket::{self, READ_CHUNK};
use super::sync::{CallbackSlot, SyncCallback};
use crate::config::ClientConfig;
use crate::registry::Registry;

/// Environment variable carrying an already connected socket descriptor
pub const SOCKET_FD_ENV: &str = "WAYLAND_SOCKET";

/// Received descriptors kept while no reader has claimed them
pub const MAX_QUEUED_FDS: usize = 1024;

/// Fatal error event sent by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// Object the error was raised on
    pub object_id: ObjectId,
    /// Interface-specific error code
    pub code: u32,
    pub message: String,
}

/// First fatal condition seen on the connection
#[derive(Debug, Clone)]
enum TerminalError {
    Protocol(ProtocolError),
    Transport { kind: io::ErrorKind, message: String },
    Closed,
}

impl TerminalError {
    fn to_error(&self) -> WlwireError {
        match self {
            Self::Protocol(e) => WlwireError::Protocol {
                object_id: e.object_id,
                code: e.code,
                message: e.message.clone(),
            },
            Self::Transport { kind, message } => {
                WlwireError::Io(io::Error::new(*kind, message.clone()))
            }
            Self::Closed => WlwireError::ConnectionClosed,
        }
    }
}

/// State reachable from every sender
#[derive(Debug)]
pub(crate) struct Shared {
    socket: UnixStream,
    next_id: AtomicU32,
    /// Serializes writes; the buffer is reused between messages
    send_buf: Mutex<BytesMut>,
    pending: Mutex<HashMap<ObjectId, Arc<CallbackSlot>>>,
    terminal: OnceLock<TerminalError>,
    closed: AtomicBool,
}

impl Shared {
    fn new(socket: UnixStream) -> Self {
        Self {
            socket,
            next_id: AtomicU32::new(FIRST_CLIENT_ID),
            send_buf: Mutex::new(BytesMut::with_capacity(READ_CHUNK)),
            pending: Mutex::new(HashMap::new()),
            terminal: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn alloc_id(&self) -> ObjectId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn protocol_error(&self) -> Option<ProtocolError> {
        match self.terminal.get() {
            Some(TerminalError::Protocol(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Fail if the connection can no longer be used
    fn check_usable(&self) -> Result<()> {
        if let Some(terminal) = self.terminal.get() {
            return Err(terminal.to_error());
        }
        if self.is_closed() {
            return Err(WlwireError::ConnectionClosed);
        }
        Ok(())
    }

    /// Record the first fatal condition; later ones are ignored
    fn record_terminal(&self, error: TerminalError) {
        if self.terminal.set(error).is_ok() {
            // Nobody will answer outstanding syncs any more
            self.cancel_pending();
        }
    }

    fn record_io_failure(&self, err: &io::Error) {
        self.record_terminal(TerminalError::Transport {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn cancel_pending(&self) {
        let slots: Vec<_> = self.pending.lock().drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            slot.cancel();
        }
    }

    pub(crate) fn send_message(&self, msg: Message) -> Result<()> {
        let mut buf = self.send_buf.lock();
        self.check_usable()?;

        buf.clear();
        // Oversized messages fail here, before any byte hits the socket
        msg.encode(&mut buf)?;

        tracing::trace!(
            object_id = msg.target,
            opcode = msg.opcode,
            size = buf.len(),
            fds = msg.fds.len(),
            "-> request"
        );

        if let Err(e) = socket::send_with_fds(&self.socket, &buf, &msg.fds) {
            tracing::error!("Failed to send message: {}", e);
            self.record_io_failure(&e);
            return Err(e.into());
        }

        // Our copies of the descriptors close when `msg` drops; the kernel
        // holds its own references for the peer
        Ok(())
    }

    pub(crate) fn sync(&self) -> Result<SyncCallback> {
        let id = self.alloc_id();
        let slot = Arc::new(CallbackSlot::new());

        // Register before sending so the reply can never beat the slot
        self.pending.lock().insert(id, slot.clone());

        let request = Message::builder(DISPLAY_ID, display::REQ_SYNC)
            .object(id)
            .build();
        if let Err(e) = self.send_message(request) {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        Ok(SyncCallback::new(id, slot))
    }

    fn take_pending(&self, id: ObjectId) -> Option<Arc<CallbackSlot>> {
        self.pending.lock().remove(&id)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_pending();
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                tracing::debug!("Socket shutdown failed: {}", e);
            }
        }
    }
}

/// Client connection to a display server
///
/// Owns the socket and the object id namespace. Object id 1 is the display
/// object itself; ids from 2 upward are handed out by [`alloc_id`](Self::alloc_id).
pub struct Connection {
    shared: Arc<Shared>,
    codec: MessageCodec,
    inbuf: BytesMut,
    /// Descriptors received and not yet taken by an `fd` argument
    fds: FdQueue,
    handlers: HashMap<ObjectId, Box<dyn EventHandler>>,
    registry: Option<Registry>,
    retired: HashSet<ObjectId>,
    /// Sync callbacks that fired and await their `delete_id`
    settled: HashSet<ObjectId>,
}

impl Connection {
    /// Connect using the environment
    ///
    /// `WAYLAND_SOCKET` (an inherited, connected descriptor) takes precedence
    /// and is removed from the environment. Otherwise the socket path is
    /// resolved from `XDG_RUNTIME_DIR` and `WAYLAND_DISPLAY`.
    pub fn connect() -> Result<Self> {
        if let Some(stream) = take_inherited_socket()? {
            tracing::debug!("Using socket inherited through {}", SOCKET_FD_ENV);
            return Self::from_stream(stream);
        }

        let path = paths::socket_path()?;
        Self::connect_to(&path)
    }

    /// Connect to an explicit socket path
    pub fn connect_to(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WlwireError::DisplayNotFound {
                path: path.to_path_buf(),
            });
        }

        let stream = UnixStream::connect(path).map_err(|e| {
            WlwireError::connection(format!("Failed to connect to {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "Connected to display");
        Self::from_stream(stream)
    }

    /// Connect using configuration overrides, falling back to the environment
    pub fn connect_with_config(config: &ClientConfig) -> Result<Self> {
        if config.has_socket_override() {
            Self::connect_to(config.socket_path()?)
        } else {
            Self::connect()
        }
    }

    /// Adopt an already connected stream
    pub fn from_stream(stream: UnixStream) -> Result<Self> {
        stream.set_nonblocking(false)?;

        Ok(Self {
            shared: Arc::new(Shared::new(stream)),
            codec: MessageCodec::new(),
            inbuf: BytesMut::with_capacity(READ_CHUNK),
            fds: FdQueue::new(),
            handlers: HashMap::new(),
            registry: None,
            retired: HashSet::new(),
            settled: HashSet::new(),
        })
    }

    /// Allocate a fresh object id; never blocks, never repeats
    pub fn alloc_id(&self) -> ObjectId {
        self.shared.alloc_id()
    }

    /// Frame and write a message, passing its descriptors along
    pub fn send_message(&self, msg: Message) -> Result<()> {
        self.shared.send_message(msg)
    }

    /// Get a sender that can be cloned and moved to other threads
    pub fn sender(&self) -> MessageSender {
        MessageSender::new(self.shared.clone())
    }

    /// Route events for `id` to `handler`, replacing any previous one
    pub fn set_handler(&mut self, id: ObjectId, handler: impl EventHandler + 'static) {
        self.handlers.insert(id, Box::new(handler));
    }

    pub fn remove_handler(&mut self, id: ObjectId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Error event recorded from the server, if any
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        self.shared.protocol_error()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Check whether the server has retired `id` with `delete_id`
    ///
    /// Sync callback ids are not tracked; they retire as soon as they fire.
    pub fn is_retired(&self, id: ObjectId) -> bool {
        self.retired.contains(&id)
    }

    /// Number of ids held for retirement bookkeeping
    pub fn tracked_ids(&self) -> usize {
        self.retired.len() + self.settled.len()
    }

    /// Received descriptors no `fd` argument has taken yet
    pub fn queued_fds(&self) -> usize {
        self.fds.len()
    }

    /// Deadline for blocking receives (used by [`roundtrip`](Self::roundtrip))
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.shared.socket.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Close the socket and cancel every pending sync. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Receive one message without blocking
    ///
    /// Returns `Ok(None)` when nothing is pending and
    /// [`WlwireError::ConnectionClosed`] once the server has hung up.
    pub fn recv_message(&mut self) -> Result<Option<Message>> {
        self.shared.check_usable()?;
        loop {
            if let Some(msg) = self.decode_buffered()? {
                return Ok(Some(msg));
            }
            if !self.fill(false)? {
                return Ok(None);
            }
        }
    }

    /// Receive one message, blocking until it arrives
    pub fn recv_message_blocking(&mut self) -> Result<Message> {
        self.shared.check_usable()?;
        loop {
            if let Some(msg) = self.decode_buffered()? {
                return Ok(msg);
            }
            self.fill(true)?;
        }
    }

    /// Receive and route exactly one message if one is available
    ///
    /// Returns `Ok(false)` when nothing was pending.
    pub fn dispatch_one(&mut self) -> Result<bool> {
        match self.recv_message()? {
            Some(msg) => {
                self.route(msg)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Route every message currently available; returns how many
    pub fn dispatch(&mut self) -> Result<usize> {
        let mut count = 0;
        while self.dispatch_one()? {
            count += 1;
        }
        Ok(count)
    }

    /// Block until one message arrives and route it
    pub fn dispatch_blocking(&mut self) -> Result<()> {
        let msg = self.recv_message_blocking()?;
        self.route(msg)
    }

    /// Issue a `sync` request and return its pending callback
    pub fn sync(&self) -> Result<SyncCallback> {
        self.shared.sync()
    }

    /// Block until the server has processed every request sent so far
    ///
    /// Drives the dispatch loop, so events that arrive in the meantime are
    /// routed to their handlers as usual.
    pub fn roundtrip(&mut self) -> Result<()> {
        let callback = self.sync()?;
        tracing::trace!(callback = callback.id(), "Roundtrip started");

        loop {
            if let Some(result) = callback.try_result() {
                return result.map(|_| ());
            }
            self.dispatch_blocking()?;
        }
    }

    /// Get the registry, creating it on first use
    pub fn get_registry(&mut self) -> Result<Registry> {
        if let Some(registry) = &self.registry {
            return Ok(registry.clone());
        }

        let id = self.alloc_id();
        let request = Message::builder(DISPLAY_ID, display::REQ_GET_REGISTRY)
            .object(id)
            .build();
        self.send_message(request)?;

        let registry = Registry::new(id, self.sender());
        self.handlers.insert(id, Box::new(registry.event_handler()));
        self.registry = Some(registry.clone());

        tracing::debug!(registry_id = id, "Registry created");
        Ok(registry)
    }

    /// Pull bytes from the socket into the input buffer
    ///
    /// Returns `Ok(false)` if a non-blocking read found nothing.
    fn fill(&mut self, blocking: bool) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        let received = match socket::recv_with_fds(&self.shared.socket, &mut chunk, blocking) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock && !blocking => return Ok(false),
            // A read timeout leaves the connection usable
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(e.into())
            }
            Err(e) => {
                tracing::error!("Failed to receive message: {}", e);
                self.shared.record_io_failure(&e);
                return Err(e.into());
            }
        };

        if received.bytes == 0 {
            tracing::info!("Server closed connection");
            self.shared.record_terminal(TerminalError::Closed);
            return Err(WlwireError::ConnectionClosed);
        }

        self.inbuf.extend_from_slice(&chunk[..received.bytes]);
        if !received.fds.is_empty() {
            self.fds.extend(received.fds);
            let dropped = self.fds.trim_to(MAX_QUEUED_FDS);
            if dropped > 0 {
                tracing::warn!(dropped, "Closing unclaimed received descriptors");
            }
        }
        Ok(true)
    }

    /// Decode the next complete message from the input buffer
    ///
    /// Every message reads `fd` arguments from the connection's queue, so
    /// descriptors are consumed in arrival order however the peer batched
    /// them.
    fn decode_buffered(&mut self) -> Result<Option<Message>> {
        match self.codec.decode(&mut self.inbuf) {
            Ok(Some(msg)) => {
                tracing::trace!(
                    object_id = msg.target,
                    opcode = msg.opcode,
                    size = msg.wire_size(),
                    queued_fds = self.fds.len(),
                    "<- event"
                );
                Ok(Some(msg.with_fd_queue(self.fds.clone())))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // The stream cannot be resynchronized past a bad header
                tracing::warn!(
                    discarded = self.inbuf.len(),
                    "Discarding unframeable input: {}",
                    e
                );
                self.inbuf.clear();
                self.fds.clear();
                Err(e.into())
            }
        }
    }

    fn route(&mut self, msg: Message) -> Result<()> {
        if msg.target == DISPLAY_ID {
            return self.handle_display_event(msg);
        }

        if let Some(slot) = self.shared.take_pending(msg.target) {
            let mut msg = msg;
            self.settled.insert(msg.target);
            if msg.opcode != callback::EVT_DONE {
                tracing::warn!(
                    object_id = msg.target,
                    opcode = msg.opcode,
                    "Unexpected event on sync callback"
                );
            }
            return match msg.reader().uint() {
                Ok(data) => {
                    slot.resolve(data);
                    Ok(())
                }
                Err(e) => {
                    slot.resolve(0);
                    Err(e.into())
                }
            };
        }

        match self.handlers.get_mut(&msg.target) {
            Some(handler) => handler.handle(msg).map_err(WlwireError::from),
            None => {
                // May belong to an object whose handler is not installed yet
                tracing::trace!(
                    object_id = msg.target,
                    opcode = msg.opcode,
                    "Dropping event for object without handler"
                );
                Ok(())
            }
        }
    }

    fn handle_display_event(&mut self, mut msg: Message) -> Result<()> {
        match msg.opcode {
            display::EVT_ERROR => {
                let mut args = msg.reader();
                let error = ProtocolError {
                    object_id: args.object()?,
                    code: args.uint()?,
                    message: args.string()?,
                };
                tracing::warn!(
                    object_id = error.object_id,
                    code = error.code,
                    "Protocol error: {}",
                    error.message
                );
                self.shared
                    .record_terminal(TerminalError::Protocol(error));
                self.shared.check_usable()
            }
            display::EVT_DELETE_ID => {
                let id = msg.reader().uint()?;
                if self.settled.remove(&id) {
                    return Ok(());
                }
                tracing::trace!(id, "Object id retired");
                self.retired.insert(id);
                self.handlers.remove(&id);
                Ok(())
            }
            opcode => {
                tracing::debug!(opcode, "Ignoring unknown display event");
                Ok(())
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Take the descriptor named by `WAYLAND_SOCKET`, if set
fn take_inherited_socket() -> Result<Option<UnixStream>> {
    let Some(value) = std::env::var_os(SOCKET_FD_ENV) else {
        return Ok(None);
    };
    std::env::remove_var(SOCKET_FD_ENV);

    let fd: RawFd = value
        .to_str()
        .and_then(|s| s.trim().parse().ok())
        .filter(|fd: &RawFd| *fd >= 0)
        .ok_or_else(|| {
            WlwireError::connection(format!("{} is not a descriptor: {:?}", SOCKET_FD_ENV, value))
        })?;

    // SAFETY: the parent process handed this descriptor to us through the
    // environment, and removing the variable above keeps anyone else from
    // adopting it a second time
    let stream = unsafe { UnixStream::from_raw_fd(fd) };
    Ok(Some(stream))
}
