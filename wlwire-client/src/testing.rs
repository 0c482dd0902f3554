//! In-process stand-in for a display server
//!
//! [`MockCompositor`] holds the server end of a socket pair. Tests drive it
//! by hand (read a request, send an event) or let [`MockCompositor::serve`]
//! answer `get_registry` and `sync` on a background thread.

use std::os::unix::net::UnixStream;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use wlwire_protocol::{callback, display, registry, Message, MessageCodec, ObjectId, Opcode, DISPLAY_ID};

use crate::connection::socket::{recv_with_fds, send_with_fds, READ_CHUNK};
use crate::connection::Connection;

/// Connected client and mock server
pub(crate) fn connection_pair() -> (Connection, MockCompositor) {
    let (client, server) = UnixStream::pair().unwrap();
    let conn = Connection::from_stream(client).unwrap();
    (conn, MockCompositor::new(server))
}

pub(crate) struct MockCompositor {
    stream: UnixStream,
    codec: MessageCodec,
    inbuf: BytesMut,
    fds: Vec<std::os::fd::OwnedFd>,
    serial: u32,
}

impl MockCompositor {
    pub(crate) fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            codec: MessageCodec::new(),
            inbuf: BytesMut::new(),
            fds: Vec::new(),
            serial: 0,
        }
    }

    /// Next request, or `None` once the client has hung up
    pub(crate) fn next_request(&mut self) -> Option<Message> {
        loop {
            if let Some(mut msg) = self.codec.decode(&mut self.inbuf).unwrap() {
                msg.fds = std::mem::take(&mut self.fds);
                return Some(msg);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let received = recv_with_fds(&self.stream, &mut chunk, true).ok()?;
            if received.bytes == 0 {
                return None;
            }
            self.inbuf.extend_from_slice(&chunk[..received.bytes]);
            self.fds.extend(received.fds);
        }
    }

    pub(crate) fn read_request(&mut self) -> Message {
        self.next_request().expect("client hung up")
    }

    /// Send one event with its descriptors
    pub(crate) fn send_event(&mut self, msg: Message) {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf).unwrap();
        send_with_fds(&self.stream, &buf, &msg.fds).unwrap();
    }

    /// Write bytes as-is, optionally with descriptors
    pub(crate) fn send_raw(&mut self, bytes: &[u8], fds: &[std::os::fd::OwnedFd]) {
        send_with_fds(&self.stream, bytes, fds).unwrap();
    }

    /// Fire callback `id` and retire it, as a real server does
    pub(crate) fn done(&mut self, id: ObjectId) {
        self.serial += 1;
        self.send_event(
            Message::builder(id, callback::EVT_DONE)
                .uint(self.serial)
                .build(),
        );
        self.send_event(
            Message::builder(DISPLAY_ID, display::EVT_DELETE_ID)
                .uint(id)
                .build(),
        );
    }

    pub(crate) fn announce(&mut self, registry_id: ObjectId, globals: &[(u32, &str, u32)]) {
        for (name, interface, version) in globals {
            self.send_event(
                Message::builder(registry_id, registry::EVT_GLOBAL)
                    .uint(*name)
                    .string(interface)
                    .uint(*version)
                    .build(),
            );
        }
    }

    /// Answer requests until the client hangs up
    ///
    /// `get_registry` is answered with `globals`, `sync` with `done`.
    /// Returns `(target, opcode)` of every request seen.
    pub(crate) fn serve(&mut self, globals: &[(u32, &str, u32)]) -> Vec<(ObjectId, Opcode)> {
        let mut seen = Vec::new();
        while let Some(mut request) = self.next_request() {
            seen.push((request.target, request.opcode));
            if request.target != DISPLAY_ID {
                continue;
            }

            let new_id = request.reader().object().unwrap();
            match request.opcode {
                display::REQ_GET_REGISTRY => self.announce(new_id, globals),
                display::REQ_SYNC => self.done(new_id),
                _ => {}
            }
        }
        seen
    }
}
