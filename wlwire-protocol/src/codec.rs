//! Stream framing codec
//!
//! Splits a byte stream into [`Message`]s using the size carried in each
//! header. Descriptors are not part of the stream; the connection attaches
//! them after decoding.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::WireError;
use crate::message::{Header, Message, HEADER_SIZE};

/// Codec for [`Message`] framing, usable in both directions
#[derive(Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need the whole header before the size is known
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = Header::decode(&src[..HEADER_SIZE])?;

        if src.len() < header.size {
            src.reserve(header.size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(header.size);
        frame.advance(HEADER_SIZE);

        Ok(Some(Message::new(
            header.object_id,
            header.opcode,
            frame.freeze(),
        )))
    }
}

impl<'a> Encoder<&'a Message> for MessageCodec {
    type Error = WireError;

    fn encode(&mut self, item: &'a Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = WireError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}
