//! Byte-stream parser for device frames
//!
//! Serial reads may split a frame across deliveries or coalesce several
//! frames into one. [`StreamParser`] keeps the bytes it could not resolve yet
//! and hands back every complete frame in arrival order.
//!
//! Response frames have a fixed size. Data frames do not carry their length,
//! so the caller passes the length expected by the command in flight on every
//! [`feed`](StreamParser::feed).
//!
//! ```
//! use gt521_core::{AckCode, Packet, ResponsePacket, StreamParser};
//!
//! let frame = ResponsePacket::new(0, AckCode::Ack);
//! let (head, tail) = frame.as_bytes().split_at(5);
//!
//! let mut parser = StreamParser::new();
//! assert!(parser.feed(head, 0).is_empty());
//!
//! let packets = parser.feed(tail, 0);
//! assert_eq!(packets, vec![Packet::Response(frame)]);
//! ```

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::{
    constants::{DATA_START, FRAME_SIZE, MIN_DATA_FRAME_SIZE, RESPONSE_START},
    packet::{DataPacket, Packet, ResponsePacket},
};

/// Initial carry-over capacity; fits a device info reply with room to spare
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Stateful frame splitter
#[derive(Debug)]
pub struct StreamParser {
    buffer: BytesMut,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append `chunk` and extract every complete frame
    ///
    /// Each pass takes at most one response frame and then, from the
    /// advanced buffer, at most one data frame of `data_len` bytes. Passes
    /// repeat until nothing more can be extracted. A `data_len` below the
    /// minimum data frame size disables data framing.
    pub fn feed(&mut self, chunk: &[u8], data_len: usize) -> Vec<Packet> {
        self.buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        loop {
            let before = packets.len();

            if self.buffer.starts_with(&RESPONSE_START) && self.buffer.len() >= FRAME_SIZE {
                let raw = self.buffer.split_to(FRAME_SIZE).freeze();
                trace!("Response frame: {:02X?}", &raw[..]);
                packets.push(Packet::Response(ResponsePacket::from_frame(raw)));
            }

            if data_len >= MIN_DATA_FRAME_SIZE
                && self.buffer.starts_with(&DATA_START)
                && self.buffer.len() >= data_len
            {
                let raw = self.buffer.split_to(data_len).freeze();
                trace!("Data frame: {} bytes", raw.len());
                packets.push(Packet::Data(DataPacket::from_frame(raw)));
            }

            if packets.len() == before {
                break;
            }
        }

        packets
    }

    /// Number of bytes waiting for more input
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take every unresolved byte, leaving the parser empty
    pub fn flush(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}
