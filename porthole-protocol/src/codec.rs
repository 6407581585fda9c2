//! Codec for zero-byte delimited frames
//!
//! Frame format:
//! ```text
//! ┌──────────────────────┬──────┐
//! │ JSON payload         │ 0x00 │
//! │ 1..=256 bytes        │ 1 B  │
//! └──────────────────────┴──────┘
//! ```
//!
//! The codec only deals in raw payload bytes; turning them into messages is
//! the job of [`crate::message`].

use crate::constants::{FRAME_DELIMITER, MAX_FRAME_LENGTH};
use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Zero-byte delimited frame codec
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    max_frame_length: usize,
    // Bytes of the read buffer already scanned for a delimiter.
    next_index: usize,
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self {
            max_frame_length: MAX_FRAME_LENGTH,
            next_index: 0,
        }
    }
}

impl DelimitedCodec {
    /// Create a codec with the protocol's maximum frame length
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom maximum frame length
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            next_index: 0,
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Decoder for DelimitedCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A legal delimiter sits at index max_frame_length at the latest.
        let read_to = src.len().min(self.max_frame_length + 1);
        let offset = self.next_index.min(read_to);

        match src[offset..read_to]
            .iter()
            .position(|b| *b == FRAME_DELIMITER)
        {
            Some(pos) => {
                let end = offset + pos;
                self.next_index = 0;

                if end == 0 {
                    src.advance(1);
                    return Err(ProtocolError::EmptyFrame);
                }

                let frame = src.split_to(end).freeze();
                src.advance(1);
                Ok(Some(frame))
            }
            None if src.len() > self.max_frame_length => {
                self.next_index = 0;
                Err(ProtocolError::too_large(src.len(), self.max_frame_length))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(ProtocolError::TruncatedFrame {
                buffered: buf.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for DelimitedCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if frame.len() > self.max_frame_length {
            return Err(ProtocolError::too_large(
                frame.len(),
                self.max_frame_length,
            ));
        }

        dst.reserve(frame.len() + 1);
        dst.put_slice(&frame);
        dst.put_u8(FRAME_DELIMITER);
        Ok(())
    }
}
