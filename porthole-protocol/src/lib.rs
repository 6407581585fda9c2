//! `porthole` wire protocol
//!
//! Messages are JSON values, one per frame, each frame terminated by a single
//! zero byte. This crate holds the frame codec, the message types for both
//! directions and the errors raised while decoding them.

pub mod codec;
pub mod constants;
pub mod error;
pub mod message;

pub use codec::DelimitedCodec;
pub use error::ProtocolError;
pub use message::{ClientMessage, ServerMessage};
