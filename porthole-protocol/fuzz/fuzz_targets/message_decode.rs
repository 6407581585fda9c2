#![no_main]

use bytes::BytesMut;
use porthole_protocol::codec::DelimitedCodec;
use porthole_protocol::ServerMessage;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Raw payloads straight into the message decoder
    let _ = ServerMessage::decode(data);

    // And the same bytes as they would arrive off the wire
    let mut codec = DelimitedCodec::new();
    let mut buf = BytesMut::from(data);
    if let Ok(Some(frame)) = codec.decode(&mut buf) {
        let _ = ServerMessage::decode(&frame);
    }
});
