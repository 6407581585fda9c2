#![no_main]

use bytes::BytesMut;
use porthole_protocol::codec::DelimitedCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = DelimitedCodec::new();
    let mut buf = BytesMut::from(data);

    // Drain every frame; decoding must never panic and never yield an
    // oversized or empty frame.
    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        assert!(!frame.is_empty());
        assert!(frame.len() <= codec.max_frame_length());
    }
    let _ = codec.decode_eof(&mut buf);
});
