//! Fuzz target for line framing
//!
//! Splits the input at an arbitrary point and checks the codec yields the
//! same lines as when the bytes arrive in one read.

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use slirc_client::LineCodec;
use tokio_util::codec::Decoder;

fn drain(codec: &mut LineCodec, buf: &mut BytesMut, out: &mut Vec<String>) {
    while let Ok(Some(line)) = codec.decode(buf) {
        out.push(line);
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let split = data[0] as usize % data.len();
    let body = &data[1..];
    let split = split.min(body.len());

    let mut whole = Vec::new();
    drain(&mut LineCodec::new(), &mut BytesMut::from(body), &mut whole);

    let mut chunked = Vec::new();
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from(&body[..split]);
    drain(&mut codec, &mut buf, &mut chunked);
    buf.extend_from_slice(&body[split..]);
    drain(&mut codec, &mut buf, &mut chunked);

    assert_eq!(whole, chunked);
});
