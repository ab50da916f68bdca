#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use packet_relay::core::codec::PacketCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Fuzz frame extraction - test for panics, crashes, runaway allocation
    let mut codec = PacketCodec::default();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
