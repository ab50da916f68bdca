#![no_main]

use libfuzzer_sys::fuzz_target;
use packet_relay::core::variant::VariantRecord;

fuzz_target!(|data: &[u8]| {
    // Fuzz variant record decoding - malformed records must error, not panic
    if let Ok(record) = VariantRecord::decode(data) {
        // Whatever decodes must also re-encode without panicking
        let _ = record.encode();
    }
});
