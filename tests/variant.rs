//! Property-based tests for the variant record codec
//!
//! The round-trip law must hold for every representable record, entry
//! order must survive the wire, and malformed input must fail with the
//! recoverable codec error class rather than panicking.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use packet_relay::core::variant::{VariantRecord, VariantValue};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = VariantValue> {
    prop_oneof![
        (-1.0e6f32..1.0e6).prop_map(VariantValue::Float),
        "[a-zA-Z0-9_]{0,64}".prop_map(VariantValue::String),
        ((-1.0e6f32..1.0e6), (-1.0e6f32..1.0e6)).prop_map(|(x, y)| VariantValue::Vec2(x, y)),
        ((-1.0e6f32..1.0e6), (-1.0e6f32..1.0e6), (-1.0e6f32..1.0e6))
            .prop_map(|(x, y, z)| VariantValue::Vec3(x, y, z)),
        any::<u32>().prop_map(VariantValue::Unsigned),
        any::<i32>().prop_map(VariantValue::Signed),
        prop::collection::vec(any::<u8>(), 0..256).prop_map(VariantValue::Bytes),
    ]
}

fn arb_record() -> impl Strategy<Value = VariantRecord> {
    prop::collection::vec(("[a-zA-Z][a-zA-Z0-9_]{0,30}", arb_value()), 0..16).prop_map(
        |entries| {
            let mut record = VariantRecord::new();
            for (name, value) in entries {
                record.push(name, value);
            }
            record
        },
    )
}

proptest! {
    // decode(encode(r)) == r for every representable record
    #[test]
    fn prop_roundtrip_law(record in arb_record()) {
        let decoded = VariantRecord::decode(&record.encode()).expect("roundtrip decode");
        prop_assert_eq!(decoded, record);
    }

    // Entry order is preserved; positional consumers rely on it
    #[test]
    fn prop_order_preserved(record in arb_record()) {
        let decoded = VariantRecord::decode(&record.encode()).expect("decode");
        let original: Vec<&str> = record.entries().iter().map(|e| e.name.as_str()).collect();
        let restored: Vec<&str> = decoded.entries().iter().map(|e| e.name.as_str()).collect();
        prop_assert_eq!(original, restored);
    }

    // Any truncation of a valid encoding fails with a codec-class error
    #[test]
    fn prop_truncation_is_codec_error(record in arb_record(), cut_fraction in 0.0f64..1.0) {
        let encoded = record.encode();
        prop_assume!(encoded.len() > 2);
        let cut = 1 + ((encoded.len() - 2) as f64 * cut_fraction) as usize;

        match VariantRecord::decode(&encoded[..cut]) {
            Ok(decoded) => {
                // A prefix can only parse if it happens to be a complete
                // shorter record, which exact-consumption rules out here.
                prop_assert_eq!(decoded, record);
            }
            Err(e) => prop_assert!(e.is_codec(), "non-codec error {e:?} at cut {cut}"),
        }
    }

    // Arbitrary bytes never panic the decoder
    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = VariantRecord::decode(&bytes);
    }
}
