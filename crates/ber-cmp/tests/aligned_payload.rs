use ber_cmp::{compare, CompareSpec, ComparisonOutcome};
use ber_core::Bitstream;

const PAYLOAD: [u8; 35] = [
    240, 240, 240, 15, 15, 15, 240, 240, 240, 10, 38, 33, 10, 74, 72, 11, 6, 34, 15, 15, 15, 240,
    240, 240, 15, 15, 15, 0, 0, 0, 0, 0, 0, 0, 0,
];

fn received_with_preamble(offset: usize) -> Vec<u8> {
    let preamble = (0..offset).map(|idx| idx % 3 == 0);
    let payload = Bitstream::from_bytes(PAYLOAD.to_vec());
    let stream = Bitstream::from_bits(preamble.chain(payload.bits()));
    stream.as_bytes().to_vec()
}

fn spec() -> CompareSpec {
    CompareSpec::new(216, 49.0).unwrap()
}

#[test]
fn aligned_payload_has_zero_mismatches() {
    let sent = Bitstream::from_bytes(PAYLOAD.to_vec());
    let received = Bitstream::from_bytes(received_with_preamble(49));
    assert_eq!(
        compare(&sent, &received, &spec()),
        ComparisonOutcome::Mismatches(0)
    );
}

#[test]
fn replaced_byte_counts_hamming_weight_of_xor() {
    let sent = Bitstream::from_bytes(PAYLOAD.to_vec());
    let original = received_with_preamble(49);
    // Byte 10 spans bits 80..88, inside the window 49..265.
    for replacement in [0x00u8, 0xff, 0x5a, original[10] ^ 0x01] {
        let mut corrupted = original.clone();
        corrupted[10] = replacement;
        let expected = (original[10] ^ replacement).count_ones() as usize;
        assert_eq!(
            compare(&sent, &Bitstream::from_bytes(corrupted), &spec()),
            ComparisonOutcome::Mismatches(expected)
        );
    }
}

#[test]
fn fully_inverted_byte_counts_eight() {
    let sent = Bitstream::from_bytes(PAYLOAD.to_vec());
    let mut corrupted = received_with_preamble(49);
    corrupted[20] = !corrupted[20];
    assert_eq!(
        compare(&sent, &Bitstream::from_bytes(corrupted), &spec()),
        ComparisonOutcome::Mismatches(8)
    );
}

#[test]
fn corruption_outside_window_is_ignored() {
    let sent = Bitstream::from_bytes(PAYLOAD.to_vec());
    let mut corrupted = received_with_preamble(49);
    corrupted[0] = !corrupted[0];
    let last = corrupted.len() - 1;
    corrupted[last] = !corrupted[last];
    assert_eq!(
        compare(&sent, &Bitstream::from_bytes(corrupted), &spec()),
        ComparisonOutcome::Mismatches(0)
    );
}

#[test]
fn compare_spec_deserializes_with_validation() {
    let spec: CompareSpec = serde_yaml::from_str("length_bits: 216\noffset_bits: 0.98\n").unwrap();
    assert_eq!(spec.resolved_offset(), 0);
    let defaulted: CompareSpec = serde_yaml::from_str("offset_bits: 49\n").unwrap();
    assert_eq!(defaulted.length_bits(), 216);
    assert!(serde_yaml::from_str::<CompareSpec>("offset_bits: -3\n").is_err());
    let json = serde_json::to_string(&spec).unwrap();
    assert_eq!(json, r#"{"length_bits":216,"offset_bits":0.98}"#);
}
