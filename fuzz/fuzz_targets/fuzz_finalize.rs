#![no_main]

use libfuzzer_sys::fuzz_target;
use wmbus_rx::config::DecodePolicy;
use wmbus_rx::wmbus::packet::Packet;

fuzz_target!(|data: &[u8]| {
    let policy = DecodePolicy::default();

    // Length estimation on the header must never panic
    let mut packet = Packet::from_capture(data.to_vec());
    let _ = packet.expected_size();
    let _ = packet.finalize(&policy);

    // Force both C1 layouts so the block handling sees arbitrary L-fields
    for marker in [0xCD, 0x3D] {
        let mut capture = vec![0x54, marker];
        capture.extend_from_slice(data);
        if let Ok(frame) = Packet::from_capture(capture).finalize(&policy) {
            assert!(!frame.is_empty());
        }
    }

    let lenient = DecodePolicy {
        verify_format_a_crc: false,
        verify_format_b_crc: false,
        ..DecodePolicy::default()
    };
    let _ = Packet::from_capture(data.to_vec()).finalize(&lenient);
});
