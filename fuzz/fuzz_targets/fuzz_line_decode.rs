#![no_main]

use libfuzzer_sys::fuzz_target;
use wmbus_rx::wmbus::block::{strip_any, strip_format_a, strip_format_b};
use wmbus_rx::wmbus::encoding::{decode_3of6, decoded_size, encode_3of6};

fuzz_target!(|data: &[u8]| {
    if let Ok(decoded) = decode_3of6(data) {
        assert_eq!(decoded.len(), decoded_size(data.len()));
    }

    // Encoding is always reversible
    let coded = encode_3of6(data);
    assert_eq!(decode_3of6(&coded).as_deref(), Ok(data));

    let _ = strip_format_a(data, true);
    let _ = strip_format_b(data, false);
    let _ = strip_any(data);
});
