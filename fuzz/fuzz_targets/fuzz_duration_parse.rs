#![no_main]

use cadence_core::duration::{parse_duration, parse_signed_millis};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let signed = parse_signed_millis(s);
    let unsigned = parse_duration(s);

    // Both parsers agree on everything non-negative.
    if let Ok(ms) = signed {
        if ms >= 0 {
            let d = unsigned.expect("non-negative millis must parse as a duration");
            assert_eq!(d.as_millis(), u128::from(ms.unsigned_abs()));
        } else {
            assert!(unsigned.is_err());
        }
    } else {
        assert!(unsigned.is_err());
    }
});
