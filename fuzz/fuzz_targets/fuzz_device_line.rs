//! Fuzz target: `parse_device_line` and `Reading::from_str`
//!
//! Feeds arbitrary (lossily decoded) bytes to both parsers and checks:
//! - No panics under any byte sequence
//! - An accepted device line carries a finite value and a non-empty id
//! - The record form of an accepted reading parses back to the same reading
//!
//! cargo fuzz run fuzz_device_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use moundctl::sensors::{Reading, Timestamp, parse_device_line};

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let stamp: Timestamp = "2019.06.02_14:00:00".parse().unwrap();

    if let Ok(reading) = parse_device_line(&line, stamp) {
        assert!(reading.value.is_finite());
        assert!(!reading.sensor_id.is_empty());

        let back: Reading = reading.to_string().parse().unwrap();
        assert_eq!(back, reading);
    }

    let _ = line.parse::<Reading>();
});
