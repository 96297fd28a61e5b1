//! Fuzz target: `Aggregation`
//!
//! Splits the input into lines, folds them into per-minute and per-day
//! aggregations and renders the CSV.  Checks:
//! - No panics on arbitrary log content
//! - Every line is either accepted or skipped
//! - The CSV has one header plus one row per bucket
//!
//! cargo fuzz run fuzz_aggregate

#![no_main]

use libfuzzer_sys::fuzz_target;
use moundctl::aggregate::{AggregateOptions, Aggregation, Granularity};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    for granularity in [Granularity::Minute, Granularity::Day] {
        let mut agg = Aggregation::new(AggregateOptions {
            granularity,
            ..AggregateOptions::default()
        });
        let lines = text.lines().count();
        agg.read_from(text.as_bytes()).unwrap();
        assert_eq!(agg.accepted() + agg.skipped(), lines);

        let mut csv = Vec::new();
        agg.write_csv(&mut csv).unwrap();
        let rows = csv.iter().filter(|&&b| b == b'\n').count();
        assert_eq!(rows, 1 + agg.buckets().count());
    }
});
