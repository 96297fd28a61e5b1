//! Offline aggregation of the data log into per-minute or per-day means.
//!
//! ```text
//! 2019.01.01_00:00:05 s1 10.0      "when","s1"
//! 2019.01.01_00:00:40 s1 20.0  ─▶  "2019.01.01_00:00",15.0000
//! 2019.01.01_00:01:02 s1 11.0      "2019.01.01_00:01",11.0000
//! ```
//!
//! Buckets are the first 16 (minute) or 10 (day) characters of the
//! timestamp.  Columns are sensor ids, or names when a sensor table is
//! selected; ids that share a name share a column.  Event lines and lines
//! outside the accepted years are skipped and reported.

use core::fmt;
use core::ops::RangeInclusive;
use core::str::FromStr;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, Write};

use log::{debug, warn};

use crate::app::events::EVENT_MARKER;
use crate::sensors::names::{self, SensorKind};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    #[default]
    Minute,
    Day,
}

impl Granularity {
    /// Timestamp prefix length that identifies a bucket.
    pub const fn prefix_len(self) -> usize {
        match self {
            Self::Minute => 16,
            Self::Day => 10,
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" | "1m" => Ok(Self::Minute),
            "day" | "1d" => Ok(Self::Day),
            other => Err(format!("unknown granularity {other:?} (expected minute or day)")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    pub granularity: Granularity,
    /// Accepted years; `None` accepts any year.
    pub years: Option<RangeInclusive<u16>>,
    /// Map sensor ids to names through this table.
    pub names: Option<SensorKind>,
}

// ---------------------------------------------------------------------------
// Skips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Not exactly three fields.
    TokenCount(usize),
    /// A control event, not a reading.
    Event,
    /// Timestamp too short or without a leading year.
    Timestamp,
    /// Year outside the accepted range.
    Year(u16),
    /// Value is not a finite number.
    Value,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenCount(n) => write!(f, "expected 3 fields, got {n}"),
            Self::Event => f.write_str("event line"),
            Self::Timestamp => f.write_str("bad timestamp"),
            Self::Year(y) => write!(f, "year {y} not accepted"),
            Self::Value => f.write_str("value is not a number"),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

/// Accumulated means per (bucket, sensor).
#[derive(Debug, Default)]
pub struct Aggregation {
    options: AggregateOptions,
    buckets: BTreeMap<String, BTreeMap<String, Mean>>,
    sensors: BTreeSet<String>,
    accepted: usize,
    skipped: usize,
}

impl Aggregation {
    pub fn new(options: AggregateOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Lines that contributed a value.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Column names in output order.
    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(String::as_str)
    }

    /// Bucket keys in output order.
    pub fn buckets(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn mean(&self, bucket: &str, sensor: &str) -> Option<f64> {
        self.buckets.get(bucket)?.get(sensor).map(|m| m.get())
    }

    /// Fold one log line into the aggregation.
    pub fn add_line(&mut self, line: &str) -> Result<(), SkipReason> {
        let cleaned: String = line.chars().filter(|&c| c != '\0').collect();
        let fields: Vec<&str> = cleaned.split_whitespace().collect();
        let [stamp, id, value] = fields[..] else {
            return Err(SkipReason::TokenCount(fields.len()));
        };
        if id == EVENT_MARKER {
            return Err(SkipReason::Event);
        }

        let bucket = stamp
            .get(..self.options.granularity.prefix_len())
            .ok_or(SkipReason::Timestamp)?;
        let year: u16 = stamp
            .get(..4)
            .and_then(|y| y.parse().ok())
            .ok_or(SkipReason::Timestamp)?;
        if let Some(years) = &self.options.years {
            if !years.contains(&year) {
                return Err(SkipReason::Year(year));
            }
        }
        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or(SkipReason::Value)?;

        let column = match self.options.names {
            Some(kind) => names::name_for(kind, id).into_owned(),
            None => id.to_string(),
        };

        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .entry(column.clone())
            .or_default()
            .add(value);
        self.sensors.insert(column);
        self.accepted += 1;
        Ok(())
    }

    /// Read every line of `input`, reporting skipped lines with their
    /// 1-based line number.
    pub fn read_from<R: BufRead>(&mut self, mut input: R) -> io::Result<()> {
        let mut raw = Vec::new();
        let mut line_no = 0usize;
        loop {
            raw.clear();
            if input.read_until(b'\n', &mut raw)? == 0 {
                return Ok(());
            }
            line_no += 1;
            let line = String::from_utf8_lossy(&raw);
            if let Err(reason) = self.add_line(&line) {
                self.skipped += 1;
                let shown = line.trim_end();
                match reason {
                    SkipReason::Event => debug!("line {line_no}: {reason}: {shown:?}"),
                    _ => warn!("line {line_no}: {reason}: {shown:?}"),
                }
            }
        }
    }

    /// Write the table as CSV.  Cells without data are left empty.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "\"when\"")?;
        for sensor in &self.sensors {
            write!(out, ",\"{sensor}\"")?;
        }
        writeln!(out)?;

        for (bucket, means) in &self.buckets {
            write!(out, "\"{bucket}\"")?;
            for sensor in &self.sensors {
                match means.get(sensor) {
                    Some(m) => write!(out, ",{:.4}", m.get())?,
                    None => write!(out, ",")?,
                }
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(agg: &Aggregation) -> String {
        let mut out = Vec::new();
        agg.write_csv(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn minute_buckets_average() {
        let mut agg = Aggregation::new(AggregateOptions::default());
        agg.read_from(
            "2019.01.01_00:00:05 s1 10.0\n2019.01.01_00:00:40 s1 20.0\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(csv(&agg), "\"when\",\"s1\"\n\"2019.01.01_00:00\",15.0000\n");
    }

    #[test]
    fn day_buckets_use_ten_chars() {
        let mut agg = Aggregation::new(AggregateOptions {
            granularity: Granularity::Day,
            ..AggregateOptions::default()
        });
        agg.add_line("2019.01.01_00:00:05 s1 10.0").unwrap();
        agg.add_line("2019.01.01_23:59:59 s1 12.0").unwrap();
        agg.add_line("2019.01.02_00:00:00 s1 1.0").unwrap();
        assert_eq!(agg.buckets().collect::<Vec<_>>(), ["2019.01.01", "2019.01.02"]);
        assert_eq!(agg.mean("2019.01.01", "s1"), Some(11.0));
    }

    #[test]
    fn missing_cells_are_empty_and_columns_sorted() {
        let mut agg = Aggregation::new(AggregateOptions::default());
        agg.add_line("2019.01.01_00:00:05 zeta 1.0").unwrap();
        agg.add_line("2019.01.01_00:01:05 alpha 2.5").unwrap();
        assert_eq!(
            csv(&agg),
            "\"when\",\"alpha\",\"zeta\"\n\
             \"2019.01.01_00:00\",,1.0000\n\
             \"2019.01.01_00:01\",2.5000,\n"
        );
    }

    #[test]
    fn skips_events_years_and_junk() {
        let mut agg = Aggregation::new(AggregateOptions {
            years: Some(2017..=2019),
            ..AggregateOptions::default()
        });
        assert_eq!(
            agg.add_line("2019.01.01_00:00:05 EVENT turned_on_pump"),
            Err(SkipReason::Event)
        );
        assert_eq!(
            agg.add_line("2020.01.01_00:00:05 s1 1.0"),
            Err(SkipReason::Year(2020))
        );
        assert_eq!(agg.add_line("a b"), Err(SkipReason::TokenCount(2)));
        assert_eq!(agg.add_line("2019.01.01_00:00:05 s1 warm"), Err(SkipReason::Value));
        assert_eq!(agg.add_line("2019.01 s1 1.0"), Err(SkipReason::Timestamp));

        agg.read_from("x\n2019.01.01_00:00:05 s1 1.0\n".as_bytes()).unwrap();
        assert_eq!(agg.accepted(), 1);
        assert_eq!(agg.skipped(), 1);
    }

    #[test]
    fn nul_bytes_are_ignored() {
        let mut agg = Aggregation::new(AggregateOptions::default());
        agg.add_line("\0\02019.01.01_00:00:05 s1 4.0\0").unwrap();
        assert_eq!(agg.mean("2019.01.01_00:00", "s1"), Some(4.0));
    }

    #[test]
    fn names_merge_replacement_probes() {
        let mut agg = Aggregation::new(AggregateOptions {
            names: Some(SensorKind::Ds18b20),
            ..AggregateOptions::default()
        });
        agg.add_line("2019.01.01_00:00:05 28.ff.59.89.92.16.05.7a 10.0").unwrap();
        agg.add_line("2019.01.01_00:00:06 28.ff.e2.42.92.16.05.e8 20.0").unwrap();
        assert_eq!(agg.sensors().collect::<Vec<_>>(), ["sensor_M"]);
        assert_eq!(agg.mean("2019.01.01_00:00", "sensor_M"), Some(15.0));
    }

    #[test]
    fn granularity_parses() {
        assert_eq!("Day".parse::<Granularity>(), Ok(Granularity::Day));
        assert!("hour".parse::<Granularity>().is_err());
    }
}
