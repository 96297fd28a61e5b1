//! Sensor id → human name → display colour.
//!
//! Static table for the probes buried in the mound and the house sensors
//! that share the same log.  Unknown ids get a fabricated name so they
//! still group consistently in the aggregated tables.

use core::fmt;
use core::str::FromStr;
use std::borrow::Cow;

/// Sensor families that appear in the data log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Ds18b20,
    Bme280,
    Si7021,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [Self::Ds18b20, Self::Bme280, Self::Si7021];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ds18b20 => "DS18B20",
            Self::Bme280 => "BME280",
            Self::Si7021 => "Si7021",
        }
    }

    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Ds18b20 => DS18B20_NAMES,
            Self::Bme280 => BME280_NAMES,
            Self::Si7021 => SI7021_NAMES,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sensor type {s:?}"))
    }
}

// Retired probes keep their entries so old log lines still resolve; a
// replacement probe reuses the name of the one it replaced.
const DS18B20_NAMES: &[(&str, &str)] = &[
    ("28.ff.b5.45.92.16.05.aa", "pipe_outlet"),
    ("28.ff.ed.77.45.16.03.f0", "pipe_outlet_old"),
    ("28.ff.0b.f1.92.16.04.86", "pipe_inlet"),
    ("28.ff.1d.8c.50.16.04.4f", "sensor_A"),
    ("28.ff.a6.e8.92.16.04.f2", "sensor_F"),
    ("28.ff.7c.e5.92.16.04.8c", "sensor_G"),
    ("28.ff.81.51.00.16.01.01", "sensor_H"),
    ("28.ff.25.95.55.16.03.e8", "sensor_I"),
    ("28.ff.88.45.92.16.05.c2", "sensor_K"),
    ("28.ff.d7.39.93.16.04.77", "sensor_L"),
    ("28.ff.59.89.92.16.05.7a", "sensor_M"),
    ("28.ff.e2.42.92.16.05.e8", "sensor_M"),
    ("28.ff.90.86.92.16.05.31", "sensor_N"),
    ("28.ff.ce.83.92.16.05.87", "sensor_O"),
    ("28.ff.d0.49.92.16.05.7b", "sensor_P"),
    ("28.ff.c7.54.90.16.05.bc", "sensor_Q"),
    ("28.ff.2b.f7.92.16.04.77", "sensor_R"),
    ("28.ff.12.67.90.16.05.f0", "sensor_S"),
    ("28.ff.cf.f3.92.16.04.bc", "sensor_T"),
    ("28.ff.45.43.92.16.05.05", "sensor_T"),
    ("28.ff.ee.48.92.16.05.d2", "sensor_U"),
    ("28.ff.25.6a.90.16.05.b8", "sensor_V"),
    ("28.ff.73.58.90.16.05.fe", "sensor_X"),
    ("28.ff.13.84.92.16.05.b3", "sensor_Z"),
    ("28.ff.6d.b0.00.16.02.de", "monitor_ambient_1"),
    ("28.ff.77.a9.00.16.02.b4", "monitor_ambient_2"),
    ("28.ff.e2.2b.55.16.03.1f", "pool_water_return"),
    ("28.ff.03.9f.51.16.04.8a", "pool_water_return_ambient"),
    ("28.ff.37.29.92.16.05.60", "TBD_sensor_B"),
    ("28.ff.de.37.93.16.04.91", "TBD_sensor_C"),
    ("28.ff.0a.25.92.16.05.1a", "TBD_sensor_D"),
    ("28.ff.ec.f6.92.16.04.8b", "TBD_sensor_E"),
    ("28.ff.a7.e8.92.16.04.3f", "TBD_sensor_J"),
    ("28.ff.ad.4c.92.16.05.7b", "TBD_sensor_AA"),
    ("28.ff.6d.23.92.16.05.53", "TBD_sensor_AB"),
    ("28.ff.a2.ef.92.16.04.6b", "TBD_sensor_CD"),
    ("28.ff.c0.83.92.16.05.25", "TBD_sensor_EF"),
    ("28.ff.65.fd.92.16.04.27", "TBD_sensor_GH"),
];

const BME280_NAMES: &[(&str, &str)] = &[
    ("000000005eb857ba", "attic"),
    ("000000005c42c396", "living_room"),
    ("00000000e013dbae", "north_ambient"),
    ("00000000f0d72ad2", "north_crawl_space"),
    ("00000000fcf52270", "rec_room"),
    ("0478d0c8e17b84a9bcef9c32c38d2a07", "rec_room"),
    ("cde66edd76c727af62dee27071cb76b4", "living_room"),
    ("ed8828854b0f744b76125be990c8f7d2", "attic"),
    ("ee55c8aaea4ead890272e7b3896f1e58", "north_crawl_space"),
];

const SI7021_NAMES: &[(&str, &str)] = &[("00000000ea2582d5", "rec-room")];

const COLORS: &[(&str, &str)] = &[
    ("pipe_inlet", "lightblue"),
    ("pipe_East", "aqua"),
    ("pipe_West", "aquamarine"),
    ("pipe_outlet", "navy"),
    ("sensor_F", "magenta"),
    ("sensor_G", "lime"),
    ("sensor_I", "tan"),
    ("sensor_K", "olive"),
    ("sensor_L", "orange"),
    ("sensor_M", "plum"),
    ("sensor_N", "salmon"),
    ("sensor_O", "red"),
    ("sensor_P", "pink"),
    ("sensor_Q", "orchid"),
    ("sensor_R", "indigo"),
    ("sensor_S", "goldenrod"),
    ("sensor_T", "darkgreen"),
    ("sensor_U", "coral"),
    ("sensor_V", "crimson"),
    ("sensor_X", "brown"),
    ("sensor_Z", "green"),
    ("monitor_ambient_1", "yellow"),
    ("monitor_ambient_2", "beige"),
    ("pool_water_return", "blue"),
];

/// Colour used for names without an entry.
pub const DEFAULT_COLOR: &str = "black";

/// Known name for `(kind, id)`, or `no_name_for_<kind>_<id>`.
pub fn name_for(kind: SensorKind, id: &str) -> Cow<'static, str> {
    kind.table()
        .iter()
        .find(|(known, _)| *known == id)
        .map_or_else(
            || Cow::Owned(format!("no_name_for_{kind}_{id}")),
            |(_, name)| Cow::Borrowed(*name),
        )
}

/// Display colour for a sensor name.
pub fn color_for(name: &str) -> &'static str {
    COLORS
        .iter()
        .find(|(known, _)| *known == name)
        .map_or(DEFAULT_COLOR, |&(_, color)| color)
}

/// Every `(id, name)` pair known for `kind`, in table order.
pub fn entries(kind: SensorKind) -> impl Iterator<Item = (&'static str, &'static str)> {
    kind.table().iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_id_resolves() {
        assert_eq!(name_for(SensorKind::Ds18b20, "28.ff.90.86.92.16.05.31"), "sensor_N");
        assert_eq!(name_for(SensorKind::Bme280, "000000005eb857ba"), "attic");
    }

    #[test]
    fn replacement_probe_shares_name() {
        assert_eq!(
            name_for(SensorKind::Ds18b20, "28.ff.59.89.92.16.05.7a"),
            name_for(SensorKind::Ds18b20, "28.ff.e2.42.92.16.05.e8"),
        );
    }

    #[test]
    fn unknown_id_gets_fabricated_name() {
        assert_eq!(name_for(SensorKind::Bme280, "0"), "no_name_for_BME280_0");
    }

    #[test]
    fn id_lookup_is_per_kind() {
        let name = name_for(SensorKind::Si7021, "28.ff.e2.2b.55.16.03.1f");
        assert_eq!(name, "no_name_for_Si7021_28.ff.e2.2b.55.16.03.1f");
    }

    #[test]
    fn colors_with_fallback() {
        assert_eq!(color_for("sensor_N"), "salmon");
        assert_eq!(color_for("attic"), DEFAULT_COLOR);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("ds18b20".parse::<SensorKind>(), Ok(SensorKind::Ds18b20));
        assert!("DS18B20a".parse::<SensorKind>().is_err());
    }
}
