//! Controller configuration parameters
//!
//! All tunable parameters for the mound controller.
//! Values can be overridden from a JSON file (see [`JsonConfigFile`](crate::adapters::config_file::JsonConfigFile));
//! any field missing from the file keeps its default.

use core::time::Duration;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Depth of the log sink queue.  Producers block when it is full.
pub const SINK_CAPACITY: usize = 30;

/// Core controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Cadence ---
    /// Sampling interval while the pump is idle (milliseconds)
    pub base_interval_ms: u64,
    /// Sampling interval for the watched devices while pumping (milliseconds)
    pub fast_interval_ms: u64,
    /// Pause after a cadence or actuator change (milliseconds)
    pub settle_delay_ms: u64,
    /// Pause after the pump starts before the threshold is checked (milliseconds)
    pub warmup_delay_ms: u64,
    /// Time the pile is left to re-heat between pump runs (milliseconds)
    pub reheat_ms: u64,
    /// Background-only sampling before the first pump cycle (milliseconds)
    pub startup_delay_ms: u64,

    // --- Control ---
    /// Pump keeps running while the watched value is at or above this
    pub pump_threshold: f64,
    /// Sensor id whose value drives the pump
    pub watched_sensor_id: String,

    // --- Devices ---
    /// Serial device paths to probe; a trailing `*` matches any suffix
    pub device_patterns: Vec<String>,
    /// Serial line speed
    pub baud_rate: u32,
    /// Time the controllers need after the port is opened (they reset on open)
    pub device_reset_ms: u64,
    /// Per-line read timeout (milliseconds)
    pub read_timeout_ms: u64,
    /// Upper bound on one device round (milliseconds)
    pub round_timeout_ms: u64,

    // --- Actuator ---
    /// BCM number of the GPIO that switches the pump relay
    pub pump_gpio: u32,
    /// Relay board switches on when the pin is driven low
    pub pump_active_low: bool,

    // --- Output ---
    /// Append-only data log
    pub log_path: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let base_interval_ms = 58_000; // a bit more often than once a minute
        let fast_interval_ms = 4_000;
        Self {
            // Cadence
            base_interval_ms,
            fast_interval_ms,
            settle_delay_ms: 2 * fast_interval_ms,
            warmup_delay_ms: 30_000,
            reheat_ms: 90 * 60 * 1000, // 1.5 h
            startup_delay_ms: 2 * base_interval_ms + 5_000,

            // Control
            pump_threshold: 40.0,
            watched_sensor_id: "28.ff.90.86.92.16.05.31".to_string(),

            // Devices
            device_patterns: vec!["/dev/ttyUSB*".to_string(), "/dev/ttyACM*".to_string()],
            baud_rate: 115_200,
            device_reset_ms: 3_000,
            read_timeout_ms: 2_000,
            round_timeout_ms: 10_000,

            // Actuator
            pump_gpio: 17,
            pump_active_low: true,

            // Output
            log_path: PathBuf::from("/var/log/mound_controller.log"),
        }
    }
}

impl ControllerConfig {
    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_interval_ms == 0 || self.fast_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("sampling intervals must be non-zero"));
        }
        if self.fast_interval_ms > self.base_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "fast_interval_ms must not exceed base_interval_ms",
            ));
        }
        if self.settle_delay_ms < self.fast_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "settle_delay_ms must cover at least one fast interval",
            ));
        }
        if !self.pump_threshold.is_finite() {
            return Err(ConfigError::ValidationFailed("pump_threshold must be finite"));
        }
        if self.watched_sensor_id.trim().is_empty()
            || self.watched_sensor_id.split_whitespace().count() != 1
        {
            return Err(ConfigError::ValidationFailed(
                "watched_sensor_id must be a single non-empty token",
            ));
        }
        if self.device_patterns.is_empty() {
            return Err(ConfigError::ValidationFailed("device_patterns must not be empty"));
        }
        if self.read_timeout_ms == 0 || self.round_timeout_ms < self.read_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "round_timeout_ms must be at least read_timeout_ms (and both non-zero)",
            ));
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }

    pub fn reheat(&self) -> Duration {
        Duration::from_millis(self.reheat_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn device_reset(&self) -> Duration {
        Duration::from_millis(self.device_reset_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = ControllerConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.settle_delay_ms, 2 * c.fast_interval_ms);
        assert_eq!(c.startup_delay_ms, 2 * c.base_interval_ms + 5_000);
    }

    #[test]
    fn serde_roundtrip() {
        let c = ControllerConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: ControllerConfig = serde_json::from_str(&json).unwrap();
        assert!((c.pump_threshold - c2.pump_threshold).abs() < f64::EPSILON);
        assert_eq!(c.watched_sensor_id, c2.watched_sensor_id);
        assert_eq!(c.device_patterns, c2.device_patterns);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let c: ControllerConfig = serde_json::from_str(r#"{"pump_threshold": 53.0}"#).unwrap();
        assert!((c.pump_threshold - 53.0).abs() < f64::EPSILON);
        assert_eq!(c.fast_interval_ms, 4_000);
        assert_eq!(c.pump_gpio, 17);
    }

    #[test]
    fn zero_interval_rejected() {
        let c = ControllerConfig {
            fast_interval_ms: 0,
            ..ControllerConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn short_settle_delay_rejected() {
        let c = ControllerConfig {
            settle_delay_ms: 1_000,
            ..ControllerConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn watched_id_with_spaces_rejected() {
        let c = ControllerConfig {
            watched_sensor_id: "28.ff 90".to_string(),
            ..ControllerConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let c = ControllerConfig::default();
        assert_eq!(c.reheat(), Duration::from_secs(5_400));
        assert_eq!(c.fast_interval(), Duration::from_secs(4));
    }
}
