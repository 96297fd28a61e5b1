//! Startup discovery: split the opened devices into the ones carrying the
//! watched sensor and everything else.
//!
//! Every device is probed once, concurrently.  A device is *watched* when
//! any well-formed line of its probe round names the watched sensor id.
//! Probe rounds are not logged.

use std::thread;

use log::{info, warn};

use crate::app::ports::BoxedDevice;
use crate::error::DiscoveryError;
use crate::sensors::{Timestamp, parse_device_line};

/// The two disjoint device collections the controller works with.
pub struct DeviceSets {
    /// Devices that reported the watched sensor; sampled fast while pumping.
    pub watched: Vec<BoxedDevice>,
    /// Everything else; sampled at the base cadence for the whole run.
    pub monitored: Vec<BoxedDevice>,
}

impl DeviceSets {
    pub fn len(&self) -> usize {
        self.watched.len() + self.monitored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for DeviceSets {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names = |set: &[BoxedDevice]| set.iter().map(|d| d.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("DeviceSets")
            .field("watched", &names(&self.watched))
            .field("monitored", &names(&self.monitored))
            .finish()
    }
}

/// Probe each device once and assign it a role.
///
/// Fails when there is nothing to probe or when no device reports
/// `watched_id`; the controller cannot run without its watched sensor.
pub fn discover(
    mut devices: Vec<BoxedDevice>,
    watched_id: &str,
) -> Result<DeviceSets, DiscoveryError> {
    if devices.is_empty() {
        return Err(DiscoveryError::NoDevices);
    }

    let verdicts: Vec<bool> = thread::scope(|s| {
        let probes: Vec<_> = devices
            .iter_mut()
            .map(|device| s.spawn(move || reports_sensor(device, watched_id)))
            .collect();
        probes
            .into_iter()
            .map(|p| p.join().unwrap_or(false))
            .collect()
    });

    let mut sets = DeviceSets {
        watched: Vec::new(),
        monitored: Vec::new(),
    };
    for (device, watched) in devices.into_iter().zip(verdicts) {
        if watched {
            sets.watched.push(device);
        } else {
            sets.monitored.push(device);
        }
    }

    if sets.watched.is_empty() {
        return Err(DiscoveryError::NoWatchedDevice {
            sensor_id: watched_id.to_string(),
        });
    }

    info!("discovery: {sets:?}");
    Ok(sets)
}

fn reports_sensor(device: &mut BoxedDevice, watched_id: &str) -> bool {
    match device.poll_once() {
        Ok(lines) => {
            let now = Timestamp::now();
            lines
                .iter()
                .filter_map(|line| parse_device_line(line, now).ok())
                .any(|r| r.sensor_id == watched_id)
        }
        Err(e) => {
            warn!("discovery: {} did not answer the probe: {e}", device.name());
            false
        }
    }
}
