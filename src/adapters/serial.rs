//! Serial device adapter.
//!
//! Implements [`DeviceSession`] over a `serialport` link to a sampling
//! microcontroller.  The protocol is line based:
//!
//! ```text
//! host ──"\n"──▶ device
//! host ◀──────── "<stamp> <sensor id> <value>\n"   (one per sensor)
//! host ◀──────── "\n"                              (end of round)
//! ```
//!
//! Opening the port resets the microcontroller, so callers wait
//! [`ControllerConfig::device_reset`] after [`open_all`] before the first
//! poll.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serialport::{ClearBuffer, SerialPort};

use crate::app::ports::{BoxedDevice, DeviceSession};
use crate::config::ControllerConfig;
use crate::error::DeviceError;
use crate::sensors::reading::is_blank;

/// Longest line a sensor controller sends, newline included.  Anything
/// longer is line noise (wrong baud rate, a device mid-reset).
pub const MAX_LINE_LEN: usize = 256;

/// Byte stream a [`SerialDevice`] can drive.
pub trait Link: Read + Write + Send {
    /// Drop everything the OS has buffered on the input side.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl Link for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// One open sensor controller.
pub struct SerialDevice<L: Link = Box<dyn SerialPort>> {
    name: String,
    reader: BufReader<L>,
    round_timeout: Duration,
    /// Set after a timeout; the next round starts from a clean input buffer.
    stale: bool,
}

impl SerialDevice {
    /// Open `path` with the configured speed and per-read timeout.
    pub fn open(path: &Path, cfg: &ControllerConfig) -> io::Result<Self> {
        let name = path.display().to_string();
        let port = serialport::new(name.as_str(), cfg.baud_rate)
            .timeout(cfg.read_timeout())
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(io::Error::from)?;
        Ok(Self::with_link(name, port, cfg.round_timeout()))
    }
}

impl<L: Link> SerialDevice<L> {
    pub fn with_link(name: impl Into<String>, link: L, round_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            reader: BufReader::new(link),
            round_timeout,
            stale: false,
        }
    }

    fn resync(&mut self) -> io::Result<()> {
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        self.reader.get_mut().discard_input()?;
        debug!("{}: discarded {buffered} stale byte(s)", self.name);
        self.stale = false;
        Ok(())
    }

    /// Read lines until the blank sentinel.  The deadline and the line cap
    /// are checked after every chunk, so a link that streams bytes without
    /// ever sending a newline still ends the round.
    fn read_round(&mut self) -> Result<Vec<String>, DeviceError> {
        let link = self.reader.get_mut();
        link.write_all(b"\n")?;
        link.flush()?;

        let deadline = Instant::now() + self.round_timeout;
        let mut lines = Vec::new();
        let mut raw = Vec::new();
        loop {
            if Instant::now() >= deadline {
                return Err(DeviceError::Timeout);
            }
            let chunk = match self.reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if chunk.is_empty() {
                return Err(DeviceError::Io(io::ErrorKind::UnexpectedEof));
            }
            let (taken, complete) = match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => (end + 1, true),
                None => (chunk.len(), false),
            };
            raw.extend_from_slice(&chunk[..taken]);
            self.reader.consume(taken);

            if raw.len() > MAX_LINE_LEN {
                warn!(
                    "{}: line exceeds {MAX_LINE_LEN} bytes without a newline",
                    self.name
                );
                return Err(DeviceError::Timeout);
            }
            if !complete {
                continue;
            }
            let line = String::from_utf8_lossy(&raw);
            if is_blank(&line) {
                return Ok(lines);
            }
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
            raw.clear();
        }
    }
}

impl<L: Link> DeviceSession for SerialDevice<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_once(&mut self) -> Result<Vec<String>, DeviceError> {
        if self.stale {
            self.resync()?;
        }
        let round = self.read_round();
        if matches!(round, Err(DeviceError::Timeout)) {
            self.stale = true;
        }
        round
    }
}

// ---------------------------------------------------------------------------
// Device patterns
// ---------------------------------------------------------------------------

/// Expand a device path pattern.  Only a trailing `*` in the file name is
/// supported (`/dev/ttyUSB*`); anything else is a literal path.
pub fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let Some(prefix_path) = pattern.strip_suffix('*') else {
        let path = PathBuf::from(pattern);
        return if path.exists() { vec![path] } else { Vec::new() };
    };

    let prefix_path = Path::new(prefix_path);
    let (dir, prefix) = if prefix_path.as_os_str().to_string_lossy().ends_with('/') {
        (prefix_path, String::new())
    } else {
        let dir = prefix_path.parent().unwrap_or_else(|| Path::new("."));
        let prefix = prefix_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (dir, prefix)
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        .map(|e| e.path())
        .collect();
    found.sort();
    found
}

/// Every path matched by any of `patterns`, de-duplicated, in pattern order.
pub fn matching_devices(patterns: &[String]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for path in patterns.iter().flat_map(|p| expand_pattern(p)) {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Open every device matching the configured patterns.  Devices that fail
/// to open are reported and skipped.
pub fn open_all(cfg: &ControllerConfig) -> Vec<BoxedDevice> {
    let mut devices: Vec<BoxedDevice> = Vec::new();
    for path in matching_devices(&cfg.device_patterns) {
        match SerialDevice::open(&path, cfg) {
            Ok(dev) => {
                info!("opened {}", path.display());
                devices.push(Box::new(dev));
            }
            Err(e) => warn!("cannot open {}: {e}", path.display()),
        }
    }
    devices
}
