//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements     | Connects to                     |
//! |---------------|----------------|---------------------------------|
//! | `serial`      | DeviceSession  | sensor microcontrollers (tty)   |
//! | `log_sink`    | RecordSink     | append-only data log file       |
//! | `gpio`        | OutputPin      | sysfs GPIO / in-memory level    |
//! | `time`        | Clock          | host wall clock + shutdown      |
//! | `config_file` | ConfigPort     | optional JSON config file       |

pub mod config_file;
pub mod gpio;
pub mod log_sink;
pub mod serial;
pub mod time;
