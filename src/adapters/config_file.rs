//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`].  A missing path means "all defaults"; a file
//! may set any subset of fields, the rest take their defaults.  The loaded
//! configuration is always validated before it is returned.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::ConfigPort;
use crate::config::ControllerConfig;
use crate::error::ConfigError;

/// Configuration source: an optional JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonConfigFile {
    path: Option<PathBuf>,
}

impl JsonConfigFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        let cfg = match &self.path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
                let cfg: ControllerConfig =
                    serde_json::from_str(&text).map_err(ConfigError::Corrupted)?;
                info!("config loaded from {}", path.display());
                cfg
            }
            None => ControllerConfig::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
