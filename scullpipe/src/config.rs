//! Process-wide device settings
//!
//! Fixed at startup, the way module parameters are fixed at load time.
//! Values come from the defaults, from `SCULL_P_BUFFER` / `SCULL_P_NR_DEVS`
//! in the environment, or from any serde source the embedding program uses.

use serde::{Deserialize, Serialize};

use crate::error::PipeError;

pub const DEFAULT_CAPACITY: usize = 40;
pub const DEFAULT_DEVICE_COUNT: usize = 4;

/// Largest accepted buffer, in bytes
pub const MAX_CAPACITY: usize = 1 << 20;
/// Largest accepted number of devices
pub const MAX_DEVICE_COUNT: usize = 256;

pub const CAPACITY_ENV: &str = "SCULL_P_BUFFER";
pub const DEVICE_COUNT_ENV: &str = "SCULL_P_NR_DEVS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Physical buffer size per device; one byte of it is never used
    pub capacity: usize,
    /// Number of devices in the registry
    pub device_count: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            device_count: DEFAULT_DEVICE_COUNT,
        }
    }
}

impl PipeConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_device_count(mut self, device_count: usize) -> Self {
        self.device_count = device_count;
        self
    }

    /// Defaults overridden by the environment
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if a variable is set but is not a
    /// number, or if the result fails [`PipeConfig::validate`].
    pub fn from_env() -> Result<Self, PipeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`PipeConfig::from_env`] with an explicit variable source
    ///
    /// # Errors
    /// See [`PipeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(CAPACITY_ENV) {
            config.capacity = parse_setting(CAPACITY_ENV, &value)?;
        }
        if let Some(value) = lookup(DEVICE_COUNT_ENV) {
            config.device_count = parse_setting(DEVICE_COUNT_ENV, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `InvalidConfiguration` when either setting is out of range.
    pub fn validate(&self) -> Result<(), PipeError> {
        validate_capacity(self.capacity)?;
        if self.device_count == 0 || self.device_count > MAX_DEVICE_COUNT {
            return Err(PipeError::InvalidConfiguration(format!(
                "device count {} not in 1..={MAX_DEVICE_COUNT}",
                self.device_count
            )));
        }
        Ok(())
    }
}

/// A buffer needs one usable byte plus the sacrificial slot
pub(crate) fn validate_capacity(capacity: usize) -> Result<(), PipeError> {
    if !(2..=MAX_CAPACITY).contains(&capacity) {
        return Err(PipeError::InvalidConfiguration(format!(
            "buffer capacity {capacity} not in 2..={MAX_CAPACITY}"
        )));
    }
    Ok(())
}

fn parse_setting(name: &str, value: &str) -> Result<usize, PipeError> {
    value
        .trim()
        .parse()
        .map_err(|e| PipeError::InvalidConfiguration(format!("{name}={value:?}: {e}")))
}
