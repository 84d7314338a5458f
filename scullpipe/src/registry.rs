//! DeviceRegistry - owns the pipe devices, one per minor number
//!
//! Devices are created without storage when the registry is built. Opening a
//! device through the registry hands out a [`PipeHandle`] with a fresh
//! [`PartyId`]; the device allocates its buffer on the first open and frees it
//! on the last close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::channel::{AccessMode, ChannelStatus, PipeDevice};
use crate::config::PipeConfig;
use crate::error::PipeError;
use crate::handle::{OpenFlags, PipeHandle};
use crate::notify::PartyId;

/// Table of pipe devices indexed by minor number
pub struct DeviceRegistry {
    config: PipeConfig,
    devices: Vec<Arc<PipeDevice>>,
    next_party: AtomicU64,
}

impl DeviceRegistry {
    /// Create `config.device_count` devices
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn new(config: PipeConfig) -> Result<Self, PipeError> {
        config.validate()?;
        let devices = (0..config.device_count)
            .map(|minor| PipeDevice::new(minor, config.capacity).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            devices = config.device_count,
            capacity = config.capacity,
            "scullpipe: loaded"
        );
        Ok(Self {
            config,
            devices,
            next_party: AtomicU64::new(1),
        })
    }

    /// Registry configured from `SCULL_P_BUFFER` / `SCULL_P_NR_DEVS`
    ///
    /// # Errors
    /// See [`PipeConfig::from_env`].
    pub fn from_env() -> Result<Self, PipeError> {
        Self::new(PipeConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// # Errors
    /// Returns `NoSuchDevice` if `minor` is out of range.
    pub fn device(&self, minor: usize) -> Result<&Arc<PipeDevice>, PipeError> {
        self.devices.get(minor).ok_or(PipeError::NoSuchDevice(minor))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PipeDevice>> {
        self.devices.iter()
    }

    /// Open device `minor`
    ///
    /// Each call attaches a new participant, even for a caller that already
    /// holds a handle to the same device.
    ///
    /// # Errors
    /// `NoSuchDevice` for a bad minor, `OutOfResources` if the buffer cannot
    /// be allocated.
    pub fn open(
        &self,
        minor: usize,
        mode: AccessMode,
        flags: OpenFlags,
    ) -> Result<PipeHandle, PipeError> {
        let device = Arc::clone(self.device(minor)?);
        let party = PartyId(self.next_party.fetch_add(1, Ordering::Relaxed));
        let handle = PipeHandle::open(device, mode, flags, party)?;
        debug!(
            minor,
            %party,
            ?mode,
            nonblocking = flags.nonblocking,
            "scullpipe: open"
        );
        Ok(handle)
    }

    /// # Errors
    /// Returns `NoSuchDevice` if `minor` is out of range.
    pub fn status(&self, minor: usize) -> Result<ChannelStatus, PipeError> {
        Ok(self.device(minor)?.status())
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        let still_open = self
            .devices
            .iter()
            .filter(|d| Arc::strong_count(*d) > 1)
            .count();
        info!(still_open, "scullpipe: unloaded");
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("config", &self.config)
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}
