//! Open handle to a pipe device
//!
//! A [`PipeHandle`] is what an open file is to the character device: it
//! remembers the access mode and the non-blocking flag, carries the identity
//! used for async notification, and detaches from the device when closed or
//! dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Poll, Waker};

use crate::channel::{AccessMode, ChannelStatus, Interest, PipeDevice, Readiness, Signal};
use crate::error::PipeError;
use crate::notify::{AsyncReceiver, PartyId};
use crate::uaccess::{UserDestination, UserSource};

/// Flags given at open time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Fail with `WouldBlock` instead of sleeping
    pub nonblocking: bool,
}

impl OpenFlags {
    pub const BLOCKING: Self = Self { nonblocking: false };
    pub const NONBLOCKING: Self = Self { nonblocking: true };
}

/// Raises the interrupt of one handle from another thread
///
/// The handle's current wait, or its next one if none is in progress, fails
/// with `Interrupted`.
#[derive(Clone)]
pub struct Interrupter {
    device: Arc<PipeDevice>,
    signal: Arc<Signal>,
}

impl Interrupter {
    pub fn raise(&self) {
        self.signal.raise();
        self.device.wake_all();
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interrupter(minor={}, pending={})",
            self.device.minor(),
            self.signal.is_pending()
        )
    }
}

/// Open handle to a [`PipeDevice`]
///
/// # Thread Safety
///
/// All I/O methods take `&self`. A handle may be shared between threads
/// (for example through `Arc`), in which case its readers and writers compete
/// for the same device exactly like separate handles do. The handle detaches
/// from the device once: on [`PipeHandle::close`] or on drop.
pub struct PipeHandle {
    device: Arc<PipeDevice>,
    mode: AccessMode,
    nonblocking: AtomicBool,
    party: PartyId,
    signal: Arc<Signal>,
    closed: bool,
}

impl PipeHandle {
    /// Attach to `device`
    ///
    /// # Errors
    /// Returns `OutOfResources` if the device cannot allocate its buffer.
    pub fn open(
        device: Arc<PipeDevice>,
        mode: AccessMode,
        flags: OpenFlags,
        party: PartyId,
    ) -> Result<Self, PipeError> {
        device.open(mode)?;
        Ok(Self {
            device,
            mode,
            nonblocking: AtomicBool::new(flags.nonblocking),
            party,
            signal: Arc::new(Signal::new()),
            closed: false,
        })
    }

    #[must_use]
    pub fn minor(&self) -> usize {
        self.device.minor()
    }

    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[must_use]
    pub fn party(&self) -> PartyId {
        self.party
    }

    #[must_use]
    pub fn device(&self) -> &Arc<PipeDevice> {
        &self.device
    }

    #[must_use]
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Relaxed)
    }

    /// Change the non-blocking flag after open
    pub fn set_nonblocking(&self, nonblocking: bool) {
        self.nonblocking.store(nonblocking, Ordering::Relaxed);
    }

    /// Read into `buf`; see [`PipeDevice::read`]
    ///
    /// # Errors
    /// `BadAccessMode` on a write-only handle, otherwise as
    /// [`PipeDevice::read`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PipeError> {
        self.read_into(buf)
    }

    /// Read into any caller memory
    ///
    /// # Errors
    /// See [`PipeHandle::read`].
    pub fn read_into<D>(&self, dest: &mut D) -> Result<usize, PipeError>
    where
        D: UserDestination + ?Sized,
    {
        if !self.mode.reads() {
            return Err(PipeError::BadAccessMode);
        }
        self.device.read(dest, self.is_nonblocking(), &self.signal)
    }

    /// Read at most `max_len` bytes into a new vector
    ///
    /// # Errors
    /// See [`PipeHandle::read`].
    pub fn read_to_vec(&self, max_len: usize) -> Result<Vec<u8>, PipeError> {
        let mut buf = vec![0u8; max_len];
        let n = self.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Write from `data`; may be short, see [`PipeDevice::write`]
    ///
    /// # Errors
    /// `BadAccessMode` on a read-only handle, otherwise as
    /// [`PipeDevice::write`].
    pub fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        self.write_from(data)
    }

    /// Write from any caller memory
    ///
    /// # Errors
    /// See [`PipeHandle::write`].
    pub fn write_from<S>(&self, src: &S) -> Result<usize, PipeError>
    where
        S: UserSource + ?Sized,
    {
        if !self.mode.writes() {
            return Err(PipeError::BadAccessMode);
        }
        self.device.write(src, self.is_nonblocking(), &self.signal)
    }

    /// Keep writing until all of `data` is in the pipe
    ///
    /// # Errors
    /// The first error of the underlying writes. Bytes written before the
    /// error stay in the pipe.
    pub fn write_all(&self, mut data: &[u8]) -> Result<(), PipeError> {
        while !data.is_empty() {
            let n = self.write(data)?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Readiness snapshot; `waker` is woken at the next state change
    pub fn poll(&self, waker: Option<&Waker>) -> Readiness {
        self.device.poll_readiness(waker)
    }

    /// Wait until the device is ready for `interest`
    pub async fn ready(&self, interest: Interest) -> Readiness {
        futures::future::poll_fn(|cx| {
            let readiness = self.device.poll_readiness(Some(cx.waker()));
            if readiness.satisfies(interest) {
                Poll::Ready(readiness)
            } else {
                Poll::Pending
            }
        })
        .await
    }

    /// Turn async notification on or off for this handle
    ///
    /// Enabling returns the receiver of [`crate::AsyncEvent`]s; enabling again
    /// replaces it. Disabling returns `None`.
    pub fn set_async(&self, enable: bool) -> Option<AsyncReceiver> {
        if enable {
            Some(self.device.register_for_async_notify(self.party))
        } else {
            self.device.deregister(self.party);
            None
        }
    }

    #[must_use]
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            device: Arc::clone(&self.device),
            signal: Arc::clone(&self.signal),
        }
    }

    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.device.status()
    }

    /// Detach from the device
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        log::debug!("PipeHandle::release: {self:?}");
        self.closed = true;
        self.device.close(self.mode, self.party);
    }
}

impl fmt::Debug for PipeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipeHandle(minor={}, mode={:?}, party={}, nonblocking={}, closed={})",
            self.device.minor(),
            self.mode,
            self.party,
            self.is_nonblocking(),
            self.closed
        )
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.release();
        }
    }
}

impl embedded_io::ErrorType for PipeHandle {
    type Error = PipeError;
}

impl embedded_io::Read for PipeHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        PipeHandle::read(self, buf)
    }
}

impl embedded_io::Write for PipeHandle {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        PipeHandle::write(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
