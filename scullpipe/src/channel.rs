//! Pipe device: a bounded byte channel with blocking I/O
//!
//! One [`PipeDevice`] exists per minor number. It owns an optional
//! [`CircularBuffer`], the reader and writer counts, and the registry of
//! parties waiting for async notification.
//!
//! # Locking
//!
//! A single mutex (the channel lock) guards the buffer, its cursors and the
//! counts. Two condition variables hang off it:
//!
//! - `inq`: "data available", waited on by readers
//! - `outq`: "space available", waited on by writers
//!
//! A waiter always goes through the same loop:
//!
//! ```ignore
//! let mut state = self.state.lock();
//! while !condition(&state) {
//!     if nonblocking { return Err(WouldBlock) }
//!     if signal.take() { return Err(Interrupted) }
//!     self.inq.wait(&mut state);      // releases the lock while asleep
//! }
//! // condition holds and the lock is held
//! ```
//!
//! The condition is only trusted after it was re-checked under the lock, so
//! spurious and stolen wakeups are harmless. Wakes are broadcast: every
//! waiter re-validates on its own and nothing guarantees fairness.
//!
//! Copying to and from caller memory happens under the lock but never
//! sleeps. Waking (condvars, poll wakers, async parties) happens after the
//! lock is released.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;

use crate::circular::CircularBuffer;
use crate::config::validate_capacity;
use crate::error::PipeError;
use crate::notify::{AsyncEvent, AsyncReceiver, NotificationRegistry, PartyId};
use crate::uaccess::{UserDestination, UserSource};

/// Requested access, as in the open flags of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    #[must_use]
    pub fn reads(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    #[must_use]
    pub fn writes(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Point-in-time readiness, as a poll/select caller sees it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// A read would return data without sleeping
    pub readable: bool,
    /// A write would accept at least one byte without sleeping
    pub writable: bool,
}

/// Which readiness a waiter cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
    Either,
}

impl Readiness {
    #[must_use]
    pub fn satisfies(self, interest: Interest) -> bool {
        match interest {
            Interest::Readable => self.readable,
            Interest::Writable => self.writable,
            Interest::Either => self.readable || self.writable,
        }
    }
}

/// Pending-interrupt flag of one handle
///
/// Raising it cancels the handle's current or next wait. The flag is
/// consumed by the wait it cancels.
#[derive(Debug, Default)]
pub struct Signal {
    pending: AtomicBool,
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

/// Snapshot of a device for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub minor: usize,
    pub capacity: usize,
    /// Storage is currently allocated
    pub materialized: bool,
    pub readers: usize,
    pub writers: usize,
    /// Unread bytes; zero when not materialized
    pub occupied: usize,
    /// Free bytes; zero when not materialized
    pub free: usize,
    /// Parties registered for async notification
    pub async_parties: usize,
}

struct ChannelState {
    buffer: Option<CircularBuffer>,
    nreaders: usize,
    nwriters: usize,
    /// Wakers registered by poll callers, drained on the next state change
    pollers: Vec<Waker>,
}

impl ChannelState {
    fn buffer(&self) -> Result<&CircularBuffer, PipeError> {
        self.buffer.as_ref().ok_or(PipeError::NotOpen)
    }

    fn buffer_mut(&mut self) -> Result<&mut CircularBuffer, PipeError> {
        self.buffer.as_mut().ok_or(PipeError::NotOpen)
    }
}

/// One pipe device
///
/// # Thread Safety
///
/// Every method takes `&self`; share the device through `Arc`. Operations
/// on the same device serialize on the channel lock, and blocked readers and
/// writers release it while asleep.
pub struct PipeDevice {
    minor: usize,
    capacity: usize,
    state: Mutex<ChannelState>,
    inq: Condvar,
    outq: Condvar,
    async_queue: NotificationRegistry,
}

impl PipeDevice {
    /// Create a device with no storage; storage appears on the first open
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if `capacity` is out of range.
    pub fn new(minor: usize, capacity: usize) -> Result<Self, PipeError> {
        validate_capacity(capacity)?;
        Ok(Self {
            minor,
            capacity,
            state: Mutex::new(ChannelState {
                buffer: None,
                nreaders: 0,
                nwriters: 0,
                pollers: Vec::new(),
            }),
            inq: Condvar::new(),
            outq: Condvar::new(),
            async_queue: NotificationRegistry::new(),
        })
    }

    #[must_use]
    pub fn minor(&self) -> usize {
        self.minor
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Attach a participant
    ///
    /// Allocates the buffer if needed and empties it. Every open discards
    /// unread data, including data written by participants still attached.
    ///
    /// # Errors
    /// Returns `OutOfResources` if the buffer cannot be allocated; the counts
    /// are left untouched.
    pub fn open(&self, mode: AccessMode) -> Result<(), PipeError> {
        let mut state = self.state.lock();

        let buffer = match state.buffer.take() {
            Some(buffer) => buffer,
            None => CircularBuffer::try_new(self.capacity).map_err(|e| {
                log::warn!(
                    "scullpipe{}: cannot allocate {} bytes: {e}",
                    self.minor,
                    self.capacity
                );
                PipeError::OutOfResources
            })?,
        };
        state.buffer.insert(buffer).reset();

        if mode.reads() {
            state.nreaders += 1;
        }
        if mode.writes() {
            state.nwriters += 1;
        }
        log::debug!(
            "scullpipe{}: open {mode:?}, readers={}, writers={}",
            self.minor,
            state.nreaders,
            state.nwriters
        );

        // The reset may have freed space for writers that were asleep
        let pollers = std::mem::take(&mut state.pollers);
        drop(state);
        self.outq.notify_all();
        wake_pollers(pollers);
        Ok(())
    }

    /// Detach a participant; one call per successful [`PipeDevice::open`]
    ///
    /// Frees the storage when the last participant leaves and wakes any
    /// registered poll wakers, which then see a device that is not ready.
    pub fn close(&self, mode: AccessMode, party: PartyId) {
        self.async_queue.deregister(party);

        let mut state = self.state.lock();
        if mode.reads() {
            state.nreaders = decrement(state.nreaders, self.minor, "readers");
        }
        if mode.writes() {
            state.nwriters = decrement(state.nwriters, self.minor, "writers");
        }
        if state.nreaders + state.nwriters != 0 {
            return;
        }
        if state.buffer.take().is_some() {
            log::debug!("scullpipe{}: last close, storage released", self.minor);
        }

        // Nothing will change state until the next open
        let pollers = std::mem::take(&mut state.pollers);
        drop(state);
        wake_pollers(pollers);
    }

    /// Read up to `dest.capacity()` bytes
    ///
    /// Sleeps while the buffer is empty unless `nonblocking` is set. Returns
    /// at most the bytes up to the physical end of the buffer, so data that
    /// wraps around takes two calls. Returns `Ok(0)` only for an empty
    /// destination.
    ///
    /// # Errors
    /// - `WouldBlock`: empty and `nonblocking`
    /// - `Interrupted`: `signal` was raised while waiting
    /// - `FaultyDestination`: the copy failed; nothing was consumed
    /// - `NotOpen`: the device has no storage
    pub fn read<D>(
        &self,
        dest: &mut D,
        nonblocking: bool,
        signal: &Signal,
    ) -> Result<usize, PipeError>
    where
        D: UserDestination + ?Sized,
    {
        let max_len = dest.capacity();
        if max_len == 0 {
            return Ok(0);
        }

        let mut state = self.state.lock();
        while state.buffer()?.is_empty() {
            if nonblocking {
                return Err(PipeError::WouldBlock);
            }
            self.sleep(&self.inq, &mut state, signal, "reading")?;
        }

        let count = {
            let buffer = state.buffer_mut()?;
            let span = buffer.readable_slice(max_len);
            let count = span.len();
            if dest.copy_to_user(span).is_err() {
                return Err(PipeError::FaultyDestination);
            }
            buffer.advance_read(count);
            count
        };

        let pollers = std::mem::take(&mut state.pollers);
        drop(state);

        self.outq.notify_all();
        wake_pollers(pollers);
        log::debug!("scullpipe{}: did read {count} bytes", self.minor);
        Ok(count)
    }

    /// Write as much of `src` as fits without wrapping
    ///
    /// Sleeps while the buffer is full unless `nonblocking` is set. A request
    /// larger than the contiguous free space is cut short; callers loop to
    /// write the rest. After a successful write, every party registered for
    /// async notification receives one [`AsyncEvent::DataReady`].
    ///
    /// # Errors
    /// - `WouldBlock`: full and `nonblocking`
    /// - `Interrupted`: `signal` was raised while waiting
    /// - `FaultySource`: the copy failed; nothing was committed
    /// - `NotOpen`: the device has no storage
    pub fn write<S>(
        &self,
        src: &S,
        nonblocking: bool,
        signal: &Signal,
    ) -> Result<usize, PipeError>
    where
        S: UserSource + ?Sized,
    {
        let len = src.len();
        if len == 0 {
            return Ok(0);
        }

        let mut state = self.state.lock();
        while state.buffer()?.free_space() == 0 {
            if nonblocking {
                return Err(PipeError::WouldBlock);
            }
            self.sleep(&self.outq, &mut state, signal, "writing")?;
        }

        let count = {
            let buffer = state.buffer_mut()?;
            let span = buffer.writable_slice(len);
            let count = span.len();
            log::debug!("scullpipe{}: going to accept {count} bytes", self.minor);
            if src.copy_from_user(span).is_err() {
                return Err(PipeError::FaultySource);
            }
            buffer.advance_write(count);
            count
        };

        let pollers = std::mem::take(&mut state.pollers);
        drop(state);

        self.inq.notify_all();
        wake_pollers(pollers);
        self.async_queue.notify(AsyncEvent::DataReady {
            minor: self.minor,
            bytes: count,
        });
        log::debug!("scullpipe{}: did write {count} bytes", self.minor);
        Ok(count)
    }

    /// Level-queried readiness plus an edge-triggered wake registration
    ///
    /// If `waker` is given it is woken at the next read, write or open on
    /// this device, whichever comes first. Never blocks.
    pub fn poll_readiness(&self, waker: Option<&Waker>) -> Readiness {
        let mut state = self.state.lock();
        if let Some(waker) = waker {
            if !state.pollers.iter().any(|w| w.will_wake(waker)) {
                state.pollers.push(waker.clone());
            }
        }
        match &state.buffer {
            Some(buffer) => Readiness {
                readable: !buffer.is_empty(),
                writable: buffer.free_space() > 0,
            },
            None => Readiness::default(),
        }
    }

    /// Register `party` for async notification
    pub fn register_for_async_notify(&self, party: PartyId) -> AsyncReceiver {
        self.async_queue
            .register(party, &format!("scullpipe{}", self.minor))
    }

    /// Remove `party` from async notification; returns whether it was there
    pub fn deregister(&self, party: PartyId) -> bool {
        self.async_queue.deregister(party)
    }

    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        let state = self.state.lock();
        let (occupied, free) = state
            .buffer
            .as_ref()
            .map_or((0, 0), |b| (b.occupied(), b.free_space()));
        ChannelStatus {
            minor: self.minor,
            capacity: self.capacity,
            materialized: state.buffer.is_some(),
            readers: state.nreaders,
            writers: state.nwriters,
            occupied,
            free,
            async_parties: self.async_queue.len(),
        }
    }

    /// Wake every sleeper so that each re-checks its condition and signal
    pub(crate) fn wake_all(&self) {
        // A sleeper checks its signal and starts waiting under the lock, so
        // it cannot miss this wake.
        drop(self.state.lock());
        self.inq.notify_all();
        self.outq.notify_all();
    }

    fn sleep(
        &self,
        queue: &Condvar,
        state: &mut MutexGuard<'_, ChannelState>,
        signal: &Signal,
        what: &str,
    ) -> Result<(), PipeError> {
        if signal.take() {
            log::debug!("scullpipe{}: {what} interrupted", self.minor);
            return Err(PipeError::Interrupted);
        }
        log::debug!("scullpipe{}: {what}: going to sleep", self.minor);
        queue.wait(state);
        Ok(())
    }
}

impl fmt::Debug for PipeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        write!(
            f,
            "PipeDevice(minor={}, capacity={}, materialized={}, readers={}, writers={}, occupied={})",
            status.minor,
            status.capacity,
            status.materialized,
            status.readers,
            status.writers,
            status.occupied
        )
    }
}

fn wake_pollers(pollers: Vec<Waker>) {
    for waker in pollers {
        waker.wake();
    }
}

fn decrement(count: usize, minor: usize, what: &str) -> usize {
    if count == 0 {
        log::warn!("scullpipe{minor}: close with no {what} attached");
    }
    count.saturating_sub(1)
}
