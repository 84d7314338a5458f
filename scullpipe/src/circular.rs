//! Fixed-capacity circular byte store
//!
//! Two cursors walk a fixed byte region. Equal cursors mean "empty"; one slot
//! is always left unused so that a full buffer never looks empty. Usable
//! capacity is therefore `capacity - 1`.
//!
//! ```text
//!   read <= write:   [ . . . R x x x x W . . . ]    readable: R..W
//!   write < read:    [ x x W . . . . R x x x x ]    readable: R..end, then 0..W
//! ```
//!
//! The store does no locking. The owning channel serializes access.

use std::collections::TryReserveError;

/// Circular buffer with a sacrificial slot
pub struct CircularBuffer {
    storage: Box<[u8]>,
    read: usize,
    write: usize,
}

impl CircularBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes
    ///
    /// The allocation is fallible so that an exhausted allocator surfaces as
    /// an error at open time instead of aborting the process.
    ///
    /// # Errors
    /// Returns the allocator's error if `capacity` bytes cannot be reserved.
    pub fn try_new(capacity: usize) -> Result<Self, TryReserveError> {
        debug_assert!(capacity >= 2, "capacity must leave room for one byte");
        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity)?;
        storage.resize(capacity, 0);
        Ok(Self {
            storage: storage.into_boxed_slice(),
            read: 0,
            write: 0,
        })
    }

    /// Physical size of the storage, including the sacrificial slot
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn read_cursor(&self) -> usize {
        self.read
    }

    #[must_use]
    pub fn write_cursor(&self) -> usize {
        self.write
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Discard all content
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Bytes that can still be written before the buffer is full
    #[must_use]
    pub fn free_space(&self) -> usize {
        let capacity = self.capacity();
        if self.is_empty() {
            return capacity - 1;
        }
        (self.read + capacity - self.write) % capacity - 1
    }

    /// Bytes waiting to be read
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.capacity() - 1 - self.free_space()
    }

    /// Longest run readable from the read cursor without wrapping
    #[must_use]
    pub fn contiguous_readable_span(&self) -> usize {
        if self.is_empty() {
            0
        } else if self.write > self.read {
            self.write - self.read
        } else {
            self.capacity() - self.read
        }
    }

    /// Longest run writable at the write cursor without wrapping or
    /// touching unread data
    #[must_use]
    pub fn contiguous_writable_span(&self) -> usize {
        let free = self.free_space();
        if self.write >= self.read {
            free.min(self.capacity() - self.write)
        } else {
            free.min(self.read - self.write - 1)
        }
    }

    /// Readable bytes at the read cursor, at most `max` of them
    #[must_use]
    pub fn readable_slice(&self, max: usize) -> &[u8] {
        let count = self.contiguous_readable_span().min(max);
        &self.storage[self.read..self.read + count]
    }

    /// Writable bytes at the write cursor, at most `max` of them
    pub fn writable_slice(&mut self, max: usize) -> &mut [u8] {
        let count = self.contiguous_writable_span().min(max);
        &mut self.storage[self.write..self.write + count]
    }

    /// Consume `n` bytes; `n` must not exceed the readable span
    pub fn advance_read(&mut self, n: usize) {
        debug_assert!(n <= self.contiguous_readable_span());
        self.read += n;
        if self.read == self.capacity() {
            self.read = 0;
        }
    }

    /// Commit `n` written bytes; `n` must not exceed the writable span
    pub fn advance_write(&mut self, n: usize) {
        debug_assert!(n <= self.contiguous_writable_span());
        self.write += n;
        if self.write == self.capacity() {
            self.write = 0;
        }
    }
}

impl std::fmt::Debug for CircularBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("capacity", &self.capacity())
            .field("read", &self.read)
            .field("write", &self.write)
            .field("occupied", &self.occupied())
            .finish()
    }
}
