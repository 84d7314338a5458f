//! Caller memory seen by the I/O engine
//!
//! Reads copy into a [`UserDestination`], writes copy from a [`UserSource`].
//! Both copies may fail, the way a copy to or from an unmapped user address
//! does; the engine then aborts without moving its cursors. Plain byte slices
//! are the everyday implementation. Tests plug in implementations that fail
//! on demand.

/// The caller's memory could not be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bad address")]
pub struct Fault;

/// Memory that received bytes are copied into
pub trait UserDestination {
    /// Maximum number of bytes the caller asked for
    fn capacity(&self) -> usize;

    /// Copy `data` to the start of the destination
    ///
    /// # Errors
    /// Returns `Fault` if the destination cannot hold or accept `data`.
    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), Fault>;
}

/// Memory that outgoing bytes are copied from
pub trait UserSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dest` from the start of the source
    ///
    /// # Errors
    /// Returns `Fault` if the source cannot supply `dest.len()` bytes.
    fn copy_from_user(&self, dest: &mut [u8]) -> Result<(), Fault>;
}

impl UserDestination for [u8] {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), Fault> {
        self.get_mut(..data.len())
            .ok_or(Fault)?
            .copy_from_slice(data);
        Ok(())
    }
}

impl UserSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_user(&self, dest: &mut [u8]) -> Result<(), Fault> {
        dest.copy_from_slice(self.get(..dest.len()).ok_or(Fault)?);
        Ok(())
    }
}
