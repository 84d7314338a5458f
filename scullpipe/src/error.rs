//! Error type shared by every pipe operation

use std::io;

/// Failures returned by open, read, write and configuration
///
/// None of them is fatal: each leaves the channel exactly as it was before
/// the call, and the caller may retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipeError {
    #[error("out of memory while allocating the pipe buffer")]
    OutOfResources,

    #[error("operation would block")]
    WouldBlock,

    #[error("interrupted while waiting")]
    Interrupted,

    #[error("bad address in source buffer")]
    FaultySource,

    #[error("bad address in destination buffer")]
    FaultyDestination,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no such device: scullpipe{0}")]
    NoSuchDevice(usize),

    #[error("handle was not opened for this operation")]
    BadAccessMode,

    #[error("device has no open participants")]
    NotOpen,
}

impl PipeError {
    /// Negative errno the character device would have returned
    #[must_use]
    pub fn errno(&self) -> i32 {
        const ENOMEM: i32 = 12;
        const EAGAIN: i32 = 11;
        const ERESTARTSYS: i32 = 512;
        const EFAULT: i32 = 14;
        const EINVAL: i32 = 22;
        const ENODEV: i32 = 19;
        const EBADF: i32 = 9;

        let errno = match self {
            Self::OutOfResources => ENOMEM,
            Self::WouldBlock => EAGAIN,
            Self::Interrupted => ERESTARTSYS,
            Self::FaultySource | Self::FaultyDestination => EFAULT,
            Self::InvalidConfiguration(_) => EINVAL,
            Self::NoSuchDevice(_) => ENODEV,
            Self::BadAccessMode | Self::NotOpen => EBADF,
        };
        -errno
    }

    /// Whether repeating the same call later may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WouldBlock | Self::Interrupted | Self::OutOfResources
        )
    }
}

impl From<PipeError> for io::Error {
    fn from(e: PipeError) -> Self {
        let kind = match e {
            PipeError::OutOfResources => io::ErrorKind::OutOfMemory,
            PipeError::WouldBlock => io::ErrorKind::WouldBlock,
            PipeError::Interrupted => io::ErrorKind::Interrupted,
            PipeError::FaultySource | PipeError::FaultyDestination => io::ErrorKind::InvalidInput,
            PipeError::InvalidConfiguration(_) => io::ErrorKind::InvalidInput,
            PipeError::NoSuchDevice(_) => io::ErrorKind::NotFound,
            PipeError::BadAccessMode | PipeError::NotOpen => io::ErrorKind::PermissionDenied,
        };
        io::Error::new(kind, e)
    }
}

impl embedded_io::Error for PipeError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            PipeError::Interrupted => embedded_io::ErrorKind::Interrupted,
            PipeError::FaultySource
            | PipeError::FaultyDestination
            | PipeError::InvalidConfiguration(_) => embedded_io::ErrorKind::InvalidInput,
            PipeError::NoSuchDevice(_) => embedded_io::ErrorKind::NotFound,
            PipeError::BadAccessMode | PipeError::NotOpen => {
                embedded_io::ErrorKind::PermissionDenied
            }
            PipeError::OutOfResources | PipeError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}
