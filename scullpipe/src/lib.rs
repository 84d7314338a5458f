//! Bounded byte pipe devices
//!
//! A user-space rendition of the `scullpipe` character device: a small
//! circular buffer shared by concurrent readers and writers, with blocking
//! and non-blocking I/O, poll-style readiness, and async "data ready"
//! notification.
//!
//! ```text
//!  DeviceRegistry ──open──▶ PipeHandle ──read/write/poll──▶ PipeDevice
//!                                                            │ channel lock
//!                                                            ├─ CircularBuffer
//!                                                            ├─ inq / outq condvars
//!                                                            └─ NotificationRegistry
//! ```
//!
//! ```
//! use scullpipe::{AccessMode, DeviceRegistry, OpenFlags, PipeConfig};
//!
//! let registry = DeviceRegistry::new(PipeConfig::default()).unwrap();
//! let writer = registry.open(0, AccessMode::WriteOnly, OpenFlags::BLOCKING).unwrap();
//! let reader = registry.open(0, AccessMode::ReadOnly, OpenFlags::NONBLOCKING).unwrap();
//!
//! assert_eq!(writer.write(b"hello").unwrap(), 5);
//! assert_eq!(reader.read_to_vec(16).unwrap(), b"hello");
//! ```

pub mod channel;
pub mod circular;
pub mod config;
pub mod error;
pub mod handle;
pub mod notify;
pub mod registry;
pub mod uaccess;

pub use channel::{AccessMode, ChannelStatus, Interest, PipeDevice, Readiness, Signal};
pub use circular::CircularBuffer;
pub use config::PipeConfig;
pub use error::PipeError;
pub use handle::{Interrupter, OpenFlags, PipeHandle};
pub use notify::{AsyncEvent, AsyncReceiver, NotificationRegistry, PartyId};
pub use registry::DeviceRegistry;
pub use uaccess::{Fault, UserDestination, UserSource};
