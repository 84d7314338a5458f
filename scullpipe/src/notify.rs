//! Asynchronous "data ready" notification
//!
//! A party that wants to learn about new data without sitting in a blocked
//! read registers itself here and keeps the returned receiver. Every
//! successful write then pushes one [`AsyncEvent`] to each registered party,
//! out of band of any reader that is blocked on the channel.
//!
//! # Ordering
//!
//! Nothing orders the wake of a blocked reader against the delivery of an
//! event to a registered party. A party that reacts to an event by reading
//! with a non-blocking handle may find the data already consumed by someone
//! else and get `WouldBlock`.
//!
//! # Unsubscribing
//!
//! Call [`NotificationRegistry::deregister`], or close the handle, which
//! deregisters it. Dropping the receiver stops delivery as well; the stale
//! entry stays until deregistered and costs one failed send per write.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;

/// Identity of one open handle as seen by the notification registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyId(pub u64);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party#{}", self.0)
    }
}

/// Event sent to registered parties (the `SIGIO` / `POLL_IN` analog)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncEvent {
    /// A write of `bytes` bytes landed on device `minor`
    DataReady { minor: usize, bytes: usize },
}

/// Receiving side handed to a registered party
pub type AsyncReceiver = mpsc::UnboundedReceiver<AsyncEvent>;

struct Subscriber {
    sender: mpsc::UnboundedSender<AsyncEvent>,
    debug_hint: String,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("debug_hint", &self.debug_hint)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Set of parties registered for async notification on one device
///
/// Has its own lock, separate from the channel lock, so that events are
/// emitted after the channel lock is released.
#[derive(Debug, Default)]
pub struct NotificationRegistry {
    subscribers: Mutex<HashMap<PartyId, Subscriber>>,
}

impl NotificationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `party` and return its event receiver
    ///
    /// Registering a party twice replaces the earlier receiver, which then
    /// sees its channel closed.
    pub fn register(&self, party: PartyId, debug_hint: &str) -> AsyncReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            sender,
            debug_hint: debug_hint.to_string(),
        };
        if let Some(old) = self.subscribers.lock().insert(party, subscriber) {
            log::warn!(
                "notify.register: {party} already registered (was: '{}')",
                old.debug_hint
            );
        }
        receiver
    }

    /// Remove `party`; returns whether it was registered
    pub fn deregister(&self, party: PartyId) -> bool {
        let removed = self.subscribers.lock().remove(&party).is_some();
        if removed {
            log::debug!("notify.deregister: {party}");
        }
        removed
    }

    #[must_use]
    pub fn is_registered(&self, party: PartyId) -> bool {
        self.subscribers.lock().contains_key(&party)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Send `event` to every registered party; returns the delivered count
    pub fn notify(&self, event: AsyncEvent) -> usize {
        let subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return 0;
        }

        log::debug!("notify: {event:?}, subscribers: {}", subscribers.len());

        let mut delivered = 0;
        for (party, subscriber) in subscribers.iter() {
            if subscriber.sender.send(event).is_ok() {
                delivered += 1;
            } else {
                log::debug!(
                    "notify: receiver dropped for {party} (hint: {})",
                    subscriber.debug_hint
                );
            }
        }
        delivered
    }
}
