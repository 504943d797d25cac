//! Signals and events
//!
//! A small closed set of signal identifiers below [`Signal::USER`] is
//! reserved for the engine. Application and command signals live at or
//! above that threshold.

use core::fmt;

/// Marker carried by every event built through the public constructors.
pub const EVENT_SIGNATURE: u32 = 0x4556_4E54; // "EVNT"

/// Event identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(u32);

impl Signal {
    /// No-op signal; always bubbles to the top state
    pub const EMPTY: Signal = Signal(0);
    /// Sent to a state when it becomes the current state
    pub const ENTRY: Signal = Signal(1);
    /// Sent to a state when it is left by a transition
    pub const EXIT: Signal = Signal(2);
    /// Sent after `ENTRY`, and once by [`Machine::init`](crate::Machine::init)
    pub const INIT: Signal = Signal(3);
    /// Superstate query; handlers answer it with their parent
    pub const SUPER: Signal = Signal(4);

    /// First identifier available to applications
    pub const USER: u32 = 0x10;

    /// Build a signal from a raw identifier
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Build an application signal `offset` places above [`Signal::USER`]
    pub const fn user(offset: u32) -> Self {
        Self(Self::USER + offset)
    }

    /// Raw identifier
    pub const fn id(self) -> u32 {
        self.0
    }

    /// True for the engine-internal signals
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::USER
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Signal::EMPTY => f.write_str("EMPTY"),
            Signal::ENTRY => f.write_str("ENTRY"),
            Signal::EXIT => f.write_str("EXIT"),
            Signal::INIT => f.write_str("INIT"),
            Signal::SUPER => f.write_str("SUPER"),
            Signal(id) => write!(f, "Signal({:#x})", id),
        }
    }
}

/// An event delivered to a state handler
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P> {
    signal: Signal,
    payload: Option<P>,
    signature: u32,
}

impl<P> Event<P> {
    /// Create an event without payload
    pub const fn new(signal: Signal) -> Self {
        Self {
            signal,
            payload: None,
            signature: EVENT_SIGNATURE,
        }
    }

    /// Create an event carrying `payload`
    pub fn with_payload(signal: Signal, payload: P) -> Self {
        Self {
            signal,
            payload: Some(payload),
            signature: EVENT_SIGNATURE,
        }
    }

    /// Rebuild an event received over a transport, signature included.
    ///
    /// The machine refuses to dispatch it unless `signature` equals
    /// [`EVENT_SIGNATURE`].
    pub fn from_raw(signal: Signal, payload: Option<P>, signature: u32) -> Self {
        Self {
            signal,
            payload,
            signature,
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// Check the validity marker
    pub fn is_valid(&self) -> bool {
        self.signature == EVENT_SIGNATURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_range() {
        assert!(Signal::EMPTY.is_reserved());
        assert!(Signal::SUPER.is_reserved());
        assert!(!Signal::user(0).is_reserved());
        assert_eq!(Signal::user(3).id(), Signal::USER + 3);
    }

    #[test]
    fn test_event_signature() {
        let ev: Event<()> = Event::new(Signal::user(1));
        assert!(ev.is_valid());
        assert!(ev.payload().is_none());

        let forged: Event<u8> = Event::from_raw(Signal::user(1), Some(7), 0xdead_beef);
        assert!(!forged.is_valid());
        assert_eq!(forged.payload(), Some(&7));
    }
}
