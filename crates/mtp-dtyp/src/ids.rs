//! Newtypes for the handful of `u32`/`u16` identifiers the wire format
//! passes around, so the layers above never confuse a handle with a
//! storage id or a transaction id.

use std::fmt;

/// Sentinel parent value meaning "storage root" on the wire (`spec.md` §3).
pub const STORAGE_ROOT_PARENT: u32 = 0xFFFFFFFF;

/// Wildcard value meaning "all" for storage id / format code / association
/// parameters in `GetObjectHandles` (`spec.md` §4.4 "flush handles").
pub const ALL: u32 = 0xFFFFFFFF;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }
    };
}

id_newtype!(
    /// A device-assigned object handle. Opaque to the cache; never reused
    /// within a session as far as the host is concerned (`spec.md` §3).
    ObjectHandle
);
id_newtype!(
    /// A storage (volume) identifier, as reported by `GetStorageIDs`.
    StorageId
);
id_newtype!(
    /// The host-chosen, nonzero session identifier (`spec.md` §3).
    SessionId
);

/// A per-session, monotonically increasing transaction id (`spec.md` §3).
///
/// The first transaction after `OpenSession` uses id 0. On an
/// `InvalidTransactionID` response the counter must be nudged forward by at
/// least 10 and the operation retried (`spec.md` §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransactionId(u32);

impl TransactionId {
    pub const fn zero() -> Self {
        TransactionId(0)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Allocates the next id, mirroring `params.next_tid++` (`spec.md` §4.3).
    #[must_use]
    pub fn next(&mut self) -> TransactionId {
        let current = *self;
        self.0 = self.0.wrapping_add(1);
        current
    }

    /// Nudges the counter forward by at least `NUDGE` on
    /// `InvalidTransactionID`, per `spec.md` §3 and §4.3.
    pub fn nudge(&mut self) {
        const NUDGE: u32 = 10;
        self.0 = self.0.wrapping_add(NUDGE);
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments_and_returns_prior_value() {
        let mut tid = TransactionId::zero();
        assert_eq!(tid.next().value(), 0);
        assert_eq!(tid.next().value(), 1);
        assert_eq!(tid.value(), 2);
    }

    #[test]
    fn nudge_advances_by_at_least_ten() {
        let mut tid = TransactionId::zero();
        tid.next();
        let before = tid.value();
        tid.nudge();
        assert!(tid.value() >= before + 10);
    }

    #[test]
    fn object_handle_roundtrips_through_u32() {
        let h: ObjectHandle = 42u32.into();
        let back: u32 = h.into();
        assert_eq!(back, 42);
    }
}
