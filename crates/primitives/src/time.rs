//! Millisecond timestamps and the clock trait the miner and retargeter use.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};

use crate::codec::{CodecError, Decode, Encode};

/// Unix milliseconds.  16 bytes big-endian on the wire.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct Timestamp(pub u128);

impl Timestamp {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn millis(&self) -> u128 {
        self.0
    }

    pub fn plus_millis(&self, ms: u64) -> Self {
        Self(self.0 + ms as u128)
    }

    pub fn saturating_elapsed_since(&self, earlier: Timestamp) -> u128 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Encode for Timestamp {
    fn encode(&self, w: &mut Vec<u8>) {
        self.0.encode(w);
    }
}

impl Decode for Timestamp {
    fn decode(r: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self(u128::decode(r)?))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of monotonic wall-clock time.  Taken as a trait object so tests can
/// pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// System clock backed by [`std::time::SystemTime`].
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let dur = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time: before epoch");
        Timestamp(dur.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed() {
        let a = Timestamp(1000);
        let b = a.plus_millis(500);
        assert_eq!(b.saturating_elapsed_since(a), 500);
        assert_eq!(a.saturating_elapsed_since(b), 0);
    }

    #[test]
    fn test_system_clock_advances() {
        let c = SystemClock;
        assert!(c.now().millis() > 0);
    }
}
