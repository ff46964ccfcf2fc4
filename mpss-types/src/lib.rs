#![deny(missing_docs)]
//! Shared type definitions for the MPSS services.
//!
//! This crate groups the strongly-typed values and message structures the
//! node and board exchange:
//!
//! * [`Epoch`] -- the monotone re-sharing round counter.
//! * API versioned request payloads (see the [`api`] module).
//!
//! Cryptographic payloads (proposals, digests, field elements) come from
//! `mpss-core`; this crate only wraps them into wire messages.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod api;

/// One complete round of re-sharing.
///
/// Epoch 0 is the bootstrap warm-up in which the board only assembles the
/// initial shares. Every node observes a strictly increasing epoch; the
/// counter is advanced only on the board's instruction. The wire domain is
/// `[0, 2^31)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Epoch(pub u32);

impl Epoch {
    /// The bootstrap epoch.
    pub const ZERO: Epoch = Epoch(0);

    /// The epoch following this one.
    pub fn next(self) -> Epoch {
        Epoch(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Epoch {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_order_and_advance() {
        assert!(Epoch::ZERO < Epoch(1));
        assert_eq!(Epoch(3).next(), Epoch(4));
        assert_eq!(serde_json::to_string(&Epoch(7)).unwrap(), "7");
    }
}
