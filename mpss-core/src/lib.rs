#![deny(missing_docs)]
//! Core primitives of the MPSS (mobile proactive secret sharing) protocol.
//!
//! A group of nodes holds Shamir shares of a secret in a prime field. Once
//! per epoch, every old-group member deals a fresh zero-constant polynomial
//! `Q` together with per-recipient blinding polynomials `R_k`, commits to
//! all of them, and hands out the evaluations `Q(j) + R_k(j)`. Combining the
//! verified evaluations of enough dealers re-randomizes every share without
//! the secret ever being reconstructed.
//!
//! This crate contains everything that is independent of networking and
//! scheduling:
//!
//! * [`polynomial`] -- the numeric kernel: sampling, evaluation and Lagrange
//!   interpolation over the BN254 scalar field.
//! * [`commitment`] -- Feldman-style polynomial commitments in BN254 G1 with
//!   point-evaluation checks and additive homomorphism.
//! * [`proposal`] -- the per-epoch dealing object, its canonical SHA-256
//!   digest and wire encoding.
//! * [`params`] -- the public protocol parameters shared by all nodes.
//!
//! The protocol prime field is fixed to [`ark_bn254::Fr`], the order of the
//! commitment group.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod commitment;
pub mod encoding;
pub mod params;
pub mod polynomial;
pub mod proposal;

/// The prime field all shares, evaluations and polynomials live in.
pub type Scalar = ark_bn254::Fr;

/// Identifier of a protocol node.
///
/// Node ids double as the evaluation abscissa of the sharing polynomials,
/// which is why they must be nonzero (the secret sits at `x = 0`).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Returns the id as the field element used for polynomial evaluation.
    pub fn as_scalar(self) -> Scalar {
        Scalar::from(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
