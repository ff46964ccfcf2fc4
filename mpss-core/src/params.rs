//! Public protocol parameters shared by every node and the board.

use num_bigint::BigUint;

use ark_ff::{BigInteger as _, PrimeField as _};

use crate::{NodeId, Scalar};

/// Errors raised while validating [`PublicParameters`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParameterError {
    /// The sharing degree must be at least one.
    #[error("sharing degree must be at least 1")]
    DegreeTooSmall,
    /// Robustness requires `|old_group| >= 3t + 1`.
    #[error("old group of size {size} is below the required 3t+1 = {required}")]
    OldGroupTooSmall {
        /// Actual group size.
        size: usize,
        /// Required minimum `3t + 1`.
        required: usize,
    },
    /// The new group must contain at least one recipient.
    #[error("new group is empty")]
    EmptyNewGroup,
    /// Ids within a group must be unique.
    #[error("node id {0} appears twice within a group")]
    DuplicateId(NodeId),
    /// Node ids are evaluation points; zero would expose the secret.
    #[error("node id 0 is reserved for the secret")]
    ZeroId,
}

/// The public parameters of one MPSS deployment.
///
/// Immutable after startup. The prime `p` of the share field is the order
/// of the commitment group and therefore fixed at compile time; it is
/// exposed through [`PublicParameters::modulus`] for diagnostics.
#[derive(Clone, Debug)]
pub struct PublicParameters {
    degree: usize,
    old_group: Vec<NodeId>,
    new_group: Vec<NodeId>,
}

impl PublicParameters {
    /// Validates and builds the parameter set.
    pub fn new(
        degree: usize,
        old_group: Vec<NodeId>,
        new_group: Vec<NodeId>,
    ) -> Result<Self, ParameterError> {
        if degree == 0 {
            return Err(ParameterError::DegreeTooSmall);
        }
        let required = 3 * degree + 1;
        if old_group.len() < required {
            return Err(ParameterError::OldGroupTooSmall {
                size: old_group.len(),
                required,
            });
        }
        if new_group.is_empty() {
            return Err(ParameterError::EmptyNewGroup);
        }
        for group in [&old_group, &new_group] {
            let mut seen = group.clone();
            seen.sort_unstable();
            for pair in seen.windows(2) {
                if pair[0] == pair[1] {
                    return Err(ParameterError::DuplicateId(pair[0]));
                }
            }
            if group.iter().any(|id| id.0 == 0) {
                return Err(ParameterError::ZeroId);
            }
        }
        Ok(Self {
            degree,
            old_group,
            new_group,
        })
    }

    /// The threshold `t`, i.e. the degree of the sharing polynomials.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// How many proposals the board fixes per epoch (`2t + 1`).
    pub fn quorum(&self) -> usize {
        2 * self.degree + 1
    }

    /// The ordered ids of the share holders entering an epoch.
    pub fn old_group(&self) -> &[NodeId] {
        &self.old_group
    }

    /// The ordered ids of the share holders leaving an epoch.
    pub fn new_group(&self) -> &[NodeId] {
        &self.new_group
    }

    /// Whether `id` deals proposals during an epoch.
    pub fn is_old(&self, id: NodeId) -> bool {
        self.old_group.contains(&id)
    }

    /// Whether `id` receives a fresh share at the end of an epoch.
    pub fn is_new(&self, id: NodeId) -> bool {
        self.new_group.contains(&id)
    }

    /// The prime modulus of the share field.
    pub fn modulus() -> BigUint {
        BigUint::from_bytes_be(&Scalar::MODULUS.to_bytes_be())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[test]
    fn accepts_minimal_group() {
        let pp = PublicParameters::new(1, ids(&[1, 2, 3, 4]), ids(&[1, 2, 3, 4])).unwrap();
        assert_eq!(pp.quorum(), 3);
        assert!(pp.is_old(NodeId(3)));
        assert!(!pp.is_new(NodeId(9)));
    }

    #[test]
    fn rejects_small_old_group() {
        let err = PublicParameters::new(2, ids(&[1, 2, 3, 4]), ids(&[1])).unwrap_err();
        assert_eq!(
            err,
            ParameterError::OldGroupTooSmall {
                size: 4,
                required: 7
            }
        );
    }

    #[test]
    fn rejects_duplicate_and_zero_ids() {
        assert_eq!(
            PublicParameters::new(1, ids(&[1, 2, 2, 4]), ids(&[1])).unwrap_err(),
            ParameterError::DuplicateId(NodeId(2))
        );
        assert_eq!(
            PublicParameters::new(1, ids(&[0, 1, 2, 3]), ids(&[1])).unwrap_err(),
            ParameterError::ZeroId
        );
    }

    #[test]
    fn modulus_is_odd_prime_sized() {
        let p = PublicParameters::modulus();
        assert!(p.bit(0));
        assert!(p.bits() > 250);
    }
}
