//! Per-epoch dealing: proposals, their canonical digest and wire shape.
//!
//! Every old-group member deals one [`Proposal`] per epoch. It commits to a
//! fresh zero-constant polynomial `Q` and, for every new-group member `k`,
//! to a blinding polynomial `R_k` that vanishes at `k`. The proposal also
//! tabulates `Q(j) + R_k(j)` for every old-group member `j`, so `j` can
//! fold the dealing into the blinded share it later sends to `k`.
//!
//! Maps are [`BTreeMap`]s keyed by [`NodeId`], so iteration order is the
//! ascending-id order the canonical digest demands; deserialized proposals
//! therefore re-hash to the same digest no matter how the sender ordered
//! its keys.

use std::collections::BTreeMap;
use std::fmt;

use ark_ff::Zero as _;
use itertools::izip;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha2::{Digest as _, Sha256};

use crate::{
    NodeId, Scalar,
    commitment::PolyCommitment,
    encoding::{field_from_bytes, field_to_bytes},
    params::PublicParameters,
    polynomial::Polynomial,
};

/// Errors raised while reading the pieces of a [`Proposal`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProposalError {
    /// The proposal holds no evaluations addressed to the given old node.
    #[error("no evaluations for old node {0}")]
    MissingEvaluations(NodeId),
    /// The proposal holds no blinding commitment for the given new node.
    #[error("no blinding commitment for new node {0}")]
    MissingBlinding(NodeId),
    /// An evaluation bundle lacks the entry for the given new node.
    #[error("no evaluation targeting new node {0}")]
    MissingPoint(NodeId),
}

/// The canonical SHA-256 digest of a proposal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProposalDigest([u8; 32]);

impl ProposalDigest {
    /// Wraps raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ProposalDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ProposalDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProposalDigest({})", hex::encode(self.0))
    }
}

impl Serialize for ProposalDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ProposalDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(&raw).map_err(de::Error::custom)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| de::Error::custom(format!("digest of {} bytes", b.len())))?;
        Ok(Self(bytes))
    }
}

/// The evaluations `Q(j) + R_k(j)` a dealer addresses to one old node `j`,
/// keyed by the new node `k` the blinding belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlindedEvaluations {
    points: BTreeMap<NodeId, Scalar>,
}

impl BlindedEvaluations {
    /// The evaluation targeting new node `k`, if present.
    pub fn point_for(&self, k: NodeId) -> Result<Scalar, ProposalError> {
        self.points
            .get(&k)
            .copied()
            .ok_or(ProposalError::MissingPoint(k))
    }

    /// Iterates the evaluations in ascending order of the new node id.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Scalar)> {
        self.points.iter().map(|(k, v)| (*k, v))
    }

    /// Number of targeted new nodes.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Serialize for BlindedEvaluations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hexed: BTreeMap<NodeId, String> = self
            .points
            .iter()
            .map(|(k, v)| (*k, hex::encode(field_to_bytes(v))))
            .collect();
        hexed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BlindedEvaluations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hexed = BTreeMap::<NodeId, String>::deserialize(deserializer)?;
        let mut points = BTreeMap::new();
        for (k, raw) in hexed {
            let bytes = hex::decode(&raw).map_err(de::Error::custom)?;
            points.insert(k, field_from_bytes(&bytes));
        }
        Ok(Self { points })
    }
}

/// One old-group member's dealing for one epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    comm_q: PolyCommitment,
    comm_rs: BTreeMap<NodeId, PolyCommitment>,
    peer_points: BTreeMap<NodeId, BlindedEvaluations>,
}

impl Proposal {
    /// Deals a fresh proposal.
    ///
    /// Samples `Q` of degree `t` and forces `Q(0) = 0`, so summing dealings
    /// re-randomizes shares without moving the secret. For every new node
    /// `k`, samples `R'_k` of degree `t - 1` and uses `R_k = R'_k (x - k)`:
    /// the blinding vanishes exactly at the evaluation point `k` will
    /// interpolate towards, so it hides the old-group evaluations without
    /// contributing to the fresh share.
    pub fn generate<R: Rng + CryptoRng>(params: &PublicParameters, rng: &mut R) -> Self {
        let mut q = Polynomial::rand(params.degree(), rng);
        q.set_constant(Scalar::zero());
        let comm_q = PolyCommitment::commit(&q);

        let mut blinding = BTreeMap::new();
        let mut comm_rs = BTreeMap::new();
        for &k in params.new_group() {
            let mut r = Polynomial::rand(params.degree() - 1, rng);
            r.mul_linear(k.as_scalar());
            comm_rs.insert(k, PolyCommitment::commit(&r));
            blinding.insert(k, r);
        }

        let old_xs: Vec<Scalar> = params.old_group().iter().map(|j| j.as_scalar()).collect();
        let q_points = q.evaluate_batch(&old_xs);

        let mut peer_points = BTreeMap::new();
        for (&j, x, qj) in izip!(params.old_group(), &old_xs, q_points) {
            debug_assert!(comm_q.verify_eval(*x, qj), "Q(j) not on Q, which is a bug");
            let points = blinding
                .iter()
                .map(|(&k, rk)| (k, qj + rk.evaluate(*x)))
                .collect();
            peer_points.insert(j, BlindedEvaluations { points });
        }

        Self {
            comm_q,
            comm_rs,
            peer_points,
        }
    }

    /// The commitment to the zero-constant polynomial `Q`.
    pub fn comm_q(&self) -> &PolyCommitment {
        &self.comm_q
    }

    /// The commitment to the blinding polynomial addressed to new node `k`.
    pub fn blinding_commitment(&self, k: NodeId) -> Result<&PolyCommitment, ProposalError> {
        self.comm_rs.get(&k).ok_or(ProposalError::MissingBlinding(k))
    }

    /// The evaluation bundle addressed to old node `j`.
    pub fn evaluations_for(&self, j: NodeId) -> Result<&BlindedEvaluations, ProposalError> {
        self.peer_points
            .get(&j)
            .ok_or(ProposalError::MissingEvaluations(j))
    }

    /// Checks the evaluation addressed to old node `j` for new node `k`
    /// against the homomorphic sum `comm(Q) + comm(R_k)`.
    pub fn verify_evaluation(&self, j: NodeId, k: NodeId) -> Result<bool, ProposalError> {
        let point = self.evaluations_for(j)?.point_for(k)?;
        let combined = self.comm_q.add(self.blinding_commitment(k)?);
        Ok(combined.verify_eval(j.as_scalar(), point))
    }

    /// The canonical byte stream the digest is computed over.
    ///
    /// Order: `comm(Q)` bytes, then `comm(R_k)` bytes for ascending `k`,
    /// then the minimal big-endian bytes of every evaluation for ascending
    /// `(j, k)`. Key order is fixed by the [`BTreeMap`]s, so the stream is
    /// identical no matter how the proposal was assembled.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.comm_q.to_bytes();
        for comm in self.comm_rs.values() {
            out.extend_from_slice(&comm.to_bytes());
        }
        for evals in self.peer_points.values() {
            for value in evals.points.values() {
                out.extend_from_slice(&field_to_bytes(value));
            }
        }
        out
    }

    /// The canonical SHA-256 digest of the proposal.
    pub fn digest(&self) -> ProposalDigest {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        ProposalDigest(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn params(degree: usize, old: &[u64], new: &[u64]) -> PublicParameters {
        PublicParameters::new(
            degree,
            old.iter().copied().map(NodeId).collect(),
            new.iter().copied().map(NodeId).collect(),
        )
        .unwrap()
    }

    #[test]
    fn generated_proposals_are_well_formed() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let pp = params(2, &[1, 2, 3, 4, 5, 6, 7], &[1, 2, 3, 4, 5, 6, 7]);
        let proposal = Proposal::generate(&pp, &mut rng);

        // Q(0) = 0 and R_k(k) = 0 for every recipient.
        assert!(proposal.comm_q().verify_eval(Scalar::zero(), Scalar::zero()));
        for &k in pp.new_group() {
            assert!(
                proposal
                    .blinding_commitment(k)
                    .unwrap()
                    .verify_eval(k.as_scalar(), Scalar::zero())
            );
        }

        // Every tabulated evaluation sits on Q + R_k.
        for &j in pp.old_group() {
            for &k in pp.new_group() {
                assert!(proposal.verify_evaluation(j, k).unwrap());
            }
        }
    }

    #[test]
    fn digest_survives_wire_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(20);
        let pp = params(5, &(1..=16).collect::<Vec<_>>(), &(1..=16).collect::<Vec<_>>());
        let proposal = Proposal::generate(&pp, &mut rng);

        let encoded = serde_json::to_vec(&proposal).unwrap();
        let decoded: Proposal = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(proposal, decoded);
        assert_eq!(proposal.digest(), decoded.digest());
        assert_eq!(proposal.canonical_bytes(), decoded.canonical_bytes());
    }

    #[test]
    fn equality_tracks_canonical_bytes_and_digest() {
        let mut rng = ChaCha20Rng::seed_from_u64(30);
        let pp = params(1, &[1, 2, 3, 4], &[1, 2, 3, 4]);
        let a = Proposal::generate(&pp, &mut rng);
        let b = Proposal::generate(&pp, &mut rng);

        assert_ne!(a, b);
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
        assert_ne!(a.digest(), b.digest());

        let a2 = a.clone();
        assert_eq!(a, a2);
        assert_eq!(a.digest(), a2.digest());
    }

    #[test]
    fn missing_entries_surface_as_errors() {
        let mut rng = ChaCha20Rng::seed_from_u64(40);
        let pp = params(1, &[1, 2, 3, 4], &[1, 2, 3, 4]);
        let proposal = Proposal::generate(&pp, &mut rng);

        assert_eq!(
            proposal.evaluations_for(NodeId(9)).unwrap_err(),
            ProposalError::MissingEvaluations(NodeId(9))
        );
        assert_eq!(
            proposal.blinding_commitment(NodeId(9)).unwrap_err(),
            ProposalError::MissingBlinding(NodeId(9))
        );
    }

    /// Runs the dealing and combining arithmetic of one full epoch in
    /// memory: every old node deals, every old node folds the quorum's
    /// dealings into blinded shares, every new node interpolates its fresh
    /// share, and the fresh shares still encode the original secret.
    fn run_epoch(
        pp: &PublicParameters,
        share_poly: &Polynomial,
        rng: &mut ChaCha20Rng,
    ) -> BTreeMap<NodeId, Scalar> {
        let proposals: Vec<Proposal> = pp
            .old_group()
            .iter()
            .map(|_| Proposal::generate(pp, rng))
            .collect();
        // The board would fix any 2t+1 of them; take the first quorum.
        let listed = &proposals[..pp.quorum()];

        let mut blinded: BTreeMap<NodeId, BTreeMap<NodeId, Scalar>> = BTreeMap::new();
        for &i in pp.old_group() {
            let share = share_poly.evaluate(i.as_scalar());
            let mut combined = BTreeMap::new();
            for &k in pp.new_group() {
                let mut value = share;
                for proposal in listed {
                    assert!(proposal.verify_evaluation(i, k).unwrap());
                    value += proposal.evaluations_for(i).unwrap().point_for(k).unwrap();
                }
                combined.insert(k, value);
            }
            blinded.insert(i, combined);
        }

        let mut new_shares = BTreeMap::new();
        for &k in pp.new_group() {
            let points: Vec<(Scalar, Scalar)> = pp
                .old_group()
                .iter()
                .take(pp.degree() + 1)
                .map(|&i| (i.as_scalar(), blinded[&i][&k]))
                .collect();
            let poly = Polynomial::interpolate(&points).unwrap();
            new_shares.insert(k, poly.evaluate(k.as_scalar()));
        }
        new_shares
    }

    fn secret_of(shares: &BTreeMap<NodeId, Scalar>, degree: usize) -> Scalar {
        let points: Vec<(Scalar, Scalar)> = shares
            .iter()
            .take(degree + 1)
            .map(|(id, share)| (id.as_scalar(), *share))
            .collect();
        Polynomial::interpolate(&points)
            .unwrap()
            .evaluate(Scalar::zero())
    }

    #[test]
    fn one_epoch_preserves_the_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(50);
        let pp = params(1, &[1, 2, 3, 4], &[1, 2, 3, 4]);
        let secret = Scalar::from(6666u64);
        let mut share_poly = Polynomial::rand(pp.degree(), &mut rng);
        share_poly.set_constant(secret);

        let new_shares = run_epoch(&pp, &share_poly, &mut rng);
        assert_eq!(secret_of(&new_shares, pp.degree()), secret);
    }

    #[test]
    fn disjoint_rotation_preserves_the_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(60);
        let pp = params(1, &[1, 2, 3, 4], &[5, 6, 7, 8]);
        let secret = Scalar::from(424242u64);
        let mut share_poly = Polynomial::rand(pp.degree(), &mut rng);
        share_poly.set_constant(secret);

        let new_shares = run_epoch(&pp, &share_poly, &mut rng);
        assert_eq!(secret_of(&new_shares, pp.degree()), secret);
    }

    #[test]
    fn epochs_rerandomize_shares() {
        let mut rng = ChaCha20Rng::seed_from_u64(70);
        let pp = params(2, &[1, 2, 3, 4, 5, 6, 7], &[1, 2, 3, 4, 5, 6, 7]);
        let secret = Scalar::from(7u64);
        let mut share_poly = Polynomial::rand(pp.degree(), &mut rng);
        share_poly.set_constant(secret);

        let first = run_epoch(&pp, &share_poly, &mut rng);
        let second = run_epoch(&pp, &share_poly, &mut rng);
        assert_eq!(secret_of(&first, pp.degree()), secret);
        assert_eq!(secret_of(&second, pp.degree()), secret);
        // Fresh dealing randomness moves every share with overwhelming
        // probability even though the secret stays put.
        assert_ne!(first, second);
        for (id, share) in &first {
            assert_ne!(*share, share_poly.evaluate(id.as_scalar()));
        }
    }
}
