//! # v1 API types
//!
//! Data transfer objects exchanged between nodes and the bulletin board.
//! Field elements are serialized as hex strings of variable-length
//! big-endian byte strings; proposal digests as 32-byte hex strings.

use mpss_core::{
    NodeId, Scalar,
    encoding::field_hex,
    proposal::{Proposal, ProposalDigest},
};
use serde::{Deserialize, Serialize};

use crate::Epoch;

/// A proposal digest a node posts on the bulletin board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalHashMsg {
    /// The epoch the proposal was dealt for.
    pub epoch: Epoch,
    /// The dealing old-group member.
    pub proposer: NodeId,
    /// Canonical SHA-256 digest of the proposal.
    pub digest: ProposalDigest,
}

/// The canonical digest set the board fixes for one epoch.
///
/// Carries exactly `2t + 1` entries with pairwise distinct proposers; every
/// entry's epoch equals the list epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalHashList {
    /// The epoch the list is authoritative for.
    pub epoch: Epoch,
    /// The fixed digest entries.
    pub list: Vec<ProposalHashMsg>,
}

/// A full proposal sent from one old-group member to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMsg {
    /// The epoch the proposal was dealt for.
    pub epoch: Epoch,
    /// The dealing node.
    pub from: NodeId,
    /// The dealing itself.
    pub proposal: Proposal,
}

/// The blinded re-share an old-group member sends to a new-group member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedShareMsg {
    /// The epoch the value belongs to.
    pub epoch: Epoch,
    /// The sending old-group member.
    pub from: NodeId,
    /// `share + sum_j (Q_j(i) + R_{j,k}(i))` for the recipient `k`.
    #[serde(with = "field_hex")]
    pub value: Scalar,
}

/// A (new or initial) share a node reports to the board for the diagnostic
/// secret recovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMsg {
    /// The epoch the share belongs to; 0 carries the bootstrap share.
    pub epoch: Epoch,
    /// The reporting node.
    pub from: NodeId,
    /// The share value.
    #[serde(with = "field_hex")]
    pub share: Scalar,
}

#[cfg(test)]
mod tests {
    use ark_ff::UniformRand as _;

    use super::*;

    #[test]
    fn share_msg_roundtrips_as_hex() {
        let mut rng = rand_stub();
        let msg = ShareMsg {
            epoch: Epoch(1),
            from: NodeId(3),
            share: Scalar::rand(&mut rng),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ShareMsg = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn digest_rejects_wrong_length() {
        let err = serde_json::from_str::<ProposalDigest>("\"abcd\"").unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    fn rand_stub() -> impl rand::Rng {
        use rand::SeedableRng as _;
        rand::rngs::StdRng::seed_from_u64(99)
    }
}
