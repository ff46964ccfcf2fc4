//! Feldman-style polynomial commitments in BN254 G1.
//!
//! A commitment to `f(x) = a_0 + a_1 x + ... + a_d x^d` is the vector
//! `[a_0 G, a_1 G, ..., a_d G]`. Point evaluations are checked with a
//! variable-base MSM against `y G`, and commitments add coefficient-wise,
//! which gives the additive homomorphism `commit(A) + commit(B) =
//! commit(A + B)` the combination step relies on. The scheme is binding
//! under the discrete log assumption in G1; evaluations themselves are not
//! hidden, which is fine here because every committed evaluation is handed
//! to its verifier anyway.

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr as _, CurveGroup as _, VariableBaseMSM as _};
use ark_ff::Zero as _;
use ark_serialize::{CanonicalDeserialize as _, CanonicalSerialize as _};
use serde::{Deserialize as _, Deserializer, Serialize, Serializer, de};

use crate::polynomial::Polynomial;

/// Errors raised while decoding commitment bytes.
#[derive(Debug, thiserror::Error)]
pub enum CommitmentError {
    /// The byte string is not a valid compressed point vector.
    #[error("malformed commitment encoding: {0}")]
    Decode(ark_serialize::SerializationError),
}

/// A binding commitment to a polynomial, one G1 point per coefficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolyCommitment {
    coeffs: Vec<G1Affine>,
}

impl PolyCommitment {
    /// Commits to every coefficient of `poly`.
    pub fn commit(poly: &Polynomial) -> Self {
        let g = G1Affine::generator();
        let coeffs = poly
            .coeffs()
            .iter()
            .map(|c| (g * c).into_affine())
            .collect();
        Self { coeffs }
    }

    /// Number of committed coefficients.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// Whether the commitment carries no coefficients at all.
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Checks that the committed polynomial satisfies `f(x) = y`.
    pub fn verify_eval(&self, x: Fr, y: Fr) -> bool {
        let mut powers = Vec::with_capacity(self.coeffs.len());
        let mut power = Fr::from(1u64);
        for _ in 0..self.coeffs.len() {
            powers.push(power);
            power *= x;
        }
        let lhs = G1Projective::msm_unchecked(&self.coeffs, &powers);
        lhs == G1Affine::generator() * y
    }

    /// Adds two commitments coefficient-wise, yielding the commitment to
    /// the sum of the underlying polynomials. Shorter operands are padded
    /// with the identity.
    pub fn add(&self, other: &Self) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..len)
            .map(|i| {
                let a = self.coeffs.get(i).copied().unwrap_or_else(G1Affine::zero);
                let b = other.coeffs.get(i).copied().unwrap_or_else(G1Affine::zero);
                (a + b).into_affine()
            })
            .collect();
        Self { coeffs }
    }

    /// Deterministic compressed byte encoding, also used for hashing.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.coeffs
            .serialize_compressed(&mut out)
            .expect("serializing points into a Vec cannot fail");
        out
    }

    /// Decodes the output of [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommitmentError> {
        let coeffs =
            Vec::<G1Affine>::deserialize_compressed(bytes).map_err(CommitmentError::Decode)?;
        Ok(Self { coeffs })
    }
}

impl Serialize for PolyCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> serde::Deserialize<'de> for PolyCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(&raw).map_err(de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use ark_ff::UniformRand as _;
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn evaluations_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let poly = Polynomial::rand(3, &mut rng);
        let comm = PolyCommitment::commit(&poly);
        for x in (1u64..=5).map(Fr::from) {
            assert!(comm.verify_eval(x, poly.evaluate(x)));
            assert!(!comm.verify_eval(x, poly.evaluate(x) + Fr::from(1u64)));
        }
    }

    #[test]
    fn addition_is_homomorphic() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let a = Polynomial::rand(3, &mut rng);
        let b = Polynomial::rand(3, &mut rng);
        let sum = Polynomial::from_coeffs(
            a.coeffs()
                .iter()
                .zip(b.coeffs())
                .map(|(x, y)| *x + *y)
                .collect(),
        );
        let combined = PolyCommitment::commit(&a).add(&PolyCommitment::commit(&b));
        assert_eq!(combined, PolyCommitment::commit(&sum));

        let x = Fr::rand(&mut rng);
        assert!(combined.verify_eval(x, a.evaluate(x) + b.evaluate(x)));
    }

    #[test]
    fn byte_roundtrip_preserves_identity() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let comm = PolyCommitment::commit(&Polynomial::rand(5, &mut rng));
        let decoded = PolyCommitment::from_bytes(&comm.to_bytes()).unwrap();
        assert_eq!(comm, decoded);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(PolyCommitment::from_bytes(&[0xff; 7]).is_err());
    }
}
