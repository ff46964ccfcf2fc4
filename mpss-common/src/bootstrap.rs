//! Deterministic bootstrap sharing.
//!
//! There is no dealer: every process derives the same initial degree-`t`
//! sharing polynomial from a fixed-seed RNG, and each old-group node takes
//! `f(id)` as its starting share. The constant term is a hardcoded secret
//! the board's diagnostic interpolation recovers at every epoch, which is
//! how a run is checked end to end.

use mpss_core::{Scalar, polynomial::Polynomial};
use num_bigint::BigUint;
use rand::SeedableRng as _;
use rand_chacha::ChaCha20Rng;

/// Decimal form of the well-known bootstrap secret.
pub const BOOTSTRAP_SECRET_DECIMAL: &str = "6666666666666666666666666";

const BOOTSTRAP_RNG_SEED: u64 = 0;

/// The bootstrap secret as a field element.
pub fn bootstrap_secret() -> Scalar {
    let digits = BigUint::parse_bytes(BOOTSTRAP_SECRET_DECIMAL.as_bytes(), 10)
        .expect("the bootstrap secret is a valid decimal literal");
    Scalar::from(digits)
}

/// The initial sharing polynomial all processes agree on.
pub fn bootstrap_share_polynomial(degree: usize) -> Polynomial {
    let mut rng = ChaCha20Rng::seed_from_u64(BOOTSTRAP_RNG_SEED);
    let mut poly = Polynomial::rand(degree, &mut rng);
    poly.set_constant(bootstrap_secret());
    poly
}

#[cfg(test)]
mod tests {
    use ark_ff::Zero as _;

    use super::*;

    #[test]
    fn every_process_derives_the_same_polynomial() {
        let a = bootstrap_share_polynomial(3);
        let b = bootstrap_share_polynomial(3);
        assert_eq!(a.coeffs(), b.coeffs());
        assert_eq!(a.constant(), bootstrap_secret());
        assert_ne!(bootstrap_secret(), Scalar::zero());
    }
}
