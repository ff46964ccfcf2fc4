//! Dense polynomials over the share field.
//!
//! This is the numeric kernel of the protocol: random sampling of dealing
//! polynomials, Horner evaluation, multiplication by linear factors (used
//! to force a root into a blinding polynomial) and Lagrange interpolation.
//! Coefficients are zeroized on drop since dealt polynomials are toxic
//! waste once their commitments and evaluations exist.

use ark_ff::{Field as _, UniformRand as _, Zero as _};
use rand::{CryptoRng, Rng};
use zeroize::ZeroizeOnDrop;

use crate::Scalar;

/// Errors raised by [`Polynomial::interpolate`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InterpolationError {
    /// No sample points were provided.
    #[error("cannot interpolate through zero points")]
    Empty,
    /// Two samples share an abscissa, the linear system is singular.
    #[error("duplicate abscissa, interpolation system is singular")]
    DuplicateAbscissa,
}

/// A dense polynomial `a_0 + a_1 x + ... + a_d x^d` over [`Scalar`].
#[derive(Clone, Debug, ZeroizeOnDrop)]
pub struct Polynomial {
    coeffs: Vec<Scalar>,
}

impl Polynomial {
    /// Samples a uniformly random polynomial of the given degree.
    pub fn rand<R: Rng + CryptoRng>(degree: usize, rng: &mut R) -> Self {
        let coeffs = (0..=degree).map(|_| Scalar::rand(rng)).collect();
        Self { coeffs }
    }

    /// Builds a polynomial from its coefficient vector, low order first.
    pub fn from_coeffs(coeffs: Vec<Scalar>) -> Self {
        if coeffs.is_empty() {
            return Self {
                coeffs: vec![Scalar::zero()],
            };
        }
        Self { coeffs }
    }

    /// The declared degree (number of coefficients minus one).
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Read access to the coefficients.
    ///
    /// **Note**: for dealt polynomials the coefficients are sensitive data.
    pub fn coeffs(&self) -> &[Scalar] {
        &self.coeffs
    }

    /// The constant term `a_0`.
    pub fn constant(&self) -> Scalar {
        self.coeffs[0]
    }

    /// Overwrites the constant term.
    pub fn set_constant(&mut self, value: Scalar) {
        self.coeffs[0] = value;
    }

    /// Multiplies the polynomial in place by the linear factor `(x - root)`,
    /// raising the degree by one and forcing `root` to be a zero.
    pub fn mul_linear(&mut self, root: Scalar) {
        let mut out = vec![Scalar::zero(); self.coeffs.len() + 1];
        for (i, c) in self.coeffs.iter().enumerate() {
            out[i] -= *c * root;
            out[i + 1] += *c;
        }
        self.coeffs = out;
    }

    /// Evaluates the polynomial at `x` using Horner's rule.
    pub fn evaluate(&self, x: Scalar) -> Scalar {
        let mut acc = Scalar::zero();
        for c in self.coeffs.iter().rev() {
            acc = acc * x + c;
        }
        acc
    }

    /// Evaluates the polynomial at every point of `xs`.
    pub fn evaluate_batch(&self, xs: &[Scalar]) -> Vec<Scalar> {
        xs.iter().map(|x| self.evaluate(*x)).collect()
    }

    /// Recovers the unique polynomial of degree `points.len() - 1` through
    /// the given `(x, y)` samples.
    pub fn interpolate(points: &[(Scalar, Scalar)]) -> Result<Self, InterpolationError> {
        if points.is_empty() {
            return Err(InterpolationError::Empty);
        }
        let mut acc = vec![Scalar::zero(); points.len()];
        for (j, (xj, yj)) in points.iter().enumerate() {
            // basis_j(x) = prod_{m != j} (x - x_m) / (x_j - x_m)
            let mut basis = vec![Scalar::from(1u64)];
            let mut denom = Scalar::from(1u64);
            for (m, (xm, _)) in points.iter().enumerate() {
                if m == j {
                    continue;
                }
                let mut next = vec![Scalar::zero(); basis.len() + 1];
                for (i, b) in basis.iter().enumerate() {
                    next[i] -= *b * xm;
                    next[i + 1] += *b;
                }
                basis = next;
                denom *= *xj - *xm;
            }
            let scale = *yj
                * denom
                    .inverse()
                    .ok_or(InterpolationError::DuplicateAbscissa)?;
            for (a, b) in acc.iter_mut().zip(basis.iter()) {
                *a += *b * scale;
            }
        }
        Ok(Self { coeffs: acc })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn horner_matches_naive() {
        // 3 + 2x + x^2
        let poly = Polynomial::from_coeffs(vec![
            Scalar::from(3u64),
            Scalar::from(2u64),
            Scalar::from(1u64),
        ]);
        assert_eq!(poly.evaluate(Scalar::from(5u64)), Scalar::from(38u64));
        assert_eq!(poly.evaluate(Scalar::zero()), Scalar::from(3u64));
    }

    #[test]
    fn mul_linear_forces_root() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut poly = Polynomial::rand(3, &mut rng);
        poly.mul_linear(Scalar::from(42u64));
        assert_eq!(poly.degree(), 4);
        assert_eq!(poly.evaluate(Scalar::from(42u64)), Scalar::zero());
    }

    #[test]
    fn interpolation_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let poly = Polynomial::rand(4, &mut rng);
        let points: Vec<_> = (1u64..=5)
            .map(|x| (Scalar::from(x), poly.evaluate(Scalar::from(x))))
            .collect();
        let recovered = Polynomial::interpolate(&points).unwrap();
        assert_eq!(recovered.coeffs(), poly.coeffs());
    }

    #[test]
    fn interpolation_rejects_duplicate_abscissa() {
        let points = vec![
            (Scalar::from(1u64), Scalar::from(2u64)),
            (Scalar::from(1u64), Scalar::from(3u64)),
        ];
        assert_eq!(
            Polynomial::interpolate(&points).unwrap_err(),
            InterpolationError::DuplicateAbscissa
        );
    }

    #[test]
    fn batch_matches_single_evaluation() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let poly = Polynomial::rand(2, &mut rng);
        let xs: Vec<_> = (1u64..=4).map(Scalar::from).collect();
        let batch = poly.evaluate_batch(&xs);
        for (x, y) in xs.iter().zip(batch) {
            assert_eq!(poly.evaluate(*x), y);
        }
    }
}
