//! Byte and serde encodings for field elements.
//!
//! All payload integers travel as variable-length big-endian byte strings,
//! hex encoded inside JSON. The byte form is minimal (no leading zeros,
//! the empty string encodes zero) so that the canonical proposal digest is
//! independent of how a value was produced.

use ark_ff::{BigInteger as _, PrimeField as _};

use crate::Scalar;

/// Minimal big-endian byte encoding of a field element.
pub fn field_to_bytes(value: &Scalar) -> Vec<u8> {
    let bytes = value.into_bigint().to_bytes_be();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Decodes a big-endian byte string, reducing modulo the field order.
pub fn field_from_bytes(bytes: &[u8]) -> Scalar {
    Scalar::from_be_bytes_mod_order(bytes)
}

/// Serde adapter serializing a [`Scalar`] as a hex string of its minimal
/// big-endian bytes. Use with `#[serde(with = "mpss_core::encoding::field_hex")]`.
pub mod field_hex {
    use serde::{Deserialize as _, Deserializer, Serializer, de};

    use super::{Scalar, field_from_bytes, field_to_bytes};

    /// Serializes the field element as lowercase hex.
    pub fn serialize<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(field_to_bytes(value)))
    }

    /// Deserializes a hex string back into a field element.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(&raw).map_err(de::Error::custom)?;
        Ok(field_from_bytes(&bytes))
    }
}
