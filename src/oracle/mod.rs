//! Hosted cryptographic primitives.
//!
//! The protocol layer only ever talks to a [`PrimitiveAdapter`]: it forwards
//! client requests and serializes whatever comes back. Key material stays
//! inside the adapter.

use num_bigint::BigUint;
use serde::ser::{Serialize, Serializer};

use crate::Result;

/// Leaky RSA oracles.
pub mod adapters;
/// Textbook RSA keys.
pub mod rsa;

pub use adapters::{ClawOracle, LengthOracle, ParityOracle, TextbookOracle};
pub use rsa::RsaKey;

/// What a decryption oracle reveals about one plaintext.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Leak {
    /// A single bit: parity, a comparison, or a length check.
    Bit(bool),
    /// The full recovered value.
    Value(BigUint),
}

impl Serialize for Leak {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Leak::Bit(bit) => serializer.serialize_u8(u8::from(*bit)),
            Leak::Value(value) => serializer.serialize_str(&hex::encode(value.to_bytes_be())),
        }
    }
}

/// Interface to an external, deliberately weakened primitive.
pub trait PrimitiveAdapter: Send {
    fn name(&self) -> &'static str;

    /// Public values announced when a client connects.
    fn greeting(&self) -> Vec<(&'static str, BigUint)>;

    /// Public key components sent alongside every encryption.
    fn public_key(&self) -> Vec<(&'static str, BigUint)>;

    /// Every plaintext that should survive encryption must be below this.
    fn modulus(&self) -> &BigUint;

    fn encrypt(&mut self, plaintext: &BigUint) -> Result<BigUint>;

    /// Decrypts `ciphertext` and returns only what this oracle is meant to leak.
    ///
    /// # Errors
    ///
    /// A recoverable error rejects the query; any other error ends the session.
    fn decrypt_oracle(&mut self, ciphertext: &BigUint) -> Result<Leak>;

    fn sign(&mut self, message: &[u8]) -> Result<BigUint>;

    fn verify(&self, message: &[u8], signature: &BigUint) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leak_serializes_bits_as_integers_and_values_as_hex() {
        assert_eq!(serde_json::to_string(&Leak::Bit(true)).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Leak::Bit(false)).unwrap(), "0");
        assert_eq!(
            serde_json::to_string(&Leak::Value(BigUint::from(0xbeefu32))).unwrap(),
            "\"beef\""
        );
    }
}
