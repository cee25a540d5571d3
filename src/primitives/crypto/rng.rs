//! Cryptographically secure random number generator.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// Cryptographically secure random number generator.
///
/// This is a thin wrapper around `OsRng`. It is only used for values drawn at
/// session start (group constants, seeds, RSA primes); everything derived
/// afterwards is deterministic.
pub struct SecureRng(OsRng);

impl SecureRng {
    /// Creates a new cryptographically secure random number generator.
    pub fn new() -> Self {
        Self(OsRng)
    }

    /// Draws a uniform integer from `[low, high)`.
    ///
    /// # Panics
    /// Panics if `low >= high`.
    pub fn range(&mut self, low: &BigUint, high: &BigUint) -> BigUint {
        self.gen_biguint_range(low, high)
    }

    /// Draws a hex-encoded random token of `len` bytes.
    pub fn token(&mut self, len: usize) -> String {
        let mut bytes = vec![0u8; len];
        self.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

impl Default for SecureRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl CryptoRng for SecureRng {}
