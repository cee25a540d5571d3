use core::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use sha2::{Digest, Sha256};

use crate::primitives::crypto::prime::generate_prime;
use crate::{Error, Result, SecureRng};

/// Public exponent used by every hosted key.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// Smallest modulus size accepted by [`RsaKey::generate`].
pub const MIN_MODULUS_BITS: u64 = 64;

/// Textbook RSA key pair. The private exponent never leaves this type.
#[derive(Clone)]
pub struct RsaKey {
    n: BigUint,
    e: BigUint,
    d: BigUint,
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("n", &self.n)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

impl RsaKey {
    /// Generates a key whose modulus is the product of two `bits / 2`-bit primes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits` is below [`MIN_MODULUS_BITS`].
    pub fn generate(bits: u64, rng: &mut SecureRng) -> Result<Self> {
        if bits < MIN_MODULUS_BITS {
            return Err(Error::InvalidParams(format!(
                "RSA modulus must have at least {MIN_MODULUS_BITS} bits, got {bits}"
            )));
        }

        let e = BigUint::from(PUBLIC_EXPONENT);
        let one = BigUint::one();
        loop {
            let p = generate_prime(bits / 2, rng);
            let q = generate_prime(bits - bits / 2, rng);
            if p == q {
                continue;
            }

            let phi = (&p - &one) * (&q - &one);
            if !e.gcd(&phi).is_one() {
                continue;
            }

            if let Some(d) = e.modinv(&phi) {
                return Ok(Self { n: p * q, e, d });
            }
        }
    }

    /// Builds a key from known components.
    pub fn from_components(n: BigUint, e: BigUint, d: BigUint) -> Self {
        Self { n, e, d }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn public_exponent(&self) -> &BigUint {
        &self.e
    }

    pub fn encrypt(&self, plaintext: &BigUint) -> BigUint {
        plaintext.modpow(&self.e, &self.n)
    }

    pub fn decrypt(&self, ciphertext: &BigUint) -> BigUint {
        ciphertext.modpow(&self.d, &self.n)
    }

    /// Signs `SHA-256(message)` with the private exponent.
    pub fn sign(&self, message: &[u8]) -> BigUint {
        self.digest(message).modpow(&self.d, &self.n)
    }

    pub fn verify(&self, message: &[u8], signature: &BigUint) -> bool {
        signature < &self.n && signature.modpow(&self.e, &self.n) == self.digest(message)
    }

    fn digest(&self, message: &[u8]) -> BigUint {
        BigUint::from_bytes_be(&Sha256::digest(message)) % &self.n
    }
}
