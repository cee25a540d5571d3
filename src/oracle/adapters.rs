use std::collections::HashSet;

use num_bigint::BigUint;
use num_integer::Integer;
use tracing::debug;

use super::{Leak, PrimitiveAdapter, RsaKey};
use crate::primitives::BlumBlumShub;
use crate::{Error, Result, SecureRng};

macro_rules! delegate_rsa {
    () => {
        fn public_key(&self) -> Vec<(&'static str, BigUint)> {
            vec![
                ("n", self.key.modulus().clone()),
                ("e", self.key.public_exponent().clone()),
            ]
        }

        fn modulus(&self) -> &BigUint {
            self.key.modulus()
        }

        fn sign(&mut self, message: &[u8]) -> Result<BigUint> {
            Ok(self.key.sign(message))
        }

        fn verify(&self, message: &[u8], signature: &BigUint) -> Result<bool> {
            Ok(self.key.verify(message, signature))
        }
    };
}

/// Leaks the least significant bit of every decryption.
pub struct ParityOracle {
    key: RsaKey,
}

impl ParityOracle {
    pub fn new(key: RsaKey) -> Self {
        Self { key }
    }

    pub fn generate(bits: u64, rng: &mut SecureRng) -> Result<Self> {
        Ok(Self::new(RsaKey::generate(bits, rng)?))
    }
}

impl PrimitiveAdapter for ParityOracle {
    fn name(&self) -> &'static str {
        "parity"
    }

    fn greeting(&self) -> Vec<(&'static str, BigUint)> {
        self.public_key()
    }

    fn encrypt(&mut self, plaintext: &BigUint) -> Result<BigUint> {
        Ok(self.key.encrypt(plaintext))
    }

    fn decrypt_oracle(&mut self, ciphertext: &BigUint) -> Result<Leak> {
        Ok(Leak::Bit(self.key.decrypt(ciphertext).is_odd()))
    }

    delegate_rsa!();
}

/// Leaks either parity or `m > n / 2`, chosen per query by a hidden BBS bit.
pub struct ClawOracle {
    key: RsaKey,
    selector: BlumBlumShub,
}

impl ClawOracle {
    pub fn new(key: RsaKey, selector: BlumBlumShub) -> Self {
        Self { key, selector }
    }

    pub fn generate(bits: u64, rng: &mut SecureRng) -> Result<Self> {
        let selector = BlumBlumShub::random(rng);
        Ok(Self::new(RsaKey::generate(bits, rng)?, selector))
    }
}

impl PrimitiveAdapter for ClawOracle {
    fn name(&self) -> &'static str {
        "claw"
    }

    fn greeting(&self) -> Vec<(&'static str, BigUint)> {
        vec![("M", BigUint::from(self.selector.modulus()))]
    }

    fn encrypt(&mut self, plaintext: &BigUint) -> Result<BigUint> {
        Ok(self.key.encrypt(plaintext))
    }

    fn decrypt_oracle(&mut self, ciphertext: &BigUint) -> Result<Leak> {
        let use_half = self.selector.next_bit();
        let m = self.key.decrypt(ciphertext);
        let bit = if use_half {
            m > (self.key.modulus() >> 1u32)
        } else {
            m.is_odd()
        };
        Ok(Leak::Bit(bit))
    }

    delegate_rsa!();
}

/// Leaks whether the plaintext fits into `bits(n) / 8` bytes.
pub struct LengthOracle {
    key: RsaKey,
}

impl LengthOracle {
    pub fn new(key: RsaKey) -> Self {
        Self { key }
    }

    pub fn generate(bits: u64, rng: &mut SecureRng) -> Result<Self> {
        Ok(Self::new(RsaKey::generate(bits, rng)?))
    }
}

impl PrimitiveAdapter for LengthOracle {
    fn name(&self) -> &'static str {
        "length"
    }

    fn greeting(&self) -> Vec<(&'static str, BigUint)> {
        self.public_key()
    }

    fn encrypt(&mut self, plaintext: &BigUint) -> Result<BigUint> {
        Ok(self.key.encrypt(plaintext))
    }

    fn decrypt_oracle(&mut self, ciphertext: &BigUint) -> Result<Leak> {
        let m = self.key.decrypt(ciphertext);
        let capacity = self.key.modulus().bits() / 8;
        let needed = m.bits().div_ceil(8);
        Ok(Leak::Bit(needed <= capacity))
    }

    delegate_rsa!();
}

/// Distinct ciphertexts a [`TextbookOracle`] will issue, and so remember, per session.
pub const MAX_ISSUED_CIPHERTEXTS: usize = 4096;

/// Decrypts anything except ciphertexts it produced itself.
///
/// Issued ciphertexts are never forgotten; once [`MAX_ISSUED_CIPHERTEXTS`] are
/// held, only repeats of known ones are encrypted.
pub struct TextbookOracle {
    key: RsaKey,
    issued: HashSet<BigUint>,
}

impl TextbookOracle {
    pub fn new(key: RsaKey) -> Self {
        Self {
            key,
            issued: HashSet::new(),
        }
    }

    pub fn generate(bits: u64, rng: &mut SecureRng) -> Result<Self> {
        Ok(Self::new(RsaKey::generate(bits, rng)?))
    }
}

impl PrimitiveAdapter for TextbookOracle {
    fn name(&self) -> &'static str {
        "textbook"
    }

    fn greeting(&self) -> Vec<(&'static str, BigUint)> {
        self.public_key()
    }

    fn encrypt(&mut self, plaintext: &BigUint) -> Result<BigUint> {
        let c = self.key.encrypt(plaintext);
        if !self.issued.contains(&c) && self.issued.len() >= MAX_ISSUED_CIPHERTEXTS {
            debug!(issued = self.issued.len(), "encryption limit reached");
            return Err(Error::Validation(format!(
                "no more than {MAX_ISSUED_CIPHERTEXTS} distinct encryptions per session"
            )));
        }
        self.issued.insert(c.clone());
        Ok(c)
    }

    fn decrypt_oracle(&mut self, ciphertext: &BigUint) -> Result<Leak> {
        let reduced = ciphertext % self.key.modulus();
        if self.issued.contains(&reduced) {
            debug!("refusing to decrypt an issued ciphertext");
            return Err(Error::Validation(
                "refusing to decrypt that ciphertext".to_string(),
            ));
        }
        Ok(Leak::Value(self.key.decrypt(&reduced)))
    }

    delegate_rsa!();
}
