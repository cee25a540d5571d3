//! Pseudorandom generators hosted by the challenges.
//!
//! Both generators are deterministic once constructed. Only their initial
//! values come from [`SecureRng`](crate::SecureRng).

use num_bigint::BigUint;

use super::groups::{LoakElement, LoakGroup};
use crate::primitives::crypto::prime::generate_prime;
use crate::{Error, Group, Result, SecureRng};

/// Default number of low bits dropped from every output.
pub const DEFAULT_SHIFT_BITS: u32 = 12;

/// A base point together with the group it lives in.
#[derive(Clone, Debug)]
pub struct BasePoint {
    pub group: LoakGroup,
    /// Walked by the generator; must belong to `group`.
    pub point: LoakElement,
}

impl BasePoint {
    /// Pairs a point with its group. The point is not validated here.
    pub fn new(group: LoakGroup, point: LoakElement) -> Self {
        Self { group, point }
    }

    fn walk_x(&self, scalar: &BigUint) -> BigUint {
        self.group
            .scalar_mul(&self.point, scalar)
            .into_coordinates()
            .0
    }
}

/// Chained generator: each step walks `P` by the seed, then walks `Q` by the result.
///
/// ```text
/// s'     = (seed * P).x
/// output = ((s' * Q).x) >> shift_bits
/// ```
///
/// The sequence cannot be rewound in place; keep the initial seed to replay it.
#[derive(Clone, Debug)]
pub struct LoakRng {
    seed: BigUint,
    first: BasePoint,
    second: BasePoint,
    shift_bits: u32,
}

impl LoakRng {
    /// Creates a generator that will next walk `first` by `seed`.
    pub fn new(seed: BigUint, first: BasePoint, second: BasePoint, shift_bits: u32) -> Self {
        Self {
            seed,
            first,
            second,
            shift_bits,
        }
    }

    /// The current internal state.
    pub fn seed(&self) -> &BigUint {
        &self.seed
    }

    /// Number of low bits dropped from every output.
    pub fn shift_bits(&self) -> u32 {
        self.shift_bits
    }

    /// Computes the next seed and output without mutating the generator.
    pub fn step(&self) -> (BigUint, BigUint) {
        let next_seed = self.first.walk_x(&self.seed);
        let output = self.second.walk_x(&next_seed) >> self.shift_bits;
        (next_seed, output)
    }

    /// Advances the generator and returns its output.
    pub fn next_output(&mut self) -> BigUint {
        let (next_seed, output) = self.step();
        self.seed = next_seed;
        output
    }
}

impl Iterator for LoakRng {
    type Item = BigUint;

    fn next(&mut self) -> Option<BigUint> {
        Some(self.next_output())
    }
}

/// Blum-Blum-Shub bit generator over a deliberately tiny modulus.
#[derive(Clone, Debug)]
pub struct BlumBlumShub {
    modulus: u64,
    state: u64,
}

impl BlumBlumShub {
    /// Creates a generator from an explicit modulus and initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the modulus is below 2.
    pub fn new(modulus: u64, state: u64) -> Result<Self> {
        if modulus < 2 {
            return Err(Error::InvalidParams(
                "BBS modulus must be at least 2".to_string(),
            ));
        }
        Ok(Self {
            modulus,
            state: state % modulus,
        })
    }

    /// Draws `M = p * q` from two 8-bit primes and a 15-bit prime seed.
    pub fn random(rng: &mut SecureRng) -> Self {
        let p = small_prime(8, rng);
        let q = small_prime(8, rng);
        let modulus = p * q;
        let state = small_prime(15, rng) % modulus;
        Self { modulus, state }
    }

    /// The modulus `M`.
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Squares the state and returns its low bit.
    pub fn next_bit(&mut self) -> bool {
        self.state = (self.state * self.state) % self.modulus;
        self.state & 1 == 1
    }
}

fn small_prime(bits: u64, rng: &mut SecureRng) -> u64 {
    generate_prime(bits, rng)
        .iter_u64_digits()
        .next()
        .unwrap_or_else(|| unreachable!("a generated prime is non-zero"))
}
