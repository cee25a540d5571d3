// Identification and generation of probable primes.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};

const MILLER_RABIN_ROUNDS: u32 = 24;

const SMALL_ODD_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

pub fn is_probable_prime<R: RandBigInt + ?Sized>(candidate: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if candidate < &two {
        return false;
    }
    if candidate == &two {
        return true;
    }
    if candidate.is_even() {
        return false;
    }

    for small in SMALL_ODD_PRIMES {
        let small = BigUint::from(small);
        if candidate == &small {
            return true;
        }
        if (candidate % &small).is_zero() {
            return false;
        }
    }

    miller_rabin(candidate, MILLER_RABIN_ROUNDS, rng)
}

fn miller_rabin<R: RandBigInt + ?Sized>(candidate: &BigUint, rounds: u32, rng: &mut R) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let minus_one = candidate - &one;

    let mut d = minus_one.clone();
    let mut r = 0u32;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &minus_one);
        let mut x = a.modpow(&d, candidate);
        if x == one || x == minus_one {
            continue;
        }
        for _ in 1..r {
            x = x.modpow(&two, candidate);
            if x == minus_one {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

/// Generates a probable prime with exactly `bits` bits.
///
/// # Panics
/// Panics if `bits < 2`.
pub fn generate_prime<R: RandBigInt + ?Sized>(bits: u64, rng: &mut R) -> BigUint {
    assert!(bits >= 2, "a prime needs at least two bits");
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, rng) {
            return candidate;
        }
    }
}
