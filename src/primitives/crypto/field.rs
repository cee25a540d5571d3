use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::Zero;

use crate::{Error, Result};

/// Computes `(a - b) mod modulus` for operands already reduced below `modulus`.
pub fn sub_mod(a: &BigUint, b: &BigUint, modulus: &BigUint) -> BigUint {
    if a >= b {
        (a - b) % modulus
    } else {
        (modulus - (b - a) % modulus) % modulus
    }
}

/// Reduces a signed integer into `[0, modulus)`.
///
/// Negative inputs wrap around the way a mathematical remainder does, so
/// `-1` becomes `modulus - 1`.
///
/// # Errors
///
/// Returns an error if the modulus is zero.
pub fn reduce(value: &BigInt, modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() {
        return Err(Error::InvalidParams("modulus cannot be zero".to_string()));
    }
    let m = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let r = value.mod_floor(&m);
    Ok(r.magnitude().clone())
}
