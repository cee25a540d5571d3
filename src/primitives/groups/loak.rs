//! The "loak" ring group.
//!
//! Elements are pairs `(x, y)` standing for `x + y*t` in `F_p[t] / (t^2 + a*t + b)`.
//! Composition is ring multiplication, so the group is commutative with
//! identity `(1, 0)` and scalar multiplication is exponentiation.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::primitives::crypto::field::{reduce, sub_mod};
use crate::primitives::crypto::SecureRng;
use crate::{Error, Group, Result};

/// A group element. Carries no reference to its group.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LoakElement {
    x: BigUint,
    y: BigUint,
}

impl LoakElement {
    /// Constant coefficient.
    pub fn x(&self) -> &BigUint {
        &self.x
    }

    /// Coefficient of `t`.
    pub fn y(&self) -> &BigUint {
        &self.y
    }

    /// Consumes the element, returning `(x, y)`.
    pub fn into_coordinates(self) -> (BigUint, BigUint) {
        (self.x, self.y)
    }
}

/// Group parameters: modulus, structural constants and the weak-subgroup cofactor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoakGroup {
    modulus: BigUint,
    a: BigUint,
    b: BigUint,
    cofactor: BigUint,
}

impl LoakGroup {
    /// Creates a group over an arbitrary modulus.
    ///
    /// The constants are reduced mod `modulus`.
    ///
    /// # Errors
    ///
    /// Returns an error if the modulus is smaller than 2.
    pub fn new(modulus: BigUint, a: BigUint, b: BigUint, cofactor: BigUint) -> Result<Self> {
        if modulus < BigUint::from(2u32) {
            return Err(Error::InvalidParams(
                "modulus must be at least 2".to_string(),
            ));
        }
        let a = a % &modulus;
        let b = b % &modulus;
        Ok(Self {
            modulus,
            a,
            b,
            cofactor,
        })
    }

    /// Creates a group over the standard modulus with the standard cofactor.
    pub fn standard(a: BigUint, b: BigUint) -> Self {
        let modulus = loak_modulus();
        Self {
            a: a % &modulus,
            b: b % &modulus,
            modulus,
            cofactor: weak_cofactor(),
        }
    }

    /// The field modulus `p`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Linear coefficient of the defining polynomial.
    pub fn a(&self) -> &BigUint {
        &self.a
    }

    /// Constant coefficient of the defining polynomial.
    pub fn b(&self) -> &BigUint {
        &self.b
    }

    /// Exponent that sends every element of the weak subgroup to the identity.
    pub fn cofactor(&self) -> &BigUint {
        &self.cofactor
    }

    /// Builds an element from coordinates that must already lie in `[0, p)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroupElement`] if a coordinate is out of range.
    pub fn element(&self, x: BigUint, y: BigUint) -> Result<LoakElement> {
        if x >= self.modulus || y >= self.modulus {
            return Err(Error::InvalidGroupElement(
                "coordinates must be less than the modulus".to_string(),
            ));
        }
        Ok(LoakElement { x, y })
    }

    /// Builds an element from arbitrary signed coordinates, reducing both mod p.
    pub fn element_reduced(&self, x: &BigInt, y: &BigInt) -> Result<LoakElement> {
        Ok(LoakElement {
            x: reduce(x, &self.modulus)?,
            y: reduce(y, &self.modulus)?,
        })
    }

    /// Draws an element with both coordinates uniform in `[1, p)`.
    pub fn random_element(&self, rng: &mut SecureRng) -> LoakElement {
        let one = BigUint::one();
        LoakElement {
            x: rng.range(&one, &self.modulus),
            y: rng.range(&one, &self.modulus),
        }
    }
}

impl Group for LoakGroup {
    type Element = LoakElement;

    fn name(&self) -> &'static str {
        "loak"
    }

    fn identity(&self) -> LoakElement {
        LoakElement {
            x: BigUint::one(),
            y: BigUint::zero(),
        }
    }

    fn compose(&self, lhs: &LoakElement, rhs: &LoakElement) -> LoakElement {
        let p = &self.modulus;
        let a = (&lhs.x * &rhs.x) % p;
        let b = (&lhs.x * &rhs.y) % p;
        let c = (&lhs.y * &rhs.x) % p;
        let d = (&lhs.y * &rhs.y) % p;

        let x = sub_mod(&a, &((&self.b * &d) % p), p);
        let y = sub_mod(&((b + c) % p), &((&self.a * &d) % p), p);
        LoakElement { x, y }
    }

    fn validate_element(&self, element: &LoakElement) -> Result<()> {
        if element.x >= self.modulus || element.y >= self.modulus {
            return Err(Error::InvalidGroupElement(
                "coordinates must be less than the modulus".to_string(),
            ));
        }

        if self.is_identity(element) {
            return Err(Error::InvalidGroupElement(
                "element is the identity".to_string(),
            ));
        }

        if element.x.is_zero() || element.y.is_zero() {
            return Err(Error::InvalidGroupElement(
                "element has a zero coordinate".to_string(),
            ));
        }

        if self.is_identity(&self.scalar_mul(element, &self.cofactor)) {
            return Err(Error::InvalidGroupElement(
                "element lies in a weak subgroup".to_string(),
            ));
        }

        Ok(())
    }
}

/// The standard modulus shared by every loak session.
pub fn loak_modulus() -> BigUint {
    BigUint::parse_bytes(
        b"3711307719289846942219567023821864189758609249064872089779",
        10,
    )
    .unwrap_or_else(|| unreachable!("loak modulus literal is valid decimal"))
}

/// Elements whose order divides this value are rejected.
pub fn weak_cofactor() -> BigUint {
    BigUint::parse_bytes(b"195306067165045895827288868805553560", 10)
        .unwrap_or_else(|| unreachable!("cofactor literal is valid decimal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_group(cofactor: u32) -> LoakGroup {
        LoakGroup::new(
            BigUint::from(11u32),
            BigUint::from(2u32),
            BigUint::from(3u32),
            BigUint::from(cofactor),
        )
        .unwrap()
    }

    fn el(g: &LoakGroup, x: u32, y: u32) -> LoakElement {
        g.element(BigUint::from(x), BigUint::from(y)).unwrap()
    }

    #[test]
    fn compose_matches_hand_computation() {
        let g = small_group(3);
        // (1 + t)^2 = 1 + 2t + t^2 = 1 + 2t - 3 - 2t = -2
        let e = el(&g, 1, 1);
        assert_eq!(g.compose(&e, &e), el(&g, 9, 0));
    }

    #[test]
    fn identity_is_neutral() {
        let g = small_group(3);
        let e = el(&g, 4, 7);
        assert_eq!(g.compose(&e, &g.identity()), e);
        assert_eq!(g.compose(&g.identity(), &e), e);
    }

    #[test]
    fn scalar_mul_edge_cases() {
        let g = small_group(3);
        let e = el(&g, 1, 1);
        assert_eq!(g.scalar_mul(&e, &BigUint::zero()), g.identity());
        assert_eq!(g.scalar_mul(&e, &BigUint::one()), e);
        // (1 + t)^9 = (-2)^4 * (1 + t) = 5 * (1 + t)
        assert_eq!(g.scalar_mul(&e, &BigUint::from(9u32)), el(&g, 5, 5));
    }

    #[test]
    fn validation_rejects_degenerate_elements() {
        let g = small_group(3);
        assert!(g.validate_element(&g.identity()).is_err());
        assert!(g.validate_element(&el(&g, 0, 4)).is_err());
        assert!(g.validate_element(&el(&g, 4, 0)).is_err());
        assert!(g.validate_element(&el(&g, 1, 1)).is_ok());
    }

    #[test]
    fn validation_rejects_weak_subgroup() {
        // (1 + t)^10 = (-2)^5 = 1 mod 11, so a cofactor of 10 kills it.
        let g = small_group(10);
        assert!(matches!(
            g.validate_element(&el(&g, 1, 1)),
            Err(Error::InvalidGroupElement(_))
        ));
    }

    #[test]
    fn element_rejects_out_of_range_coordinates() {
        let g = small_group(3);
        assert!(g.element(BigUint::from(11u32), BigUint::one()).is_err());
        assert!(g.element(BigUint::one(), BigUint::from(12u32)).is_err());
    }

    #[test]
    fn element_reduced_wraps_signed_input() {
        let g = small_group(3);
        let e = g
            .element_reduced(&BigInt::from(-1), &BigInt::from(23))
            .unwrap();
        assert_eq!(e, el(&g, 10, 1));
    }

    #[test]
    fn standard_group_accepts_random_elements() {
        let g = LoakGroup::standard(BigUint::from(1234u32), BigUint::from(5678u32));
        let mut rng = SecureRng::new();
        let e = g.random_element(&mut rng);
        assert!(!e.x().is_zero() && !e.y().is_zero());
        assert!(e.x() < g.modulus() && e.y() < g.modulus());
    }

    #[test]
    fn new_rejects_tiny_modulus() {
        assert!(LoakGroup::new(
            BigUint::one(),
            BigUint::one(),
            BigUint::one(),
            BigUint::one()
        )
        .is_err());
    }
}
