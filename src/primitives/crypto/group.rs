use core::fmt::Debug;

use num_bigint::BigUint;

use crate::Result;

/// A commutative group (or monoid) whose parameters live in the group value.
///
/// Elements are plain values; every operation takes the group explicitly, so
/// elements never need to point back at the structure that produced them.
pub trait Group: Clone + Debug + Send + Sync {
    /// Element type for this group.
    type Element: Clone + Debug + Eq + PartialEq + Send + Sync;

    /// Returns the name of this group, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the neutral element.
    fn identity(&self) -> Self::Element;

    /// Applies the group operation.
    fn compose(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Checks that an element supplied from outside is safe to use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroupElement`](crate::Error::InvalidGroupElement)
    /// if the element is out of range or degenerate.
    fn validate_element(&self, element: &Self::Element) -> Result<()>;

    /// Checks whether `element` is the neutral element.
    fn is_identity(&self, element: &Self::Element) -> bool {
        *element == self.identity()
    }

    /// Composes `element` with itself `n` times using double-and-add.
    ///
    /// `n = 0` yields the identity.
    fn scalar_mul(&self, element: &Self::Element, n: &BigUint) -> Self::Element {
        let mut result = self.identity();
        let mut base = element.clone();
        let bits = n.bits();
        for i in 0..bits {
            if n.bit(i) {
                result = self.compose(&result, &base);
            }
            if i + 1 < bits {
                base = self.compose(&base, &base);
            }
        }
        result
    }
}
