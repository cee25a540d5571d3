//! Core mathematical building blocks of the hosted challenges.
//!
//! - **crypto**: modular helpers, the group trait, primes and secure randomness
//! - **groups**: the loak ring group
//! - **prng**: the chained loak generator and the Blum-Blum-Shub bit source

/// Cryptographic primitives and traits.
pub mod crypto;
/// Group implementations.
pub mod groups;
/// Deterministic generators.
pub mod prng;

pub use crypto::{Group, SecureRng};
pub use groups::{LoakElement, LoakGroup};
pub use prng::{BasePoint, BlumBlumShub, LoakRng, DEFAULT_SHIFT_BITS};
