/// Modular arithmetic helpers.
pub mod field;
/// Group trait and double-and-add scalar multiplication.
pub mod group;
/// Probable-prime testing and generation.
pub mod prime;
/// Cryptographically secure random number generation.
pub mod rng;

pub use group::Group;
pub use rng::SecureRng;
