//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use num_bigint::BigUint;
use oracle_arena::primitives::DEFAULT_SHIFT_BITS;
use oracle_arena::{BasePoint, GuessingSetup, LoakGroup, LoakRng};

/// Initialize test tracing (call once at the beginning of tests).
///
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("oracle_arena=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

pub fn big(v: u64) -> BigUint {
    BigUint::from(v)
}

/// A guessing game whose randomness is known to the test.
pub fn known_setup() -> GuessingSetup {
    let group = LoakGroup::standard(big(7), big(11));
    let point = group.element(big(3), big(4)).unwrap();
    GuessingSetup {
        a1: big(5),
        second: BasePoint::new(group, point),
        seed: big(123_456_789),
    }
}

/// The handshake sent by [`replica`]'s client.
pub const HANDSHAKE: &str = r#"{"b1": 13, "x": 2, "y": "3"}"#;

/// Client-side copy of the generator that [`HANDSHAKE`] sets up.
pub fn replica(setup: &GuessingSetup) -> LoakRng {
    let group = LoakGroup::standard(setup.a1.clone(), big(13));
    let point = group.element(big(2), big(3)).unwrap();
    LoakRng::new(
        setup.seed.clone(),
        BasePoint::new(group, point),
        setup.second.clone(),
        DEFAULT_SHIFT_BITS,
    )
}

/// Parses one outbound line.
pub fn json(line: &str) -> serde_json::Value {
    serde_json::from_str(line).unwrap()
}
