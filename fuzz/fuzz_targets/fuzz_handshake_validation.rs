#![no_main]

use libfuzzer_sys::fuzz_target;
use num_bigint::BigUint;
use oracle_arena::{BasePoint, Dispatcher, GuessingGame, GuessingSetup, LoakGroup};
use oracle_arena::protocol::GuessingRules;
use zeroize::Zeroizing;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let group = LoakGroup::standard(BigUint::from(7u32), BigUint::from(11u32));
    let Ok(point) = group.element(BigUint::from(3u32), BigUint::from(4u32)) else {
        return;
    };
    let setup = GuessingSetup {
        a1: BigUint::from(5u32),
        second: BasePoint::new(group, point),
        seed: BigUint::from(1u32),
    };
    let mut game = GuessingGame::new(
        setup,
        GuessingRules::default(),
        Zeroizing::new("flag{fuzz}".to_string()),
    );

    // Every line must either be rejected or accepted, never abort the session.
    for part in line.lines().take(4) {
        assert!(game.handle(part).is_ok());
    }
});
