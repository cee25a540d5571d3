use num_bigint::BigUint;
use num_traits::Zero;
use oracle_arena::protocol::{BudgetRules, Record, RoundMachine, RoundOutcome, RoundState};
use oracle_arena::{BasePoint, Group, LoakElement, LoakGroup, LoakRng};
use proptest::prelude::*;

const SMALL_PRIME: u32 = 1009;

fn small_group(a: u32, b: u32) -> LoakGroup {
    LoakGroup::new(
        BigUint::from(SMALL_PRIME),
        BigUint::from(a),
        BigUint::from(b),
        BigUint::from(1u32),
    )
    .unwrap()
}

fn element(group: &LoakGroup, x: u32, y: u32) -> LoakElement {
    group
        .element(BigUint::from(x), BigUint::from(y))
        .unwrap()
}

proptest! {
    #[test]
    fn composition_is_associative_and_commutative(
        a in 0..SMALL_PRIME, b in 0..SMALL_PRIME,
        coords in prop::array::uniform6(0..SMALL_PRIME),
    ) {
        let g = small_group(a, b);
        let x = element(&g, coords[0], coords[1]);
        let y = element(&g, coords[2], coords[3]);
        let z = element(&g, coords[4], coords[5]);

        prop_assert_eq!(
            g.compose(&g.compose(&x, &y), &z),
            g.compose(&x, &g.compose(&y, &z))
        );
        prop_assert_eq!(g.compose(&x, &y), g.compose(&y, &x));
        prop_assert_eq!(g.compose(&x, &g.identity()), x);
    }

    #[test]
    fn scalar_mul_matches_repeated_composition(
        a in 0..SMALL_PRIME, b in 0..SMALL_PRIME,
        x in 0..SMALL_PRIME, y in 0..SMALL_PRIME,
        n in 0u32..64,
    ) {
        let g = small_group(a, b);
        let e = element(&g, x, y);

        let mut expected = g.identity();
        for _ in 0..n {
            expected = g.compose(&expected, &e);
        }
        prop_assert_eq!(g.scalar_mul(&e, &BigUint::from(n)), expected);
    }

    #[test]
    fn scalar_mul_distributes_over_addition(
        x in 1..SMALL_PRIME, y in 1..SMALL_PRIME,
        m in any::<u64>(), n in any::<u64>(),
    ) {
        let g = small_group(2, 3);
        let e = element(&g, x, y);
        let (m, n) = (BigUint::from(m), BigUint::from(n));

        prop_assert_eq!(
            g.scalar_mul(&e, &(&m + &n)),
            g.compose(&g.scalar_mul(&e, &m), &g.scalar_mul(&e, &n))
        );
    }

    #[test]
    fn generator_is_deterministic(
        a in any::<u64>(), b in any::<u64>(),
        x in 1u64.., y in 1u64..,
        seed in any::<u64>(),
    ) {
        let g = LoakGroup::standard(BigUint::from(a), BigUint::from(b));
        let point = g.element(BigUint::from(x), BigUint::from(y)).unwrap();
        let base = BasePoint::new(g, point);

        let build = || LoakRng::new(BigUint::from(seed), base.clone(), base.clone(), 12);
        let first: Vec<BigUint> = build().take(4).collect();
        let second: Vec<BigUint> = build().take(4).collect();
        prop_assert_eq!(&first, &second);

        let modulus_bits = base.group.modulus().bits();
        for output in &first {
            prop_assert!(output.bits() <= modulus_bits - 12);
        }
    }

    #[test]
    fn budget_settles_once_and_stays_settled(outcomes in prop::collection::vec(any::<bool>(), 0..64)) {
        let rules = BudgetRules::default();
        let mut machine = RoundMachine::new(rules);
        let mut settled: Option<RoundState> = None;
        let mut disclosures = 0;

        for hit in outcomes {
            let outcome = if hit { RoundOutcome::Hit } else { RoundOutcome::Miss };
            match (machine.record(outcome), settled) {
                (Ok(state), None) => {
                    if state.is_terminal() {
                        settled = Some(state);
                    }
                    match state {
                        RoundState::Lost => prop_assert!(machine.budget() <= 0),
                        RoundState::Won => prop_assert!(machine.budget() >= 12000),
                        _ => prop_assert!(machine.budget() > 0 && machine.budget() < 12000),
                    }
                }
                (Err(_), Some(state)) => prop_assert_eq!(machine.state(), state),
                (result, previous) => {
                    prop_assert!(false, "unexpected {:?} after {:?}", result.map(|_| ()), previous);
                }
            }
            if machine.claim_disclosure() {
                disclosures += 1;
            }
        }

        prop_assert!(disclosures <= 1);
        prop_assert_eq!(disclosures == 1, settled == Some(RoundState::Won));
    }

    #[test]
    fn record_parsing_never_panics(input in ".{0,256}") {
        if let Ok(record) = Record::parse(&input) {
            for key in ["nextLoak", "b1", "choice", "ciphertext"] {
                let _ = record.integer(key);
                let _ = record.flexible_unsigned(key);
                let _ = record.hex_bytes(key);
            }
        }
    }

    #[test]
    fn decimal_and_hex_notations_agree(value in any::<u128>()) {
        let line = format!(
            r#"{{"dec": "{value}", "num": {value}, "hex": "0x{value:x}"}}"#
        );
        let record = Record::parse(&line).unwrap();
        let expected = BigUint::from(value);
        prop_assert_eq!(record.flexible_unsigned("dec").unwrap(), expected.clone());
        prop_assert_eq!(record.flexible_unsigned("num").unwrap(), expected.clone());
        prop_assert_eq!(record.flexible_unsigned("hex").unwrap(), expected);
    }
}

#[test]
fn zero_scalar_gives_identity_on_the_standard_group() {
    let g = LoakGroup::standard(BigUint::from(3u32), BigUint::from(5u32));
    let e = g.element(BigUint::from(7u32), BigUint::from(9u32)).unwrap();
    assert_eq!(g.scalar_mul(&e, &BigUint::zero()), g.identity());
}
