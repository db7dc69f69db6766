//! Property-based tests for predicate parsing

use proptest::prelude::*;

use device_backend::InterfaceType;
use device_predicate::{CompareOp, Predicate};

fn interface_strategy() -> impl Strategy<Value = InterfaceType> {
    prop::sample::select(InterfaceType::ALL.to_vec())
}

fn leaf_strategy() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        interface_strategy().prop_map(Predicate::Is),
        (interface_strategy(), "p[A-Za-z0-9_]{0,10}", any::<i64>()).prop_map(
            |(ty, property, value)| Predicate::compare(ty, property, CompareOp::Ge, value)
        ),
        (interface_strategy(), "p[A-Za-z0-9_]{0,10}", "[a-z /_.-]{0,12}").prop_map(
            |(ty, property, value)| Predicate::compare(ty, property, CompareOp::Eq, value)
        ),
    ]
}

fn predicate_strategy() -> impl Strategy<Value = Predicate> {
    leaf_strategy().prop_recursive(4, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| l.and(r)),
            (inner.clone(), inner).prop_map(|(l, r)| l.or(r)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Arbitrary input never panics; anything that fails to parse is the
    /// invalid predicate and references no types.
    #[test]
    fn prop_arbitrary_input_degrades(input in ".{0,40}") {
        match Predicate::parse(&input) {
            Ok(p) => prop_assert!(p.is_valid()),
            Err(_) => {
                let lossy = Predicate::from_str_lossy(&input);
                prop_assert!(!lossy.is_valid());
                prop_assert!(lossy.used_types().is_empty());
            }
        }
    }

    /// The canonical rendering of a tree parses back to the same tree.
    #[test]
    fn prop_display_reparses(p in predicate_strategy()) {
        let rendered = p.to_string();
        prop_assert_eq!(Predicate::parse(&rendered), Ok(p));
    }
}
