//! Oversized input: deep grouping and very long AND/OR runs

use std::collections::BTreeSet;

use rstest::rstest;

use device_backend::{DeviceObject, FetchMode, InterfaceType, PropertyValue};
use device_predicate::{Predicate, PredicateError, MAX_DEPTH};

struct BlockDevice;

impl DeviceObject for BlockDevice {
    fn udi(&self) -> &str {
        "/test/sda"
    }

    fn parent_udi(&self) -> Option<String> {
        None
    }

    fn interfaces(&self) -> BTreeSet<InterfaceType> {
        BTreeSet::from([InterfaceType::GenericInterface, InterfaceType::Block])
    }

    fn property(&self, _: InterfaceType, _: &str, _: FetchMode) -> Option<PropertyValue> {
        None
    }
}

fn wrapped(open: &str, close: &str, depth: usize) -> String {
    format!("{}IS Block{}", open.repeat(depth), close.repeat(depth))
}

#[rstest]
#[case("(", ")")]
#[case("[", "]")]
fn test_deep_grouping_is_rejected(#[case] open: &str, #[case] close: &str) {
    let input = wrapped(open, close, 5_000);

    assert_eq!(
        Predicate::parse(&input),
        Err(PredicateError::TooDeep { offset: MAX_DEPTH })
    );
    let lossy = Predicate::from_str_lossy(&input);
    assert!(!lossy.is_valid());
    assert!(!lossy.matches(&BlockDevice));
}

#[test]
fn test_grouping_up_to_limit_still_matches() {
    let p = Predicate::parse(&wrapped("(", ")", MAX_DEPTH)).unwrap();
    assert!(p.matches(&BlockDevice));
}

#[rstest]
#[case(" AND ")]
#[case(" OR ")]
fn test_long_runs_evaluate_and_drop(#[case] separator: &str) {
    let input = vec!["IS Block"; 200_000].join(separator);

    let p = Predicate::from_str_lossy(&input);
    assert!(p.is_valid());
    assert!(p.matches(&BlockDevice));
    assert_eq!(p.used_types(), BTreeSet::from([InterfaceType::Block]));
    drop(p);
}

#[test]
fn test_long_builder_chain_stays_flat() {
    let mut p = Predicate::Is(InterfaceType::Block);
    for _ in 0..100_000 {
        p = p.and(Predicate::Is(InterfaceType::Block));
    }

    assert!(matches!(&p, Predicate::And(operands) if operands.len() == 100_001));
    assert!(p.matches(&BlockDevice));
}
