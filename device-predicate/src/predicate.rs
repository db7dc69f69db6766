//! Predicate tree, evaluation and canonical rendering

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use device_backend::{DeviceObject, FetchMode, InterfaceType, PropertyValue};

use crate::error::{PredicateError, PredicateResult};
use crate::parser;

/// Comparison operator of a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Bit-mask test: `(value & mask) != 0`
    Mask,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Mask => false,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Mask => "&",
        })
    }
}

/// A parsed, immutable filter expression
///
/// # Example
///
/// ```rust
/// use device_predicate::Predicate;
/// use device_backend::InterfaceType;
///
/// let p = Predicate::parse("IS StorageAccess AND Block.Size > 0").unwrap();
/// assert!(p.used_types().contains(&InterfaceType::Block));
/// assert_eq!(p.to_string(), "[IS StorageAccess AND Block.Size > 0]");
///
/// assert!(!Predicate::new("Block.Size >").is_valid());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Predicate {
    /// Parsed from an empty string; matches every device
    #[default]
    Empty,
    /// Parsed from a malformed string; matches nothing
    Invalid,
    /// Device reports the capability type
    Is(InterfaceType),
    /// `Type.property <op> literal`
    Compare {
        ty: InterfaceType,
        property: String,
        op: CompareOp,
        value: PropertyValue,
    },
    /// Every operand matches
    And(Vec<Predicate>),
    /// At least one operand matches
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Parse with diagnostics
    pub fn parse(input: &str) -> PredicateResult<Self> {
        parser::parse(input)
    }

    /// Parse, mapping any failure to the invalid predicate
    pub fn from_str_lossy(input: &str) -> Self {
        match Self::parse(input) {
            Ok(predicate) => predicate,
            Err(err) => {
                warn!("Invalid predicate {:?}: {}", input, err);
                Predicate::Invalid
            }
        }
    }

    /// Shorthand for [`Predicate::from_str_lossy`]
    pub fn new(input: &str) -> Self {
        Self::from_str_lossy(input)
    }

    pub fn compare(
        ty: InterfaceType,
        property: impl Into<String>,
        op: CompareOp,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Predicate::Compare {
            ty,
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    /// Conjunction; chaining onto an `And` extends it instead of nesting
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut operands) => {
                operands.push(other);
                Predicate::And(operands)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Disjunction; chaining onto an `Or` extends it instead of nesting
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut operands) => {
                operands.push(other);
                Predicate::Or(operands)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::Empty)
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Predicate::Invalid)
    }

    /// Capability types referenced anywhere in the tree
    pub fn used_types(&self) -> BTreeSet<InterfaceType> {
        let mut types = BTreeSet::new();
        self.collect_types(&mut types);
        types
    }

    fn collect_types(&self, types: &mut BTreeSet<InterfaceType>) {
        match self {
            Predicate::Empty | Predicate::Invalid => {}
            Predicate::Is(ty) | Predicate::Compare { ty, .. } => {
                types.insert(*ty);
            }
            Predicate::And(operands) | Predicate::Or(operands) => {
                for operand in operands {
                    operand.collect_types(types);
                }
            }
        }
    }

    /// Evaluate against a device, fetching properties as needed
    pub fn matches(&self, device: &dyn DeviceObject) -> bool {
        match self {
            Predicate::Empty => true,
            Predicate::Invalid => false,
            Predicate::Is(ty) => device.query_interface(*ty),
            Predicate::Compare {
                ty,
                property,
                op,
                value,
            } => {
                if !device.query_interface(*ty) {
                    return false;
                }
                device
                    .property(*ty, property, FetchMode::FetchIfNeeded)
                    .is_some_and(|actual| compare(&actual, *op, value))
            }
            Predicate::And(operands) => operands.iter().all(|p| p.matches(device)),
            Predicate::Or(operands) => operands.iter().any(|p| p.matches(device)),
        }
    }
}

impl FromStr for Predicate {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Empty => Ok(()),
            Predicate::Invalid => f.write_str("<invalid>"),
            Predicate::Is(ty) => write!(f, "IS {}", ty),
            Predicate::Compare {
                ty,
                property,
                op,
                value,
            } => {
                write!(f, "{}.{} {} ", ty, property, op)?;
                write_literal(f, value)
            }
            Predicate::And(operands) => write_group(f, operands, " AND "),
            Predicate::Or(operands) => write_group(f, operands, " OR "),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, operands: &[Predicate], separator: &str) -> fmt::Result {
    f.write_str("[")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", operand)?;
    }
    f.write_str("]")
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &PropertyValue) -> fmt::Result {
    match value {
        PropertyValue::Str(s) if s.contains('\'') => write!(f, "\"{}\"", s),
        PropertyValue::Str(s) => write!(f, "'{}'", s),
        PropertyValue::Double(d) => write!(f, "{:?}", d),
        other => write!(f, "{}", other),
    }
}

// ============================================================================
// Leaf comparison
// ============================================================================

fn compare(actual: &PropertyValue, op: CompareOp, expected: &PropertyValue) -> bool {
    if op == CompareOp::Mask {
        return match (integer(actual), integer(expected)) {
            (Some(a), Some(m)) => a & m != 0,
            _ => false,
        };
    }

    if let PropertyValue::StrList(list) = actual {
        let contains = expected.as_str().map(|s| list.iter().any(|item| item == s));
        return match (op, contains) {
            (CompareOp::Eq, Some(found)) => found,
            (CompareOp::Ne, Some(found)) => !found,
            _ => false,
        };
    }

    ordering(actual, expected).is_some_and(|ordering| op.accepts(ordering))
}

fn integer(value: &PropertyValue) -> Option<i128> {
    match value {
        PropertyValue::Int(i) => Some(i128::from(*i)),
        PropertyValue::UInt(u) => Some(i128::from(*u)),
        _ => None,
    }
}

fn ordering(actual: &PropertyValue, expected: &PropertyValue) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (integer(actual), integer(expected)) {
        return Some(a.cmp(&b));
    }
    if actual.is_numeric() && expected.is_numeric() {
        return actual.as_f64()?.partial_cmp(&expected.as_f64()?);
    }

    match (actual, expected) {
        (PropertyValue::Str(a), PropertyValue::Str(b)) => Some(a.cmp(b)),
        (_, PropertyValue::Bool(b)) => actual.as_bool().map(|a| a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparisons_cross_variants() {
        assert!(compare(&PropertyValue::UInt(10), CompareOp::Gt, &PropertyValue::Int(-1)));
        assert!(compare(&PropertyValue::Double(2.5), CompareOp::Lt, &PropertyValue::UInt(3)));
        assert!(compare(&PropertyValue::UInt(u64::MAX), CompareOp::Gt, &PropertyValue::Int(i64::MAX)));
        assert!(compare(&PropertyValue::Int(4), CompareOp::Eq, &PropertyValue::Double(4.0)));
    }

    #[test]
    fn test_type_mismatch_is_false() {
        assert!(!compare(&PropertyValue::from("10"), CompareOp::Eq, &PropertyValue::Int(10)));
        assert!(!compare(&PropertyValue::from("10"), CompareOp::Ne, &PropertyValue::Int(10)));
        assert!(!compare(&PropertyValue::Bytes(vec![1]), CompareOp::Eq, &PropertyValue::from("x")));
    }

    #[test]
    fn test_string_list_membership() {
        let list = PropertyValue::StrList(vec!["audio".into(), "data".into()]);
        assert!(compare(&list, CompareOp::Eq, &PropertyValue::from("data")));
        assert!(compare(&list, CompareOp::Ne, &PropertyValue::from("video")));
        assert!(!compare(&list, CompareOp::Lt, &PropertyValue::from("zzz")));
    }

    #[test]
    fn test_mask() {
        assert!(compare(&PropertyValue::UInt(0b0110), CompareOp::Mask, &PropertyValue::Int(0b0100)));
        assert!(!compare(&PropertyValue::UInt(0b0110), CompareOp::Mask, &PropertyValue::Int(0b1001)));
        assert!(!compare(&PropertyValue::from("6"), CompareOp::Mask, &PropertyValue::Int(2)));
    }

    #[test]
    fn test_bool_against_string_flag() {
        assert!(compare(&PropertyValue::from("true"), CompareOp::Eq, &PropertyValue::Bool(true)));
        assert!(compare(&PropertyValue::Bool(false), CompareOp::Ne, &PropertyValue::Bool(true)));
    }

    #[test]
    fn test_used_types_and_validity() {
        let p = Predicate::Is(InterfaceType::Block)
            .and(Predicate::compare(InterfaceType::StorageVolume, "usage", CompareOp::Eq, "FileSystem"))
            .or(Predicate::Is(InterfaceType::Block));
        assert_eq!(
            p.used_types().into_iter().collect::<Vec<_>>(),
            vec![InterfaceType::Block, InterfaceType::StorageVolume]
        );
        assert!(p.is_valid());
        assert!(!p.is_empty());
        assert!(Predicate::Invalid.used_types().is_empty());
    }

    #[test]
    fn test_chained_builders_stay_flat() {
        let p = Predicate::Is(InterfaceType::Block)
            .and(Predicate::Is(InterfaceType::Camera))
            .and(Predicate::Is(InterfaceType::Battery));
        assert!(matches!(&p, Predicate::And(operands) if operands.len() == 3));
        assert_eq!(p.to_string(), "[IS Block AND IS Camera AND IS Battery]");

        let nested = Predicate::Is(InterfaceType::Block).or(p);
        assert!(matches!(&nested, Predicate::Or(operands) if operands.len() == 2));
    }

    #[test]
    fn test_display_literals() {
        let p = Predicate::compare(InterfaceType::Block, "Label", CompareOp::Eq, "it's");
        assert_eq!(p.to_string(), "Block.Label == \"it's\"");

        let p = Predicate::compare(InterfaceType::Battery, "ChargePercent", CompareOp::Ge, 1.0);
        assert_eq!(p.to_string(), "Battery.ChargePercent >= 1.0");
        assert_eq!(Predicate::Empty.to_string(), "");
    }
}
