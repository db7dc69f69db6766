//! Property values reported by platform services
//!
//! Platform services hand out loosely typed values. `PropertyValue` keeps the
//! handful of shapes the registry cares about and offers lossy accessors for
//! comparisons and capability views.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Property name -> value for one interface
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Interface name -> properties for one device
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// A single concrete property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(String),
    StrList(Vec<String>),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Normalize byte strings into text
    ///
    /// Services frequently transmit paths as NUL-terminated byte arrays.
    /// Those become `Str`; any other byte payload is left untouched.
    pub fn sanitize(self) -> Self {
        match self {
            PropertyValue::Bytes(bytes) => {
                let text = match bytes.split_last() {
                    Some((&0, body)) if !body.contains(&0) => {
                        std::str::from_utf8(body).ok().map(str::to_string)
                    }
                    _ => None,
                };
                match text {
                    Some(text) => PropertyValue::Str(text),
                    None => PropertyValue::Bytes(bytes),
                }
            }
            other => other,
        }
    }

    /// Sanitize every value of a property map
    pub fn sanitize_map(map: PropertyMap) -> PropertyMap {
        map.into_iter().map(|(k, v)| (k, v.sanitize())).collect()
    }

    /// Sanitize every value of an interface map
    pub fn sanitize_interfaces(map: InterfaceMap) -> InterfaceMap {
        map.into_iter()
            .map(|(iface, props)| (iface, Self::sanitize_map(props)))
            .collect()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Int(i) => Some(*i != 0),
            PropertyValue::UInt(u) => Some(*u != 0),
            PropertyValue::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::UInt(u) => i64::try_from(*u).ok(),
            PropertyValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::UInt(u) => Some(*u),
            PropertyValue::Int(i) => u64::try_from(*i).ok(),
            PropertyValue::Bool(b) => Some(u64::from(*b)),
            PropertyValue::Double(d) if *d >= 0.0 && d.fract() == 0.0 => Some(*d as u64),
            _ => None,
        }
    }

    /// Numeric view used for ordering comparisons
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::StrList(list) => Some(list),
            _ => None,
        }
    }

    /// Whether the value is one of the numeric variants
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PropertyValue::Int(_) | PropertyValue::UInt(_) | PropertyValue::Double(_)
        )
    }

    /// Like `as_u64` but reports which property failed to convert
    pub fn expect_u64(&self, property: &str) -> Result<u64> {
        self.as_u64().ok_or_else(|| BackendError::ValueConversion {
            property: property.to_string(),
            expected: "unsigned integer",
        })
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::UInt(u) => write!(f, "{}", u),
            PropertyValue::Double(d) => write!(f, "{}", d),
            PropertyValue::Str(s) => write!(f, "'{}'", s),
            PropertyValue::StrList(list) => write!(f, "[{}]", list.join(", ")),
            PropertyValue::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::UInt(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::StrList(v)
    }
}
