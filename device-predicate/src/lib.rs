//! # device-predicate
//!
//! Boolean filter expressions over device capability types and properties.
//!
//! ```text
//! IS StorageAccess AND (StorageVolume.usage == 'FileSystem' OR Block.Size > 0)
//! ```
//!
//! A string that fails to parse becomes a predicate that matches nothing,
//! so queries built from user input degrade to empty results instead of
//! erroring. Use [`Predicate::parse`] when the diagnostic matters.
//!
//! ## Usage
//!
//! ```rust
//! use device_predicate::Predicate;
//!
//! let p = Predicate::new("IS OpticalDisc AND OpticalDisc.Blank == true");
//! assert!(p.is_valid());
//!
//! let broken = Predicate::new("OpticalDisc.Blank ==");
//! assert!(!broken.is_valid());
//!
//! assert!(Predicate::new("").is_empty());
//! ```

pub mod error;
mod lexer;
mod parser;
pub mod predicate;

pub use error::{PredicateError, PredicateResult};
pub use parser::MAX_DEPTH;
pub use predicate::{CompareOp, Predicate};
