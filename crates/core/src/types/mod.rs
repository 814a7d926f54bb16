//! The QTI type system: base types, cardinalities and runtime values.
//!
//! A typed value is always the triple (cardinality, baseType, value).
//! `baseType` is optional because NULL literals and record containers have
//! none; an absent baseType is compatible with every other baseType.

pub mod json;
pub mod values;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QtiError, Result};

pub use values::{check_value, is_null, match_values, Scalar, TypedValue, Uri, Value};

// ──────────────────────────────────────────────
// BaseType
// ──────────────────────────────────────────────

/// The scalar kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Identifier,
    Boolean,
    Integer,
    Float,
    String,
    Point,
    Pair,
    DirectedPair,
    Duration,
    File,
    #[serde(rename = "uri")]
    Uri,
}

impl BaseType {
    pub const ALL: [BaseType; 11] = [
        BaseType::Identifier,
        BaseType::Boolean,
        BaseType::Integer,
        BaseType::Float,
        BaseType::String,
        BaseType::Point,
        BaseType::Pair,
        BaseType::DirectedPair,
        BaseType::Duration,
        BaseType::File,
        BaseType::Uri,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Identifier => "identifier",
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Point => "point",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directedPair",
            BaseType::Duration => "duration",
            BaseType::File => "file",
            BaseType::Uri => "uri",
        }
    }

    /// True for Integer and Float.
    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = QtiError;

    fn from_str(s: &str) -> Result<Self> {
        BaseType::ALL
            .iter()
            .find(|bt| bt.as_str() == s)
            .copied()
            .ok_or_else(|| QtiError::type_mismatch("a QTI baseType", s))
    }
}

/// Two base types are compatible when they are equal or either is absent.
pub fn compare_base_types(a: Option<BaseType>, b: Option<BaseType>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

// ──────────────────────────────────────────────
// Cardinality
// ──────────────────────────────────────────────

/// The shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    /// Unordered bag.
    Multiple,
    /// Sequence.
    Ordered,
    /// Named heterogeneous fields; never carries a single baseType.
    Record,
}

impl Cardinality {
    pub const ALL: [Cardinality; 4] = [
        Cardinality::Single,
        Cardinality::Multiple,
        Cardinality::Ordered,
        Cardinality::Record,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
            Cardinality::Record => "record",
        }
    }

    /// Multiple or Ordered.
    pub fn is_container(&self) -> bool {
        matches!(self, Cardinality::Multiple | Cardinality::Ordered)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = QtiError;

    fn from_str(s: &str) -> Result<Self> {
        Cardinality::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| QtiError::type_mismatch("a QTI cardinality", s))
    }
}

// ──────────────────────────────────────────────
// Identifiers
// ──────────────────────────────────────────────

/// Validate a QTI identifier: a letter or `_`, then letters, digits, `_`,
/// `-` or `.`.
pub fn check_identifier(identifier: &str) -> Result<()> {
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(QtiError::type_mismatch("a QTI identifier", identifier))
    }
}
