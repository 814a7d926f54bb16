//! Runtime values and the value validator.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{QtiError, Result};

use super::{compare_base_types, BaseType, Cardinality};

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

/// An already-validated URI reference.
///
/// URI grammar belongs to the parsing layer; here we only refuse strings
/// that could never be a URI reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri(String);

impl Uri {
    pub fn parse(s: &str) -> Result<Uri> {
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(QtiError::type_mismatch("a URI reference", s));
        }
        Ok(Uri(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single value of one base type. The variant determines the base type.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Identifier(String),
    Boolean(bool),
    Integer(i32),
    Float(f64),
    String(String),
    Point(i32, i32),
    Pair(String, String),
    DirectedPair(String, String),
    Duration(time::Duration),
    File(String),
    Uri(Uri),
}

impl Scalar {
    pub fn base_type(&self) -> BaseType {
        match self {
            Scalar::Identifier(_) => BaseType::Identifier,
            Scalar::Boolean(_) => BaseType::Boolean,
            Scalar::Integer(_) => BaseType::Integer,
            Scalar::Float(_) => BaseType::Float,
            Scalar::String(_) => BaseType::String,
            Scalar::Point(..) => BaseType::Point,
            Scalar::Pair(..) => BaseType::Pair,
            Scalar::DirectedPair(..) => BaseType::DirectedPair,
            Scalar::Duration(_) => BaseType::Duration,
            Scalar::File(_) => BaseType::File,
            Scalar::Uri(_) => BaseType::Uri,
        }
    }

    pub fn identifier(s: impl Into<String>) -> Scalar {
        Scalar::Identifier(s.into())
    }

    pub fn string(s: impl Into<String>) -> Scalar {
        Scalar::String(s.into())
    }

    /// The text of an Identifier, String or File scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Identifier(s) | Scalar::String(s) | Scalar::File(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Single-value match: unordered pairs compare in either orientation.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Pair(a0, a1), Scalar::Pair(b0, b1)) => {
                (a0 == b0 && a1 == b1) || (a0 == b1 && a1 == b0)
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Identifier(s) | Scalar::String(s) | Scalar::File(s) => f.write_str(s),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Point(x, y) => write!(f, "{} {}", x, y),
            Scalar::Pair(a, b) | Scalar::DirectedPair(a, b) => write!(f, "{} {}", a, b),
            Scalar::Duration(d) => write!(f, "{}", d.as_seconds_f64()),
            Scalar::Uri(u) => write!(f, "{}", u),
        }
    }
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// A runtime value. Multiple and Ordered share the `List` shape; the
/// cardinality travels alongside in [`TypedValue`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Single(Scalar),
    List(Vec<Scalar>),
    Record(BTreeMap<String, Scalar>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Single(_) => "single value",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            Value::Single(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Single(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Single(s) => write!(f, "{}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// The (cardinality, baseType, value) triple every expression produces
/// and every session cell stores.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub cardinality: Cardinality,
    pub base_type: Option<BaseType>,
    pub value: Value,
}

impl TypedValue {
    pub fn new(cardinality: Cardinality, base_type: Option<BaseType>, value: Value) -> Self {
        TypedValue {
            cardinality,
            base_type,
            value,
        }
    }

    pub fn null(cardinality: Cardinality, base_type: Option<BaseType>) -> Self {
        TypedValue::new(cardinality, base_type, Value::Null)
    }

    pub fn single(scalar: Scalar) -> Self {
        TypedValue::new(
            Cardinality::Single,
            Some(scalar.base_type()),
            Value::Single(scalar),
        )
    }

    /// A Single Boolean; `None` is NULL.
    pub fn boolean(b: Option<bool>) -> Self {
        TypedValue::new(
            Cardinality::Single,
            Some(BaseType::Boolean),
            b.map_or(Value::Null, |b| Value::Single(Scalar::Boolean(b))),
        )
    }

    /// A Single Float; `None` is NULL.
    pub fn float(x: Option<f64>) -> Self {
        TypedValue::new(
            Cardinality::Single,
            Some(BaseType::Float),
            x.map_or(Value::Null, |x| Value::Single(Scalar::Float(x))),
        )
    }

    /// Reads a Single Boolean: `Some(b)` or `None` for NULL.
    pub fn as_bool(&self) -> Result<Option<bool>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Single(Scalar::Boolean(b)) => Ok(Some(*b)),
            other => Err(QtiError::type_mismatch(
                "a single boolean",
                other.shape_name(),
            )),
        }
    }

    /// Validate this triple against its own cardinality and baseType.
    pub fn check(&self) -> Result<()> {
        check_value(self.cardinality, self.base_type, &self.value)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base_type {
            Some(bt) => write!(f, "{}/{} {}", self.cardinality, bt, self.value),
            None => write!(f, "{} {}", self.cardinality, self.value),
        }
    }
}

// ──────────────────────────────────────────────
// Validation, null-ness and matching
// ──────────────────────────────────────────────

/// Check that `value` is a legal value for a variable of the given
/// cardinality and baseType. NULL is legal everywhere.
pub fn check_value(
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    value: &Value,
) -> Result<()> {
    let expected = || match base_type {
        Some(bt) => format!("{} {}", cardinality, bt),
        None => cardinality.to_string(),
    };
    match (cardinality, value) {
        (_, Value::Null) => Ok(()),
        (Cardinality::Single, Value::Single(scalar)) => {
            check_scalar(base_type, scalar).map_err(|_| {
                QtiError::type_mismatch(expected(), format!("single {}", scalar.base_type()))
            })
        }
        (Cardinality::Multiple | Cardinality::Ordered, Value::List(items)) => {
            for item in items {
                check_scalar(base_type, item).map_err(|_| {
                    QtiError::type_mismatch(
                        expected(),
                        format!("list containing {}", item.base_type()),
                    )
                })?;
            }
            Ok(())
        }
        (Cardinality::Record, Value::Record(fields)) => {
            for (field, scalar) in fields {
                super::check_identifier(field)?;
                check_scalar(Some(scalar.base_type()), scalar)?;
            }
            Ok(())
        }
        (_, other) => Err(QtiError::type_mismatch(expected(), other.shape_name())),
    }
}

fn check_scalar(base_type: Option<BaseType>, scalar: &Scalar) -> Result<()> {
    if !compare_base_types(base_type, Some(scalar.base_type())) {
        return Err(QtiError::type_mismatch(
            base_type.map(|b| b.to_string()).unwrap_or_default(),
            scalar.base_type().to_string(),
        ));
    }
    if let Scalar::Float(x) = scalar {
        if x.is_nan() {
            return Err(QtiError::type_mismatch("a float", "NaN"));
        }
    }
    Ok(())
}

/// NULL, the empty string, the empty container and the empty record are
/// all treated as NULL by the operators that test for it.
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Single(s) => s.as_text().is_some_and(str::is_empty),
        Value::List(items) => items.is_empty(),
        Value::Record(fields) => fields.is_empty(),
    }
}

/// Structural equality respecting the cardinality: Multiple compares as a
/// bag, Ordered element-wise, Record field by field.
pub fn match_values(cardinality: Cardinality, a: &Value, b: &Value) -> bool {
    match (cardinality, a, b) {
        (Cardinality::Single, Value::Single(a), Value::Single(b)) => a.matches(b),
        (Cardinality::Multiple, Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut remaining: Vec<&Scalar> = a.iter().collect();
            for item in b {
                match remaining.iter().position(|r| r.matches(item)) {
                    Some(index) => {
                        remaining.swap_remove(index);
                    }
                    None => return false,
                }
            }
            true
        }
        (Cardinality::Ordered, Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
        }
        (Cardinality::Record, Value::Record(a), Value::Record(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, va)| {
                    b.get(k)
                        .is_some_and(|vb| va.base_type() == vb.base_type() && va.matches(vb))
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Scalar::identifier(*s)).collect())
    }

    #[test]
    fn null_is_valid_for_every_declaration() {
        for c in Cardinality::ALL {
            for bt in BaseType::ALL {
                assert!(check_value(c, Some(bt), &Value::Null).is_ok());
            }
        }
    }

    #[test]
    fn single_values_must_match_the_base_type() {
        for bt in BaseType::ALL {
            let integer = Value::Single(Scalar::Integer(3));
            let result = check_value(Cardinality::Single, Some(bt), &integer);
            assert_eq!(result.is_ok(), bt == BaseType::Integer, "{}", bt);
        }
        let text = Value::Single(Scalar::string("A"));
        assert!(check_value(Cardinality::Single, Some(BaseType::Identifier), &text).is_err());
        let boolean = Value::Single(Scalar::Boolean(true));
        assert!(check_value(Cardinality::Single, Some(BaseType::Boolean), &boolean).is_ok());
    }

    #[test]
    fn containers_must_be_homogeneous_lists() {
        let id = Some(BaseType::Identifier);
        assert!(check_value(Cardinality::Multiple, id, &ids(&["A", "B"])).is_ok());
        assert!(check_value(Cardinality::Ordered, id, &ids(&[])).is_ok());
        let mixed = Value::List(vec![Scalar::identifier("A"), Scalar::Integer(1)]);
        assert!(check_value(Cardinality::Multiple, id, &mixed).is_err());
        // A list is not a single value and vice versa.
        assert!(check_value(Cardinality::Single, id, &ids(&["A"])).is_err());
        let single = Value::Single(Scalar::identifier("A"));
        assert!(check_value(Cardinality::Multiple, id, &single).is_err());
    }

    #[test]
    fn records_hold_heterogeneous_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Scalar::string("x"));
        fields.insert("count".to_string(), Scalar::Integer(2));
        assert!(check_value(Cardinality::Record, None, &Value::Record(fields.clone())).is_ok());
        let record = Value::Record(fields);
        assert!(check_value(Cardinality::Single, Some(BaseType::String), &record).is_err());

        let mut bad = BTreeMap::new();
        bad.insert("1bad".to_string(), Scalar::Integer(2));
        assert!(check_value(Cardinality::Record, None, &Value::Record(bad)).is_err());
    }

    #[test]
    fn nan_is_not_a_float() {
        let nan = Value::Single(Scalar::Float(f64::NAN));
        assert!(check_value(Cardinality::Single, Some(BaseType::Float), &nan).is_err());
    }

    #[test]
    fn empty_things_are_null() {
        assert!(is_null(&Value::Null));
        assert!(is_null(&Value::Single(Scalar::string(""))));
        assert!(is_null(&ids(&[])));
        assert!(is_null(&Value::Record(BTreeMap::new())));
        assert!(!is_null(&Value::Single(Scalar::Integer(0))));
        assert!(!is_null(&Value::Single(Scalar::string(" "))));
    }

    #[test]
    fn multiple_matches_as_a_bag() {
        let bag = ids(&["A", "A", "B"]);
        assert!(match_values(Cardinality::Multiple, &ids(&["A", "B", "A"]), &bag));
        assert!(!match_values(Cardinality::Multiple, &ids(&["A", "B", "B"]), &bag));
        assert!(!match_values(Cardinality::Ordered, &ids(&["A", "B"]), &ids(&["B", "A"])));
        assert!(match_values(Cardinality::Ordered, &ids(&["A", "B"]), &ids(&["A", "B"])));
    }

    #[test]
    fn pairs_are_unordered_directed_pairs_are_not() {
        let p = Value::Single(Scalar::Pair("A".into(), "B".into()));
        let q = Value::Single(Scalar::Pair("B".into(), "A".into()));
        assert!(match_values(Cardinality::Single, &p, &q));
        let dp = Value::Single(Scalar::DirectedPair("A".into(), "B".into()));
        let dq = Value::Single(Scalar::DirectedPair("B".into(), "A".into()));
        assert!(!match_values(Cardinality::Single, &dp, &dq));
    }

    #[test]
    fn typed_value_reads_booleans() {
        assert_eq!(TypedValue::boolean(Some(true)).as_bool().unwrap(), Some(true));
        assert_eq!(TypedValue::boolean(None).as_bool().unwrap(), None);
        assert!(TypedValue::single(Scalar::Integer(1)).as_bool().is_err());
    }
}
