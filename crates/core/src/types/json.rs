//! JSON conversion for values crossing into and out of the engine.
//!
//! The delivery layer hands candidate responses over as plain JSON; the
//! declaration supplies the cardinality and baseType needed to read them.

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::{QtiError, Result};

use super::values::{Scalar, TypedValue, Uri, Value};
use super::{BaseType, Cardinality};

impl TypedValue {
    /// Read a JSON value as a value of the given cardinality and baseType.
    ///
    /// `null` is NULL for every declaration. Record values are objects of
    /// `{"baseType": ..., "value": ...}` entries keyed by field identifier.
    pub fn from_json(
        cardinality: Cardinality,
        base_type: Option<BaseType>,
        v: &serde_json::Value,
    ) -> Result<TypedValue> {
        let value = parse_value(cardinality, base_type, v)?;
        let typed = TypedValue::new(cardinality, base_type, value);
        typed.check()?;
        Ok(typed)
    }

    pub fn to_json(&self) -> serde_json::Value {
        value_to_json(&self.value)
    }
}

fn parse_value(
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    v: &serde_json::Value,
) -> Result<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    match cardinality {
        Cardinality::Single => Ok(Value::Single(parse_scalar(require(base_type)?, v)?)),
        Cardinality::Multiple | Cardinality::Ordered => {
            let bt = require(base_type)?;
            let arr = v.as_array().ok_or_else(|| {
                QtiError::deserialize(format!("expected array for {} value", cardinality))
            })?;
            let items: Result<Vec<Scalar>> =
                arr.iter().map(|item| parse_scalar(bt, item)).collect();
            Ok(Value::List(items?))
        }
        Cardinality::Record => {
            let obj = v
                .as_object()
                .ok_or_else(|| QtiError::deserialize("expected object for record value"))?;
            let mut fields = BTreeMap::new();
            for (field, entry) in obj {
                let bt = entry
                    .get("baseType")
                    .and_then(|b| b.as_str())
                    .ok_or_else(|| {
                        QtiError::deserialize(format!("record field '{field}' missing 'baseType'"))
                    })?
                    .parse::<BaseType>()?;
                let inner = entry.get("value").ok_or_else(|| {
                    QtiError::deserialize(format!("record field '{}' missing 'value'", field))
                })?;
                fields.insert(field.clone(), parse_scalar(bt, inner)?);
            }
            Ok(Value::Record(fields))
        }
    }
}

fn require(base_type: Option<BaseType>) -> Result<BaseType> {
    base_type.ok_or_else(|| QtiError::deserialize("non-record value requires a baseType"))
}

fn parse_scalar(base_type: BaseType, v: &serde_json::Value) -> Result<Scalar> {
    let text = || {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| QtiError::deserialize(format!("expected string for {}", base_type)))
    };
    match base_type {
        BaseType::Identifier => Ok(Scalar::Identifier(text()?)),
        BaseType::String => Ok(Scalar::String(text()?)),
        BaseType::File => Ok(Scalar::File(text()?)),
        BaseType::Uri => Ok(Scalar::Uri(Uri::parse(&text()?)?)),
        BaseType::Boolean => v
            .as_bool()
            .map(Scalar::Boolean)
            .ok_or_else(|| QtiError::deserialize("expected boolean")),
        BaseType::Integer => parse_integer(v).map(Scalar::Integer),
        BaseType::Float => v
            .as_f64()
            .map(Scalar::Float)
            .ok_or_else(|| QtiError::deserialize("expected number for float")),
        BaseType::Point => {
            let (x, y) = two_items(v, base_type)?;
            Ok(Scalar::Point(parse_integer(x)?, parse_integer(y)?))
        }
        BaseType::Pair | BaseType::DirectedPair => {
            let (a, b) = parse_pair(v)?;
            if base_type == BaseType::Pair {
                Ok(Scalar::Pair(a, b))
            } else {
                Ok(Scalar::DirectedPair(a, b))
            }
        }
        BaseType::Duration => {
            let seconds = v
                .as_f64()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| {
                    QtiError::deserialize("expected non-negative seconds for duration")
                })?;
            time::Duration::checked_seconds_f64(seconds)
                .map(Scalar::Duration)
                .ok_or_else(|| {
                    QtiError::deserialize(format!("duration of {seconds}s is out of range"))
                })
        }
    }
}

fn parse_integer(v: &serde_json::Value) -> Result<i32> {
    let i = v
        .as_i64()
        .ok_or_else(|| QtiError::deserialize("expected integer"))?;
    i32::try_from(i).map_err(|_| {
        QtiError::deserialize(format!("{} exceeds maximum integer size defined by QTI", i))
    })
}

fn two_items(
    v: &serde_json::Value,
    base_type: BaseType,
) -> Result<(&serde_json::Value, &serde_json::Value)> {
    match v.as_array().map(Vec::as_slice) {
        Some([a, b]) => Ok((a, b)),
        _ => Err(QtiError::deserialize(format!(
            "{} requires exactly 2 items",
            base_type
        ))),
    }
}

/// Pairs arrive either as `["A", "B"]` or in the QTI text form `"A B"`.
fn parse_pair(v: &serde_json::Value) -> Result<(String, String)> {
    let (a, b) = if let Some(s) = v.as_str() {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [a, b] => (a.to_string(), b.to_string()),
            _ => {
                return Err(QtiError::deserialize(format!(
                    "pair requires exactly 2 identifiers: {}",
                    s
                )))
            }
        }
    } else {
        let (a, b) = two_items(v, BaseType::Pair)?;
        match (a.as_str(), b.as_str()) {
            (Some(a), Some(b)) => (a.to_string(), b.to_string()),
            _ => return Err(QtiError::deserialize("pair items must be strings")),
        }
    };
    super::check_identifier(&a)?;
    super::check_identifier(&b)?;
    Ok((a, b))
}

fn scalar_to_json(s: &Scalar) -> serde_json::Value {
    match s {
        Scalar::Identifier(t) | Scalar::String(t) | Scalar::File(t) => json!(t),
        Scalar::Uri(u) => json!(u.as_str()),
        Scalar::Boolean(b) => json!(b),
        Scalar::Integer(i) => json!(i),
        Scalar::Float(x) => json!(x),
        Scalar::Point(x, y) => json!([x, y]),
        Scalar::Pair(a, b) | Scalar::DirectedPair(a, b) => json!([a, b]),
        Scalar::Duration(d) => json!(d.as_seconds_f64()),
    }
}

/// Convert a runtime value to JSON for output.
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Single(s) => scalar_to_json(s),
        Value::List(items) => serde_json::Value::Array(items.iter().map(scalar_to_json).collect()),
        Value::Record(fields) => {
            let mut map = serde_json::Map::new();
            for (k, s) in fields {
                map.insert(
                    k.clone(),
                    json!({ "baseType": s.base_type().as_str(), "value": scalar_to_json(s) }),
                );
            }
            serde_json::Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(card: Cardinality, bt: BaseType, v: serde_json::Value) -> Result<TypedValue> {
        TypedValue::from_json(card, Some(bt), &v)
    }

    #[test]
    fn reads_single_values() {
        let v = read(Cardinality::Single, BaseType::Identifier, json!("ChoiceA")).unwrap();
        assert_eq!(v.value, Value::Single(Scalar::identifier("ChoiceA")));

        let p = read(Cardinality::Single, BaseType::Point, json!([3, -4])).unwrap();
        assert_eq!(p.value, Value::Single(Scalar::Point(3, -4)));

        let d = read(Cardinality::Single, BaseType::Duration, json!(1.5)).unwrap();
        assert_eq!(
            d.value,
            Value::Single(Scalar::Duration(time::Duration::milliseconds(1500)))
        );
    }

    #[test]
    fn null_reads_as_null() {
        let v = read(Cardinality::Ordered, BaseType::Integer, json!(null)).unwrap();
        assert!(v.value.is_null());
    }

    #[test]
    fn rejects_wrong_json_shapes() {
        assert!(read(Cardinality::Single, BaseType::Integer, json!("1")).is_err());
        assert!(read(Cardinality::Single, BaseType::Integer, json!(1.5)).is_err());
        assert!(read(Cardinality::Single, BaseType::Integer, json!(4_000_000_000i64)).is_err());
        assert!(read(Cardinality::Multiple, BaseType::String, json!("a")).is_err());
        assert!(read(Cardinality::Single, BaseType::Point, json!([1])).is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let huge = read(Cardinality::Single, BaseType::Duration, json!(1e300));
        assert!(matches!(huge, Err(QtiError::Deserialize { .. })));
        let negative = read(Cardinality::Single, BaseType::Duration, json!(-1.0));
        assert!(matches!(negative, Err(QtiError::Deserialize { .. })));
        let list = read(Cardinality::Multiple, BaseType::Duration, json!([1.0, 1e300]));
        assert!(matches!(list, Err(QtiError::Deserialize { .. })));
    }

    #[test]
    fn pairs_accept_text_form() {
        let v = read(Cardinality::Single, BaseType::Pair, json!("A B")).unwrap();
        assert_eq!(v.value, Value::Single(Scalar::Pair("A".into(), "B".into())));
        assert!(read(Cardinality::Single, BaseType::Pair, json!("A B C")).is_err());
        assert!(read(Cardinality::Single, BaseType::DirectedPair, json!(["A", "9"])).is_err());
    }

    #[test]
    fn records_round_trip() {
        let input = json!({
            "score": { "baseType": "float", "value": 2.5 },
            "name": { "baseType": "string", "value": "x" }
        });
        let v = TypedValue::from_json(Cardinality::Record, None, &input).unwrap();
        assert_eq!(v.to_json(), input);
    }

    #[test]
    fn lists_round_trip() {
        let input = json!(["A", "B", "A"]);
        let v = read(Cardinality::Multiple, BaseType::Identifier, input.clone()).unwrap();
        assert_eq!(v.to_json(), input);
    }
}
