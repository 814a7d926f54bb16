//! Operators of the expression language.
//!
//! Every operator is three-valued over booleans: a NULL operand usually
//! yields a NULL result instead of an error. Type errors, on the other
//! hand, are hard errors; they are normally caught when the tree is built
//! (see [`crate::expression::ExpressionBuilder`]) because building trial
//! evaluates each node without a session.

use std::fmt;

use assessa_core::{
    check_identifier, compare_base_types, is_null, match_values, BaseType, Cardinality,
    QtiError, Result, Scalar, TypedValue, Value,
};
use rand::Rng;

use crate::expression::Expression;
use crate::session::ItemSession;

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Not,
    And,
    Or,
    AnyN { min: u32, max: u32 },
    IsNull,
    Multiple,
    Ordered,
    Member,
    /// 1-based position in an ordered container.
    Index { n: u32 },
    FieldValue { field: String },
    Random,
    Delete,
    Contains,
    StringMatch { case_sensitive: bool, substring: bool },
    /// First operand is the substring, second the string searched.
    Substring { case_sensitive: bool },
    Match,
}

impl Operator {
    /// QTI element name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::AnyN { .. } => "anyN",
            Operator::IsNull => "isNull",
            Operator::Multiple => "multiple",
            Operator::Ordered => "ordered",
            Operator::Member => "member",
            Operator::Index { .. } => "index",
            Operator::FieldValue { .. } => "fieldValue",
            Operator::Random => "random",
            Operator::Delete => "delete",
            Operator::Contains => "contains",
            Operator::StringMatch { .. } => "stringMatch",
            Operator::Substring { .. } => "substring",
            Operator::Match => "match",
        }
    }

    pub fn min_arity(&self) -> usize {
        match self {
            Operator::Member
            | Operator::Delete
            | Operator::Contains
            | Operator::StringMatch { .. }
            | Operator::Substring { .. }
            | Operator::Match => 2,
            _ => 1,
        }
    }

    /// `None` means unbounded.
    pub fn max_arity(&self) -> Option<usize> {
        match self {
            Operator::And
            | Operator::Or
            | Operator::AnyN { .. }
            | Operator::Multiple
            | Operator::Ordered => None,
            _ => Some(self.min_arity()),
        }
    }

    /// Check the operator's own attributes.
    pub fn validate(&self) -> Result<()> {
        match self {
            Operator::AnyN { min, max } if min > max => Err(QtiError::invariant(format!(
                "anyN requires min <= max, got min={} max={}",
                min, max
            ))),
            Operator::Index { n: 0 } => Err(QtiError::invariant("index is 1-based, got n=0")),
            Operator::FieldValue { field } => check_identifier(field),
            _ => Ok(()),
        }
    }

    /// The typing rule for the operand at `index`, given the operands that
    /// precede it. Only cardinality and baseType are inspected, so this is
    /// equally valid for trial values and live ones.
    pub fn check_operand(
        &self,
        index: usize,
        operand: &TypedValue,
        earlier: &[TypedValue],
    ) -> Result<()> {
        let name = self.name();
        match self {
            Operator::Not | Operator::And | Operator::Or | Operator::AnyN { .. } => {
                expect_cardinality(name, operand, &[Cardinality::Single], "single")?;
                expect_base_type(name, operand, BaseType::Boolean)
            }
            Operator::IsNull => Ok(()),
            Operator::Multiple | Operator::Ordered => {
                let container = if *self == Operator::Multiple {
                    Cardinality::Multiple
                } else {
                    Cardinality::Ordered
                };
                expect_cardinality(
                    name,
                    operand,
                    &[Cardinality::Single, container],
                    format!("single or {}", container),
                )?;
                let shared = earlier.iter().find_map(|e| e.base_type);
                expect_compatible(name, shared, operand.base_type)
            }
            Operator::Member | Operator::Delete => match index {
                0 => {
                    expect_cardinality(name, operand, &[Cardinality::Single], "single")?;
                    if *self == Operator::Member {
                        forbid_duration(name, operand)?;
                    }
                    Ok(())
                }
                _ => {
                    expect_container(name, operand)?;
                    if *self == Operator::Member {
                        forbid_duration(name, operand)?;
                    }
                    let member = earlier.first().and_then(|e| e.base_type);
                    expect_compatible(name, member, operand.base_type)
                }
            },
            Operator::Index { .. } => {
                expect_cardinality(name, operand, &[Cardinality::Ordered], "ordered")
            }
            Operator::FieldValue { .. } => {
                expect_cardinality(name, operand, &[Cardinality::Record], "record")
            }
            Operator::Random => expect_container(name, operand),
            Operator::Contains => {
                forbid_duration(name, operand)?;
                match earlier.first() {
                    None => expect_container(name, operand),
                    Some(first) => {
                        expect_cardinality(
                            name,
                            operand,
                            &[first.cardinality],
                            first.cardinality.to_string(),
                        )?;
                        expect_compatible(name, first.base_type, operand.base_type)
                    }
                }
            }
            Operator::StringMatch { .. } | Operator::Substring { .. } => {
                expect_cardinality(name, operand, &[Cardinality::Single], "single")?;
                expect_base_type(name, operand, BaseType::String)
            }
            Operator::Match => {
                forbid_duration(name, operand)?;
                if let Some(first) = earlier.first() {
                    expect_cardinality(
                        name,
                        operand,
                        &[first.cardinality],
                        first.cardinality.to_string(),
                    )?;
                    expect_compatible(name, first.base_type, operand.base_type)?;
                }
                Ok(())
            }
        }
    }

    /// Apply the operator to `children`, evaluating them against `session`.
    pub(crate) fn apply(
        &self,
        children: &[Expression],
        session: Option<&ItemSession>,
    ) -> Result<TypedValue> {
        match self {
            Operator::And => {
                // Scan order matters: the first False or NULL decides.
                for (i, child) in children.iter().enumerate() {
                    let v = child.evaluate(session)?;
                    self.check_operand(i, &v, &[])?;
                    match v.as_bool()? {
                        Some(true) => continue,
                        Some(false) => return Ok(TypedValue::boolean(Some(false))),
                        None => return Ok(TypedValue::boolean(None)),
                    }
                }
                Ok(TypedValue::boolean(Some(true)))
            }
            Operator::Or => {
                let mut result = Some(false);
                for v in self.operands(children, session)? {
                    match v.as_bool()? {
                        Some(true) => result = Some(true),
                        Some(false) => {}
                        None if result == Some(false) => result = None,
                        None => {}
                    }
                }
                Ok(TypedValue::boolean(result))
            }
            Operator::AnyN { min, max } => {
                let (mut t, mut u) = (0u32, 0u32);
                for v in self.operands(children, session)? {
                    match v.as_bool()? {
                        Some(true) => t += 1,
                        Some(false) => {}
                        None => u += 1,
                    }
                }
                Ok(TypedValue::boolean(any_n(*min, *max, t, u)))
            }
            _ => {
                let operands = self.operands(children, session)?;
                self.combine(operands, session)
            }
        }
    }

    /// Evaluate all children, checking each operand as it arrives.
    fn operands(
        &self,
        children: &[Expression],
        session: Option<&ItemSession>,
    ) -> Result<Vec<TypedValue>> {
        let mut values: Vec<TypedValue> = Vec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            let v = child.evaluate(session)?;
            self.check_operand(i, &v, &values)?;
            values.push(v);
        }
        Ok(values)
    }

    fn combine(
        &self,
        mut operands: Vec<TypedValue>,
        session: Option<&ItemSession>,
    ) -> Result<TypedValue> {
        let null_bool = TypedValue::boolean(None);
        match self {
            Operator::Not => {
                let b = operands[0].as_bool()?;
                Ok(TypedValue::boolean(b.map(|b| !b)))
            }
            Operator::IsNull => Ok(TypedValue::boolean(Some(is_null(&operands[0].value)))),
            Operator::Multiple | Operator::Ordered => {
                let cardinality = if *self == Operator::Multiple {
                    Cardinality::Multiple
                } else {
                    Cardinality::Ordered
                };
                let base_type = operands.iter().find_map(|o| o.base_type);
                let mut items = Vec::new();
                for operand in operands {
                    match operand.value {
                        Value::Single(s) => items.push(s),
                        Value::List(list) => items.extend(list),
                        Value::Null | Value::Record(_) => {}
                    }
                }
                let value = if items.is_empty() {
                    Value::Null
                } else {
                    Value::List(items)
                };
                Ok(TypedValue::new(cardinality, base_type, value))
            }
            Operator::Member => {
                let (member, container) = (&operands[0].value, &operands[1].value);
                if is_null(member) || is_null(container) {
                    return Ok(null_bool);
                }
                let found = match (member.as_single(), container.as_list()) {
                    (Some(m), Some(items)) => items.iter().any(|i| i.matches(m)),
                    _ => false,
                };
                Ok(TypedValue::boolean(Some(found)))
            }
            Operator::Index { n } => {
                let container = operands.swap_remove(0);
                let picked = container
                    .value
                    .as_list()
                    .zip((*n as usize).checked_sub(1))
                    .and_then(|(items, i)| items.get(i))
                    .cloned();
                Ok(TypedValue::new(
                    Cardinality::Single,
                    container.base_type,
                    picked.map_or(Value::Null, Value::Single),
                ))
            }
            Operator::FieldValue { field } => {
                let field = match &operands[0].value {
                    Value::Record(fields) => fields.get(field).cloned(),
                    _ => None,
                };
                Ok(match field {
                    Some(s) => TypedValue::single(s),
                    None => TypedValue::null(Cardinality::Single, None),
                })
            }
            Operator::Random => {
                let container = operands.swap_remove(0);
                let picked = match container.value.as_list() {
                    Some(items) if !items.is_empty() => {
                        let i = match session {
                            Some(s) => s.random_index(items.len()),
                            None => rand::thread_rng().gen_range(0..items.len()),
                        };
                        Value::Single(items[i].clone())
                    }
                    _ => Value::Null,
                };
                Ok(TypedValue::new(Cardinality::Single, container.base_type, picked))
            }
            Operator::Delete => {
                let container = operands.swap_remove(1);
                let unwanted = operands.swap_remove(0);
                let base_type = container.base_type.or(unwanted.base_type);
                let value = match (&unwanted.value, &container.value) {
                    (Value::Single(u), Value::List(items))
                        if !is_null(&unwanted.value) && !items.is_empty() =>
                    {
                        Value::List(items.iter().filter(|i| !i.matches(u)).cloned().collect())
                    }
                    _ => Value::Null,
                };
                Ok(TypedValue::new(container.cardinality, base_type, value))
            }
            Operator::Contains => {
                let (container, sub) = (&operands[0], &operands[1]);
                let (Some(items), Some(wanted)) = (container.value.as_list(), sub.value.as_list())
                else {
                    return Ok(null_bool);
                };
                if items.is_empty() || wanted.is_empty() {
                    return Ok(null_bool);
                }
                let found = if container.cardinality == Cardinality::Multiple {
                    contains_bag(items, wanted)
                } else {
                    items
                        .windows(wanted.len())
                        .any(|w| w.iter().zip(wanted).all(|(a, b)| a.matches(b)))
                };
                Ok(TypedValue::boolean(Some(found)))
            }
            Operator::StringMatch {
                case_sensitive,
                substring,
            } => {
                let Some((a, b)) = text_pair(&operands, *case_sensitive) else {
                    return Ok(null_bool);
                };
                let found = if *substring { a.contains(&b) } else { a == b };
                Ok(TypedValue::boolean(Some(found)))
            }
            Operator::Substring { case_sensitive } => {
                let Some((sub, string)) = text_pair(&operands, *case_sensitive) else {
                    return Ok(null_bool);
                };
                Ok(TypedValue::boolean(Some(string.contains(&sub))))
            }
            Operator::Match => {
                let (a, b) = (&operands[0], &operands[1]);
                if is_null(&a.value) || is_null(&b.value) {
                    return Ok(null_bool);
                }
                Ok(TypedValue::boolean(Some(match_values(
                    a.cardinality,
                    &a.value,
                    &b.value,
                ))))
            }
            Operator::And | Operator::Or | Operator::AnyN { .. } => Err(QtiError::invariant(
                format!("{} is applied by scanning its children", self.name()),
            )),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `t` children were true and `u` were NULL.
pub(crate) fn any_n(min: u32, max: u32, t: u32, u: u32) -> Option<bool> {
    if t > max {
        Some(false)
    } else if t >= min {
        if t + u > max {
            None
        } else {
            Some(true)
        }
    } else if t + u >= min {
        None
    } else {
        Some(false)
    }
}

/// Every element of `wanted` is consumed from a working copy of `items`.
fn contains_bag(items: &[Scalar], wanted: &[Scalar]) -> bool {
    let mut remaining: Vec<&Scalar> = items.iter().collect();
    for w in wanted {
        match remaining.iter().position(|r| r.matches(w)) {
            Some(i) => {
                remaining.swap_remove(i);
            }
            None => return false,
        }
    }
    true
}

/// Both operands' text, folded when matching is case-insensitive. `None`
/// when either is NULL or empty.
fn text_pair(operands: &[TypedValue], case_sensitive: bool) -> Option<(String, String)> {
    let text = |v: &TypedValue| -> Option<String> {
        let s = v.value.as_single()?.as_text()?;
        if s.is_empty() {
            return None;
        }
        Some(if case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        })
    };
    Some((text(&operands[0])?, text(&operands[1])?))
}

// ──────────────────────────────────────────────
// Typing helpers
// ──────────────────────────────────────────────

fn expect_cardinality(
    operator: &str,
    operand: &TypedValue,
    allowed: &[Cardinality],
    expected: impl Into<String>,
) -> Result<()> {
    if allowed.contains(&operand.cardinality) {
        Ok(())
    } else {
        Err(QtiError::cardinality(operator, expected, operand.cardinality))
    }
}

fn expect_container(operator: &str, operand: &TypedValue) -> Result<()> {
    expect_cardinality(
        operator,
        operand,
        &[Cardinality::Multiple, Cardinality::Ordered],
        "multiple or ordered",
    )
}

fn expect_base_type(operator: &str, operand: &TypedValue, base_type: BaseType) -> Result<()> {
    expect_compatible(operator, Some(base_type), operand.base_type)
}

fn expect_compatible(
    operator: &str,
    expected: Option<BaseType>,
    got: Option<BaseType>,
) -> Result<()> {
    if compare_base_types(expected, got) {
        Ok(())
    } else {
        Err(QtiError::base_type_mismatch(operator, expected, got))
    }
}

fn forbid_duration(operator: &str, operand: &TypedValue) -> Result<()> {
    if operand.base_type == Some(BaseType::Duration) {
        return Err(QtiError::type_mismatch(
            format!("a non-duration operand in {}", operator),
            "duration",
        ));
    }
    Ok(())
}
