//! Score mappings attached to response declarations.

use crate::error::{QtiError, Result};
use crate::types::{check_value, BaseType, Cardinality, Scalar, Value};

/// Maps response values onto float scores.
///
/// Entries keep insertion order; only duplicate-key rejection depends on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    base_type: BaseType,
    default_value: f64,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
    entries: Vec<(Scalar, f64)>,
}

impl Mapping {
    pub fn new(base_type: BaseType) -> Self {
        Mapping {
            base_type,
            default_value: 0.0,
            lower_bound: None,
            upper_bound: None,
            entries: Vec::new(),
        }
    }

    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn lower_bound(&self) -> Option<f64> {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> Option<f64> {
        self.upper_bound
    }

    pub fn entries(&self) -> &[(Scalar, f64)] {
        &self.entries
    }

    pub fn set_default_value(&mut self, default_value: f64) -> Result<()> {
        self.default_value = finite(default_value, "mapping defaultValue")?;
        Ok(())
    }

    pub fn set_lower_bound(&mut self, bound: Option<f64>) -> Result<()> {
        let bound = bound.map(|b| finite(b, "mapping lowerBound")).transpose()?;
        check_bounds(bound, self.upper_bound)?;
        self.lower_bound = bound;
        Ok(())
    }

    pub fn set_upper_bound(&mut self, bound: Option<f64>) -> Result<()> {
        let bound = bound.map(|b| finite(b, "mapping upperBound")).transpose()?;
        check_bounds(self.lower_bound, bound)?;
        self.upper_bound = bound;
        Ok(())
    }

    /// Add a `mapKey -> mappedValue` entry; keys must be unique.
    pub fn add_entry(&mut self, key: Scalar, mapped_value: f64) -> Result<()> {
        check_value(
            Cardinality::Single,
            Some(self.base_type),
            &Value::Single(key.clone()),
        )?;
        let mapped_value = finite(mapped_value, "mappedValue")?;
        if self.lookup(&key).is_some() {
            return Err(QtiError::invariant(format!("duplicate mapKey: {}", key)));
        }
        self.entries.push((key, mapped_value));
        Ok(())
    }

    fn lookup(&self, key: &Scalar) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    fn map_one(&self, key: &Scalar) -> f64 {
        self.lookup(key).unwrap_or(self.default_value)
    }

    /// Map a response value to a score.
    ///
    /// A single value maps to its entry (or the default). A container sums
    /// the entries of its *distinct* members. The total is then clamped to
    /// the bounds, when set.
    pub fn map_value(&self, value: &Value) -> f64 {
        let raw = match value {
            Value::Single(s) => self.map_one(s),
            Value::List(items) => {
                let mut seen: Vec<&Scalar> = Vec::with_capacity(items.len());
                let mut total = 0.0;
                for item in items {
                    if seen.contains(&item) {
                        continue;
                    }
                    seen.push(item);
                    total += self.map_one(item);
                }
                total
            }
            Value::Null | Value::Record(_) => self.default_value,
        };
        self.clamp(raw)
    }

    fn clamp(&self, mut score: f64) -> f64 {
        if let Some(lower) = self.lower_bound {
            if score < lower {
                score = lower;
            }
        }
        if let Some(upper) = self.upper_bound {
            if score > upper {
                score = upper;
            }
        }
        score
    }
}

fn finite(x: f64, what: &str) -> Result<f64> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(QtiError::type_mismatch(format!("finite float for {}", what), x.to_string()))
    }
}

fn check_bounds(lower: Option<f64>, upper: Option<f64>) -> Result<()> {
    match (lower, upper) {
        (Some(l), Some(u)) if l > u => Err(QtiError::invariant(format!(
            "mapping lowerBound {} exceeds upperBound {}",
            l, u
        ))),
        _ => Ok(()),
    }
}
