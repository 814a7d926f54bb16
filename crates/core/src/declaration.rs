//! Variable declarations: the static metadata of response and outcome
//! variables.

use crate::error::{QtiError, Result};
use crate::mapping::Mapping;
use crate::types::{
    check_identifier, check_value, BaseType, Cardinality, Scalar, TypedValue, Uri, Value,
};

/// Identifier, type and default value shared by every declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    identifier: String,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    default_value: Value,
    default_interpretation: Option<String>,
}

impl VariableDeclaration {
    /// Record declarations take no baseType; every other cardinality needs
    /// one.
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        check_identifier(&identifier)?;
        match (cardinality, base_type) {
            (Cardinality::Record, Some(bt)) => {
                return Err(QtiError::invariant(format!(
                    "{}: record variables have no baseType (got {})",
                    identifier, bt
                )))
            }
            (c, None) if c != Cardinality::Record => {
                return Err(QtiError::invariant(format!(
                    "{}: {} variables require a baseType",
                    identifier, c
                )))
            }
            _ => {}
        }
        Ok(VariableDeclaration {
            identifier,
            cardinality,
            base_type,
            default_value: Value::Null,
            default_interpretation: None,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn base_type(&self) -> Option<BaseType> {
        self.base_type
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    pub fn default_interpretation(&self) -> Option<&str> {
        self.default_interpretation.as_deref()
    }

    pub fn set_default_value(&mut self, value: Value) -> Result<()> {
        self.check(&value)?;
        self.default_value = value;
        Ok(())
    }

    pub fn set_default_interpretation(&mut self, interpretation: Option<String>) {
        self.default_interpretation = interpretation;
    }

    /// Validate a value against this declaration's cardinality and baseType.
    pub fn check(&self, value: &Value) -> Result<()> {
        check_value(self.cardinality, self.base_type, value)
    }

    /// The declared type carrying a NULL value.
    pub fn null_value(&self) -> TypedValue {
        TypedValue::null(self.cardinality, self.base_type)
    }

    pub fn typed(&self, value: Value) -> TypedValue {
        TypedValue::new(self.cardinality, self.base_type, value)
    }
}

/// A response variable: what the candidate supplies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDeclaration {
    variable: VariableDeclaration,
    correct_value: Value,
    correct_interpretation: Option<String>,
    mapping: Option<Mapping>,
}

impl ResponseDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Result<Self> {
        Ok(ResponseDeclaration {
            variable: VariableDeclaration::new(identifier, cardinality, base_type)?,
            correct_value: Value::Null,
            correct_interpretation: None,
            mapping: None,
        })
    }

    pub fn variable(&self) -> &VariableDeclaration {
        &self.variable
    }

    pub fn set_default_value(&mut self, value: Value) -> Result<()> {
        self.variable.set_default_value(value)
    }

    pub fn set_default_interpretation(&mut self, interpretation: Option<String>) {
        self.variable.set_default_interpretation(interpretation)
    }

    pub fn correct_value(&self) -> &Value {
        &self.correct_value
    }

    pub fn correct_interpretation(&self) -> Option<&str> {
        self.correct_interpretation.as_deref()
    }

    pub fn set_correct_value(&mut self, value: Value) -> Result<()> {
        self.variable.check(&value)?;
        self.correct_value = value;
        Ok(())
    }

    pub fn set_correct_interpretation(&mut self, interpretation: Option<String>) {
        self.correct_interpretation = interpretation;
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    /// Attach a fresh mapping (default 0.0, no bounds) and return it for
    /// population. Replaces any earlier mapping.
    pub fn create_mapping(&mut self) -> Result<&mut Mapping> {
        let base_type = self.variable.base_type.ok_or_else(|| {
            QtiError::invariant(format!(
                "{}: record responses cannot be mapped",
                self.variable.identifier
            ))
        })?;
        Ok(self.mapping.insert(Mapping::new(base_type)))
    }
}

/// An outcome variable: what response processing computes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeDeclaration {
    variable: VariableDeclaration,
    interpretation: Option<String>,
    long_interpretation: Option<Uri>,
    normal_maximum: Option<f64>,
}

impl OutcomeDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Result<Self> {
        Ok(OutcomeDeclaration {
            variable: VariableDeclaration::new(identifier, cardinality, base_type)?,
            interpretation: None,
            long_interpretation: None,
            normal_maximum: None,
        })
    }

    pub fn variable(&self) -> &VariableDeclaration {
        &self.variable
    }

    pub fn set_default_value(&mut self, value: Value) -> Result<()> {
        self.variable.set_default_value(value)
    }

    pub fn set_default_interpretation(&mut self, interpretation: Option<String>) {
        self.variable.set_default_interpretation(interpretation)
    }

    pub fn interpretation(&self) -> Option<&str> {
        self.interpretation.as_deref()
    }

    pub fn set_interpretation(&mut self, interpretation: Option<String>) {
        self.interpretation = interpretation;
    }

    pub fn long_interpretation(&self) -> Option<&Uri> {
        self.long_interpretation.as_ref()
    }

    pub fn set_long_interpretation(&mut self, uri: Option<Uri>) {
        self.long_interpretation = uri;
    }

    pub fn normal_maximum(&self) -> Option<f64> {
        self.normal_maximum
    }

    pub fn set_normal_maximum(&mut self, normal_maximum: Option<f64>) -> Result<()> {
        if let Some(max) = normal_maximum {
            if !max.is_finite() {
                return Err(QtiError::type_mismatch("finite normalMaximum", max.to_string()));
            }
        }
        self.normal_maximum = normal_maximum;
        Ok(())
    }

    /// The value an outcome takes before grading: its default, or zero for
    /// single numeric outcomes that have none.
    pub fn initial_value(&self) -> Value {
        let v = &self.variable;
        if !v.default_value.is_null() || v.cardinality != Cardinality::Single {
            return v.default_value.clone();
        }
        match v.base_type {
            Some(BaseType::Integer) => Value::Single(Scalar::Integer(0)),
            Some(BaseType::Float) => Value::Single(Scalar::Float(0.0)),
            _ => Value::Null,
        }
    }
}

/// Either kind of declaration, as stored on an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Response(ResponseDeclaration),
    Outcome(OutcomeDeclaration),
}

impl Declaration {
    pub fn variable(&self) -> &VariableDeclaration {
        match self {
            Declaration::Response(r) => r.variable(),
            Declaration::Outcome(o) => o.variable(),
        }
    }

    pub fn identifier(&self) -> &str {
        self.variable().identifier()
    }

    pub fn cardinality(&self) -> Cardinality {
        self.variable().cardinality()
    }

    pub fn base_type(&self) -> Option<BaseType> {
        self.variable().base_type()
    }

    pub fn as_response(&self) -> Option<&ResponseDeclaration> {
        match self {
            Declaration::Response(r) => Some(r),
            Declaration::Outcome(_) => None,
        }
    }

    pub fn as_outcome(&self) -> Option<&OutcomeDeclaration> {
        match self {
            Declaration::Outcome(o) => Some(o),
            Declaration::Response(_) => None,
        }
    }
}

impl From<ResponseDeclaration> for Declaration {
    fn from(r: ResponseDeclaration) -> Self {
        Declaration::Response(r)
    }
}

impl From<OutcomeDeclaration> for Declaration {
    fn from(o: OutcomeDeclaration) -> Self {
        Declaration::Outcome(o)
    }
}
