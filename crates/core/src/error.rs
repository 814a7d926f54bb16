use crate::types::{BaseType, Cardinality};

/// Errors raised while building or running an item.
///
/// Every error is detected synchronously and handed back to the caller;
/// nothing in the engine retries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QtiError {
    /// A value does not have the shape its cardinality/baseType demands.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// An operator received a sub-expression of the wrong cardinality.
    #[error("cardinality mismatch in {operator}: expected {expected}, got {got}")]
    CardinalityMismatch {
        operator: String,
        expected: String,
        got: Cardinality,
    },

    /// A reference to a variable the item never declared (or declared with
    /// the wrong kind, e.g. an outcome where a response is required).
    #[error("unknown identifier: {identifier} ({message})")]
    UnknownIdentifier { identifier: String, message: String },

    /// A variable, map key, choice or interaction was declared twice.
    #[error("duplicate identifier: {identifier}")]
    DuplicateIdentifier { identifier: String },

    /// A structural rule of the item tree was broken (arity, part order,
    /// duplicate map key, ...).
    #[error("construction invariant violated: {message}")]
    ConstructionInvariantViolated { message: String },

    /// The session was driven out of order.
    #[error("invalid state transition: cannot {action} while {state}")]
    InvalidStateTransition { action: String, state: String },

    /// Malformed JSON handed to the value converter.
    #[error("deserialization error: {message}")]
    Deserialize { message: String },
}

impl QtiError {
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        QtiError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn base_type_mismatch(
        operator: &str,
        expected: Option<BaseType>,
        got: Option<BaseType>,
    ) -> Self {
        QtiError::TypeMismatch {
            expected: format!("{} in {}", describe_base_type(expected), operator),
            got: describe_base_type(got),
        }
    }

    pub fn cardinality(operator: &str, expected: impl Into<String>, got: Cardinality) -> Self {
        QtiError::CardinalityMismatch {
            operator: operator.to_string(),
            expected: expected.into(),
            got,
        }
    }

    pub fn unknown(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        QtiError::UnknownIdentifier {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        QtiError::ConstructionInvariantViolated {
            message: message.into(),
        }
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        QtiError::Deserialize {
            message: message.into(),
        }
    }
}

fn describe_base_type(base_type: Option<BaseType>) -> String {
    match base_type {
        Some(bt) => bt.to_string(),
        None => "no baseType".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, QtiError>;
