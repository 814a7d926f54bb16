//! assessa-core: the typed value model of QTI assessment items.
//!
//! Provides the (cardinality, baseType, value) triple every expression and
//! session variable uses, the value validator, JSON conversion for values
//! crossing the delivery boundary, variable declarations and score
//! mappings.

pub mod declaration;
pub mod error;
pub mod mapping;
pub mod types;

pub use declaration::{Declaration, OutcomeDeclaration, ResponseDeclaration, VariableDeclaration};
pub use error::{QtiError, Result};
pub use mapping::Mapping;
pub use types::{
    check_identifier, check_value, compare_base_types, is_null, match_values, BaseType,
    Cardinality, Scalar, TypedValue, Uri, Value,
};
