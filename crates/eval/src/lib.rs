//! QTI response-processing engine.
//!
//! An [`Item`] is assembled once: variable declarations, interactions and a
//! [`ResponseProcessing`] program whose expressions are type-checked as
//! they are built. Each candidate then drives an [`ItemSession`] through
//! `begin_attempt` / `end_attempt`; ending an attempt commits the responses
//! and runs response processing to compute the outcomes.
//!
//! ```ignore
//! let mut session = ItemSession::new(Arc::new(item));
//! session.begin_attempt()?;
//! session.end_attempt([("RESPONSE", Value::Single(Scalar::identifier("ChoiceA")))])?;
//! let score = session.get_outcome_value("SCORE")?;
//! ```

pub mod config;
pub mod expression;
pub mod interaction;
pub mod item;
pub mod operator;
pub mod rules;
pub mod session;

pub use assessa_core::{
    BaseType, Cardinality, Declaration, Mapping, OutcomeDeclaration, QtiError,
    ResponseDeclaration, Result, Scalar, TypedValue, Uri, Value, VariableDeclaration,
};
pub use config::{ConfigError, SessionConfig};
pub use expression::{Expression, ExpressionBuilder, OperatorNode, VariableRef};
pub use interaction::{Interaction, InteractionKind, SimpleChoice};
pub use item::{Item, COMPLETION_STATUS, DURATION};
pub use operator::Operator;
pub use rules::{
    PartKind, ResponseCondition, ResponseConditionPart, ResponseProcessing, ResponseRule,
    SetOutcomeValue,
};
pub use session::{ItemSession, ItemState};
