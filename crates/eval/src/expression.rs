//! Expression trees.
//!
//! A tree is built bottom-up through [`ExpressionBuilder`]. Each child is
//! evaluated without a session as it is added, so variable references
//! report only their declared type; a child that would make the node
//! ill-typed is rejected and the builder is left as it was. A finished
//! [`Expression`] is therefore well-typed against the item it was bound
//! to, and evaluation against a live session only fails if the session
//! belongs to a different item.

use assessa_core::{
    check_value, BaseType, Cardinality, QtiError, ResponseDeclaration, Result, Scalar, TypedValue,
};

use crate::item::Item;
use crate::operator::Operator;
use crate::session::ItemSession;

/// A variable reference resolved against an item at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    identifier: String,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
}

impl VariableRef {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn base_type(&self) -> Option<BaseType> {
        self.base_type
    }

    fn null(&self) -> TypedValue {
        TypedValue::null(self.cardinality, self.base_type)
    }
}

/// An operator node. Only [`ExpressionBuilder`] creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorNode {
    op: Operator,
    children: Vec<Expression>,
}

impl OperatorNode {
    pub fn op(&self) -> &Operator {
        &self.op
    }

    pub fn children(&self) -> &[Expression] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal single value.
    BaseValue(Scalar),
    /// Always a single NULL with no base type.
    Null,
    /// Current value of a response or outcome variable.
    Variable(VariableRef),
    /// Declared default of a variable.
    Default(VariableRef),
    /// Correct value of a response variable.
    Correct(VariableRef),
    /// Current value of a response variable, scored through its mapping.
    MapResponse(VariableRef),
    Operator(OperatorNode),
}

impl Expression {
    /// Read a variable. Besides declared variables this may name the
    /// built-ins `completionStatus` and (for time-dependent items)
    /// `duration`.
    pub fn variable(item: &Item, identifier: &str) -> Result<Expression> {
        let (cardinality, base_type) = item
            .variable_type(identifier)
            .ok_or_else(|| QtiError::unknown(identifier, "not a declared variable"))?;
        Ok(Expression::Variable(VariableRef {
            identifier: identifier.to_string(),
            cardinality,
            base_type,
        }))
    }

    pub fn default(item: &Item, identifier: &str) -> Result<Expression> {
        let decl = item
            .lookup(identifier)
            .ok_or_else(|| QtiError::unknown(identifier, "not a declared variable"))?;
        Ok(Expression::Default(VariableRef {
            identifier: identifier.to_string(),
            cardinality: decl.cardinality(),
            base_type: decl.base_type(),
        }))
    }

    pub fn correct(item: &Item, identifier: &str) -> Result<Expression> {
        Ok(Expression::Correct(response_ref(item, identifier)?))
    }

    /// Requires a response variable that has a mapping.
    pub fn map_response(item: &Item, identifier: &str) -> Result<Expression> {
        let var = response_ref(item, identifier)?;
        if item.response(identifier).and_then(|r| r.mapping()).is_none() {
            return Err(QtiError::invariant(format!(
                "mapResponse on {} which has no mapping",
                identifier
            )));
        }
        Ok(Expression::MapResponse(var))
    }

    /// Build an operator node from already-built children in one go.
    pub fn build(
        op: Operator,
        children: impl IntoIterator<Item = Expression>,
    ) -> Result<Expression> {
        let mut builder = ExpressionBuilder::new(op)?;
        for child in children {
            builder.add(child)?;
        }
        builder.build()
    }

    /// Evaluate against `session`, or against declared types only when
    /// there is none.
    pub fn evaluate(&self, session: Option<&ItemSession>) -> Result<TypedValue> {
        match self {
            Expression::BaseValue(scalar) => {
                let v = TypedValue::single(scalar.clone());
                v.check()?;
                Ok(v)
            }
            Expression::Null => Ok(TypedValue::null(Cardinality::Single, None)),
            Expression::Variable(var) => match session {
                Some(s) => s.get_variable(&var.identifier).cloned(),
                None => Ok(var.null()),
            },
            Expression::Default(var) => {
                let Some(s) = session else {
                    return Ok(var.null());
                };
                let decl = s
                    .item()
                    .lookup(&var.identifier)
                    .ok_or_else(|| {
                        QtiError::unknown(&var.identifier, "not declared in this item")
                    })?;
                Ok(decl.variable().typed(decl.variable().default_value().clone()))
            }
            Expression::Correct(var) => {
                let Some(s) = session else {
                    return Ok(var.null());
                };
                let decl = session_response(s, &var.identifier)?;
                Ok(decl.variable().typed(decl.correct_value().clone()))
            }
            Expression::MapResponse(var) => {
                let Some(s) = session else {
                    return Ok(TypedValue::float(None));
                };
                let mapping = session_response(s, &var.identifier)?
                    .mapping()
                    .ok_or_else(|| {
                        QtiError::invariant(format!("{} has no mapping", var.identifier))
                    })?;
                let current = s.get_variable(&var.identifier)?;
                Ok(TypedValue::float(Some(mapping.map_value(&current.value))))
            }
            Expression::Operator(node) => node.op.apply(&node.children, session),
        }
    }
}

fn response_ref(item: &Item, identifier: &str) -> Result<VariableRef> {
    let decl = item
        .response(identifier)
        .ok_or_else(|| QtiError::unknown(identifier, "not a declared response variable"))?;
    Ok(VariableRef {
        identifier: identifier.to_string(),
        cardinality: decl.variable().cardinality(),
        base_type: decl.variable().base_type(),
    })
}

fn session_response<'a>(
    session: &'a ItemSession,
    identifier: &str,
) -> Result<&'a ResponseDeclaration> {
    session
        .item()
        .response(identifier)
        .ok_or_else(|| QtiError::unknown(identifier, "not a response variable in this item"))
}

// ──────────────────────────────────────────────
// Builder
// ──────────────────────────────────────────────

/// Incrementally builds an operator node, type-checking every child as it
/// is added. A rejected child leaves the builder untouched.
#[derive(Debug, Clone)]
pub struct ExpressionBuilder {
    op: Operator,
    children: Vec<Expression>,
    operand_types: Vec<TypedValue>,
}

impl ExpressionBuilder {
    pub fn new(op: Operator) -> Result<Self> {
        op.validate()?;
        Ok(ExpressionBuilder {
            op,
            children: Vec::new(),
            operand_types: Vec::new(),
        })
    }

    pub fn add(&mut self, child: Expression) -> Result<()> {
        let index = self.children.len();
        if let Some(max) = self.op.max_arity().filter(|&max| index >= max) {
            return Err(QtiError::invariant(format!(
                "{} takes at most {} sub-expression(s)",
                self.op, max
            )));
        }
        let trial = child.evaluate(None)?;
        self.op.check_operand(index, &trial, &self.operand_types)?;
        check_value(trial.cardinality, trial.base_type, &trial.value)?;

        let mut candidate = self.children.clone();
        candidate.push(child);
        if candidate.len() >= self.op.min_arity() {
            self.op.apply(&candidate, None)?;
        }
        self.children = candidate;
        self.operand_types.push(trial);
        Ok(())
    }

    pub fn with(mut self, child: Expression) -> Result<Self> {
        self.add(child)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn build(self) -> Result<Expression> {
        if self.children.len() < self.op.min_arity() {
            return Err(QtiError::invariant(format!(
                "{} needs at least {} sub-expression(s), got {}",
                self.op,
                self.op.min_arity(),
                self.children.len()
            )));
        }
        Ok(Expression::Operator(OperatorNode {
            op: self.op,
            children: self.children,
        }))
    }
}
