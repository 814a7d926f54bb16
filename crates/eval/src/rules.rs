//! Response rules and the response-processing program.
//!
//! `run` returns `true` when an exitResponse was reached; the flag is
//! passed straight back up through every enclosing condition so that
//! nothing after it executes.

use assessa_core::{
    check_value, compare_base_types, BaseType, Cardinality, QtiError, Result, TypedValue, Uri,
};
use tracing::debug;

use crate::expression::Expression;
use crate::item::{Item, COMPLETION_STATUS};
use crate::session::ItemSession;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseRule {
    Exit,
    SetOutcomeValue(SetOutcomeValue),
    Condition(ResponseCondition),
}

impl ResponseRule {
    pub fn run(&self, session: &mut ItemSession) -> Result<bool> {
        match self {
            ResponseRule::Exit => Ok(true),
            ResponseRule::SetOutcomeValue(set) => set.run(session),
            ResponseRule::Condition(condition) => condition.run(session),
        }
    }
}

impl From<SetOutcomeValue> for ResponseRule {
    fn from(rule: SetOutcomeValue) -> Self {
        ResponseRule::SetOutcomeValue(rule)
    }
}

impl From<ResponseCondition> for ResponseRule {
    fn from(rule: ResponseCondition) -> Self {
        ResponseRule::Condition(rule)
    }
}

/// A rule can only be added once it is complete.
fn check_rule(rule: &ResponseRule) -> Result<()> {
    match rule {
        ResponseRule::Condition(condition) if condition.parts.is_empty() => Err(
            QtiError::invariant("a responseCondition needs at least a responseIf"),
        ),
        _ => Ok(()),
    }
}

// ──────────────────────────────────────────────
// setOutcomeValue
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcomeValue {
    identifier: String,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    expression: Expression,
}

impl SetOutcomeValue {
    /// The target must be an outcome (or the built-in `completionStatus`)
    /// and the expression must produce its cardinality with a compatible
    /// base type.
    pub fn new(item: &Item, identifier: &str, expression: Expression) -> Result<Self> {
        let (cardinality, base_type) = if identifier == COMPLETION_STATUS {
            (Cardinality::Single, Some(BaseType::Identifier))
        } else {
            let outcome = item
                .outcome(identifier)
                .ok_or_else(|| QtiError::unknown(identifier, "not a declared outcome variable"))?;
            (outcome.variable().cardinality(), outcome.variable().base_type())
        };
        let rule = SetOutcomeValue {
            identifier: identifier.to_string(),
            cardinality,
            base_type,
            expression,
        };
        rule.check_type(&rule.expression.evaluate(None)?)?;
        Ok(rule)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    fn check_type(&self, v: &TypedValue) -> Result<()> {
        if v.cardinality != self.cardinality {
            return Err(QtiError::cardinality(
                "setOutcomeValue",
                self.cardinality.to_string(),
                v.cardinality,
            ));
        }
        if !compare_base_types(self.base_type, v.base_type) {
            return Err(QtiError::base_type_mismatch(
                "setOutcomeValue",
                self.base_type,
                v.base_type,
            ));
        }
        Ok(())
    }

    pub fn run(&self, session: &mut ItemSession) -> Result<bool> {
        let v = self.expression.evaluate(Some(session))?;
        self.check_type(&v)?;
        check_value(self.cardinality, self.base_type, &v.value)?;
        session.write_outcome(&self.identifier, v.value)?;
        Ok(false)
    }
}

// ──────────────────────────────────────────────
// responseCondition
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    If,
    ElseIf,
    Else,
}

/// One branch of a condition: `responseIf`, `responseElseIf` or
/// `responseElse`. Only the else branch has no guard.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseConditionPart {
    kind: PartKind,
    guard: Option<Expression>,
    rules: Vec<ResponseRule>,
}

impl ResponseConditionPart {
    pub fn if_(guard: Expression) -> Result<Self> {
        Self::guarded(PartKind::If, guard)
    }

    pub fn else_if(guard: Expression) -> Result<Self> {
        Self::guarded(PartKind::ElseIf, guard)
    }

    pub fn else_() -> Self {
        ResponseConditionPart {
            kind: PartKind::Else,
            guard: None,
            rules: Vec::new(),
        }
    }

    fn guarded(kind: PartKind, guard: Expression) -> Result<Self> {
        let trial = guard.evaluate(None)?;
        if trial.cardinality != Cardinality::Single {
            return Err(QtiError::cardinality(
                "responseCondition",
                "single",
                trial.cardinality,
            ));
        }
        if !compare_base_types(Some(BaseType::Boolean), trial.base_type) {
            return Err(QtiError::base_type_mismatch(
                "responseCondition",
                Some(BaseType::Boolean),
                trial.base_type,
            ));
        }
        Ok(ResponseConditionPart {
            kind,
            guard: Some(guard),
            rules: Vec::new(),
        })
    }

    pub fn add_rule(&mut self, rule: impl Into<ResponseRule>) -> Result<()> {
        let rule = rule.into();
        check_rule(&rule)?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn with_rule(mut self, rule: impl Into<ResponseRule>) -> Result<Self> {
        self.add_rule(rule)?;
        Ok(self)
    }

    pub fn kind(&self) -> PartKind {
        self.kind
    }

    pub fn rules(&self) -> &[ResponseRule] {
        &self.rules
    }

    /// `Some(exit)` if this part was taken, `None` if its guard was not
    /// true.
    fn run(&self, session: &mut ItemSession) -> Result<Option<bool>> {
        if let Some(guard) = &self.guard {
            if guard.evaluate(Some(session))?.as_bool()? != Some(true) {
                return Ok(None);
            }
        }
        for rule in &self.rules {
            if rule.run(session)? {
                return Ok(Some(true));
            }
        }
        Ok(Some(false))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseCondition {
    parts: Vec<ResponseConditionPart>,
}

impl ResponseCondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts arrive as `If (ElseIf)* Else?`.
    pub fn add_part(&mut self, part: ResponseConditionPart) -> Result<()> {
        match (self.parts.last().map(|p| p.kind), part.kind) {
            (None, PartKind::If) => {}
            (None, _) => {
                return Err(QtiError::invariant(
                    "a responseCondition must start with responseIf",
                ))
            }
            (Some(PartKind::Else), _) => {
                return Err(QtiError::invariant(
                    "nothing may follow responseElse",
                ))
            }
            (Some(_), PartKind::If) => {
                return Err(QtiError::invariant(
                    "responseIf may only be the first part",
                ))
            }
            (Some(_), _) => {}
        }
        self.parts.push(part);
        Ok(())
    }

    pub fn with_part(mut self, part: ResponseConditionPart) -> Result<Self> {
        self.add_part(part)?;
        Ok(self)
    }

    pub fn parts(&self) -> &[ResponseConditionPart] {
        &self.parts
    }

    pub fn run(&self, session: &mut ItemSession) -> Result<bool> {
        for part in &self.parts {
            if let Some(exit) = part.run(session)? {
                return Ok(exit);
            }
        }
        Ok(false)
    }
}

// ──────────────────────────────────────────────
// responseProcessing
// ──────────────────────────────────────────────

/// The rule program of an item. A template reference is kept but never
/// resolved; callers that use templates expand them into `rules`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseProcessing {
    template: Option<Uri>,
    template_location: Option<Uri>,
    rules: Vec<ResponseRule>,
}

impl ResponseProcessing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(&self) -> Option<&Uri> {
        self.template.as_ref()
    }

    pub fn set_template(&mut self, template: Option<Uri>) {
        self.template = template;
    }

    pub fn template_location(&self) -> Option<&Uri> {
        self.template_location.as_ref()
    }

    pub fn set_template_location(&mut self, location: Option<Uri>) {
        self.template_location = location;
    }

    pub fn add_rule(&mut self, rule: impl Into<ResponseRule>) -> Result<()> {
        let rule = rule.into();
        check_rule(&rule)?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[ResponseRule] {
        &self.rules
    }

    /// Run the rules in order. Returns `true` if an exitResponse stopped
    /// processing early.
    pub fn run(&self, session: &mut ItemSession) -> Result<bool> {
        debug!(rules = self.rules.len(), "response processing started");
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.run(session)? {
                debug!(rule = index, "exitResponse reached");
                return Ok(true);
            }
        }
        debug!("response processing finished");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessa_core::{OutcomeDeclaration, Scalar, Value};

    use crate::operator::Operator;

    fn item() -> Item {
        let mut item = Item::new("rules", "Rules", false, false).unwrap();
        let mut score =
            OutcomeDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Integer)).unwrap();
        score.set_default_value(Value::Single(Scalar::Integer(0))).unwrap();
        item.declare_variable(score).unwrap();
        item
    }

    fn set(item: &Item, n: i32) -> SetOutcomeValue {
        SetOutcomeValue::new(item, "SCORE", Expression::BaseValue(Scalar::Integer(n))).unwrap()
    }

    fn guard(b: bool) -> Expression {
        Expression::BaseValue(Scalar::Boolean(b))
    }

    fn score(session: &ItemSession) -> TypedValue {
        session.get_variable("SCORE").unwrap().clone()
    }

    #[test]
    fn set_outcome_value_is_type_checked() {
        let item = item();
        let float = Expression::BaseValue(Scalar::Float(1.0));
        assert!(matches!(
            SetOutcomeValue::new(&item, "SCORE", float),
            Err(QtiError::TypeMismatch { .. })
        ));
        let one = Expression::BaseValue(Scalar::Integer(1));
        let list = Expression::build(Operator::Multiple, [one]).unwrap();
        assert!(matches!(
            SetOutcomeValue::new(&item, "SCORE", list),
            Err(QtiError::CardinalityMismatch { .. })
        ));
        assert!(SetOutcomeValue::new(&item, "NOPE", Expression::Null).is_err());
        assert!(SetOutcomeValue::new(&item, "SCORE", Expression::Null).is_ok());
    }

    #[test]
    fn condition_part_order() {
        let mut c = ResponseCondition::new();
        assert!(c.add_part(ResponseConditionPart::else_()).is_err());
        c.add_part(ResponseConditionPart::if_(guard(true)).unwrap())
            .unwrap();
        assert!(c
            .add_part(ResponseConditionPart::if_(guard(true)).unwrap())
            .is_err());
        c.add_part(ResponseConditionPart::else_if(guard(false)).unwrap())
            .unwrap();
        c.add_part(ResponseConditionPart::else_()).unwrap();
        assert!(c.add_part(ResponseConditionPart::else_()).is_err());
        assert_eq!(c.parts().len(), 3);

        let not_boolean = ResponseConditionPart::if_(Expression::BaseValue(Scalar::Integer(1)));
        assert!(not_boolean.is_err());
        assert!(ResponseProcessing::new()
            .add_rule(ResponseCondition::new())
            .is_err());
    }

    fn branch(
        part: Result<ResponseConditionPart>,
        rule: SetOutcomeValue,
    ) -> ResponseConditionPart {
        part.unwrap().with_rule(rule).unwrap()
    }

    #[test]
    fn first_true_branch_wins() {
        let item = item();
        let condition = ResponseCondition::new()
            .with_part(branch(ResponseConditionPart::if_(Expression::Null), set(&item, 1)))
            .unwrap()
            .with_part(branch(ResponseConditionPart::else_if(guard(true)), set(&item, 2)))
            .unwrap()
            .with_part(branch(ResponseConditionPart::else_if(guard(true)), set(&item, 3)))
            .unwrap()
            .with_part(branch(Ok(ResponseConditionPart::else_()), set(&item, 4)))
            .unwrap();
        let mut session = ItemSession::new(std::sync::Arc::new(item));
        assert!(!condition.run(&mut session).unwrap());
        assert_eq!(score(&session), TypedValue::single(Scalar::Integer(2)));
    }

    #[test]
    fn nested_conditions_need_a_branch() {
        let mut part = ResponseConditionPart::if_(guard(true)).unwrap();
        assert!(matches!(
            part.add_rule(ResponseCondition::new()),
            Err(QtiError::ConstructionInvariantViolated { .. })
        ));
        assert!(part.rules().is_empty());

        let inner = ResponseCondition::new()
            .with_part(ResponseConditionPart::if_(guard(false)).unwrap())
            .unwrap();
        part.add_rule(inner).unwrap();
        assert_eq!(part.rules().len(), 1);
        assert!(ResponseConditionPart::else_()
            .with_rule(ResponseCondition::new())
            .is_err());
    }

    #[test]
    fn exit_propagates_out_of_nested_conditions() {
        let item = item();
        let inner = ResponseCondition::new()
            .with_part(
                ResponseConditionPart::if_(guard(true))
                    .unwrap()
                    .with_rule(set(&item, 1))
                    .and_then(|p| p.with_rule(ResponseRule::Exit))
                    .and_then(|p| p.with_rule(set(&item, 2)))
                    .unwrap(),
            )
            .unwrap();
        let outer_if = ResponseConditionPart::if_(guard(true))
            .unwrap()
            .with_rule(inner)
            .unwrap();
        let outer = ResponseCondition::new().with_part(outer_if).unwrap();
        let mut rp = ResponseProcessing::new();
        rp.add_rule(outer).unwrap();
        rp.add_rule(set(&item, 3)).unwrap();

        let mut session = ItemSession::new(std::sync::Arc::new(item));
        assert!(rp.run(&mut session).unwrap());
        assert_eq!(score(&session), TypedValue::single(Scalar::Integer(1)));
    }
}
