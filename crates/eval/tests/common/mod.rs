//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use assessa_eval::{
    BaseType, Cardinality, Expression, Item, OutcomeDeclaration, Operator, ResponseCondition,
    ResponseConditionPart, ResponseDeclaration, ResponseProcessing, Scalar, SetOutcomeValue,
    Value,
};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness; set `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn identifier(s: &str) -> Value {
    Value::Single(Scalar::identifier(s))
}

/// RESPONSE (single identifier, correct ChoiceA) and SCORE (single
/// integer, default 0), scored by
/// `if match(RESPONSE, correct(RESPONSE)) then SCORE := 1`.
pub fn match_correct_item(adaptive: bool) -> Arc<Item> {
    let mut item = Item::new("matchCorrect", "Match correct", adaptive, false).unwrap();
    let mut response =
        ResponseDeclaration::new("RESPONSE", Cardinality::Single, Some(BaseType::Identifier))
            .unwrap();
    response.set_correct_value(identifier("ChoiceA")).unwrap();
    item.declare_variable(response).unwrap();
    let mut score =
        OutcomeDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Integer)).unwrap();
    score
        .set_default_value(Value::Single(Scalar::Integer(0)))
        .unwrap();
    item.declare_variable(score).unwrap();

    let guard = Expression::build(
        Operator::Match,
        [
            Expression::variable(&item, "RESPONSE").unwrap(),
            Expression::correct(&item, "RESPONSE").unwrap(),
        ],
    )
    .unwrap();
    let set_one =
        SetOutcomeValue::new(&item, "SCORE", Expression::BaseValue(Scalar::Integer(1))).unwrap();
    let branch = ResponseConditionPart::if_(guard)
        .unwrap()
        .with_rule(set_one)
        .unwrap();
    let condition = ResponseCondition::new().with_part(branch).unwrap();
    let mut rp = ResponseProcessing::new();
    rp.add_rule(condition).unwrap();
    item.set_response_processing(Some(rp));
    Arc::new(item)
}

/// RESPONSE (multiple identifier) with mapping A→1.0, B→2.0, scored by
/// `SCORE := mapResponse(RESPONSE)`.
pub fn mapped_item() -> Arc<Item> {
    let mut item = Item::new("mapped", "Mapped", false, false).unwrap();
    let mut response =
        ResponseDeclaration::new("RESPONSE", Cardinality::Multiple, Some(BaseType::Identifier))
            .unwrap();
    let mapping = response.create_mapping().unwrap();
    mapping.add_entry(Scalar::identifier("A"), 1.0).unwrap();
    mapping.add_entry(Scalar::identifier("B"), 2.0).unwrap();
    item.declare_variable(response).unwrap();
    item.declare_variable(
        OutcomeDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Float)).unwrap(),
    )
    .unwrap();
    let set = SetOutcomeValue::new(
        &item,
        "SCORE",
        Expression::map_response(&item, "RESPONSE").unwrap(),
    )
    .unwrap();
    let mut rp = ResponseProcessing::new();
    rp.add_rule(set).unwrap();
    item.set_response_processing(Some(rp));
    Arc::new(item)
}
