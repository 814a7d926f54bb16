//! Item sessions: the per-candidate variable store and attempt lifecycle.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use assessa_core::{BaseType, Cardinality, QtiError, Result, Scalar, TypedValue, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::interaction::{Interaction, InteractionKind, SimpleChoice};
use crate::item::{Item, COMPLETION_STATUS, DURATION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    Initial,
    Interacting,
    Suspended,
    Submitted,
    ModalFeedback,
    Closed,
    Solution,
    Review,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::Initial => "initial",
            ItemState::Interacting => "interacting",
            ItemState::Suspended => "suspended",
            ItemState::Submitted => "submitted",
            ItemState::ModalFeedback => "modalFeedback",
            ItemState::Closed => "closed",
            ItemState::Solution => "solution",
            ItemState::Review => "review",
        };
        f.write_str(s)
    }
}

/// One candidate's attempts at one item.
///
/// The item is shared read-only; everything mutable lives here. A session
/// is driven by a single thread of control.
#[derive(Debug, Clone)]
pub struct ItemSession {
    item: Arc<Item>,
    config: SessionConfig,
    variables: BTreeMap<String, TypedValue>,
    state: ItemState,
    attempts: u32,
    /// Shuffled choice order per response identifier, as indices into the
    /// interaction's choice list.
    shuffles: HashMap<String, Vec<usize>>,
    rng: RefCell<StdRng>,
}

impl ItemSession {
    pub fn new(item: Arc<Item>) -> Self {
        Self::with_config(item, SessionConfig::default())
    }

    pub fn with_config(item: Arc<Item>, config: SessionConfig) -> Self {
        let mut variables = BTreeMap::new();
        for response in item.responses() {
            let var = response.variable();
            variables.insert(var.identifier().to_string(), var.null_value());
        }
        for outcome in item.outcomes() {
            let var = outcome.variable();
            variables.insert(var.identifier().to_string(), var.typed(outcome.initial_value()));
        }
        variables.insert(
            COMPLETION_STATUS.to_string(),
            TypedValue::single(Scalar::identifier("not_attempted")),
        );
        if item.is_time_dependent() {
            let duration = if config.duration_tracking {
                TypedValue::single(Scalar::Duration(time::Duration::ZERO))
            } else {
                TypedValue::null(Cardinality::Single, Some(BaseType::Duration))
            };
            variables.insert(DURATION.to_string(), duration);
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ItemSession {
            item,
            config,
            variables,
            state: ItemState::Initial,
            attempts: 0,
            shuffles: HashMap::new(),
            rng: RefCell::new(rng),
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    // ──────────────────────────────────────────────
    // Variable access
    // ──────────────────────────────────────────────

    pub fn get_variable(&self, identifier: &str) -> Result<&TypedValue> {
        self.variables
            .get(identifier)
            .ok_or_else(|| QtiError::unknown(identifier, "no such variable in this session"))
    }

    /// A response variable, or the built-in `duration`.
    pub fn get_response_value(&self, identifier: &str) -> Result<&TypedValue> {
        if identifier != DURATION && self.item.response(identifier).is_none() {
            return Err(QtiError::unknown(identifier, "undeclared response"));
        }
        self.get_variable(identifier)
    }

    /// An outcome variable, or the built-in `completionStatus`.
    pub fn get_outcome_value(&self, identifier: &str) -> Result<&TypedValue> {
        if identifier != COMPLETION_STATUS && self.item.outcome(identifier).is_none() {
            return Err(QtiError::unknown(identifier, "undeclared outcome"));
        }
        self.get_variable(identifier)
    }

    /// Write a response directly, outside of an end-of-attempt submission.
    pub fn set_response_value(&mut self, identifier: &str, value: Value) -> Result<()> {
        self.expect_state(
            "set a response",
            &[ItemState::Initial, ItemState::Interacting, ItemState::Suspended],
        )?;
        self.check_response(identifier, &value)?;
        self.store(identifier, value);
        Ok(())
    }

    /// Update the built-in `duration`. Ignored when duration tracking is
    /// switched off.
    pub fn set_duration(&mut self, duration: time::Duration) -> Result<()> {
        if !self.item.is_time_dependent() {
            return Err(QtiError::unknown(DURATION, "item is not time dependent"));
        }
        if duration.is_negative() {
            return Err(QtiError::type_mismatch(
                "a non-negative duration",
                format!("{}s", duration.as_seconds_f64()),
            ));
        }
        if self.config.duration_tracking {
            self.store(DURATION, Value::Single(Scalar::Duration(duration)));
        }
        Ok(())
    }

    pub(crate) fn write_outcome(&mut self, identifier: &str, value: Value) -> Result<()> {
        if !self.variables.contains_key(identifier) {
            return Err(QtiError::unknown(identifier, "no such outcome in this session"));
        }
        trace!(outcome = identifier, value = %value, "outcome set");
        self.store(identifier, value);
        Ok(())
    }

    pub(crate) fn random_index(&self, len: usize) -> usize {
        self.rng.borrow_mut().gen_range(0..len)
    }

    fn store(&mut self, identifier: &str, value: Value) {
        if let Some(cell) = self.variables.get_mut(identifier) {
            cell.value = value;
        }
    }

    fn check_response(&self, identifier: &str, value: &Value) -> Result<()> {
        let response = self
            .item
            .response(identifier)
            .ok_or_else(|| QtiError::unknown(identifier, "not a declared response variable"))?;
        response.variable().check(value)
    }

    // ──────────────────────────────────────────────
    // Attempt lifecycle
    // ──────────────────────────────────────────────

    pub fn begin_attempt(&mut self) -> Result<()> {
        match self.state {
            ItemState::Interacting | ItemState::Suspended => {
                self.transition(ItemState::Interacting);
                return Ok(());
            }
            ItemState::Initial => {
                let defaults: Vec<(String, Value)> = self
                    .item
                    .responses()
                    .map(|r| {
                        let var = r.variable();
                        (var.identifier().to_string(), var.default_value().clone())
                    })
                    .collect();
                for (identifier, value) in defaults {
                    self.store(&identifier, value);
                }
            }
            ItemState::Submitted | ItemState::ModalFeedback => {}
            ItemState::Closed | ItemState::Solution | ItemState::Review => {
                return Err(self.invalid("begin an attempt"));
            }
        }
        self.attempts += 1;
        self.store(COMPLETION_STATUS, Value::Single(Scalar::identifier("unknown")));
        self.transition(ItemState::Interacting);
        Ok(())
    }

    /// Submit responses and run response processing.
    ///
    /// Every value is validated before anything is written. If response
    /// processing fails the session is restored to how it was before the
    /// call.
    pub fn end_attempt<I, K>(&mut self, responses: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.expect_state(
            "end an attempt",
            &[ItemState::Interacting, ItemState::Suspended],
        )?;
        let responses: Vec<(String, Value)> = responses
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        for (identifier, value) in &responses {
            self.check_response(identifier, value)?;
        }

        let snapshot = (self.variables.clone(), self.state);
        for (identifier, value) in responses {
            self.store(&identifier, value);
        }
        if self.attempts > 1 && !self.item.is_adaptive() {
            let initial: Vec<(String, Value)> = self
                .item
                .outcomes()
                .map(|o| (o.variable().identifier().to_string(), o.initial_value()))
                .collect();
            for (identifier, value) in initial {
                self.store(&identifier, value);
            }
        }
        self.transition(ItemState::Submitted);

        let item = Arc::clone(&self.item);
        if let Some(rp) = item.response_processing() {
            if let Err(e) = rp.run(self) {
                warn!(
                    item = item.identifier(),
                    error = %e,
                    "response processing failed, rolling back"
                );
                (self.variables, self.state) = snapshot;
                return Err(e);
            }
        }
        self.transition(ItemState::ModalFeedback);
        Ok(())
    }

    /// Like [`end_attempt`](Self::end_attempt), with responses given as a
    /// JSON object of identifier to value.
    pub fn end_attempt_json(&mut self, responses: &serde_json::Value) -> Result<()> {
        let object = responses
            .as_object()
            .ok_or_else(|| QtiError::deserialize("responses must be a JSON object"))?;
        let mut values = Vec::with_capacity(object.len());
        for (identifier, json) in object {
            let response = self
                .item
                .response(identifier)
                .ok_or_else(|| QtiError::unknown(identifier, "not a declared response variable"))?;
            let var = response.variable();
            let typed = TypedValue::from_json(var.cardinality(), var.base_type(), json)?;
            values.push((identifier.clone(), typed.value));
        }
        self.end_attempt(values)
    }

    pub fn suspend(&mut self) -> Result<()> {
        self.expect_state("suspend", &[ItemState::Interacting])?;
        self.transition(ItemState::Suspended);
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.expect_state("close", &[ItemState::Submitted, ItemState::ModalFeedback])?;
        self.transition(ItemState::Closed);
        Ok(())
    }

    pub fn review(&mut self) -> Result<()> {
        self.expect_state(
            "review",
            &[ItemState::Closed, ItemState::Review, ItemState::Solution],
        )?;
        self.transition(ItemState::Review);
        Ok(())
    }

    pub fn show_solution(&mut self) -> Result<()> {
        self.expect_state(
            "show the solution",
            &[ItemState::Closed, ItemState::Review, ItemState::Solution],
        )?;
        self.transition(ItemState::Solution);
        Ok(())
    }

    fn transition(&mut self, to: ItemState) {
        debug!(from = %self.state, to = %to, attempt = self.attempts, "item session state change");
        self.state = to;
    }

    fn expect_state(&self, action: &str, allowed: &[ItemState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &str) -> QtiError {
        QtiError::InvalidStateTransition {
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }

    // ──────────────────────────────────────────────
    // Interactions
    // ──────────────────────────────────────────────

    /// Toggle `choice` in the response bound to `interaction`.
    ///
    /// A single-cardinality response is replaced. Otherwise the choice is
    /// removed if already selected, or appended if there is room; `false`
    /// means `max_choices` was already reached.
    pub fn select(&mut self, interaction: &Interaction, choice: &str) -> Result<bool> {
        self.expect_state("select a choice", &[ItemState::Interacting])?;
        let identifier = interaction.response_identifier();
        if interaction.find_choice(choice).is_none() {
            return Err(QtiError::unknown(choice, "not a choice of this interaction"));
        }
        let current = self.get_response_value(identifier)?.clone();
        let picked = Scalar::identifier(choice);
        let value = match current.cardinality {
            Cardinality::Single => Value::Single(picked),
            _ => {
                let mut items = current.value.as_list().map(<[Scalar]>::to_vec).unwrap_or_default();
                if let Some(i) = items.iter().position(|s| *s == picked) {
                    items.remove(i);
                } else {
                    let limit = match interaction.kind() {
                        InteractionKind::Choice { max_choices } => max_choices as usize,
                        InteractionKind::Order => interaction.choices().len(),
                    };
                    if limit != 0 && items.len() >= limit {
                        return Ok(false);
                    }
                    items.push(picked);
                }
                if items.is_empty() {
                    Value::Null
                } else {
                    Value::List(items)
                }
            }
        };
        self.check_response(identifier, &value)?;
        self.store(identifier, value);
        Ok(true)
    }

    /// The interaction's choices in presentation order.
    ///
    /// Without the shuffle flag this is document order. With it, the
    /// non-fixed choices are permuted among the non-fixed slots the first
    /// time the interaction is asked for, and that order is kept for the
    /// rest of the session.
    pub fn get_shuffled_choices<'a>(
        &mut self,
        interaction: &'a Interaction,
    ) -> Vec<&'a SimpleChoice> {
        let choices = interaction.choices();
        if !interaction.shuffle() {
            return choices.iter().collect();
        }
        let key = interaction.response_identifier();
        let cached = self
            .shuffles
            .get(key)
            .filter(|order| order.len() == choices.len())
            .cloned();
        let order = match cached {
            Some(order) => order,
            None => {
                let mut movable: Vec<usize> =
                    (0..choices.len()).filter(|&i| !choices[i].is_fixed()).collect();
                movable.shuffle(self.rng.get_mut());
                let mut movable = movable.into_iter();
                let order: Vec<usize> = (0..choices.len())
                    .map(|i| {
                        if choices[i].is_fixed() {
                            i
                        } else {
                            movable.next().unwrap_or(i)
                        }
                    })
                    .collect();
                self.shuffles.insert(key.to_string(), order.clone());
                order
            }
        };
        order.into_iter().map(|i| &choices[i]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessa_core::{OutcomeDeclaration, ResponseDeclaration};

    fn item(adaptive: bool, time_dependent: bool) -> Arc<Item> {
        let mut item = Item::new("session", "Session", adaptive, time_dependent).unwrap();
        let mut response =
            ResponseDeclaration::new("RESPONSE", Cardinality::Multiple, Some(BaseType::Identifier))
                .unwrap();
        response
            .set_default_value(Value::List(vec![Scalar::identifier("A")]))
            .unwrap();
        item.declare_variable(response).unwrap();
        item.declare_variable(
            OutcomeDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Float)).unwrap(),
        )
        .unwrap();
        let mut interaction = Interaction::choice(&item, "RESPONSE", true, 2).unwrap();
        for (id, fixed) in [("A", false), ("B", true), ("C", false), ("D", false)] {
            interaction.add_choice(SimpleChoice::new(id, fixed).unwrap()).unwrap();
        }
        item.add_interaction(interaction).unwrap();
        Arc::new(item)
    }

    #[test]
    fn initial_store() {
        let session = ItemSession::new(item(false, true));
        assert_eq!(session.state(), ItemState::Initial);
        assert!(session.get_response_value("RESPONSE").unwrap().value.is_null());
        assert_eq!(
            session.get_outcome_value("SCORE").unwrap(),
            &TypedValue::float(Some(0.0))
        );
        assert_eq!(
            session.get_outcome_value(COMPLETION_STATUS).unwrap().value,
            Value::Single(Scalar::identifier("not_attempted"))
        );
        assert_eq!(
            session.get_response_value(DURATION).unwrap().value,
            Value::Single(Scalar::Duration(time::Duration::ZERO))
        );
        assert!(session.get_outcome_value("RESPONSE").is_err());

        let untimed = ItemSession::new(item(false, false));
        assert!(untimed.get_variable(DURATION).is_err());
    }

    #[test]
    fn transitions_are_checked() {
        let mut session = ItemSession::new(item(false, false));
        assert!(matches!(
            session.end_attempt(Vec::<(String, Value)>::new()),
            Err(QtiError::InvalidStateTransition { .. })
        ));
        assert!(session.suspend().is_err());
        session.begin_attempt().unwrap();
        session.suspend().unwrap();
        session.begin_attempt().unwrap();
        assert_eq!(session.attempts(), 1);
        session.end_attempt(Vec::<(String, Value)>::new()).unwrap();
        assert_eq!(session.state(), ItemState::ModalFeedback);
        session.close().unwrap();
        assert!(session.begin_attempt().is_err());
        session.review().unwrap();
        session.show_solution().unwrap();
        assert_eq!(session.state(), ItemState::Solution);
    }

    #[test]
    fn invalid_submission_changes_nothing() {
        let mut session = ItemSession::new(item(false, false));
        session.begin_attempt().unwrap();
        let before = session.clone();
        let bad = vec![
            ("RESPONSE", Value::List(vec![Scalar::identifier("B")])),
            ("SCORE", Value::Single(Scalar::Float(1.0))),
        ];
        assert!(session.end_attempt(bad).is_err());
        assert_eq!(session.state(), ItemState::Interacting);
        assert_eq!(session.variables, before.variables);
    }

    #[test]
    fn select_respects_max_choices() {
        let item = item(false, false);
        let interaction = item.interaction("RESPONSE").unwrap().clone();
        let mut session = ItemSession::new(Arc::clone(&item));
        assert!(session.select(&interaction, "B").is_err());
        session.begin_attempt().unwrap();
        // Default value selected A already.
        assert!(session.select(&interaction, "B").unwrap());
        assert!(!session.select(&interaction, "C").unwrap());
        assert!(session.select(&interaction, "A").unwrap());
        assert!(session.select(&interaction, "C").unwrap());
        assert_eq!(
            session.get_response_value("RESPONSE").unwrap().value,
            Value::List(vec![Scalar::identifier("B"), Scalar::identifier("C")])
        );
        assert!(session.select(&interaction, "Z").is_err());
    }

    #[test]
    fn shuffle_is_stable_and_keeps_fixed_choices() {
        let item = item(false, false);
        let interaction = item.interaction("RESPONSE").unwrap().clone();
        let mut session = ItemSession::with_config(item, SessionConfig::seeded(11));
        let first: Vec<String> = session
            .get_shuffled_choices(&interaction)
            .iter()
            .map(|c| c.identifier().to_string())
            .collect();
        assert_eq!(first[1], "B");
        for _ in 0..5 {
            let again: Vec<String> = session
                .get_shuffled_choices(&interaction)
                .iter()
                .map(|c| c.identifier().to_string())
                .collect();
            assert_eq!(again, first);
        }
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, ["A", "B", "C", "D"]);
    }

    #[test]
    fn duration_tracking_can_be_disabled() {
        let config = SessionConfig {
            duration_tracking: false,
            ..SessionConfig::default()
        };
        let mut session = ItemSession::with_config(item(false, true), config);
        session.set_duration(time::Duration::seconds(30)).unwrap();
        assert!(session.get_variable(DURATION).unwrap().value.is_null());

        let mut tracked = ItemSession::new(item(false, true));
        tracked.set_duration(time::Duration::seconds(30)).unwrap();
        assert_eq!(
            tracked.get_variable(DURATION).unwrap().value,
            Value::Single(Scalar::Duration(time::Duration::seconds(30)))
        );
        assert!(tracked.set_duration(time::Duration::seconds(-1)).is_err());
        assert!(ItemSession::new(item(false, false))
            .set_duration(time::Duration::seconds(1))
            .is_err());
    }
}
