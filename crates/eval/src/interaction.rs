//! Choice-bearing interactions.
//!
//! Rendering is the delivery layer's business; the engine only needs the
//! binding to a response variable, the choice list and the shuffle flags.

use assessa_core::{check_identifier, BaseType, Cardinality, QtiError, Result};

use crate::item::Item;

/// One selectable choice. Fixed choices never move when shuffling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleChoice {
    identifier: String,
    fixed: bool,
}

impl SimpleChoice {
    pub fn new(identifier: impl Into<String>, fixed: bool) -> Result<Self> {
        let identifier = identifier.into();
        check_identifier(&identifier)?;
        Ok(SimpleChoice { identifier, fixed })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// `max_choices == 0` means unlimited.
    Choice { max_choices: u32 },
    Order,
}

/// An interaction bound to a response variable of the item.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    response_identifier: String,
    kind: InteractionKind,
    shuffle: bool,
    choices: Vec<SimpleChoice>,
}

impl Interaction {
    /// A choice interaction; binds to an identifier response with single or
    /// multiple cardinality. More than one choice needs multiple.
    pub fn choice(
        item: &Item,
        response_identifier: &str,
        shuffle: bool,
        max_choices: u32,
    ) -> Result<Self> {
        let cardinality = bound_cardinality(item, response_identifier, "choiceInteraction")?;
        if !matches!(cardinality, Cardinality::Single | Cardinality::Multiple) {
            return Err(QtiError::cardinality(
                "choiceInteraction",
                "single or multiple",
                cardinality,
            ));
        }
        if max_choices != 1 && cardinality != Cardinality::Multiple {
            return Err(QtiError::cardinality(
                "choiceInteraction with maxChoices other than 1",
                "multiple",
                cardinality,
            ));
        }
        Ok(Interaction {
            response_identifier: response_identifier.to_string(),
            kind: InteractionKind::Choice { max_choices },
            shuffle,
            choices: Vec::new(),
        })
    }

    /// An order interaction; binds to an ordered identifier response.
    pub fn order(item: &Item, response_identifier: &str, shuffle: bool) -> Result<Self> {
        let cardinality = bound_cardinality(item, response_identifier, "orderInteraction")?;
        if cardinality != Cardinality::Ordered {
            return Err(QtiError::cardinality("orderInteraction", "ordered", cardinality));
        }
        Ok(Interaction {
            response_identifier: response_identifier.to_string(),
            kind: InteractionKind::Order,
            shuffle,
            choices: Vec::new(),
        })
    }

    pub fn add_choice(&mut self, choice: SimpleChoice) -> Result<()> {
        if self.find_choice(choice.identifier()).is_some() {
            return Err(QtiError::DuplicateIdentifier {
                identifier: choice.identifier,
            });
        }
        self.choices.push(choice);
        Ok(())
    }

    pub fn response_identifier(&self) -> &str {
        &self.response_identifier
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn choices(&self) -> &[SimpleChoice] {
        &self.choices
    }

    pub fn find_choice(&self, identifier: &str) -> Option<&SimpleChoice> {
        self.choices.iter().find(|c| c.identifier == identifier)
    }
}

fn bound_cardinality(item: &Item, response_identifier: &str, what: &str) -> Result<Cardinality> {
    let decl = item.response(response_identifier).ok_or_else(|| {
        QtiError::unknown(
            response_identifier,
            format!("{} must be bound to a declared response variable", what),
        )
    })?;
    let var = decl.variable();
    if var.base_type() != Some(BaseType::Identifier) {
        return Err(QtiError::type_mismatch(
            format!("identifier response for {}", what),
            var.base_type().map(|b| b.to_string()).unwrap_or_else(|| "record".to_string()),
        ));
    }
    Ok(var.cardinality())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessa_core::ResponseDeclaration;

    fn item() -> Item {
        let mut item = Item::new("choice", "Choice", false, false).unwrap();
        for (id, c, bt) in [
            ("SINGLE", Cardinality::Single, BaseType::Identifier),
            ("MULTI", Cardinality::Multiple, BaseType::Identifier),
            ("ORDER", Cardinality::Ordered, BaseType::Identifier),
            ("TEXT", Cardinality::Single, BaseType::String),
        ] {
            item.declare_variable(ResponseDeclaration::new(id, c, Some(bt)).unwrap())
                .unwrap();
        }
        item
    }

    #[test]
    fn choice_binding_rules() {
        let item = item();
        assert!(Interaction::choice(&item, "SINGLE", false, 1).is_ok());
        assert!(Interaction::choice(&item, "MULTI", true, 0).is_ok());
        assert!(matches!(
            Interaction::choice(&item, "SINGLE", false, 2),
            Err(QtiError::CardinalityMismatch { .. })
        ));
        assert!(matches!(
            Interaction::choice(&item, "TEXT", false, 1),
            Err(QtiError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Interaction::choice(&item, "NOPE", false, 1),
            Err(QtiError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn order_binding_rules() {
        let item = item();
        assert!(Interaction::order(&item, "ORDER", true).is_ok());
        assert!(Interaction::order(&item, "MULTI", true).is_err());
    }

    #[test]
    fn choice_identifiers_are_unique() {
        let item = item();
        let mut interaction = Interaction::choice(&item, "SINGLE", false, 1).unwrap();
        interaction.add_choice(SimpleChoice::new("A", false).unwrap()).unwrap();
        assert!(matches!(
            interaction.add_choice(SimpleChoice::new("A", true).unwrap()),
            Err(QtiError::DuplicateIdentifier { .. })
        ));
        assert_eq!(interaction.choices().len(), 1);
        assert!(SimpleChoice::new("bad id", false).is_err());
    }
}
