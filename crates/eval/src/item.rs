//! Assessment items: declarations, interactions and the response
//! processing program.
//!
//! An item is assembled once (normally by a parser) and is read-only from
//! then on; sessions share it behind an `Arc`.

use std::collections::HashMap;

use assessa_core::{
    check_identifier, BaseType, Cardinality, Declaration, OutcomeDeclaration, QtiError,
    ResponseDeclaration, Result,
};

use crate::interaction::Interaction;
use crate::rules::ResponseProcessing;

/// Built-in outcome holding the candidate's completion status.
pub const COMPLETION_STATUS: &str = "completionStatus";
/// Built-in response holding the time spent on a time-dependent item.
pub const DURATION: &str = "duration";

#[derive(Debug, Clone)]
pub struct Item {
    identifier: String,
    title: String,
    label: Option<String>,
    language: Option<String>,
    tool_name: Option<String>,
    tool_version: Option<String>,
    adaptive: bool,
    time_dependent: bool,
    declarations: Vec<Declaration>,
    index: HashMap<String, usize>,
    interactions: Vec<Interaction>,
    response_processing: Option<ResponseProcessing>,
}

impl Item {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        adaptive: bool,
        time_dependent: bool,
    ) -> Result<Self> {
        let identifier = identifier.into();
        check_identifier(&identifier)?;
        Ok(Item {
            identifier,
            title: title.into(),
            label: None,
            language: None,
            tool_name: None,
            tool_version: None,
            adaptive,
            time_dependent,
            declarations: Vec::new(),
            index: HashMap::new(),
            interactions: Vec::new(),
            response_processing: None,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub fn tool_version(&self) -> Option<&str> {
        self.tool_version.as_deref()
    }

    pub fn set_tool(&mut self, name: Option<String>, version: Option<String>) {
        self.tool_name = name;
        self.tool_version = version;
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn is_time_dependent(&self) -> bool {
        self.time_dependent
    }

    /// Declare a response or outcome variable. Identifiers are unique within
    /// the item and may not shadow the built-in variables.
    pub fn declare_variable(&mut self, declaration: impl Into<Declaration>) -> Result<()> {
        let declaration = declaration.into();
        let id = declaration.identifier().to_string();
        if self.index.contains_key(&id) || id == COMPLETION_STATUS || id == DURATION {
            return Err(QtiError::DuplicateIdentifier { identifier: id });
        }
        self.index.insert(id, self.declarations.len());
        self.declarations.push(declaration);
        Ok(())
    }

    pub fn lookup(&self, identifier: &str) -> Option<&Declaration> {
        self.index.get(identifier).map(|&i| &self.declarations[i])
    }

    pub fn response(&self, identifier: &str) -> Option<&ResponseDeclaration> {
        self.lookup(identifier).and_then(Declaration::as_response)
    }

    pub fn outcome(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.lookup(identifier).and_then(Declaration::as_outcome)
    }

    /// Declarations in declaration order.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn responses(&self) -> impl Iterator<Item = &ResponseDeclaration> {
        self.declarations.iter().filter_map(Declaration::as_response)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &OutcomeDeclaration> {
        self.declarations.iter().filter_map(Declaration::as_outcome)
    }

    /// Declared type of a variable, including the built-ins a session
    /// creates for this item.
    pub fn variable_type(&self, identifier: &str) -> Option<(Cardinality, Option<BaseType>)> {
        match identifier {
            COMPLETION_STATUS => Some((Cardinality::Single, Some(BaseType::Identifier))),
            DURATION if self.time_dependent => {
                Some((Cardinality::Single, Some(BaseType::Duration)))
            }
            _ => self
                .lookup(identifier)
                .map(|d| (d.cardinality(), d.base_type())),
        }
    }

    /// Register an interaction; each response variable is bound at most once.
    pub fn add_interaction(&mut self, interaction: Interaction) -> Result<()> {
        let id = interaction.response_identifier();
        if self.response(id).is_none() {
            return Err(QtiError::unknown(id, "interaction bound to an undeclared response"));
        }
        if self.interaction(id).is_some() {
            return Err(QtiError::DuplicateIdentifier {
                identifier: id.to_string(),
            });
        }
        self.interactions.push(interaction);
        Ok(())
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn interaction(&self, response_identifier: &str) -> Option<&Interaction> {
        self.interactions
            .iter()
            .find(|i| i.response_identifier() == response_identifier)
    }

    pub fn response_processing(&self) -> Option<&ResponseProcessing> {
        self.response_processing.as_ref()
    }

    pub fn set_response_processing(&mut self, response_processing: Option<ResponseProcessing>) {
        self.response_processing = response_processing;
    }
}
