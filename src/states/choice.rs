use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::Next;
use crate::aggregate::User;
use crate::errors::{InteractionError, InteractionResult};
use crate::value_objects::{Metadata, NextState};

/// Case-insensitive form used both to reject duplicates and to match input
fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One option of a [`ChoiceState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Value recorded as the answer and used to pick the next state
    pub value: String,
    /// Text shown to the user
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A state offering a numbered list of options
#[derive(Debug, Clone)]
pub struct ChoiceState {
    name: String,
    metadata: Metadata,
    question: String,
    choices: Vec<Choice>,
    next: Next,
    error: Option<String>,
    accept_labels: bool,
    invalid: bool,
}

impl ChoiceState {
    /// Build a choice state; an empty or duplicated option set is rejected
    pub fn new(
        name: impl Into<String>,
        question: impl Into<String>,
        choices: Vec<Choice>,
        next: impl Into<Next>,
    ) -> InteractionResult<Self> {
        let name = name.into();
        if choices.is_empty() {
            return Err(InteractionError::configuration(format!(
                "choice state '{name}' has no choices"
            )));
        }

        let mut seen = HashSet::new();
        for choice in &choices {
            if !seen.insert(fold(&choice.value)) {
                return Err(InteractionError::configuration(format!(
                    "choice state '{name}' has duplicate choice '{}'",
                    choice.value
                )));
            }
        }

        Ok(Self {
            name,
            metadata: Metadata::new(),
            question: question.into(),
            choices,
            next: next.into(),
            error: None,
            accept_labels: false,
            invalid: false,
        })
    }

    /// Text shown instead of the question after an invalid choice
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Also match input against option labels
    pub fn accept_labels(mut self, accept: bool) -> Self {
        self.accept_labels = accept;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Find the option selected by `input`: position first, then value, then label
    pub fn find(&self, input: &str) -> Option<&Choice> {
        let input = input.trim();
        let folded = fold(input);
        if let Ok(position) = input.parse::<usize>() {
            if let Some(choice) = position.checked_sub(1).and_then(|i| self.choices.get(i)) {
                return Some(choice);
            }
        }

        self.choices
            .iter()
            .find(|c| fold(&c.value) == folded)
            .or_else(|| {
                self.accept_labels
                    .then(|| {
                        self.choices
                            .iter()
                            .find(|c| fold(&c.label) == folded)
                    })
                    .flatten()
            })
    }

    pub fn display(&self, user: &User) -> String {
        let i18n = user.i18n();
        let heading = match (&self.error, self.invalid) {
            (Some(error), true) => error,
            _ => &self.question,
        };

        let mut lines = vec![i18n.gettext(heading).to_string()];
        lines.extend(
            self.choices
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {}", i + 1, i18n.gettext(&c.label))),
        );
        lines.join("\n")
    }

    pub async fn handle_input(
        &mut self,
        input: &str,
        user: &mut User,
    ) -> InteractionResult<Option<NextState>> {
        let Some(choice) = self.find(input) else {
            self.invalid = true;
            return Ok(None);
        };
        let value = choice.value.clone();
        self.invalid = false;

        user.set_answer(&self.name, serde_json::Value::String(value.clone()));
        self.next.resolve(&value, user).await
    }
}
