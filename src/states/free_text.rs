use std::fmt;
use std::sync::Arc;

use super::Next;
use crate::aggregate::User;
use crate::errors::InteractionResult;
use crate::value_objects::{Metadata, NextState};

/// Validates free-text input, returning the error text to show on failure
pub type Check = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A state that accepts any text the user sends
#[derive(Clone)]
pub struct FreeTextState {
    name: String,
    metadata: Metadata,
    question: String,
    check: Option<Check>,
    next: Next,
    error: Option<String>,
}

impl FreeTextState {
    pub fn new(name: impl Into<String>, question: impl Into<String>, next: impl Into<Next>) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::new(),
            question: question.into(),
            check: None,
            next: next.into(),
            error: None,
        }
    }

    /// Reject inputs for which `check` returns an error text
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
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

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn display(&self, user: &User) -> String {
        let text = self.error.as_deref().unwrap_or(&self.question);
        user.i18n().gettext(text).to_string()
    }

    pub async fn handle_input(
        &mut self,
        input: &str,
        user: &mut User,
    ) -> InteractionResult<Option<NextState>> {
        if let Some(error) = self.check.as_ref().and_then(|check| check(input)) {
            self.error = Some(error);
            return Ok(None);
        }
        self.error = None;

        user.set_answer(&self.name, serde_json::Value::String(input.to_string()));
        self.next.resolve(input, user).await
    }
}

impl fmt::Debug for FreeTextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeTextState")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("question", &self.question)
            .field("next", &self.next)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
