//! Translation handles attached to users

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::errors::InteractionResult;

/// A message catalogue for one language
///
/// Lookups fall back to the message id itself, so an empty catalogue
/// behaves as the identity translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    language: Option<String>,
    messages: HashMap<String, String>,
}

impl Translation {
    pub fn new(language: impl Into<String>, messages: HashMap<String, String>) -> Self {
        Self {
            language: Some(language.into()),
            messages,
        }
    }

    /// Translation that returns every message id unchanged
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn gettext<'a>(&'a self, msgid: &'a str) -> &'a str {
        self.messages.get(msgid).map(String::as_str).unwrap_or(msgid)
    }
}

/// Resolves language codes to translation handles
#[async_trait]
pub trait TranslationSource: Send + Sync {
    async fn resolve(&self, language: &str) -> InteractionResult<Arc<Translation>>;
}

/// Translation source serving catalogues held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticTranslations {
    catalogues: HashMap<String, Arc<Translation>>,
}

impl StaticTranslations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalogue<I, K, V>(mut self, language: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let messages = messages
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.catalogues.insert(
            language.to_string(),
            Arc::new(Translation::new(language, messages)),
        );
        self
    }
}

#[async_trait]
impl TranslationSource for StaticTranslations {
    async fn resolve(&self, language: &str) -> InteractionResult<Arc<Translation>> {
        match self.catalogues.get(language) {
            Some(translation) => Ok(Arc::clone(translation)),
            None => {
                warn!(language, "No catalogue for language, using identity translation");
                Ok(Arc::new(Translation::identity()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_catalogue_lookup() {
        let source = StaticTranslations::new().with_catalogue("af", [("Hello", "Hallo")]);

        let af = source.resolve("af").await.unwrap();
        assert_eq!(af.language(), Some("af"));
        assert_eq!(af.gettext("Hello"), "Hallo");
        assert_eq!(af.gettext("Goodbye"), "Goodbye");
    }

    #[tokio::test]
    async fn test_unknown_language_falls_back_to_identity() {
        let source = StaticTranslations::new();
        let sw = source.resolve("sw").await.unwrap();
        assert_eq!(sw.language(), None);
        assert_eq!(sw.gettext("Hello"), "Hello");
    }
}
