//! Value objects for the interaction domain

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::states::State;

/// Opaque, session-scoped data attached to a state
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Answers recorded for a user, keyed by state name
pub type Answers = HashMap<String, serde_json::Value>;

/// A reference to a state: its name plus, optionally, its metadata
///
/// This is what states hand back from input handling to move the session
/// forward. Without metadata the destination starts with an empty mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl NextState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl From<&str> for NextState {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NextState {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&State> for NextState {
    fn from(state: &State) -> Self {
        Self::new(state.name()).with_metadata(state.metadata().clone())
    }
}

fn nullable_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Metadata>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tracks which state a session is in without needing the live state
///
/// An absent name means the session has not entered any state yet. The
/// metadata is always a mapping, never absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStateData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable_metadata")]
    metadata: Metadata,
}

impl UserStateData {
    pub fn new(source: Option<NextState>) -> Self {
        let mut data = Self::default();
        data.reset(source);
        data
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Replace the tracked state; `None` clears it
    pub fn reset(&mut self, source: Option<NextState>) {
        match source {
            Some(next) => {
                self.name = Some(next.name);
                self.metadata = next.metadata.unwrap_or_default();
            }
            None => {
                self.name = None;
                self.metadata = Metadata::new();
            }
        }
    }

    /// Like [`reset`](Self::reset), except `None` leaves the state untouched
    pub fn change(&mut self, source: Option<NextState>) {
        if source.is_some() {
            self.reset(source);
        }
    }

    /// Shallow-merge `patch` into the metadata; patch keys win
    pub fn update_metadata(&mut self, patch: Metadata) {
        self.metadata.extend(patch);
    }

    pub fn exists(&self) -> bool {
        self.name.is_some()
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    /// The pointer as a transition target, `None` when no state is set
    pub fn to_next(&self) -> Option<NextState> {
        self.name
            .as_ref()
            .map(|name| NextState::new(name.clone()).with_metadata(self.metadata.clone()))
    }

    /// The `{name, metadata}` record this pointer persists as
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "metadata": self.metadata,
        })
    }
}

/// Storage namespace for user records
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreName {
    /// The `"default"` namespace
    #[default]
    Default,
    /// An explicit namespace, which may be the empty string.
    /// `Named("default")` shares the `Default` namespace; build it with
    /// [`StoreName::named`] to get the canonical value.
    Named(String),
    /// No namespace at all: records live directly under `users.`
    Unscoped,
}

impl StoreName {
    pub const DEFAULT: &'static str = "default";

    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == Self::DEFAULT {
            StoreName::Default
        } else {
            StoreName::Named(name)
        }
    }

    /// Namespace segment used when building storage keys
    pub fn namespace(&self) -> Option<&str> {
        match self {
            StoreName::Default => Some(Self::DEFAULT),
            StoreName::Named(name) => Some(name),
            StoreName::Unscoped => None,
        }
    }
}

/// Options used to set up a user for a turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserOptions {
    pub lang: Option<String>,
    pub store_name: StoreName,
    pub answers: Answers,
    pub state: Option<NextState>,
}

impl UserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn store_name(mut self, store_name: StoreName) -> Self {
        self.store_name = store_name;
        self
    }

    pub fn state(mut self, state: impl Into<NextState>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn answer(mut self, state_name: impl Into<String>, answer: serde_json::Value) -> Self {
        self.answers.insert(state_name.into(), answer);
        self
    }
}

/// A single inbound message driving one conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Address of the sender, e.g. an MSISDN
    pub address: String,
    /// Raw text of the message, absent for session-start events
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub options: UserOptions,
}

impl InboundMessage {
    pub fn new(address: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            content: Some(content.into()),
            options: UserOptions::default(),
        }
    }

    /// A message that opens a session without any input
    pub fn session_start(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            content: None,
            options: UserOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UserOptions) -> Self {
        self.options = options;
        self
    }

    /// The message text, trimmed; empty when absent
    pub fn input(&self) -> &str {
        self.content.as_deref().map(str::trim).unwrap_or_default()
    }
}

/// Outcome of a turn handed back to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Content to send back, absent when the reply is suppressed
    pub content: Option<String>,
    /// Whether the conversation expects further input
    pub continue_session: bool,
}

impl Reply {
    pub fn prompt(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            continue_session: true,
        }
    }

    pub fn close(content: Option<String>) -> Self {
        Self {
            content,
            continue_session: false,
        }
    }

    pub fn expects_input(&self) -> bool {
        self.continue_session
    }
}
