use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::State;
use crate::errors::{InteractionError, InteractionResult};
use crate::value_objects::UserStateData;

/// Builds a state on demand from its name
pub type StateFactory = Arc<dyn Fn(&str) -> InteractionResult<State> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Template(State),
    Factory(StateFactory),
}

/// Read-only catalogue of an application's states, keyed by name
///
/// Registration happens while the application is wired up. Once shared with
/// a machine the registry is only read from.
#[derive(Clone, Default)]
pub struct StateRegistry {
    entries: HashMap<String, Entry>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: String, entry: Entry) -> InteractionResult<()> {
        if self.entries.contains_key(&name) {
            return Err(InteractionError::configuration(format!(
                "state '{name}' is already registered"
            )));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Register a state template, cloned for every instantiation
    pub fn register(&mut self, state: impl Into<State>) -> InteractionResult<()> {
        let state = state.into();
        self.insert(state.name().to_string(), Entry::Template(state))
    }

    /// Register a factory that builds the state named `name`
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F) -> InteractionResult<()>
    where
        F: Fn(&str) -> InteractionResult<State> + Send + Sync + 'static,
    {
        self.insert(name.into(), Entry::Factory(Arc::new(factory)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A fresh state for the pointer, carrying the pointer's metadata
    pub fn instantiate(&self, pointer: &UserStateData) -> InteractionResult<State> {
        let name = pointer.name().ok_or_else(|| {
            InteractionError::configuration("cannot instantiate a state for an empty session")
        })?;

        let mut state = match self.entries.get(name) {
            Some(Entry::Template(state)) => state.clone(),
            Some(Entry::Factory(factory)) => factory(name)?,
            None => {
                return Err(InteractionError::configuration(format!(
                    "unknown state '{name}'"
                )));
            }
        };

        if state.name() != name {
            return Err(InteractionError::configuration(format!(
                "factory for '{name}' produced state '{}'",
                state.name()
            )));
        }

        state.set_metadata(pointer.metadata().clone());
        Ok(state)
    }
}

impl fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StateRegistry").field("states", &names).finish()
    }
}
