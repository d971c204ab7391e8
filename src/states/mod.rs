//! The conversation's state model
//!
//! A [`State`] is one step of a conversation: it produces the prompt shown to
//! the user and interprets the user's answer. States are templates held in a
//! [`StateRegistry`] and instantiated fresh for every turn. Anything that must
//! survive between turns travels in the session pointer's metadata.

pub mod choice;
pub mod end;
pub mod free_text;
pub mod next;
pub mod registry;

pub use choice::{Choice, ChoiceState};
pub use end::EndState;
pub use free_text::{Check, FreeTextState};
pub use next::{Next, NextResolver};
pub use registry::{StateFactory, StateRegistry};

use tracing::debug;

use crate::aggregate::User;
use crate::errors::InteractionResult;
use crate::value_objects::{Metadata, NextState};

/// A conversation state
#[derive(Debug, Clone)]
pub enum State {
    /// Accepts any text
    FreeText(FreeTextState),
    /// Accepts one of a fixed list of options
    Choice(ChoiceState),
    /// Ends the conversation
    End(EndState),
}

impl State {
    pub fn name(&self) -> &str {
        match self {
            State::FreeText(s) => s.name(),
            State::Choice(s) => s.name(),
            State::End(s) => s.name(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            State::FreeText(s) => s.metadata(),
            State::Choice(s) => s.metadata(),
            State::End(s) => s.metadata(),
        }
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        let slot = match self {
            State::FreeText(s) => s.metadata_mut(),
            State::Choice(s) => s.metadata_mut(),
            State::End(s) => s.metadata_mut(),
        };
        *slot = metadata;
    }

    pub fn is_end(&self) -> bool {
        matches!(self, State::End(_))
    }

    /// Whether this state's content is sent back to the user
    pub fn send_reply(&self) -> bool {
        match self {
            State::End(s) => s.send_reply(),
            _ => true,
        }
    }

    /// Content shown when entering the state
    pub fn display(&self, user: &User) -> InteractionResult<String> {
        Ok(match self {
            State::FreeText(s) => s.display(user),
            State::Choice(s) => s.display(user),
            State::End(s) => s.display(user),
        })
    }

    /// Interpret `input`, returning the state to move to or `None` to stay
    pub async fn handle_input(
        &mut self,
        input: &str,
        user: &mut User,
    ) -> InteractionResult<Option<NextState>> {
        let next = match self {
            State::FreeText(s) => s.handle_input(input, user).await?,
            State::Choice(s) => s.handle_input(input, user).await?,
            State::End(_) => None,
        };
        debug!(
            state = self.name(),
            next = next.as_ref().map(|n| n.name.as_str()),
            "Handled input"
        );
        Ok(next)
    }
}

impl From<FreeTextState> for State {
    fn from(state: FreeTextState) -> Self {
        State::FreeText(state)
    }
}

impl From<ChoiceState> for State {
    fn from(state: ChoiceState) -> Self {
        State::Choice(state)
    }
}

impl From<EndState> for State {
    fn from(state: EndState) -> Self {
        State::End(state)
    }
}
