//! Successor selection for states that accept input

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::aggregate::User;
use crate::errors::InteractionResult;
use crate::value_objects::NextState;

/// Decides the next state from an accepted answer
///
/// Resolvers run inside the turn and may suspend on collaborators reachable
/// through the user's sandbox, such as HTTP services or the key-value store.
#[async_trait]
pub trait NextResolver: Send + Sync {
    async fn resolve(&self, answer: &str, user: &User) -> InteractionResult<Option<NextState>>;
}

#[async_trait]
impl<F> NextResolver for F
where
    F: Fn(&str, &User) -> Option<NextState> + Send + Sync,
{
    async fn resolve(&self, answer: &str, user: &User) -> InteractionResult<Option<NextState>> {
        Ok(self(answer, user))
    }
}

/// How a state picks its successor once input has been accepted
#[derive(Clone, Default)]
pub enum Next {
    /// Remain in the current state
    #[default]
    Stay,
    /// Always move to the same state
    State(NextState),
    /// Look the successor up by answer; unknown answers stay
    ByAnswer(HashMap<String, NextState>),
    /// Defer to a resolver
    Resolver(Arc<dyn NextResolver>),
}

impl Next {
    pub fn by_answer<I, K, V>(routes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NextState>,
    {
        Next::ByAnswer(
            routes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn resolver(resolver: impl NextResolver + 'static) -> Self {
        Next::Resolver(Arc::new(resolver))
    }

    pub async fn resolve(&self, answer: &str, user: &User) -> InteractionResult<Option<NextState>> {
        match self {
            Next::Stay => Ok(None),
            Next::State(next) => Ok(Some(next.clone())),
            Next::ByAnswer(routes) => Ok(routes.get(answer).cloned()),
            Next::Resolver(resolver) => resolver.resolve(answer, user).await,
        }
    }
}

impl From<&str> for Next {
    fn from(name: &str) -> Self {
        Next::State(name.into())
    }
}

impl From<String> for Next {
    fn from(name: String) -> Self {
        Next::State(name.into())
    }
}

impl From<NextState> for Next {
    fn from(next: NextState) -> Self {
        Next::State(next)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Stay => f.write_str("Stay"),
            Next::State(next) => f.debug_tuple("State").field(next).finish(),
            Next::ByAnswer(routes) => f.debug_tuple("ByAnswer").field(routes).finish(),
            Next::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}
