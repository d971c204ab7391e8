//! SessionActivity projection - per-address view of session lifecycle
//!
//! Fed by the user event bus, this read model answers "when did we last hear
//! from this address" and "who is parked in which state".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

use crate::aggregate::{User, UserEventKind};
use crate::errors::{InteractionError, InteractionResult};
use crate::events::{Event, EventBus, EventHandler, SubscriptionId};

/// Activity summary for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub address: String,
    pub key: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_event: UserEventKind,
    pub resets: u32,
    pub saves: u32,
    pub last_saved_state: Option<String>,
}

impl SessionSummary {
    fn new(user: &User, kind: UserEventKind, at: DateTime<Utc>) -> Self {
        Self {
            address: user.address().to_string(),
            key: user.key(),
            first_seen: at,
            last_seen: at,
            last_event: kind,
            resets: 0,
            saves: 0,
            last_saved_state: None,
        }
    }
}

/// Session activity read model
#[derive(Debug, Default)]
pub struct SessionActivity {
    sessions: RwLock<HashMap<String, SessionSummary>>,
}

impl SessionActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the projection to every user lifecycle event on `bus`
    pub fn attach(self: &Arc<Self>, bus: &EventBus<User>) -> Vec<SubscriptionId> {
        UserEventKind::ALL
            .into_iter()
            .filter(|kind| *kind != UserEventKind::Setup)
            .map(|kind| {
                let handler: Arc<dyn EventHandler<User>> = self.clone();
                bus.add_handler(kind.as_str(), handler)
            })
            .collect()
    }

    /// Record one lifecycle event for `user`
    pub async fn apply(&self, kind: UserEventKind, user: &User) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let summary = sessions
            .entry(user.address().to_string())
            .or_insert_with(|| SessionSummary::new(user, kind, now));

        summary.last_seen = now;
        summary.last_event = kind;
        summary.key = user.key();
        match kind {
            UserEventKind::Reset => summary.resets += 1,
            UserEventKind::Saved => {
                summary.saves += 1;
                summary.last_saved_state = user.state().name().map(str::to_string);
            }
            UserEventKind::Setup | UserEventKind::Created | UserEventKind::Loaded => {}
        }
        trace!(address = user.address(), event = %kind, "Session activity updated");
    }

    pub async fn get(&self, address: &str) -> Option<SessionSummary> {
        self.sessions.read().await.get(address).cloned()
    }

    /// Sessions whose last saved state is `state`, ordered by address
    pub async fn in_state(&self, state: &str) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| s.last_saved_state.as_deref() == Some(state))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.address.cmp(&b.address));
        matching
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl EventHandler<User> for SessionActivity {
    async fn handle(&self, event: Event<'_, User>) -> InteractionResult<()> {
        let kind = UserEventKind::from_name(event.name()).ok_or_else(|| {
            InteractionError::configuration(format!(
                "session activity cannot handle event '{}'",
                event.name()
            ))
        })?;
        self.apply(kind, event.subject()).await;
        Ok(())
    }
}
