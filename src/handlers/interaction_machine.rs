//! Runs one conversation turn per inbound message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::aggregate::User;
use crate::config::AppConfig;
use crate::errors::{InteractionError, InteractionResult};
use crate::events::{Event, EventBus};
use crate::sandbox::Sandbox;
use crate::states::{State, StateRegistry};
use crate::value_objects::{InboundMessage, NextState, Reply, StoreName, UserOptions};

/// One conversation turn, as seen by turn event handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub message: InboundMessage,
    pub started_at: DateTime<Utc>,
    /// Set once the turn has produced its reply
    pub reply: Option<Reply>,
}

impl Turn {
    /// Emitted before the user is loaded
    pub const START: &'static str = "turn:start";
    /// Emitted after the user has been saved
    pub const END: &'static str = "turn:end";

    pub fn new(message: InboundMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            started_at: Utc::now(),
            reply: None,
        }
    }
}

/// Drives conversations through the states of one application
///
/// The machine is shared by all turns. Each turn builds its own [`User`],
/// so turns for different addresses can run concurrently. Turns for the
/// same address are not serialized here.
pub struct InteractionMachine {
    config: AppConfig,
    registry: Arc<StateRegistry>,
    sandbox: Sandbox,
    user_events: Arc<EventBus<User>>,
    turn_events: Arc<EventBus<Turn>>,
}

impl InteractionMachine {
    pub fn new(
        config: AppConfig,
        registry: Arc<StateRegistry>,
        sandbox: Sandbox,
    ) -> InteractionResult<Self> {
        config.validate()?;
        if !registry.contains(&config.start_state) {
            return Err(InteractionError::configuration(format!(
                "start state '{}' is not registered",
                config.start_state
            )));
        }

        Ok(Self {
            config,
            registry,
            sandbox,
            user_events: Arc::new(EventBus::new()),
            turn_events: Arc::new(EventBus::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Lifecycle events of the users handled by this machine
    pub fn user_events(&self) -> &Arc<EventBus<User>> {
        &self.user_events
    }

    /// `turn:start` and `turn:end` events
    pub fn turn_events(&self) -> &Arc<EventBus<Turn>> {
        &self.turn_events
    }

    /// Setup options for the sender, completed from the config
    fn user_options(&self, message: &InboundMessage) -> UserOptions {
        let mut options = message.options.clone();
        if options.lang.is_none() {
            options.lang = self.config.default_lang.clone();
        }
        if options.store_name == StoreName::Default {
            options.store_name = self.config.store_name();
        }
        options
    }

    /// Handle one inbound message and produce the reply for it
    pub async fn handle_message(&self, message: InboundMessage) -> InteractionResult<Reply> {
        let mut turn = Turn::new(message);
        let span = info_span!("turn", turn_id = %turn.id, address = %turn.message.address);
        self.run(&mut turn).instrument(span).await
    }

    async fn run(&self, turn: &mut Turn) -> InteractionResult<Reply> {
        self.turn_events.emit(Event::new(Turn::START, &*turn)).await?;

        let reply = self.run_turn(&turn.message).await?;
        turn.reply = Some(reply.clone());

        self.turn_events.emit(Event::new(Turn::END, &*turn)).await?;
        info!(continue_session = reply.continue_session, "Turn complete");
        Ok(reply)
    }

    async fn run_turn(&self, message: &InboundMessage) -> InteractionResult<Reply> {
        let mut user = User::new(self.sandbox.clone(), Arc::clone(&self.user_events));
        let mut options = self.user_options(message);
        let input = message.input();

        if input == self.config.reset_keyword {
            options.state = None;
            user.reset(&message.address, options).await?;
        } else {
            user.load_or_create(&message.address, options).await?;
        }

        let entering = !user.state().exists();
        if entering {
            debug!(state = %self.config.start_state, "Entering start state");
            user.state_mut()
                .reset(Some(NextState::new(self.config.start_state.as_str())));
        }

        let mut state = self.registry.instantiate(user.state())?;

        // Session-start messages re-show the current state without input.
        if !entering && message.content.is_some() {
            if let Some(next) = state.handle_input(input, &mut user).await? {
                user.state_mut().change(Some(next));
                state = self.registry.instantiate(user.state())?;
            }
        }

        let content = state.display(&user)?;
        let reply = match &state {
            State::End(end) => {
                if let Some(next) = end.next() {
                    user.state_mut().change(Some(next.clone()));
                }
                Reply::close(end.send_reply().then_some(content))
            }
            _ => Reply::prompt(content),
        };

        user.save().await?;
        Ok(reply)
    }
}

impl std::fmt::Debug for InteractionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionMachine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
