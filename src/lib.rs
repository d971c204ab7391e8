//! Interaction domain module
//!
//! This domain runs menu-style conversations (USSD, SMS) where every inbound
//! message is handled by a fresh, stateless invocation. It provides:
//! - A state model of free-text, multiple-choice and terminal states
//! - A per-address user aggregate persisted to a key-value store
//! - Named lifecycle events with awaitable handlers
//! - An interaction machine that runs one conversation turn per message
//!
//! All session state lives in the store between turns. A turn loads the
//! user, feeds the input to the current state, moves the session pointer and
//! saves the user again.

pub mod aggregate;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod http;
pub mod projections;
pub mod sandbox;
pub mod states;
pub mod value_objects;

// Re-export main types
pub use aggregate::{User, UserEventKind, UserPhase, UserRecord};

pub use config::{AppConfig, ConfigSource, StaticConfig};

pub use errors::{ErrorKind, InteractionError, InteractionResult};

pub use events::{Event, EventBus, EventHandler, SubscriptionId};

pub use handlers::{InteractionMachine, Turn};

pub use http::{
    Codec, HttpApi, HttpError, HttpRequest, HttpResponse, HttpTransport, Method,
    ReqwestTransport, RequestOptions, TransportReply,
};

pub use projections::{SessionActivity, SessionSummary};

pub use sandbox::{
    KeyValueStore, MemoryStore, Sandbox, SetReply, StaticTranslations, Translation,
    TranslationSource,
};

pub use states::{
    Choice, ChoiceState, EndState, FreeTextState, Next, NextResolver, State, StateRegistry,
};

pub use value_objects::{
    Answers, InboundMessage, Metadata, NextState, Reply, StoreName, UserOptions, UserStateData,
};
