//! Shared doubles and fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cim_domain_interaction::{
    AppConfig, Choice, ChoiceState, EndState, Event, EventBus, FreeTextState, HttpRequest,
    HttpTransport, InteractionMachine, InteractionResult, KeyValueStore, MemoryStore, Next,
    Sandbox, SetReply, StateRegistry, StaticTranslations, TransportReply, User, UserEventKind,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ADDR: &str = "+27123";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Store that reads like a memory store but refuses every write
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    reason: String,
}

impl FailingStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            inner: MemoryStore::new(),
            reason: reason.into(),
        }
    }

    pub async fn seed(&self, key: &str, value: serde_json::Value) {
        self.inner.set(key, value).await.expect("seed");
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> InteractionResult<Option<serde_json::Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: serde_json::Value) -> InteractionResult<SetReply> {
        Ok(SetReply::failed(self.reason.clone()))
    }
}

/// HTTP transport answering from a url table and keeping the requests it saw
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: HashMap<String, TransportReply>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, url: &str, code: u16, body: &str) -> Self {
        self.replies.insert(
            url.to_string(),
            TransportReply::Response {
                code,
                body: Some(body.to_string()),
            },
        );
        self
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: &HttpRequest) -> TransportReply {
        self.requests.lock().await.push(request.clone());
        let url = request.to_url().unwrap_or_else(|_| request.url.clone());
        self.replies
            .get(&url)
            .cloned()
            .unwrap_or(TransportReply::Failed {
                reason: Some(format!("no stub for {url}")),
            })
    }
}

/// Record the names of user lifecycle events emitted on `bus`
pub fn record_user_events(bus: &EventBus<User>) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in UserEventKind::ALL {
        let log = Arc::clone(&log);
        bus.on(kind.as_str(), move |event: Event<'_, User>| {
            let log = Arc::clone(&log);
            let name = event.name().to_string();
            async move {
                log.lock().await.push(name);
                Ok(())
            }
            .boxed()
        });
    }
    log
}

/// The drinks menu used across the turn tests
pub fn drinks_registry() -> StateRegistry {
    let mut registry = StateRegistry::new();
    registry
        .register(
            ChoiceState::new(
                "states:start",
                "What would you like?",
                vec![Choice::new("tea", "Tea"), Choice::new("coffee", "Coffee")],
                Next::by_answer([("tea", "tea_state"), ("coffee", "coffee_state")]),
            )
            .expect("valid choices")
            .with_error("Please choose 1 or 2."),
        )
        .expect("register start");
    registry
        .register(EndState::new("tea_state", "Enjoy your tea!").with_send_reply(false))
        .expect("register tea");
    registry
        .register(
            FreeTextState::new("coffee_state", "How many sugars?", "states:thanks")
                .with_check(|input| {
                    input
                        .parse::<u8>()
                        .is_err()
                        .then(|| "Please send a number.".to_string())
                }),
        )
        .expect("register coffee");
    registry
        .register(EndState::new("states:thanks", "Thanks, coming right up.").with_next("states:start"))
        .expect("register thanks");
    registry
}

pub fn drinks_machine(sandbox: Sandbox) -> InteractionMachine {
    InteractionMachine::new(
        AppConfig::new("states:start"),
        Arc::new(drinks_registry()),
        sandbox,
    )
    .expect("valid machine")
}

pub fn memory_sandbox() -> (Sandbox, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let sandbox = Sandbox::new(store.clone(), Arc::new(StaticTranslations::new()));
    (sandbox, store)
}
