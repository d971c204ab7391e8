//! Named-event publish/subscribe
//!
//! An [`EventBus`] dispatches named events about a subject (the user
//! aggregate, a conversation turn) to asynchronous handlers. `emit` resolves
//! only after every matching handler has finished, so callers can rely on
//! handler side effects having happened.

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::oneshot;
use tracing::trace;

use crate::errors::{InteractionError, InteractionResult};

/// A named occurrence concerning a subject
///
/// The subject is borrowed, not copied: handlers observe the subject exactly
/// as it is at the moment of emission.
pub struct Event<'a, T> {
    name: &'a str,
    subject: &'a T,
}

impl<'a, T> Event<'a, T> {
    pub fn new(name: &'a str, subject: &'a T) -> Self {
        Self { name, subject }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn subject(&self) -> &'a T {
        self.subject
    }
}

impl<T> Clone for Event<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Event<'_, T> {}

impl<T> fmt::Debug for Event<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("name", &self.name).finish()
    }
}

/// Asynchronous handler for events about `T`
#[async_trait]
pub trait EventHandler<T: Sync>: Send + Sync {
    async fn handle(&self, event: Event<'_, T>) -> InteractionResult<()>;
}

#[async_trait]
impl<T, F> EventHandler<T> for F
where
    T: Sync,
    F: for<'a> Fn(Event<'a, T>) -> BoxFuture<'a, InteractionResult<()>> + Send + Sync,
{
    async fn handle(&self, event: Event<'_, T>) -> InteractionResult<()> {
        self(event).await
    }
}

/// Identifies a registered handler so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<T: Sync> {
    id: SubscriptionId,
    name: String,
    handler: Arc<dyn EventHandler<T>>,
    once: bool,
}

type Subscriptions<T> = Mutex<Vec<Subscription<T>>>;

/// Removes a subscription when dropped, unless the bus is already gone
struct Unsubscribe<T: Sync> {
    subscriptions: Weak<Subscriptions<T>>,
    id: SubscriptionId,
}

impl<T: Sync> Drop for Unsubscribe<T> {
    fn drop(&mut self) {
        if let Some(subscriptions) = self.subscriptions.upgrade() {
            subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|s| s.id != self.id);
        }
    }
}

/// Publish/subscribe hub for events about `T`
pub struct EventBus<T: Sync> {
    subscriptions: Arc<Subscriptions<T>>,
    next_id: AtomicU64,
}

impl<T: Sync> EventBus<T> {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn subscriptions(&self) -> MutexGuard<'_, Vec<Subscription<T>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn register(
        &self,
        name: &str,
        handler: Arc<dyn EventHandler<T>>,
        once: bool,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions().push(Subscription {
            id,
            name: name.to_string(),
            handler,
            once,
        });
        trace!(event = name, ?id, once, "Registered event handler");
        id
    }

    /// Register a handler for every occurrence of `name`
    pub fn on<F>(&self, name: impl AsRef<str>, handler: F) -> SubscriptionId
    where
        F: for<'a> Fn(Event<'a, T>) -> BoxFuture<'a, InteractionResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name.as_ref(), Arc::new(handler), false)
    }

    /// Register a handler that is removed after the first occurrence of `name`
    pub fn once<F>(&self, name: impl AsRef<str>, handler: F) -> SubscriptionId
    where
        F: for<'a> Fn(Event<'a, T>) -> BoxFuture<'a, InteractionResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name.as_ref(), Arc::new(handler), true)
    }

    /// Register a handler object for every occurrence of `name`
    pub fn add_handler(
        &self,
        name: impl AsRef<str>,
        handler: Arc<dyn EventHandler<T>>,
    ) -> SubscriptionId {
        self.register(name.as_ref(), handler, false)
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() < before
    }

    /// Number of handlers currently registered for `name`
    pub fn listener_count(&self, name: &str) -> usize {
        self.subscriptions()
            .iter()
            .filter(|s| s.name == name)
            .count()
    }

    /// Dispatch an event to its handlers
    ///
    /// Handlers are started in registration order and awaited together. If
    /// any of them fails the first failure (in registration order) is
    /// returned, after the remaining handlers have run to completion.
    pub async fn emit(&self, event: Event<'_, T>) -> InteractionResult<()> {
        let handlers: Vec<Arc<dyn EventHandler<T>>> = {
            let mut subscriptions = self.subscriptions();
            let matched = subscriptions
                .iter()
                .filter(|s| s.name == event.name())
                .map(|s| Arc::clone(&s.handler))
                .collect();
            subscriptions.retain(|s| !(s.once && s.name == event.name()));
            matched
        };

        trace!(event = event.name(), handlers = handlers.len(), "Emitting event");

        let results = future::join_all(handlers.iter().map(|h| h.handle(event))).await;
        results.into_iter().collect()
    }
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Wait for the next occurrence of `name`
    ///
    /// The subscription is registered immediately, so an emission that
    /// happens any time after this call resolves the returned future. Every
    /// call gets its own single-fire subscription, which is removed again if
    /// the returned future is dropped before the event arrives.
    pub fn next(&self, name: &str) -> impl Future<Output = InteractionResult<T>> + Send + use<T> {
        let name = name.to_string();
        let (tx, rx) = oneshot::channel::<T>();
        let tx = Mutex::new(Some(tx));

        let id = self.once(&name, move |event: Event<'_, T>| {
            let sender = tx.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(sender) = sender {
                // Receiver may have been dropped; nobody is waiting then.
                let _ = sender.send(event.subject().clone());
            }
            future::ready(Ok(())).boxed()
        });

        let unsubscribe = Unsubscribe {
            subscriptions: Arc::downgrade(&self.subscriptions),
            id,
        };

        async move {
            let _unsubscribe = unsubscribe;
            rx.await.map_err(|_| {
                InteractionError::task_ordering(format!(
                    "event bus dropped before '{name}' was emitted"
                ))
            })
        }
    }
}

impl<T: Sync> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sync> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self.subscriptions();
        let names: Vec<&str> = subscriptions.iter().map(|s| s.name.as_str()).collect();
        f.debug_struct("EventBus").field("subscriptions", &names).finish()
    }
}
