//! User aggregate - the per-address session record
//!
//! A [`User`] lives for exactly one conversation turn. It is hydrated from
//! the key-value store (or created fresh), mutated by the turn's states and
//! written back at the end of the turn. Lifecycle transitions are announced
//! on the user event bus:
//! - `setup` on every (re)initialization
//! - `user:new` when no prior record existed
//! - `user:load` when a prior record was found
//! - `user:reset` on an explicit forced reinitialization
//! - `user:save` once the record has been persisted

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::{InteractionError, InteractionResult};
use crate::events::{Event, EventBus};
use crate::sandbox::{Sandbox, Translation};
use crate::value_objects::{Answers, StoreName, UserOptions, UserStateData};

/// Lifecycle phase of a [`User`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserPhase {
    /// Constructed but not yet set up
    Uninitialized,
    /// Defaults applied, no lifecycle event beyond `setup` yet
    SetUp,
    /// Created because no prior record existed
    Created,
    /// Hydrated from a prior record
    Loaded,
    /// Forcibly reinitialized
    Reset,
    /// Persisted
    Saved,
}

/// Events emitted about a [`User`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserEventKind {
    Setup,
    Created,
    Loaded,
    Reset,
    Saved,
}

impl UserEventKind {
    pub const ALL: [UserEventKind; 5] = [
        UserEventKind::Setup,
        UserEventKind::Created,
        UserEventKind::Loaded,
        UserEventKind::Reset,
        UserEventKind::Saved,
    ];

    /// Event name used on the bus
    pub fn as_str(self) -> &'static str {
        match self {
            UserEventKind::Setup => "setup",
            UserEventKind::Created => "user:new",
            UserEventKind::Loaded => "user:load",
            UserEventKind::Reset => "user:reset",
            UserEventKind::Saved => "user:save",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for UserEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted form of a [`User`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub addr: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub state: UserStateData,
}

/// The session record for one address
#[derive(Clone)]
pub struct User {
    address: String,
    lang: Option<String>,
    answers: Answers,
    state: UserStateData,
    store_name: StoreName,
    i18n: Arc<Translation>,
    phase: UserPhase,
    sandbox: Sandbox,
    events: Arc<EventBus<User>>,
}

impl User {
    pub fn new(sandbox: Sandbox, events: Arc<EventBus<User>>) -> Self {
        Self {
            address: String::new(),
            lang: None,
            answers: Answers::new(),
            state: UserStateData::default(),
            store_name: StoreName::Default,
            i18n: Arc::new(Translation::identity()),
            phase: UserPhase::Uninitialized,
            sandbox,
            events,
        }
    }

    /// Storage key for a user record
    ///
    /// `store` is the namespace; `None` places records directly under
    /// `users.`. Distinct namespaces never yield the same key for one address.
    pub fn make_key(address: &str, store: Option<&str>) -> String {
        match store {
            Some(store) => format!("users.{store}.{address}"),
            None => format!("users.{address}"),
        }
    }

    pub fn key(&self) -> String {
        Self::make_key(&self.address, self.store_name.namespace())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn store_name(&self) -> &StoreName {
        &self.store_name
    }

    pub fn phase(&self) -> UserPhase {
        self.phase
    }

    pub fn i18n(&self) -> &Translation {
        &self.i18n
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn events(&self) -> &Arc<EventBus<User>> {
        &self.events
    }

    /// The session pointer
    pub fn state(&self) -> &UserStateData {
        &self.state
    }

    /// The session pointer, for transitions through its own operations
    pub fn state_mut(&mut self) -> &mut UserStateData {
        &mut self.state
    }

    pub fn set_answer(&mut self, state_name: impl Into<String>, answer: serde_json::Value) {
        self.answers.insert(state_name.into(), answer);
    }

    pub fn get_answer(&self, state_name: &str) -> Option<&serde_json::Value> {
        self.answers.get(state_name)
    }

    /// The answer for `state_name` as text
    ///
    /// An answer of any other JSON type is a validation error.
    pub fn text_answer(&self, state_name: &str) -> InteractionResult<Option<&str>> {
        match self.answers.get(state_name) {
            None => Ok(None),
            Some(serde_json::Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(InteractionError::validation(format!(
                "answer for '{state_name}' has a value of type '{}' instead of 'string': {other}",
                json_type(other)
            ))),
        }
    }

    async fn emit(&self, kind: UserEventKind) -> InteractionResult<()> {
        let events = Arc::clone(&self.events);
        events.emit(Event::new(kind.as_str(), self)).await
    }

    async fn resolve_translation(&mut self) -> InteractionResult<()> {
        self.i18n = match &self.lang {
            Some(lang) => self.sandbox.translations().resolve(lang).await?,
            None => Arc::new(Translation::identity()),
        };
        Ok(())
    }

    /// Apply `options` over the defaults and announce `setup`
    pub async fn setup(&mut self, address: &str, options: UserOptions) -> InteractionResult<()> {
        self.address = address.to_string();
        self.lang = options.lang;
        self.store_name = options.store_name;
        self.answers = options.answers;
        self.state = UserStateData::new(options.state);
        self.resolve_translation().await?;
        self.phase = UserPhase::SetUp;

        debug!(address, key = %self.key(), "User set up");
        self.emit(UserEventKind::Setup).await
    }

    /// Set up a brand new user
    pub async fn create(&mut self, address: &str, options: UserOptions) -> InteractionResult<()> {
        self.setup(address, options).await?;
        self.phase = UserPhase::Created;
        info!(address, "Created user");
        self.emit(UserEventKind::Created).await
    }

    /// Forcibly reinitialize the user, discarding any stored session
    pub async fn reset(&mut self, address: &str, options: UserOptions) -> InteractionResult<()> {
        self.setup(address, options).await?;
        self.phase = UserPhase::Reset;
        info!(address, "Reset user");
        self.emit(UserEventKind::Reset).await
    }

    async fn fetch(&self, address: &str, store: &StoreName) -> InteractionResult<Option<UserRecord>> {
        let key = Self::make_key(address, store.namespace());
        match self.sandbox.kv().get(&key).await? {
            None | Some(serde_json::Value::Null) => {
                debug!(%key, "No stored user");
                Ok(None)
            }
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn load_record(
        &mut self,
        address: &str,
        record: UserRecord,
        mut options: UserOptions,
    ) -> InteractionResult<()> {
        options.lang = record.lang;
        options.answers = record.answers;
        options.state = record.state.to_next();

        self.setup(address, options).await?;
        self.phase = UserPhase::Loaded;
        info!(address, state = self.state.name(), "Loaded user");
        self.emit(UserEventKind::Loaded).await
    }

    /// Hydrate the user from its stored record
    ///
    /// A missing record is a not-found error.
    pub async fn load(&mut self, address: &str, options: UserOptions) -> InteractionResult<()> {
        let record = self
            .fetch(address, &options.store_name)
            .await?
            .ok_or_else(|| InteractionError::not_found(format!("Failed to load user '{address}'")))?;
        self.load_record(address, record, options).await
    }

    /// Load the stored user, or create it when there is none
    pub async fn load_or_create(&mut self, address: &str, options: UserOptions) -> InteractionResult<()> {
        match self.fetch(address, &options.store_name).await? {
            Some(record) => self.load_record(address, record, options).await,
            None => self.create(address, options).await,
        }
    }

    /// Persist the user and announce `user:save`
    pub async fn save(&mut self) -> InteractionResult<()> {
        if self.phase == UserPhase::Uninitialized {
            return Err(InteractionError::task_ordering(
                "cannot save a user that was never set up",
            ));
        }

        let key = self.key();
        let record = serde_json::to_value(self.to_record())?;
        let reply = self.sandbox.kv().set(&key, record).await?;
        if !reply.success {
            warn!(%key, reason = reply.reason.as_deref(), "Failed to save user");
            return Err(InteractionError::persistence(reply.reason));
        }

        self.phase = UserPhase::Saved;
        debug!(%key, state = self.state.name(), "Saved user");
        self.emit(UserEventKind::Saved).await
    }

    /// Change the user's language, refreshing the translation handle
    pub async fn set_lang(&mut self, lang: impl Into<String>) -> InteractionResult<()> {
        let lang = lang.into();
        if self.lang.as_deref() == Some(lang.as_str()) {
            return Ok(());
        }
        self.lang = Some(lang);
        self.resolve_translation().await
    }

    pub fn to_record(&self) -> UserRecord {
        UserRecord {
            addr: self.address.clone(),
            lang: self.lang.clone(),
            answers: self.answers.clone(),
            state: self.state.clone(),
        }
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("address", &self.address)
            .field("lang", &self.lang)
            .field("answers", &self.answers)
            .field("state", &self.state)
            .field("store_name", &self.store_name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::sandbox::{KeyValueStore, MemoryStore, StaticTranslations};
    use crate::value_objects::NextState;
    use serde_json::json;

    fn sandbox(store: Arc<MemoryStore>) -> Sandbox {
        Sandbox::new(store, Arc::new(StaticTranslations::new()))
    }

    #[test]
    fn test_make_key() {
        assert_eq!(User::make_key("+27123", Some("default")), "users.default.+27123");
        assert_eq!(User::make_key("+27123", Some("")), "users..+27123");
        assert_eq!(User::make_key("+27123", None), "users.+27123");
        assert_ne!(
            User::make_key("+27123", Some("a")),
            User::make_key("+27123", Some("b"))
        );
    }

    #[test]
    fn test_event_names() {
        assert_eq!(UserEventKind::Created.as_str(), "user:new");
        assert_eq!(UserEventKind::from_name("user:save"), Some(UserEventKind::Saved));
        assert_eq!(UserEventKind::from_name("user:unknown"), None);
    }

    #[tokio::test]
    async fn test_setup_applies_defaults() {
        let mut user = User::new(Sandbox::in_memory(), Arc::new(EventBus::new()));
        assert_eq!(user.phase(), UserPhase::Uninitialized);

        user.setup("+27123", UserOptions::new()).await.unwrap();
        assert_eq!(user.address(), "+27123");
        assert_eq!(user.lang(), None);
        assert_eq!(user.store_name(), &StoreName::Default);
        assert!(user.answers().is_empty());
        assert!(!user.state().exists());
        assert_eq!(user.key(), "users.default.+27123");
        assert_eq!(user.phase(), UserPhase::SetUp);
    }

    #[tokio::test]
    async fn test_save_before_setup_is_out_of_order() {
        let mut user = User::new(Sandbox::in_memory(), Arc::new(EventBus::new()));
        let err = user.save().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TaskOrdering);
    }

    #[tokio::test]
    async fn test_save_writes_record() {
        let store = Arc::new(MemoryStore::new());
        let mut user = User::new(sandbox(Arc::clone(&store)), Arc::new(EventBus::new()));
        user.create(
            "+27123",
            UserOptions::new().lang("af").state("states:start"),
        )
        .await
        .unwrap();
        user.set_answer("states:start", json!("yes"));
        user.save().await.unwrap();

        let stored = store.get("users.default.+27123").await.unwrap();
        assert_eq!(
            stored,
            Some(json!({
                "addr": "+27123",
                "lang": "af",
                "answers": {"states:start": "yes"},
                "state": {"name": "states:start", "metadata": {}},
            }))
        );
        assert_eq!(user.phase(), UserPhase::Saved);
    }

    #[tokio::test]
    async fn test_load_prefers_stored_fields() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "users.default.+27123",
                json!({
                    "addr": "+27123",
                    "lang": "xh",
                    "answers": {"states:q": "a"},
                    "state": {"name": "states:q", "metadata": {"page": 1}},
                }),
            )
            .await
            .unwrap();

        let mut user = User::new(sandbox(store), Arc::new(EventBus::new()));
        user.load(
            "+27123",
            UserOptions::new().lang("en").state(NextState::new("states:other")),
        )
        .await
        .unwrap();

        assert_eq!(user.lang(), Some("xh"));
        assert_eq!(user.get_answer("states:q"), Some(&json!("a")));
        assert!(user.state().is("states:q"));
        assert_eq!(user.state().metadata()["page"], json!(1));
        assert_eq!(user.phase(), UserPhase::Loaded);
    }

    #[tokio::test]
    async fn test_malformed_record_is_validation_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("users.default.+27123", json!({"addr": 5}))
            .await
            .unwrap();

        let mut user = User::new(sandbox(store), Arc::new(EventBus::new()));
        let err = user
            .load_or_create("+27123", UserOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_text_answer_type_check() {
        let mut user = User::new(Sandbox::in_memory(), Arc::new(EventBus::new()));
        user.set_answer("states:age", json!(5));
        user.set_answer("states:name", json!("Jane"));

        assert_eq!(user.text_answer("states:name").unwrap(), Some("Jane"));
        assert_eq!(user.text_answer("states:missing").unwrap(), None);

        let err = user.text_answer("states:age").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.message(),
            "answer for 'states:age' has a value of type 'number' instead of 'string': 5"
        );
    }

    #[tokio::test]
    async fn test_set_lang_refreshes_translation() {
        let translations = StaticTranslations::new().with_catalogue("af", [("Yes", "Ja")]);
        let sandbox = Sandbox::new(Arc::new(MemoryStore::new()), Arc::new(translations));
        let mut user = User::new(sandbox, Arc::new(EventBus::new()));
        user.setup("+27123", UserOptions::new()).await.unwrap();
        assert_eq!(user.i18n().gettext("Yes"), "Yes");

        user.set_lang("af").await.unwrap();
        assert_eq!(user.lang(), Some("af"));
        assert_eq!(user.i18n().gettext("Yes"), "Ja");

        user.set_lang("af").await.unwrap();
        assert_eq!(user.i18n().language(), Some("af"));
    }
}
