//! Drives the controller through its lifecycle with an in-memory storage fake.
use async_trait::async_trait;
use crypto_bot::components::{ComponentClient, ComponentClientKey};
use crypto_bot::config::{BotConfig, DATABASE_URL_VAR, TOKEN_VAR};
use crypto_bot::error::StorageError;
use crypto_bot::lifecycle::LifecycleState;
use crypto_bot::registry::DependencyRegistry;
use crypto_bot::storage::{Profile, Storage, StorageKey};
use crypto_bot::{BotError, CryptoBot};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Default)]
struct FakeStorage {
    journal: Mutex<Vec<String>>,
    registry: OnceLock<DependencyRegistry>,
    components: OnceLock<Arc<ComponentClient>>,
    fail_connect: bool,
}

impl FakeStorage {
    fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    fn watch(&self, bot: &CryptoBot) {
        self.registry.set(bot.registry().clone()).ok();
        self.components.set(bot.components().clone()).ok();
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn init(
        &self,
        url: &str,
        database: &str,
        collection: &str,
        ensure_schema: bool,
    ) -> Result<(), StorageError> {
        let registered = match self.registry.get() {
            Some(registry) => registry.contains::<StorageKey>().await,
            None => false,
        };
        let components_open = self.components.get().is_some_and(|c| c.is_open());
        self.record(format!(
            "init {url} {database} {collection} schema={ensure_schema} registered={registered} components_open={components_open}"
        ));
        if self.fail_connect {
            return Err(StorageError::Timeout(1));
        }
        Ok(())
    }

    async fn close(&self) {
        self.record("close".to_string());
    }

    async fn fetch_profile(&self, _user_id: u64) -> Result<Option<Profile>, StorageError> {
        Ok(None)
    }

    async fn save_profile(&self, _profile: &Profile) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Copies the controller's and registry's log lines into the storage journal, so
/// log order can be checked against storage calls.
struct LogJournal(Arc<FakeStorage>);

#[derive(Default)]
struct LogFields {
    target: Option<String>,
    key: Option<String>,
    message: Option<String>,
}

impl Visit for LogFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "target" => self.target = Some(value.to_string()),
            "key" => self.key = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for LogJournal {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = LogFields::default();
        event.record(&mut fields);
        match (fields.target.as_deref(), fields.key, fields.message) {
            (Some("registry"), Some(key), _) => {
                let short = key.rsplit("::").next().unwrap_or(&key).to_string();
                self.0.record(format!("set {short}"));
            }
            (Some("bot"), _, Some(message)) => self.0.record(message),
            _ => {}
        }
    }
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn build(pairs: &[(&str, &str)], storage: Arc<FakeStorage>) -> crypto_bot::Result<CryptoBot> {
    let config = BotConfig::from_lookup(env(pairs))?;
    let bot = CryptoBot::new(config, storage.clone());
    storage.watch(&bot);
    Ok(bot)
}

#[test]
fn empty_environment_fails_before_any_connection() {
    let storage = Arc::new(FakeStorage::default());
    let result = build(&[], storage.clone());
    assert!(matches!(result, Err(BotError::Configuration(_))));
    assert!(storage.journal().is_empty(), "no storage call expected");
}

#[test]
fn one_required_value_is_not_enough() {
    for pairs in [[(TOKEN_VAR, "T1")], [(DATABASE_URL_VAR, "mongodb://x")]] {
        let storage = Arc::new(FakeStorage::default());
        assert!(matches!(
            build(&pairs, storage.clone()),
            Err(BotError::Configuration(_))
        ));
        assert!(storage.journal().is_empty());
    }
}

#[tokio::test]
async fn full_run_orders_client_modules_storage_and_registry() {
    let storage = Arc::new(FakeStorage::default());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "mongodb://x")], storage.clone())
        .expect("both credentials present");
    assert_eq!(bot.state().await, LifecycleState::Created);
    assert_eq!(bot.gateway().token, "T1");

    bot.create_client().await.unwrap();
    let commands = bot.commands().expect("client created").clone();
    assert_eq!(commands.loaded_modules(), ["ping", "profile"]);
    assert!(!commands.options().mention_prefix);
    assert!(bot.registry().contains::<ComponentClientKey>().await);
    assert!(!bot.registry().contains::<StorageKey>().await);
    assert!(storage.journal().is_empty(), "storage untouched until Starting");

    bot.transition(LifecycleState::Starting).await.unwrap();
    assert_eq!(
        storage.journal(),
        ["init mongodb://x Crypto Profiles schema=true registered=false components_open=true"]
    );
    assert!(bot.registry().contains::<StorageKey>().await);
    assert!(commands.is_open());

    bot.transition(LifecycleState::Started).await.unwrap();
    assert_eq!(bot.state().await, LifecycleState::Started);

    bot.transition(LifecycleState::Stopping).await.unwrap();
    assert!(!commands.is_open());
    assert!(!bot.registry().contains::<StorageKey>().await);
    assert_eq!(storage.journal().last().map(String::as_str), Some("close"));

    bot.transition(LifecycleState::Stopped).await.unwrap();
    assert_eq!(bot.state().await, LifecycleState::Stopped);
}

#[tokio::test]
async fn component_client_lives_inside_the_command_window() {
    let storage = Arc::new(FakeStorage::default());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage).unwrap();
    let components = bot.components().clone();
    assert!(!components.is_event_managed());

    bot.create_client().await.unwrap();
    assert!(!components.is_open(), "not opened by creation");

    bot.transition(LifecycleState::Starting).await.unwrap();
    assert!(components.is_open());
    bot.transition(LifecycleState::Started).await.unwrap();
    assert!(components.is_open());

    bot.transition(LifecycleState::Stopping).await.unwrap();
    assert!(!components.is_open());
    bot.transition(LifecycleState::Stopped).await.unwrap();
    assert!(!components.is_open());
}

#[tokio::test]
async fn storage_failure_is_fatal_and_releases_clients() {
    let storage = Arc::new(FakeStorage::failing());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage.clone()).unwrap();
    bot.create_client().await.unwrap();

    let err = bot.transition(LifecycleState::Starting).await.unwrap_err();
    assert!(matches!(err, BotError::Storage(StorageError::Timeout(1))));
    assert_eq!(bot.state().await, LifecycleState::Created);
    assert!(!bot.registry().contains::<StorageKey>().await);
    assert!(!bot.components().is_open());
    assert!(!bot.commands().unwrap().is_open());
    assert_eq!(storage.journal().len(), 1);
}

#[tokio::test]
async fn client_is_created_once() {
    let storage = Arc::new(FakeStorage::default());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage).unwrap();
    bot.create_client().await.unwrap();
    assert!(matches!(bot.create_client().await, Err(BotError::ClientExists)));
}

#[tokio::test]
async fn lifecycle_rejects_skipping_ahead() {
    let storage = Arc::new(FakeStorage::default());
    let bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage.clone()).unwrap();
    assert!(matches!(
        bot.transition(LifecycleState::Started).await,
        Err(BotError::Lifecycle { .. })
    ));
    assert!(storage.journal().is_empty());
}

#[tokio::test]
async fn out_of_order_start_leaves_the_running_window_alone() {
    let storage = Arc::new(FakeStorage::default());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage.clone()).unwrap();
    bot.create_client().await.unwrap();
    let commands = bot.commands().unwrap().clone();

    bot.transition(LifecycleState::Starting).await.unwrap();
    bot.transition(LifecycleState::Started).await.unwrap();

    for stray in [LifecycleState::Starting, LifecycleState::Created, LifecycleState::Stopped] {
        assert!(matches!(
            bot.transition(stray).await,
            Err(BotError::Lifecycle { from: LifecycleState::Started, .. })
        ));
        assert_eq!(bot.state().await, LifecycleState::Started);
        assert!(commands.is_open());
        assert!(bot.components().is_open());
        assert!(bot.registry().contains::<StorageKey>().await);
    }
    assert_eq!(storage.journal().len(), 1, "storage initialised once, never closed");
}

#[tokio::test]
async fn stray_stop_before_start_touches_nothing() {
    let storage = Arc::new(FakeStorage::default());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage.clone()).unwrap();
    bot.create_client().await.unwrap();

    assert!(matches!(
        bot.transition(LifecycleState::Stopping).await,
        Err(BotError::Lifecycle { from: LifecycleState::Created, .. })
    ));
    assert_eq!(bot.state().await, LifecycleState::Created);
    assert!(storage.journal().is_empty());

    bot.transition(LifecycleState::Starting).await.unwrap();
    assert!(bot.components().is_open());
}

#[tokio::test]
async fn lifecycle_logs_follow_storage_and_registry() {
    let storage = Arc::new(FakeStorage::default());
    let mut bot = build(&[(TOKEN_VAR, "T1"), (DATABASE_URL_VAR, "postgres://x")], storage.clone()).unwrap();
    bot.create_client().await.unwrap();

    let subscriber = tracing_subscriber::registry().with(LogJournal(storage.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    bot.transition(LifecycleState::Starting).await.unwrap();
    bot.transition(LifecycleState::Started).await.unwrap();
    bot.transition(LifecycleState::Stopping).await.unwrap();
    bot.transition(LifecycleState::Stopped).await.unwrap();

    assert_eq!(
        storage.journal(),
        [
            "init postgres://x Crypto Profiles schema=true registered=false components_open=true",
            "set StorageKey",
            "Bot Starting.",
            "Bot is ready!",
            "Bot is stopping.",
            "close",
            "Bot has stopped!",
        ]
    );
}
