//! The bot lifecycle controller: validates configuration, builds the command and
//! component clients, connects storage while starting and drives the gateway loop.

use crate::commands;
use crate::components::{ComponentClient, ComponentClientKey};
use crate::config::BotConfig;
use crate::dispatch::{ClientCallback, ClientOptions, CommandClient, CommandModule};
use crate::error::{BotError, Result};
use crate::gateway::{GatewayEvent, GatewayHandler, GatewaySettings, ShardManagerContainer};
use crate::lifecycle::{Lifecycle, LifecycleHooks, LifecycleState};
use crate::registry::DependencyRegistry;
use crate::storage::{PgStore, Storage, StorageKey};
use async_trait::async_trait;
use serenity::Client;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct CryptoBot {
    config: BotConfig,
    gateway: GatewaySettings,
    components: Arc<ComponentClient>,
    storage: Arc<dyn Storage>,
    registry: DependencyRegistry,
    lifecycle: Lifecycle,
    commands: Option<Arc<CommandClient>>,
}

impl CryptoBot {
    /// Loads configuration from the environment and declares a Postgres storage handle.
    /// Fails before anything touches the network when a credential is missing.
    pub fn from_env() -> Result<Self> {
        let config = BotConfig::from_env()?;
        let storage = Arc::new(PgStore::new(config.connect_timeout));
        Ok(Self::new(config, storage))
    }

    pub fn new(config: BotConfig, storage: Arc<dyn Storage>) -> Self {
        let gateway = GatewaySettings::all_events(config.credentials.token.clone());
        Self {
            config,
            gateway,
            components: Arc::new(ComponentClient::new(false)),
            storage,
            registry: DependencyRegistry::new(),
            lifecycle: Lifecycle::new(),
            commands: None,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn gateway(&self) -> &GatewaySettings {
        &self.gateway
    }

    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    pub fn components(&self) -> &Arc<ComponentClient> {
        &self.components
    }

    pub fn commands(&self) -> Option<&Arc<CommandClient>> {
        self.commands.as_ref()
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Builds the command client with the modules under [`commands`].
    pub async fn create_client(&mut self) -> Result<()> {
        self.create_client_with(commands::modules()).await
    }

    /// Builds the command client: the component client is opened and closed with
    /// the command client's window, registered as a dependency, and the given
    /// modules are loaded before anything can dispatch to them.
    pub async fn create_client_with<I>(&mut self, modules: I) -> Result<()>
    where
        I: IntoIterator<Item = CommandModule>,
    {
        if self.commands.is_some() {
            return Err(BotError::ClientExists);
        }
        let options = ClientOptions {
            declare_global_commands: GuildId::new(self.config.commands_guild_id),
            mention_prefix: false,
        };
        let mut client = CommandClient::new(options, self.registry.clone());

        let opener = self.components.clone();
        let closer = self.components.clone();
        client
            .add_client_callback(ClientCallback::Starting, move || {
                let components = opener.clone();
                async move { components.open() }
            })
            .add_client_callback(ClientCallback::Closing, move || {
                let components = closer.clone();
                async move { components.close() }
            });
        client
            .set_type_dependency::<ComponentClientKey>(self.components.clone())
            .await;

        client.load_modules(modules).await?;
        info!(target = "bot", modules = ?client.loaded_modules(), "command client created");
        self.commands = Some(Arc::new(client));
        Ok(())
    }

    /// Moves the lifecycle to `to`, opening the command client before `Starting`
    /// and closing it after `Stopping`. An out-of-order target is rejected before
    /// either client is touched.
    pub async fn transition(&self, to: LifecycleState) -> Result<()> {
        let from = self.state().await;
        if !from.may_advance_to(to) {
            return Err(BotError::Lifecycle { from, to });
        }
        match to {
            LifecycleState::Starting => {
                if let Some(commands) = &self.commands {
                    commands.open().await;
                }
                match self.lifecycle.advance(to, self).await {
                    Ok(()) => Ok(()),
                    // lost a race with another transition; the window belongs to it
                    Err(e @ BotError::Lifecycle { .. }) => Err(e),
                    Err(e) => {
                        error!(target = "bot", error = %e, "startup failed");
                        self.release_clients().await;
                        Err(e)
                    }
                }
            }
            LifecycleState::Stopping => match self.lifecycle.advance(to, self).await {
                Err(e @ BotError::Lifecycle { .. }) => Err(e),
                result => {
                    self.release_clients().await;
                    result
                }
            },
            _ => self.lifecycle.advance(to, self).await,
        }
    }

    async fn release_clients(&self) {
        if let Some(commands) = &self.commands {
            commands.close().await;
        }
    }

    async fn on_gateway_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::Ready { user, guilds } => {
                if self.state().await != LifecycleState::Starting {
                    tracing::debug!(target = "bot", %user, "ready after reconnect");
                    return;
                }
                info!(target = "bot", %user, guilds, "gateway ready");
                if let Err(e) = self.transition(LifecycleState::Started).await {
                    error!(target = "bot", error = %e, "could not enter Started");
                }
            }
        }
    }

    /// Creates the clients, fires the lifecycle and blocks in the gateway loop until
    /// Ctrl-C or the gateway ends. A storage failure while starting is fatal.
    pub async fn run(mut self) -> Result<()> {
        self.create_client().await?;
        let commands = self.commands.clone().ok_or(BotError::MissingDependency("CommandClient"))?;

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut client = Client::builder(&self.gateway.token, self.gateway.intents)
            .event_handler(GatewayHandler::new(commands, events_tx))
            .await?;
        let shard_manager = client.shard_manager.clone();
        self.registry
            .set::<ShardManagerContainer>(shard_manager.clone())
            .await;

        self.transition(LifecycleState::Starting).await?;

        let mut gateway = tokio::spawn(async move { client.start().await });
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut listening = true;

        let outcome = loop {
            tokio::select! {
                Some(event) = events.recv() => self.on_gateway_event(event).await,
                signal = &mut ctrl_c, if listening => match signal {
                    Ok(()) => {
                        info!(target = "bot", "stop signal received");
                        self.transition(LifecycleState::Stopping).await?;
                        shard_manager.shutdown_all().await;
                        break (&mut gateway).await;
                    }
                    Err(e) => {
                        warn!(target = "bot", error = %e, "could not listen for Ctrl-C, running until the gateway ends");
                        listening = false;
                    }
                },
                joined = &mut gateway => {
                    info!(target = "bot", "gateway loop ended");
                    self.transition(LifecycleState::Stopping).await?;
                    break joined;
                }
            }
        };

        self.transition(LifecycleState::Stopped).await?;
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LifecycleHooks for CryptoBot {
    async fn on_starting(&self) -> Result<()> {
        let config = &self.config;
        self.storage
            .init(
                &config.credentials.database_url,
                &config.database_name,
                &config.collection,
                true,
            )
            .await?;
        self.registry
            .set::<StorageKey>(self.storage.clone())
            .await;
        info!(target = "bot", "Bot Starting.");
        Ok(())
    }

    async fn on_started(&self) -> Result<()> {
        info!(target = "bot", "Bot is ready!");
        Ok(())
    }

    async fn on_stopping(&self) -> Result<()> {
        info!(target = "bot", "Bot is stopping.");
        self.registry.remove::<StorageKey>().await;
        self.storage.close().await;
        Ok(())
    }

    async fn on_stopped(&self) -> Result<()> {
        info!(target = "bot", "Bot has stopped!");
        Ok(())
    }
}
