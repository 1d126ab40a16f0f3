//! Command-dispatch client: turns slash-command and component interactions into
//! calls on the loaded command modules.

use crate::components::{ComponentClientKey, ComponentHandler};
use crate::error::{BotError, Result};
use crate::registry::DependencyRegistry;
use async_trait::async_trait;
use serenity::builder::CreateCommand;
use serenity::http::Http;
use serenity::model::application::{CommandInteraction, ComponentInteraction};
use serenity::model::id::GuildId;
use serenity::prelude::{Context, TypeMapKey};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Named phases of the dispatch client's own active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCallback {
    Starting,
    Closing,
}

type Callback = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Guild the command set is declared into.
    pub declare_global_commands: GuildId,
    /// Whether a leading bot mention counts as a command prefix.
    pub mention_prefix: bool,
}

#[async_trait]
pub trait SlashCommand: Send + Sync {
    fn name(&self) -> &'static str;

    /// The declaration sent to Discord.
    fn register(&self) -> CreateCommand;

    async fn run(
        &self,
        ctx: &Context,
        interaction: &CommandInteraction,
        deps: &DependencyRegistry,
    ) -> Result<()>;
}

/// A group of commands and component handlers loaded together.
pub struct CommandModule {
    pub name: &'static str,
    pub commands: Vec<Arc<dyn SlashCommand>>,
    pub components: Vec<(&'static str, Arc<dyn ComponentHandler>)>,
}

impl CommandModule {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            commands: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn command(mut self, command: impl SlashCommand + 'static) -> Self {
        self.commands.push(Arc::new(command));
        self
    }

    pub fn component(mut self, family: &'static str, handler: impl ComponentHandler + 'static) -> Self {
        self.components.push((family, Arc::new(handler)));
        self
    }
}

pub struct CommandClient {
    options: ClientOptions,
    deps: DependencyRegistry,
    callbacks: HashMap<ClientCallback, Vec<Callback>>,
    commands: HashMap<&'static str, Arc<dyn SlashCommand>>,
    modules: Vec<&'static str>,
    open: AtomicBool,
}

impl CommandClient {
    pub fn new(options: ClientOptions, deps: DependencyRegistry) -> Self {
        Self {
            options,
            deps,
            callbacks: HashMap::new(),
            commands: HashMap::new(),
            modules: Vec::new(),
            open: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    pub fn dependencies(&self) -> &DependencyRegistry {
        &self.deps
    }

    /// Registers `callback` to run when the client enters `phase`. Callbacks run in
    /// registration order.
    pub fn add_client_callback<F, Fut>(&mut self, phase: ClientCallback, callback: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks
            .entry(phase)
            .or_default()
            .push(Box::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(callback())
            }));
        self
    }

    pub async fn set_type_dependency<K: TypeMapKey>(&self, value: K::Value) {
        self.deps.set::<K>(value).await;
    }

    /// Loads every module's commands and component handlers. Component handlers go
    /// to the component client resolved from the registry, so it has to be
    /// registered first.
    pub async fn load_modules<I>(&mut self, modules: I) -> Result<()>
    where
        I: IntoIterator<Item = CommandModule>,
    {
        if self.is_open() {
            return Err(BotError::ClientOpen);
        }
        for module in modules {
            if !module.components.is_empty() {
                let components = self.deps.require::<ComponentClientKey>().await?;
                for (family, handler) in module.components {
                    components.register(family, handler)?;
                }
            }
            for command in module.commands {
                let name = command.name();
                if self.commands.insert(name, command).is_some() {
                    return Err(BotError::DuplicateRegistration(format!("command `{name}`")));
                }
            }
            tracing::info!(target = "dispatch", module = module.name, "module loaded");
            self.modules.push(module.name);
        }
        Ok(())
    }

    pub fn loaded_modules(&self) -> &[&'static str] {
        &self.modules
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Enters the active window, running the `Starting` callbacks. No-op when already open.
    pub async fn open(&self) {
        if self.open.swap(true, Ordering::SeqCst) {
            return;
        }
        self.run_callbacks(ClientCallback::Starting).await;
        tracing::info!(target = "dispatch", commands = self.commands.len(), "command client open");
    }

    /// Leaves the active window, running the `Closing` callbacks. No-op when not open.
    pub async fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.run_callbacks(ClientCallback::Closing).await;
        tracing::info!(target = "dispatch", "command client closed");
    }

    async fn run_callbacks(&self, phase: ClientCallback) {
        if let Some(callbacks) = self.callbacks.get(&phase) {
            for callback in callbacks {
                callback().await;
            }
        }
    }

    /// Declarations for every loaded command, sorted by name.
    pub fn declarations(&self) -> Vec<CreateCommand> {
        self.command_names()
            .into_iter()
            .filter_map(|name| self.commands.get(name).map(|c| c.register()))
            .collect()
    }

    /// Overwrites the command set of the configured guild.
    pub async fn declare_commands(&self, http: &Http) -> Result<()> {
        let guild = self.options.declare_global_commands;
        let declared = guild.set_commands(http, self.declarations()).await?;
        tracing::info!(target = "dispatch", guild = %guild, count = declared.len(), "commands declared");
        Ok(())
    }

    /// Runs the command named by `interaction`. Returns whether one ran.
    pub async fn dispatch_command(&self, ctx: &Context, interaction: &CommandInteraction) -> Result<bool> {
        if !self.is_open() {
            return Ok(false);
        }
        let Some(command) = self.commands.get(interaction.data.name.as_str()).cloned() else {
            tracing::warn!(target = "dispatch", command = %interaction.data.name, "unknown command");
            return Ok(false);
        };
        command.run(ctx, interaction, &self.deps).await?;
        Ok(true)
    }

    pub async fn dispatch_component(&self, ctx: &Context, component: &ComponentInteraction) -> Result<bool> {
        if !self.is_open() {
            return Ok(false);
        }
        let Some(components) = self.deps.get::<ComponentClientKey>().await else {
            return Ok(false);
        };
        components.handle(ctx, component, &self.deps).await
    }
}
