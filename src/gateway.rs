//! Gateway side of the bot: connection settings, the serenity event handler, and
//! the lifecycle events it reports back to the controller.

use crate::dispatch::CommandClient;
use crate::error::BotError;
use serenity::gateway::ShardManager;
use serenity::async_trait;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use serenity::client::Context;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::prelude::{EventHandler, TypeMapKey};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

const FAILURE_REPLY: &str = "Something went wrong while handling that. Please try again.";

/// What the gateway connection is built from.
#[derive(Clone)]
pub struct GatewaySettings {
    pub token: String,
    pub intents: GatewayIntents,
}

impl GatewaySettings {
    /// A connection subscribed to every event category.
    pub fn all_events(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: GatewayIntents::all(),
        }
    }
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .finish()
    }
}

/// Registry key for the shard manager, used for latency and shutdown.
pub struct ShardManagerContainer;

impl TypeMapKey for ShardManagerContainer {
    type Value = Arc<ShardManager>;
}

/// Events the handler forwards to the controller's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Ready { user: String, guilds: usize },
}

pub struct GatewayHandler {
    commands: Arc<CommandClient>,
    events: UnboundedSender<GatewayEvent>,
}

impl GatewayHandler {
    pub fn new(commands: Arc<CommandClient>, events: UnboundedSender<GatewayEvent>) -> Self {
        Self { commands, events }
    }
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(target = "gateway", user = %ready.user.name, guilds = ready.guilds.len(), "connected and ready");
        if let Err(e) = self.commands.declare_commands(&ctx.http).await {
            tracing::error!(target = "gateway", error = %e, "failed to declare commands");
        }
        let event = GatewayEvent::Ready {
            user: ready.user.name.clone(),
            guilds: ready.guilds.len(),
        };
        if self.events.send(event).is_err() {
            tracing::debug!(target = "gateway", "controller no longer listening for ready");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                match self.commands.dispatch_command(&ctx, &command).await {
                    Ok(true) => {}
                    Ok(false) => {
                        let reply = CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content("That command is not available right now.")
                                .ephemeral(true),
                        );
                        command.create_response(&ctx.http, reply).await.ok();
                    }
                    Err(e) => {
                        tracing::error!(target = "gateway", command = %command.data.name, error = %e, "command failed");
                        report_failure(&ctx, &command, &e).await;
                    }
                }
            }
            Interaction::Component(component) => {
                match self.commands.dispatch_component(&ctx, &component).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(target = "gateway", cid = %component.data.custom_id, "unhandled component");
                    }
                    Err(e) => {
                        tracing::error!(target = "gateway", cid = %component.data.custom_id, error = %e, "component failed");
                        let reply = CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content(FAILURE_REPLY)
                                .ephemeral(true),
                        );
                        component.create_response(&ctx.http, reply).await.ok();
                    }
                }
            }
            _ => {}
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || !self.commands.options().mention_prefix {
            return;
        }
        let me = ctx.cache.current_user().id;
        if msg.content.starts_with(&format!("<@{me}>")) || msg.content.starts_with(&format!("<@!{me}>")) {
            msg.reply(&ctx.http, "Commands are available as slash commands, type `/` to see them.")
                .await
                .ok();
        }
    }
}

/// Tells the user a command failed, whether or not it already responded.
async fn report_failure(
    ctx: &Context,
    command: &serenity::model::application::CommandInteraction,
    error: &BotError,
) {
    let fresh = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(FAILURE_REPLY)
            .ephemeral(true),
    );
    if command.create_response(&ctx.http, fresh).await.is_err() {
        let followup = CreateInteractionResponseFollowup::new()
            .content(FAILURE_REPLY)
            .ephemeral(true);
        if let Err(e) = command.create_followup(&ctx.http, followup).await {
            tracing::debug!(target = "gateway", cause = %error, error = ?e, "failure report not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_cover_every_event_and_hide_the_token() {
        let settings = GatewaySettings::all_events("T1");
        assert_eq!(settings.intents, GatewayIntents::all());
        let shown = format!("{settings:?}");
        assert!(!shown.contains("T1"));
        assert!(shown.contains("<redacted>"));
    }
}
