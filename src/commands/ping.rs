use crate::commands::reply_ephemeral;
use crate::dispatch::{CommandModule, SlashCommand};
use crate::error::Result;
use crate::gateway::ShardManagerContainer;
use crate::registry::DependencyRegistry;
use async_trait::async_trait;
use serenity::builder::CreateCommand;
use serenity::model::application::CommandInteraction;
use serenity::prelude::Context;
use std::time::Duration;

pub fn module() -> CommandModule {
    CommandModule::new("ping").command(Ping)
}

pub struct Ping;

/// `Pong! Heartbeat Latency: ...`, with `N/A` before the first heartbeat ack.
pub fn format_latency(latency: Option<Duration>) -> String {
    let latency = latency.map_or_else(
        || "N/A".to_string(),
        |latency| format!("{} ms", latency.as_millis()),
    );
    format!("Pong! Heartbeat Latency: `{}`", latency)
}

#[async_trait]
impl SlashCommand for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn register(&self) -> CreateCommand {
        CreateCommand::new("ping").description("Check the gateway heartbeat latency.")
    }

    async fn run(
        &self,
        ctx: &Context,
        interaction: &CommandInteraction,
        deps: &DependencyRegistry,
    ) -> Result<()> {
        let mut latency = None;
        if let Some(shard_manager) = deps.get::<ShardManagerContainer>().await {
            let runners = shard_manager.runners.lock().await;
            latency = runners.get(&ctx.shard_id).and_then(|runner| runner.latency);
        }
        reply_ephemeral(ctx, interaction, format_latency(latency)).await
    }
}
