use super::ui::create_profile_view;
use crate::commands::{STILL_STARTING, reply_ephemeral};
use crate::components::ComponentHandler;
use crate::dispatch::SlashCommand;
use crate::error::Result;
use crate::registry::DependencyRegistry;
use crate::storage::{StorageKey, get_or_create_profile};
use async_trait::async_trait;
use serenity::builder::{CreateCommand, CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::{CommandInteraction, ComponentInteraction};
use serenity::prelude::Context;

pub struct ProfileCommand;

#[async_trait]
impl SlashCommand for ProfileCommand {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn register(&self) -> CreateCommand {
        CreateCommand::new("profile").description("Show your profile.")
    }

    async fn run(
        &self,
        ctx: &Context,
        interaction: &CommandInteraction,
        deps: &DependencyRegistry,
    ) -> Result<()> {
        // Storage is registered by the Starting hook; a command can beat it.
        let Some(store) = deps.get::<StorageKey>().await else {
            return reply_ephemeral(ctx, interaction, STILL_STARTING).await;
        };
        let user = &interaction.user;
        let profile = get_or_create_profile(store.as_ref(), user.id.get()).await?;
        let (embed, components) = create_profile_view(&user.name, &profile);
        interaction
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .embed(embed)
                        .components(components)
                        .ephemeral(true),
                ),
            )
            .await?;
        Ok(())
    }
}

/// Re-renders the profile message in place.
pub struct RefreshProfile;

#[async_trait]
impl ComponentHandler for RefreshProfile {
    async fn handle(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        deps: &DependencyRegistry,
    ) -> Result<()> {
        let response = match deps.get::<StorageKey>().await {
            Some(store) => {
                let user = &component.user;
                let profile = get_or_create_profile(store.as_ref(), user.id.get()).await?;
                let (embed, components) = create_profile_view(&user.name, &profile);
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(embed)
                        .components(components),
                )
            }
            None => CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(STILL_STARTING)
                    .ephemeral(true),
            ),
        };
        component.create_response(&ctx.http, response).await?;
        Ok(())
    }
}
