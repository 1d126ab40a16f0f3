//! The command modules the bot loads at start-up.
//!
//! Every module listed in [`modules`] is loaded by the command client before the
//! gateway connects.

pub mod ping;
pub mod profile;

use crate::dispatch::CommandModule;
use crate::error::Result;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::CommandInteraction;
use serenity::prelude::Context;

/// Reply used when a command needs a dependency that is not registered yet.
pub const STILL_STARTING: &str = "The bot is still starting up, try again in a moment.";

pub fn modules() -> Vec<CommandModule> {
    vec![ping::module(), profile::module()]
}

/// Sends a reply only the invoking user can see.
pub async fn reply_ephemeral(
    ctx: &Context,
    interaction: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
