//! Embed and buttons for the `/profile` command.

use crate::storage::Profile;
use serenity::builder::{CreateActionRow, CreateButton, CreateEmbed};
use serenity::model::application::ButtonStyle;

pub const FAMILY: &str = "profile";
pub const REFRESH_ID: &str = "profile_refresh";

pub fn create_profile_view(username: &str, profile: &Profile) -> (CreateEmbed, Vec<CreateActionRow>) {
    let embed = CreateEmbed::new()
        .title(format!("{}'s Profile", username))
        .field("💰 Balance", format!("`{}` coins", profile.balance), true)
        .field(
            "📅 Member Since",
            profile.created_at.format("%Y-%m-%d").to_string(),
            true,
        )
        .color(0x5865F2);
    let buttons = CreateActionRow::Buttons(vec![
        CreateButton::new(REFRESH_ID)
            .label("Refresh")
            .style(ButtonStyle::Secondary),
    ]);
    (embed, vec![buttons])
}
