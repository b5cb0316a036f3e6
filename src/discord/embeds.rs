// Shared embed and reply helpers for the moderation and mod-mail commands.

use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

pub const RED_COLOR: u32 = 0xFF0000;
const FOOTER_TEXT: &str = "Moderation Bot";

/// The standard red embed with a timestamp and the bot footer.
pub fn moderation_embed(title: impl Into<String>, description: Option<String>) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(title)
        .color(RED_COLOR)
        .timestamp(serenity::Timestamp::now())
        .footer(serenity::CreateEmbedFooter::new(FOOTER_TEXT));

    if let Some(description) = description {
        embed = embed.description(description);
    }
    embed
}

/// Reply with a confirmation embed visible to the channel.
pub async fn confirm(
    ctx: Context<'_>,
    title: &str,
    description: impl Into<String>,
) -> Result<(), Error> {
    let embed = moderation_embed(title, Some(description.into()));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Tell only the invoker why their command was refused.
pub async fn reject(ctx: Context<'_>, message: impl std::fmt::Display) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(format!("❌ {}", message))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Discord answered 403 / "Missing Permissions" (role hierarchy, channel
/// overwrites and the like).
pub fn is_missing_permissions_error(source: &serenity::Error) -> bool {
    matches!(
        source,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 403 || response.error.code == 50013
    )
}
