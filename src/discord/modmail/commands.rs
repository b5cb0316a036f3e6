// Staff-side mod-mail commands.

use super::serenity_platform::{is_thread, SerenityModmail};
use crate::core::modmail::{CloseRequest, ModmailError};
use crate::discord::embeds::{confirm, reject};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Close the current Mod Mail thread.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn close(ctx: Context<'_>) -> Result<(), Error> {
    let channel = ctx.guild_channel().await;
    let thread_name = channel
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let request = CloseRequest {
        channel_id: ctx.channel_id().get(),
        in_thread: channel.as_ref().is_some_and(is_thread),
        parent_id: channel.as_ref().and_then(|c| c.parent_id).map(|id| id.get()),
        actor_id: ctx.author().id.get(),
    };

    let platform = SerenityModmail::new(ctx.serenity_context(), ctx.guild_id());
    match ctx.data().modmail.close_session(&platform, request).await {
        Ok(_) => {
            confirm(
                ctx,
                "✅ Mod Mail Closed",
                format!("Thread `{}` has been closed.", thread_name),
            )
            .await
        }
        Err(e @ (ModmailError::NotFound(_) | ModmailError::Permission(_))) => reject(ctx, e).await,
        Err(e) => Err(e.into()),
    }
}

/// Block a user from using Mod Mail.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn block(
    ctx: Context<'_>,
    #[description = "User to block"] member: serenity::User,
) -> Result<(), Error> {
    let platform = SerenityModmail::new(ctx.serenity_context(), ctx.guild_id());
    ctx.data()
        .modmail
        .block_user(&platform, member.id.get())
        .await?;

    confirm(
        ctx,
        "⛔ User Blocked",
        format!("{} has been blocked from using Mod Mail.", member.tag()),
    )
    .await
}

/// Unblock a user from using Mod Mail.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn unblock(
    ctx: Context<'_>,
    #[description = "User to unblock"] member: serenity::User,
) -> Result<(), Error> {
    ctx.data().moderation.unblock_user(member.id.get()).await?;

    confirm(
        ctx,
        "✅ User Unblocked",
        format!("{} can now use Mod Mail again.", member.tag()),
    )
    .await
}
