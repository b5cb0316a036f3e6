// Moderation slash commands: warnings, member actions and channel controls.
//
// Each command checks input, performs at most one stored change and one
// Discord action, then answers once. Input is validated before anything is
// mutated so a refused command leaves no trace.

use super::serenity_roles::SerenityWarningRoles;
use crate::core::moderation::{
    format_warning_list, purge_limit, timeout_until, ModerationError, ProofArtifact, PurgeBatch,
    RoleChange,
};
use crate::discord::embeds::{
    confirm, is_missing_permissions_error, moderation_embed, reject, RED_COLOR,
};
use crate::discord::{Context, Error};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serenity::Mentionable;

const DEFAULT_REASON: &str = "No reason";

fn proof_from_attachment(attachment: &serenity::Attachment) -> ProofArtifact {
    ProofArtifact {
        url: attachment.url.clone(),
        filename: attachment.filename.clone(),
        content_type: attachment.content_type.clone(),
        size: attachment.size,
    }
}

/// Warn a member, grant the warning role and log it with image proof.
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "User to warn"] user: serenity::Member,
    #[description = "Channel to post the warning"]
    #[channel_types("Text")]
    channel: serenity::GuildChannel,
    #[description = "Reason for warning"] reason: String,
    #[description = "Attach an image as proof"] attachment: Option<serenity::Attachment>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let data = ctx.data();

    let proof = attachment.as_ref().map(proof_from_attachment);
    let draft = match data.moderation.prepare_warning(&reason, proof.as_ref()) {
        Ok(draft) => draft,
        Err(e) => return reject(ctx, e).await,
    };

    // Role first; a refusal leaves nothing written, a failed write is reverted
    let roles = SerenityWarningRoles::new(ctx.serenity_context(), data.warning_role_id);
    let issued = match data
        .moderation
        .warn(&roles, user.user.id.get(), guild_id.get(), &ctx.author().tag(), draft)
        .await
    {
        Ok(issued) => issued,
        Err(e @ ModerationError::PermissionDenied(_)) => return reject(ctx, e).await,
        Err(e) => return Err(e.into()),
    };

    let mut footer = serenity::CreateEmbedFooter::new(format!("Issued by {}", ctx.author().tag()));
    if let Some(avatar) = ctx.author().avatar_url() {
        footer = footer.icon_url(avatar);
    }

    let embed = serenity::CreateEmbed::new()
        .title(issued.title())
        .description(format!(
            "**User:** {}\n**Reason:** {}",
            user.mention(),
            issued.reason
        ))
        .image(issued.proof_url)
        .color(RED_COLOR)
        .timestamp(serenity::Timestamp::now())
        .footer(footer);

    channel
        .id
        .send_message(ctx, serenity::CreateMessage::new().embed(embed))
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "✅ {} has been warned and logged in {}",
                user.mention(),
                channel.mention()
            ))
            .ephemeral(true),
    )
    .await?;

    Ok(())
}

/// Clear all warnings for a member and remove the warning role.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn clearwarnings(
    ctx: Context<'_>,
    #[description = "Member to clear"] member: serenity::Member,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let data = ctx.data();

    let roles = SerenityWarningRoles::new(ctx.serenity_context(), data.warning_role_id);
    let change = match data
        .moderation
        .clear(&roles, member.user.id.get(), guild_id.get(), &ctx.author().tag())
        .await
    {
        Ok(change) => change,
        Err(e @ ModerationError::PermissionDenied(_)) => return reject(ctx, e).await,
        Err(e) => return Err(e.into()),
    };

    let description = match change {
        RoleChange::Applied => {
            let role_name = ctx
                .guild()
                .and_then(|guild| guild.roles.get(&data.warning_role_id).map(|r| r.name.clone()))
                .unwrap_or_else(|| "warning".to_string());
            format!(
                "All warnings for {} have been cleared and {} role removed.",
                member.user.tag(),
                role_name
            )
        }
        RoleChange::RoleMissing => {
            format!("All warnings for {} have been cleared.", member.user.tag())
        }
    };

    confirm(ctx, "✅ Warnings Cleared", description).await
}

/// List a member's warnings.
#[poise::command(slash_command, guild_only)]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "Member to look up"] member: serenity::Member,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let reasons = ctx
        .data()
        .moderation
        .list_warnings(member.user.id.get(), guild_id.get())
        .await?;

    confirm(
        ctx,
        &format!("Warnings for {}", member.user.tag()),
        format_warning_list(&reasons),
    )
    .await
}

/// Kick a member.
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] member: serenity::Member,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let reason = reason.unwrap_or_else(|| DEFAULT_REASON.to_string());

    if let Err(e) = member.kick_with_reason(ctx, &reason).await {
        return refuse_or_fail(ctx, e, "kick that member").await;
    }
    tracing::info!(user_id = %member.user.id, moderator = %ctx.author().id, "Member kicked");

    confirm(
        ctx,
        "👢 User Kicked",
        format!("Member: {}\nReason: {}", member.user.tag(), reason),
    )
    .await
}

/// Ban a member.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] member: serenity::Member,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let reason = reason.unwrap_or_else(|| DEFAULT_REASON.to_string());

    if let Err(e) = member.ban_with_reason(ctx, 0, &reason).await {
        return refuse_or_fail(ctx, e, "ban that member").await;
    }
    tracing::info!(user_id = %member.user.id, moderator = %ctx.author().id, "Member banned");

    confirm(
        ctx,
        "⛔ User Banned",
        format!("Member: {}\nReason: {}", member.user.tag(), reason),
    )
    .await
}

/// Time a member out for a number of minutes.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] member: serenity::Member,
    #[description = "Duration in minutes (max 40320)"] minutes: u64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let until = match timeout_until(Utc::now(), minutes) {
        Ok(until) => until,
        Err(e) => return reject(ctx, e).await,
    };
    let until = serenity::Timestamp::from_unix_timestamp(until.timestamp())
        .map_err(|e| Error::from(e.to_string()))?;

    let builder = serenity::EditMember::new().disable_communication_until_datetime(until);
    if let Err(e) = guild_id.edit_member(ctx, member.user.id, builder).await {
        return refuse_or_fail(ctx, e, "time out that member").await;
    }

    confirm(
        ctx,
        "🕒 User Timed Out",
        format!("Member: {}\nDuration: {} minutes", member.user.tag(), minutes),
    )
    .await
}

/// Lift a member's timeout.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn untimeout(
    ctx: Context<'_>,
    #[description = "Member to release"] member: serenity::Member,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let builder = serenity::EditMember::new().enable_communication();
    if let Err(e) = guild_id.edit_member(ctx, member.user.id, builder).await {
        return refuse_or_fail(ctx, e, "remove that timeout").await;
    }

    confirm(
        ctx,
        "✅ Timeout Removed",
        format!("Timeout removed for {}", member.user.tag()),
    )
    .await
}

/// Delete recent messages in this channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn purge(
    ctx: Context<'_>,
    #[description = "Number of messages to delete (1-100)"] amount: u64,
) -> Result<(), Error> {
    let limit = match purge_limit(amount) {
        Ok(limit) => limit,
        Err(e) => return reject(ctx, e).await,
    };

    // Fetching and deleting can outlast the interaction deadline
    ctx.defer_ephemeral().await?;

    let channel_id = ctx.channel_id();
    let messages: Vec<(u64, DateTime<Utc>)> = channel_id
        .messages(ctx, serenity::GetMessages::new().limit(limit))
        .await?
        .iter()
        .map(|m| {
            let sent_at = DateTime::<Utc>::from_timestamp(m.timestamp.unix_timestamp(), 0)
                .unwrap_or_default();
            (m.id.get(), sent_at)
        })
        .collect();

    // Bulk delete refuses old messages, so those go one at a time
    let batch = PurgeBatch::split(&messages, Utc::now());
    if let Err(e) = delete_batch(ctx, channel_id, &batch).await {
        return refuse_or_fail(ctx, e, "delete messages here").await;
    }

    tracing::info!(
        channel_id = %channel_id,
        bulk = batch.bulk.len(),
        single = batch.single.len(),
        "Messages purged"
    );

    let embed = moderation_embed(
        "🧹 Messages Purged",
        Some(format!("{} messages deleted", batch.total())),
    );
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

async fn delete_batch(
    ctx: Context<'_>,
    channel_id: serenity::ChannelId,
    batch: &PurgeBatch,
) -> Result<(), serenity::Error> {
    if !batch.bulk.is_empty() {
        let ids = batch.bulk.iter().map(|id| serenity::MessageId::new(*id));
        channel_id.delete_messages(ctx.http(), ids).await?;
    }
    for id in &batch.single {
        channel_id
            .delete_message(ctx.http(), serenity::MessageId::new(*id))
            .await?;
    }
    Ok(())
}

/// Stop @everyone from sending messages in this channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn lock(ctx: Context<'_>) -> Result<(), Error> {
    set_channel_lock(ctx, true).await
}

/// Let @everyone send messages in this channel again.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn unlock(ctx: Context<'_>) -> Result<(), Error> {
    set_channel_lock(ctx, false).await
}

async fn set_channel_lock(ctx: Context<'_>, locked: bool) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let everyone = guild_id.everyone_role();

    let existing = ctx.guild_channel().await.and_then(|channel| {
        channel
            .permission_overwrites
            .into_iter()
            .find(|o| o.kind == serenity::PermissionOverwriteType::Role(everyone))
    });
    let overwrite = send_messages_overwrite(existing, everyone, locked);

    if let Err(e) = ctx.channel_id().create_permission(ctx, overwrite).await {
        return refuse_or_fail(ctx, e, "edit this channel's permissions").await;
    }

    let (title, state) = if locked {
        ("🔒 Channel Locked", "locked")
    } else {
        ("🔓 Channel Unlocked", "unlocked")
    };
    confirm(
        ctx,
        title,
        format!("{} is now {}", ctx.channel_id().mention(), state),
    )
    .await
}

/// Toggle SEND_MESSAGES on the @everyone overwrite, keeping its other bits.
fn send_messages_overwrite(
    existing: Option<serenity::PermissionOverwrite>,
    everyone: serenity::RoleId,
    locked: bool,
) -> serenity::PermissionOverwrite {
    let mut overwrite = existing.unwrap_or(serenity::PermissionOverwrite {
        allow: serenity::Permissions::empty(),
        deny: serenity::Permissions::empty(),
        kind: serenity::PermissionOverwriteType::Role(everyone),
    });

    let send = serenity::Permissions::SEND_MESSAGES;
    if locked {
        overwrite.allow.remove(send);
        overwrite.deny.insert(send);
    } else {
        overwrite.deny.remove(send);
        overwrite.allow.insert(send);
    }
    overwrite
}

/// A 403 becomes an ephemeral refusal; anything else goes to `on_error`.
async fn refuse_or_fail(ctx: Context<'_>, e: serenity::Error, action: &str) -> Result<(), Error> {
    if is_missing_permissions_error(&e) {
        return reject(ctx, format!("I don't have permission to {}.", action)).await;
    }
    Err(e.into())
}
