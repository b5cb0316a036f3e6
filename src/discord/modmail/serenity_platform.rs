// Serenity implementation of the mod-mail platform port.
//
// Built per event from the gateway context; it owns nothing, so creating
// one is free.

use crate::core::modmail::{Capability, ModmailEntry, ModmailError, ModmailPlatform, ThreadHandle};
use crate::discord::embeds::moderation_embed;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;

const NEW_MAIL_TITLE: &str = "📩 New Mod Mail";
const NEW_MAIL_REACTION: &str = "✉️";
const THREAD_AUDIT_REASON: &str = "New Mod Mail";

pub struct SerenityModmail<'a> {
    ctx: &'a serenity::Context,
    /// Guild used to resolve staff permissions. DMs have none.
    guild_id: Option<serenity::GuildId>,
}

impl<'a> SerenityModmail<'a> {
    pub fn new(ctx: &'a serenity::Context, guild_id: Option<serenity::GuildId>) -> Self {
        Self { ctx, guild_id }
    }
}

fn platform_error(e: serenity::Error) -> ModmailError {
    ModmailError::Platform(e.to_string())
}

/// Map a capability onto Discord's permission bits.
pub fn capability_permissions(capability: Capability) -> serenity::Permissions {
    match capability {
        Capability::ManageMessages => serenity::Permissions::MANAGE_MESSAGES,
        Capability::KickMembers => serenity::Permissions::KICK_MEMBERS,
        Capability::BanMembers => serenity::Permissions::BAN_MEMBERS,
        Capability::ModerateMembers => serenity::Permissions::MODERATE_MEMBERS,
        Capability::ManageChannels => serenity::Permissions::MANAGE_CHANNELS,
        Capability::Administrator => serenity::Permissions::ADMINISTRATOR,
    }
}

/// Whether a channel is any kind of thread.
pub fn is_thread(channel: &serenity::GuildChannel) -> bool {
    matches!(
        channel.kind,
        serenity::ChannelType::PublicThread
            | serenity::ChannelType::PrivateThread
            | serenity::ChannelType::NewsThread
    )
}

#[async_trait]
impl ModmailPlatform for SerenityModmail<'_> {
    async fn create_thread(
        &self,
        parent_id: u64,
        name: &str,
    ) -> Result<ThreadHandle, ModmailError> {
        let builder = serenity::CreateThread::new(name)
            .kind(serenity::ChannelType::PublicThread)
            .audit_log_reason(THREAD_AUDIT_REASON);

        let thread = serenity::ChannelId::new(parent_id)
            .create_thread(self.ctx, builder)
            .await
            .map_err(platform_error)?;

        Ok(ThreadHandle(thread.id.get()))
    }

    async fn post_entry(
        &self,
        thread: ThreadHandle,
        entry: &ModmailEntry,
    ) -> Result<(), ModmailError> {
        let embed = moderation_embed(NEW_MAIL_TITLE, None)
            .field("User", entry.user_field(), true)
            .field("Message", entry.message_field(), false);

        let sent = serenity::ChannelId::new(thread.0)
            .send_message(self.ctx, serenity::CreateMessage::new().embed(embed))
            .await
            .map_err(platform_error)?;

        // The reaction is cosmetic; losing it shouldn't fail the relay
        if let Err(e) = sent
            .react(
                self.ctx,
                serenity::ReactionType::Unicode(NEW_MAIL_REACTION.to_string()),
            )
            .await
        {
            tracing::warn!(thread_id = thread.0, "Failed to react to mod mail entry: {}", e);
        }

        Ok(())
    }

    async fn send_direct(&self, user_id: u64, content: &str) -> Result<(), ModmailError> {
        serenity::UserId::new(user_id)
            .direct_message(self.ctx, serenity::CreateMessage::new().content(content))
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn archive_thread(&self, thread: ThreadHandle) -> Result<(), ModmailError> {
        serenity::ChannelId::new(thread.0)
            .edit_thread(
                self.ctx,
                serenity::EditThread::new().archived(true).locked(true),
            )
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn has_capability(
        &self,
        actor_id: u64,
        capability: Capability,
    ) -> Result<bool, ModmailError> {
        let Some(guild_id) = self.guild_id else {
            return Ok(false);
        };

        let member = guild_id
            .member(self.ctx, serenity::UserId::new(actor_id))
            .await
            .map_err(platform_error)?;

        // Guild-level permissions, resolved from the cache. The guard must
        // not live across an await.
        let permissions = match self.ctx.cache.guild(guild_id) {
            Some(guild) => guild.member_permissions(&member),
            None => return Ok(false),
        };

        Ok(permissions.administrator() || permissions.contains(capability_permissions(capability)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_map_to_single_permissions() {
        assert_eq!(
            capability_permissions(Capability::ManageMessages),
            serenity::Permissions::MANAGE_MESSAGES
        );
        assert_eq!(
            capability_permissions(Capability::ModerateMembers),
            serenity::Permissions::MODERATE_MEMBERS
        );
        assert_eq!(
            capability_permissions(Capability::Administrator),
            serenity::Permissions::ADMINISTRATOR
        );
    }
}
