// Serenity implementation of the warning-role port.

use crate::core::moderation::{ModerationError, RoleChange, WarningRoles};
use crate::discord::embeds::is_missing_permissions_error;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;

/// Discord's "Unknown Role" JSON error code.
const UNKNOWN_ROLE: isize = 10011;

pub struct SerenityWarningRoles<'a> {
    ctx: &'a serenity::Context,
    role_id: serenity::RoleId,
}

impl<'a> SerenityWarningRoles<'a> {
    pub fn new(ctx: &'a serenity::Context, role_id: serenity::RoleId) -> Self {
        Self { ctx, role_id }
    }

    /// False only when the cached guild has no such role. An uncached guild
    /// falls through to the HTTP call.
    fn role_exists(&self, guild_id: serenity::GuildId) -> bool {
        self.ctx
            .cache
            .guild(guild_id)
            .map_or(true, |guild| guild.roles.contains_key(&self.role_id))
    }

    fn role_missing(&self, guild_id: serenity::GuildId) -> Result<RoleChange, ModerationError> {
        tracing::warn!(
            role_id = %self.role_id,
            guild_id = %guild_id,
            "Warning role not found, skipping role change"
        );
        Ok(RoleChange::RoleMissing)
    }

    fn classify(
        &self,
        guild_id: serenity::GuildId,
        result: serenity::Result<()>,
        refused: &str,
    ) -> Result<RoleChange, ModerationError> {
        match result {
            Ok(()) => Ok(RoleChange::Applied),
            Err(e) if is_unknown_role_error(&e) => self.role_missing(guild_id),
            Err(e) if is_missing_permissions_error(&e) => {
                Err(ModerationError::PermissionDenied(refused.to_string()))
            }
            Err(e) => Err(ModerationError::PlatformError(e.to_string())),
        }
    }
}

fn is_unknown_role_error(source: &serenity::Error) -> bool {
    matches!(
        source,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.error.code == UNKNOWN_ROLE
    )
}

#[async_trait]
impl WarningRoles for SerenityWarningRoles<'_> {
    async fn grant(
        &self,
        user_id: u64,
        guild_id: u64,
        audit_reason: &str,
    ) -> Result<RoleChange, ModerationError> {
        let guild_id = serenity::GuildId::new(guild_id);
        if !self.role_exists(guild_id) {
            return self.role_missing(guild_id);
        }

        let result = self
            .ctx
            .http
            .add_member_role(
                guild_id,
                serenity::UserId::new(user_id),
                self.role_id,
                Some(audit_reason),
            )
            .await;

        self.classify(
            guild_id,
            result,
            "I cannot assign the warning role. Check role hierarchy and permissions.",
        )
    }

    async fn revoke(
        &self,
        user_id: u64,
        guild_id: u64,
        audit_reason: &str,
    ) -> Result<RoleChange, ModerationError> {
        let guild_id = serenity::GuildId::new(guild_id);
        if !self.role_exists(guild_id) {
            return self.role_missing(guild_id);
        }

        let result = self
            .ctx
            .http
            .remove_member_role(
                guild_id,
                serenity::UserId::new(user_id),
                self.role_id,
                Some(audit_reason),
            )
            .await;

        self.classify(
            guild_id,
            result,
            "I cannot remove the warning role. Check role hierarchy and permissions.",
        )
    }
}
