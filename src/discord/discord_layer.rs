// Discord layer - commands, event handlers and the serenity adapter.

use crate::core::moderation::ModerationService;
use crate::core::modmail::RelayService;
use crate::infra::moderation::SqliteModerationStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[path = "commands/command_catalog.rs"]
pub mod commands;
#[path = "embeds.rs"]
pub mod embeds;
#[path = "moderation/mod.rs"]
pub mod moderation;
#[path = "modmail/mod.rs"]
pub mod modmail;

/// Shared state handed to every command and event.
pub struct Data {
    pub moderation: Arc<ModerationService<SqliteModerationStore>>,
    pub modmail: Arc<RelayService<SqliteModerationStore>>,
    pub warning_role_id: serenity::RoleId,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
