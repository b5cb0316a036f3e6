// The infra module contains implementations of core traits and the
// process-level services that sit beside the bot.
// Each feature implementation goes in its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "keepalive/keepalive_server.rs"]
pub mod keepalive;
