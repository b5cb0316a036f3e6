// Mod-mail on Discord: staff commands, message routing and the platform
// adapter the relay talks through.

pub mod commands;
pub mod events;
pub mod serenity_platform;
