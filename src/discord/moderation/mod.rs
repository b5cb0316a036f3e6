// Moderation on Discord: slash commands and the warning-role adapter.

pub mod commands;
pub mod serenity_roles;

pub use commands::*;
