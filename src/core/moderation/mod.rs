// Core moderation module - warnings, the mod-mail block list and the
// argument rules shared by the moderation commands.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
